// Copyright (C) 2024 Jelmer Vernooij <jelmer@samba.org>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod checker;
pub mod core;
pub mod descriptors;
pub mod model;
pub mod name;
pub mod resolve;
pub mod scanner;
pub mod scope;
pub mod syntax;

pub use checker::{check_model, CheckResult};
pub use crate::core::*;
pub use model::{load_model, load_model_file, AnnotatedDeclaration, LoadedModel};
pub use resolve::{FrontendConfig, InMemoryFrontend, ProgressIndicator, ResolutionFacade};
pub use scanner::*;

#[cfg(test)]
mod tests;

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod test_setup;
