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

//! Shared fixtures for the analyzer test suites

use crate::core::{analyze, AnalysisError, ReplaceWith, ReplacementExpression};
use crate::descriptors::{add_builtins, DescriptorId, Descriptors, KotlinType};
use crate::name::FqName;
use crate::resolve::{InMemoryFrontend, ResolutionFacade};
use crate::syntax::Role;

/// A descriptor arena with the builtins, one module `main` and a file in
/// package `p`.
pub struct TestWorld {
    pub descriptors: Descriptors,
    pub builtins: DescriptorId,
    pub module: DescriptorId,
    pub fragment: DescriptorId,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_package("p")
    }

    pub fn with_package(package: &str) -> Self {
        let mut descriptors = Descriptors::new();
        let builtins = add_builtins(&mut descriptors);
        let module = descriptors.add_module("main", vec![builtins]);
        let fragment =
            descriptors.add_package_fragment(module, FqName::from_trusted(package), Vec::new());
        Self {
            descriptors,
            builtins,
            module,
            fragment,
        }
    }

    /// The non-nullable type of the class named `fq_name`.
    pub fn ty(&self, fq_name: &str) -> KotlinType {
        let class = self
            .descriptors
            .find_class(fq_name)
            .unwrap_or_else(|| panic!("no class {}", fq_name));
        KotlinType::simple(class)
    }

    pub fn int(&self) -> KotlinType {
        self.ty("kotlin.Int")
    }

    pub fn string(&self) -> KotlinType {
        self.ty("kotlin.String")
    }

    pub fn list_of(&self, element: KotlinType) -> KotlinType {
        let list = self.descriptors.find_class("kotlin.collections.List").unwrap();
        KotlinType::class(list, vec![element])
    }

    /// Add a top-level function with value parameters and a return type.
    pub fn function(
        &mut self,
        name: &str,
        parameters: &[(&str, KotlinType)],
        returns: KotlinType,
    ) -> DescriptorId {
        let fragment = self.fragment;
        self.member_function(fragment, name, parameters, returns)
    }

    pub fn member_function(
        &mut self,
        containing: DescriptorId,
        name: &str,
        parameters: &[(&str, KotlinType)],
        returns: KotlinType,
    ) -> DescriptorId {
        let function = self.descriptors.add_function(containing, name);
        for (parameter, ty) in parameters {
            self.descriptors.add_value_parameter(function, parameter, ty.clone());
        }
        self.descriptors.set_return_type(function, returns);
        function
    }

    pub fn frontend(self) -> InMemoryFrontend {
        InMemoryFrontend::new(self.descriptors)
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

pub fn analyze_text(
    facade: &dyn ResolutionFacade,
    callable: DescriptorId,
    expression: &str,
    imports: &[&str],
) -> Result<ReplacementExpression, AnalysisError> {
    let annotation = ReplaceWith::new(expression).with_imports(imports.iter().copied());
    analyze(&annotation, callable, facade)
}

/// Roles of every name spelled `name` in the template, in tree order.
pub fn roles_of(template: &ReplacementExpression, name: &str) -> Vec<Role> {
    template
        .expression()
        .simple_names()
        .into_iter()
        .filter(|simple| simple.name == name)
        .map(|simple| simple.role.clone())
        .collect()
}

pub fn import_names(template: &ReplacementExpression) -> Vec<String> {
    template
        .fq_names_to_import()
        .iter()
        .map(|name| name.to_string())
        .collect()
}
