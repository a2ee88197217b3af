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

use indexmap::IndexSet;

use crate::name::{FqName, FqNameUnsafe};

/// Insertion-ordered set of the names a replacement needs imported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    names: IndexSet<FqName>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the set from annotation imports, dropping entries that are not
    /// valid and safe fully-qualified names.
    pub fn from_annotation<S: AsRef<str>>(imports: &[S]) -> Self {
        let mut set = Self::new();
        for import in imports {
            let import = import.as_ref();
            match FqNameUnsafe::parse(import).and_then(|name| name.to_safe()) {
                Some(name) => {
                    set.add(name);
                }
                None => tracing::debug!("Dropping invalid import {:?}", import),
            }
        }
        set
    }

    /// Add a name unless it is already present. The root name is never added.
    pub fn add(&mut self, name: FqName) -> bool {
        if name.is_root() {
            return false;
        }
        self.names.insert(name)
    }

    pub fn add_if_some(&mut self, name: Option<FqName>) {
        if let Some(name) = name {
            self.add(name);
        }
    }

    pub fn contains(&self, name: &FqName) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FqName> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn into_inner(self) -> IndexSet<FqName> {
        self.names
    }
}
