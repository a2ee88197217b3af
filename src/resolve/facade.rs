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

//! The front-end services the analyzer consumes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::descriptors::{DescriptorId, DescriptorKind, Descriptors};
use crate::name::FqName;
use crate::resolve::typing::{Canceled, ExpressionTypingServices, ProgressIndicator};
use crate::scope::{chained_package_scope, ClassResolutionScopesSupport, LexicalScope, MemberScope};
use crate::syntax::ExpressionFactory;

/// Access to a compiler front-end.
pub trait ResolutionFacade {
    fn descriptors(&self) -> &Descriptors;

    /// A fresh factory for building expression trees.
    fn expression_factory(&self) -> ExpressionFactory {
        ExpressionFactory::new()
    }

    fn expression_typing_services(&self, module: DescriptorId) -> ExpressionTypingServices<'_>;

    /// Descriptors an import of `fq_name` would bring into scope in `module`.
    fn resolve_import_reference(
        &self,
        module: DescriptorId,
        fq_name: &FqName,
    ) -> Result<Vec<DescriptorId>, Canceled>;

    /// File-level scopes every expression sees, such as default imports.
    fn additional_scopes(&self) -> Vec<MemberScope>;

    /// The precomputed member-declaration scope of a source class.
    fn class_member_declaration_scope(&self, class: DescriptorId) -> Option<Arc<LexicalScope>>;

    /// The scope recorded for a local variable's declaration.
    fn local_variable_scope(&self, local: DescriptorId) -> Option<Arc<LexicalScope>>;
}

#[derive(Debug, Clone)]
pub struct FrontendConfig {
    default_imports: Vec<FqName>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            default_imports: vec![
                FqName::from_trusted("kotlin"),
                FqName::from_trusted("kotlin.collections"),
            ],
        }
    }
}

impl FrontendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_default_imports() -> Self {
        Self {
            default_imports: Vec::new(),
        }
    }

    pub fn with_default_import(mut self, package: FqName) -> Self {
        if !self.default_imports.contains(&package) {
            self.default_imports.push(package);
        }
        self
    }

    pub fn default_imports(&self) -> &[FqName] {
        &self.default_imports
    }
}

/// A front-end over a fully built descriptor arena.
///
/// Scopes of source classes are computed once and shared between threads.
pub struct InMemoryFrontend {
    descriptors: Descriptors,
    config: FrontendConfig,
    progress: ProgressIndicator,
    class_scopes: Mutex<HashMap<DescriptorId, Arc<LexicalScope>>>,
    local_scopes: Mutex<HashMap<DescriptorId, Arc<LexicalScope>>>,
}

impl InMemoryFrontend {
    pub fn new(descriptors: Descriptors) -> Self {
        Self::with_config(descriptors, FrontendConfig::default())
    }

    pub fn with_config(descriptors: Descriptors, config: FrontendConfig) -> Self {
        Self {
            descriptors,
            config,
            progress: ProgressIndicator::new(),
            class_scopes: Mutex::new(HashMap::new()),
            local_scopes: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_progress(mut self, progress: ProgressIndicator) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> &ProgressIndicator {
        &self.progress
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    pub fn record_local_variable_scope(&self, local: DescriptorId, scope: Arc<LexicalScope>) {
        self.local_scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(local, scope);
    }

    fn resolve_visible(&self, module: DescriptorId, fq_name: &FqName) -> Vec<DescriptorId> {
        let visible = self.descriptors.visible_modules(module);
        self.descriptors
            .resolve_fq_name(fq_name)
            .into_iter()
            .filter(|id| match self.descriptors.module_of(*id) {
                Some(owner) => visible.contains(&owner),
                None => true,
            })
            .collect()
    }

    /// The scope of a source file: its package, its own imports, then the
    /// default imports.
    fn file_scope(&self, fragment: DescriptorId) -> Option<Arc<LexicalScope>> {
        let DescriptorKind::PackageFragment(data) = &self.descriptors.get(fragment).kind else {
            return None;
        };
        let view = self.descriptors.package_view(&data.fq_name)?;
        let module = self.descriptors.module_of(fragment)?;
        let imported: Vec<DescriptorId> = data
            .imports
            .iter()
            .flat_map(|import| self.resolve_visible(module, import))
            .collect();
        let mut additional = vec![MemberScope::ExplicitImports(imported)];
        additional.extend(self.additional_scopes());
        Some(chained_package_scope(view, &additional))
    }

    fn compute_class_scope(&self, class: DescriptorId) -> Option<Arc<LexicalScope>> {
        let containing = self.descriptors.containing(class)?;
        let outer = match &self.descriptors.get(containing).kind {
            DescriptorKind::PackageFragment(_) => self.file_scope(containing)?,
            DescriptorKind::Class(_) => self.class_member_declaration_scope(containing)?,
            _ => return None,
        };
        Some(ClassResolutionScopesSupport::new(class, outer).scope_for_member_declaration_resolution(&self.descriptors))
    }
}

impl ResolutionFacade for InMemoryFrontend {
    fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    fn expression_typing_services(&self, module: DescriptorId) -> ExpressionTypingServices<'_> {
        ExpressionTypingServices::new(&self.descriptors, module, self.progress.clone())
    }

    fn resolve_import_reference(
        &self,
        module: DescriptorId,
        fq_name: &FqName,
    ) -> Result<Vec<DescriptorId>, Canceled> {
        self.progress.check_canceled()?;
        let resolved = self.resolve_visible(module, fq_name);
        if resolved.is_empty() {
            tracing::debug!("Import {} does not resolve", fq_name);
        }
        Ok(resolved)
    }

    fn additional_scopes(&self) -> Vec<MemberScope> {
        self.config
            .default_imports
            .iter()
            .filter_map(|package| self.descriptors.package_view(package))
            .map(MemberScope::AllUnderImport)
            .collect()
    }

    fn class_member_declaration_scope(&self, class: DescriptorId) -> Option<Arc<LexicalScope>> {
        if let Some(scope) = self
            .class_scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&class)
        {
            return Some(scope.clone());
        }
        // Computed without holding the lock: nested classes recurse into
        // their outer class's scope.
        let scope = self.compute_class_scope(class)?;
        Some(
            self.class_scopes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entry(class)
                .or_insert(scope)
                .clone(),
        )
    }

    fn local_variable_scope(&self, local: DescriptorId) -> Option<Arc<LexicalScope>> {
        self.local_scopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&local)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{add_builtins, ClassKind};
    use crate::name::Name;

    fn frontend() -> (InMemoryFrontend, DescriptorId, DescriptorId) {
        let mut d = Descriptors::new();
        let builtins = add_builtins(&mut d);
        let other = d.add_module("other", Vec::new());
        let hidden = d.add_package_fragment(other, FqName::from_trusted("hidden"), Vec::new());
        d.add_function(hidden, "secret");
        let main = d.add_module("main", vec![builtins]);
        let fragment = d.add_package_fragment(
            main,
            FqName::from_trusted("p"),
            vec![FqName::from_trusted("kotlin.collections.listOf")],
        );
        let class = d.add_class(fragment, "C", ClassKind::Class);
        d.set_has_resolution_scopes(class, true);
        (InMemoryFrontend::new(d), main, class)
    }

    #[test]
    fn test_import_resolution_respects_dependencies() {
        let (frontend, main, _) = frontend();
        assert_eq!(
            frontend
                .resolve_import_reference(main, &FqName::from_trusted("kotlin.collections.listOf"))
                .unwrap()
                .len(),
            1
        );
        assert!(frontend
            .resolve_import_reference(main, &FqName::from_trusted("hidden.secret"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_canceled_import_resolution() {
        let (frontend, main, _) = frontend();
        frontend.progress().cancel();
        assert_eq!(
            frontend.resolve_import_reference(main, &FqName::from_trusted("kotlin")),
            Err(Canceled)
        );
    }

    #[test]
    fn test_source_class_scope_is_cached_and_sees_file_imports() {
        let (frontend, _, class) = frontend();
        let first = frontend.class_member_declaration_scope(class).unwrap();
        let second = frontend.class_member_declaration_scope(class).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let file_level = first.levels().last().unwrap();
        let found = file_level.contributed(frontend.descriptors(), &Name::new("listOf"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_default_imports_from_config() {
        let mut d = Descriptors::new();
        add_builtins(&mut d);
        let frontend = InMemoryFrontend::with_config(d, FrontendConfig::without_default_imports());
        assert!(frontend.additional_scopes().is_empty());

        let mut d = Descriptors::new();
        add_builtins(&mut d);
        let frontend = InMemoryFrontend::new(d);
        assert_eq!(frontend.additional_scopes().len(), 2);
    }
}
