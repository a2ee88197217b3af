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

//! Verification of `ReplaceWith` annotations.
//!
//! Every annotated declaration is analyzed, and the resulting template is
//! resolved again in the declaration's scope with only the template's own
//! imports. References that still do not resolve are reported.

use crate::core::scope_builder::{explicit_imports_scope, get_resolution_scope};
use crate::core::{analyze, analyze_in_context, AnalysisError, ImportSet, ReplacementExpression};
use crate::descriptors::DescriptorId;
use crate::model::{AnnotatedDeclaration, LoadedModel};
use crate::resolve::{Diagnostic, FrontendConfig, ResolutionFacade};

/// Result of checking `ReplaceWith` annotations
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// True if all replacements are valid, False otherwise
    pub success: bool,
    /// List of error messages for invalid replacements
    pub errors: Vec<String>,
    /// List of declarations that were checked
    pub checked_declarations: Vec<String>,
}

impl CheckResult {
    pub fn new() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            checked_declarations: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.success = false;
        self.errors.push(error);
    }

    pub fn add_checked_declaration(&mut self, name: String) {
        self.checked_declarations.push(name);
    }
}

impl Default for CheckResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze every annotated declaration of `model`.
pub fn check_model(model: LoadedModel, config: FrontendConfig) -> CheckResult {
    let (frontend, annotated) = model.into_frontend(config);
    let mut result = CheckResult::new();
    for declaration in &annotated {
        result.add_checked_declaration(declaration.name.clone());
        match check_declaration(declaration, &frontend) {
            Ok(diagnostics) => {
                for diagnostic in diagnostics {
                    result.add_error(format!("{}: {}", declaration.name, diagnostic.message));
                }
            }
            Err(e) => result.add_error(format!("{}: {}", declaration.name, e)),
        }
    }
    result
}

/// Analyze one declaration and return what re-resolving its template reports.
pub fn check_declaration(
    declaration: &AnnotatedDeclaration,
    facade: &dyn ResolutionFacade,
) -> Result<Vec<Diagnostic>, AnalysisError> {
    let template = analyze(&declaration.replace_with, declaration.descriptor, facade)?;
    template_diagnostics(&template, declaration.descriptor, facade)
}

/// Resolve `template` inside `callable` using only the template's imports.
pub fn template_diagnostics(
    template: &ReplacementExpression,
    callable: DescriptorId,
    facade: &dyn ResolutionFacade,
) -> Result<Vec<Diagnostic>, AnalysisError> {
    let descriptors = facade.descriptors();
    let callable = descriptors.original(descriptors.unwrap_fake_override(callable));
    let module = descriptors
        .module_of(callable)
        .ok_or_else(|| AnalysisError::UnsupportedDeclarationKind(descriptors.description(callable)))?;

    let mut imports = ImportSet::new();
    for name in template.fq_names_to_import() {
        imports.add(name.clone());
    }
    let mut additional = vec![explicit_imports_scope(&imports, module, facade)?];
    additional.extend(facade.additional_scopes());
    let scope = get_resolution_scope(callable, facade, &additional)?;
    let binding = analyze_in_context(template.expression(), &scope, module, facade)?;
    Ok(binding.diagnostics().to_vec())
}
