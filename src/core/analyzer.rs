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

//! Turning a `ReplaceWith` annotation into a replacement template.

use tracing::debug;

use crate::core::imports::ImportSet;
use crate::core::rewriter::rewrite_references;
use crate::core::scope_builder::{explicit_imports_scope, get_resolution_scope};
use crate::core::type_arguments::insert_explicit_type_arguments;
use crate::core::types::{AnalysisError, ReplaceWith, ReplacementExpression};
use crate::descriptors::DescriptorId;
use crate::resolve::{BindingContext, BindingTrace, DataFlowInfo, ResolutionFacade};
use crate::scope::LexicalScope;
use crate::syntax::Expr;

/// Analyze the replacement `annotation` of the deprecated `callable`.
///
/// Fake overrides are followed to the declaration they inherit, so every
/// override of a deprecated member yields the same template.
pub fn analyze(
    annotation: &ReplaceWith,
    callable: DescriptorId,
    facade: &dyn ResolutionFacade,
) -> Result<ReplacementExpression, AnalysisError> {
    let descriptors = facade.descriptors();
    if !descriptors.is_callable(callable) {
        return Err(AnalysisError::UnsupportedDeclarationKind(
            descriptors.description(callable),
        ));
    }
    let mut original = callable;
    if descriptors.is_class_member(original) {
        original = descriptors.unwrap_fake_override(original);
    }
    original = descriptors.original(original);
    debug!(
        "Analyzing replacement `{}` for {}",
        annotation.expression,
        descriptors.description(original)
    );
    analyze_original(annotation, original, facade)
}

/// Analyze `annotation` for a callable that is already its own original.
pub fn analyze_original(
    annotation: &ReplaceWith,
    callable: DescriptorId,
    facade: &dyn ResolutionFacade,
) -> Result<ReplacementExpression, AnalysisError> {
    let descriptors = facade.descriptors();
    let factory = facade.expression_factory();

    let mut expression = factory
        .create_expression(&annotation.expression)
        .map_err(|e| AnalysisError::MalformedReplacement {
            expression: annotation.expression.clone(),
            message: e.to_string(),
        })?;

    let mut imports = ImportSet::from_annotation(&annotation.imports);
    let module = descriptors
        .module_of(callable)
        .ok_or_else(|| AnalysisError::UnsupportedDeclarationKind(descriptors.description(callable)))?;

    let mut additional = vec![explicit_imports_scope(&imports, module, facade)?];
    additional.extend(facade.additional_scopes());
    let scope = get_resolution_scope(callable, facade, &additional)?;

    let mut binding = analyze_in_context(&expression, &scope, module, facade)?;
    debug!("First pass left {} diagnostics", binding.diagnostics().len());

    if insert_explicit_type_arguments(&mut expression, &binding, descriptors, &factory) {
        binding = analyze_in_context(&expression, &scope, module, facade)?;
        debug!("Second pass left {} diagnostics", binding.diagnostics().len());
    }

    rewrite_references(
        &mut expression,
        callable,
        &binding,
        &scope,
        descriptors,
        &factory,
        &mut imports,
    );

    Ok(ReplacementExpression::new(expression, imports.into_inner()))
}

/// Type `expression` in `scope` with no expected type.
pub fn analyze_in_context(
    expression: &Expr,
    scope: &LexicalScope,
    module: DescriptorId,
    facade: &dyn ResolutionFacade,
) -> Result<BindingContext, AnalysisError> {
    let mut trace = BindingTrace::new();
    facade.expression_typing_services(module).get_type_info(
        scope,
        expression,
        None,
        &DataFlowInfo::EMPTY,
        &mut trace,
        false,
    )?;
    Ok(trace.into_binding_context())
}
