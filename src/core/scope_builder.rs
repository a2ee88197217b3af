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

//! The lexical scope a replacement expression is resolved in.
//!
//! The scope mimics the inside of the deprecated declaration: a function
//! sees its parameters, a member sees its class's `this`, and everything
//! sees its package plus the annotation imports.

use std::sync::Arc;

use crate::core::imports::ImportSet;
use crate::core::types::AnalysisError;
use crate::descriptors::{DescriptorId, DescriptorKind};
use crate::resolve::ResolutionFacade;
use crate::scope::{
    chained_package_scope, function_inner_scope, property_declaration_inner_scope,
    ClassResolutionScopesSupport, LexicalScope, MemberScope,
};

/// Resolve `imports` in `module` into a member scope.
pub fn explicit_imports_scope(
    imports: &ImportSet,
    module: DescriptorId,
    facade: &dyn ResolutionFacade,
) -> Result<MemberScope, AnalysisError> {
    let mut imported = Vec::new();
    for import in imports.iter() {
        imported.extend(facade.resolve_import_reference(module, import)?);
    }
    Ok(MemberScope::ExplicitImports(imported))
}

/// The scope expressions inside `descriptor` are resolved in.
///
/// `additional` is chained after the package member scope.
pub fn get_resolution_scope(
    descriptor: DescriptorId,
    facade: &dyn ResolutionFacade,
    additional: &[MemberScope],
) -> Result<Arc<LexicalScope>, AnalysisError> {
    let descriptors = facade.descriptors();
    match &descriptors.get(descriptor).kind {
        DescriptorKind::PackageFragment(data) => {
            let view = descriptors
                .package_view(&data.fq_name)
                .ok_or_else(|| unsupported(facade, descriptor))?;
            get_resolution_scope(view, facade, additional)
        }
        DescriptorKind::PackageView { .. } => Ok(chained_package_scope(descriptor, additional)),
        DescriptorKind::Class(data) => {
            if data.has_resolution_scopes {
                return facade
                    .class_member_declaration_scope(descriptor)
                    .ok_or_else(|| unsupported(facade, descriptor));
            }
            let outer = containing_scope(descriptor, facade, additional)?;
            Ok(ClassResolutionScopesSupport::new(descriptor, outer)
                .scope_for_member_declaration_resolution(descriptors))
        }
        DescriptorKind::Function(_) | DescriptorKind::Constructor(_) => {
            let outer = containing_scope(descriptor, facade, additional)?;
            Ok(function_inner_scope(outer, descriptor, descriptors))
        }
        DescriptorKind::Property(_) => {
            let outer = containing_scope(descriptor, facade, additional)?;
            Ok(property_declaration_inner_scope(outer, descriptor, descriptors))
        }
        DescriptorKind::LocalVariable { .. } => facade
            .local_variable_scope(descriptor)
            .ok_or_else(|| unsupported(facade, descriptor)),
        _ => Err(unsupported(facade, descriptor)),
    }
}

fn containing_scope(
    descriptor: DescriptorId,
    facade: &dyn ResolutionFacade,
    additional: &[MemberScope],
) -> Result<Arc<LexicalScope>, AnalysisError> {
    let containing = facade
        .descriptors()
        .containing(descriptor)
        .ok_or_else(|| unsupported(facade, descriptor))?;
    get_resolution_scope(containing, facade, additional)
}

fn unsupported(facade: &dyn ResolutionFacade, descriptor: DescriptorId) -> AnalysisError {
    AnalysisError::UnsupportedDeclarationKind(facade.descriptors().description(descriptor))
}
