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

//! Making inferred type arguments explicit.
//!
//! Inside the deprecated declaration `listOf(x)` infers `T` from `x`; at a
//! call site `x` is replaced by an arbitrary argument, so the inferred
//! arguments are spelled out before the template leaves the analyzer.

use tracing::debug;

use crate::descriptors::{Descriptors, KotlinType};
use crate::resolve::BindingContext;
use crate::syntax::{CallExpr, Expr, ExpressionFactory, NodeId, TypeArgumentList};

/// Whether `call` should get an explicit type argument list.
pub fn is_applicable(call: &CallExpr, binding: &BindingContext) -> bool {
    if call.type_arguments.is_some() {
        return false;
    }
    let Some(resolved) = call
        .callee_name()
        .and_then(|callee| binding.resolved_call(callee.id))
    else {
        return false;
    };
    !resolved.type_arguments.is_empty()
        && !resolved.type_arguments.values().any(KotlinType::contains_error)
}

/// The inferred type arguments of `call`, in type parameter order.
pub fn create_type_arguments(
    call: &CallExpr,
    binding: &BindingContext,
    descriptors: &Descriptors,
    factory: &ExpressionFactory,
) -> Option<TypeArgumentList> {
    let resolved = binding.resolved_call(call.callee_name()?.id)?;
    let rendered: Vec<String> = resolved
        .type_arguments
        .values()
        .map(|ty| descriptors.render_type(ty))
        .collect();
    let text = format!("<{}>", rendered.join(", "));
    match factory.create_type_arguments(&text) {
        Ok(arguments) => Some(arguments),
        Err(e) => {
            debug!("Cannot parse type arguments {}: {}", text, e);
            None
        }
    }
}

/// Add explicit type arguments to every applicable call in `expression`.
///
/// Returns whether the tree changed.
pub fn insert_explicit_type_arguments(
    expression: &mut Expr,
    binding: &BindingContext,
    descriptors: &Descriptors,
    factory: &ExpressionFactory,
) -> bool {
    let mut pending: Vec<(NodeId, TypeArgumentList)> = Vec::new();
    expression.for_each_call(&mut |expr, call| {
        if !is_applicable(call, binding) {
            return;
        }
        if let Some(arguments) = create_type_arguments(call, binding, descriptors, factory) {
            pending.push((expr.id, arguments));
        }
    });

    let mut inserted = 0;
    for (id, arguments) in pending {
        if let Some(call) = expression.call_mut(id) {
            call.type_arguments = Some(arguments);
            inserted += 1;
        }
    }
    debug!("Inserted {} explicit type argument lists", inserted);
    inserted > 0
}
