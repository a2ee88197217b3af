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

use tracing::debug;

use crate::core::imports::ImportSet;
use crate::descriptors::{DescriptorId, DescriptorKind, Descriptors};
use crate::name::is_identifier;
use crate::resolve::{BindingContext, ReceiverValue};
use crate::scope::{LexicalScope, ThisReceiver};
use crate::syntax::{Expr, ExpressionFactory, NodeId, Role};

/// Express an implicit receiver as source in `scope`.
///
/// Objects are named by their fully-qualified name. Otherwise the first
/// implicit receiver whose type fits is `this` when innermost, or
/// `this@Label` when an outer receiver can be labelled unambiguously.
pub fn materialize_this(
    receiver: &ThisReceiver,
    scope: &LexicalScope,
    descriptors: &Descriptors,
    factory: &ExpressionFactory,
) -> Option<Expr> {
    if descriptors
        .class(receiver.owner)
        .is_some_and(|class| class.kind.is_singleton())
    {
        let fq_name = descriptors.fq_name(receiver.owner)?;
        return factory.create_expression(fq_name.as_str()).ok();
    }

    let receivers = scope.implicit_receivers();
    let position = receivers
        .iter()
        .position(|candidate| descriptors.is_subtype(&candidate.ty, &receiver.ty))?;
    if position == 0 {
        return Some(factory.create_this(None));
    }

    let label = descriptors.name(receivers[position].owner);
    if label.is_special() || !is_identifier(label.as_str()) {
        return None;
    }
    // An inner receiver with the same label would capture `this@Label`.
    if receivers[..position]
        .iter()
        .any(|inner| descriptors.name(inner.owner) == label)
    {
        return None;
    }
    Some(factory.create_this(Some(label.clone())))
}

/// Tag parameter usages, collect imports and qualify implicit receivers.
///
/// `callable` is the deprecated declaration whose parameters are tagged.
pub fn rewrite_references(
    expression: &mut Expr,
    callable: DescriptorId,
    binding: &BindingContext,
    scope: &LexicalScope,
    descriptors: &Descriptors,
    factory: &ExpressionFactory,
    imports: &mut ImportSet,
) {
    let mut roles: Vec<(NodeId, Role)> = Vec::new();
    let mut receivers: Vec<(NodeId, Expr)> = Vec::new();

    expression.for_each_simple_name(&mut |name, context| {
        let Some(target) = binding.reference_target(name.id) else {
            return;
        };

        if descriptors.is_extension(target) || !context.has_receiver {
            imports.add_if_some(descriptors.importable_fq_name(target));
        }
        if context.has_receiver {
            return;
        }

        if descriptors.containing(target) == Some(callable) {
            let target_name = descriptors.name(target).clone();
            match descriptors.get(target).kind {
                DescriptorKind::ValueParameter(_) => {
                    roles.push((name.id, Role::Parameter(target_name)))
                }
                DescriptorKind::TypeParameter(_) => {
                    roles.push((name.id, Role::TypeParameter(target_name)))
                }
                _ => {}
            }
        }

        let Some(call) = binding
            .resolved_call(name.id)
            .filter(|call| call.status.is_success())
        else {
            return;
        };
        let receiver = if descriptors.is_extension(call.candidate) {
            call.extension_receiver.as_ref()
        } else {
            call.dispatch_receiver.as_ref()
        };
        let Some(ReceiverValue::This(this)) = receiver else {
            return;
        };
        let Some(node) = context.callee_of.or(context.expression) else {
            return;
        };
        match materialize_this(this, scope, descriptors, factory) {
            Some(receiver) => receivers.push((node, receiver)),
            None => debug!("Leaving receiver of {} implicit", name.name),
        }
    });

    for (id, role) in roles {
        if let Some(name) = expression.simple_name_mut(id) {
            name.role = role;
        }
    }
    for (node, receiver) in receivers.into_iter().rev() {
        expression.replace(node, |original| factory.create_qualified(receiver, original));
    }
}
