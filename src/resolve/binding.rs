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

//! Results of resolving an expression tree.

use std::collections::HashMap;

use crate::descriptors::{DescriptorId, KotlinType, TypeSubstitution};
use crate::scope::ThisReceiver;
use crate::syntax::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    Success,
    /// A candidate was chosen but some type argument could not be inferred.
    IncompleteTypeInference,
    /// No candidate accepted the arguments; the first one is reported.
    ArgumentMismatch,
}

impl ResolutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ResolutionStatus::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverValue {
    /// An implicit `this`.
    This(ThisReceiver),
    /// An explicit receiver expression.
    Expression { node: NodeId, ty: KotlinType },
    /// An object or companion named through its class.
    Qualifier(DescriptorId),
}

/// Overload selection for one call or property access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub candidate: DescriptorId,
    pub status: ResolutionStatus,
    pub dispatch_receiver: Option<ReceiverValue>,
    pub extension_receiver: Option<ReceiverValue>,
    /// Inferred type arguments in the candidate's type parameter order.
    pub type_arguments: TypeSubstitution,
    pub result_type: KotlinType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub node: NodeId,
    pub message: String,
}

/// What the typing service found out about an expression tree.
///
/// Reference targets and resolved calls are keyed by the id of the
/// [`SimpleName`](crate::syntax::SimpleName) that names them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingContext {
    reference_targets: HashMap<NodeId, DescriptorId>,
    resolved_calls: HashMap<NodeId, ResolvedCall>,
    expression_types: HashMap<NodeId, KotlinType>,
    diagnostics: Vec<Diagnostic>,
}

impl BindingContext {
    pub fn reference_target(&self, name: NodeId) -> Option<DescriptorId> {
        self.reference_targets.get(&name).copied()
    }

    pub fn resolved_call(&self, name: NodeId) -> Option<&ResolvedCall> {
        self.resolved_calls.get(&name)
    }

    pub fn expression_type(&self, expr: NodeId) -> Option<&KotlinType> {
        self.expression_types.get(&expr)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Collects binding information while an expression is typed.
#[derive(Debug, Default)]
pub struct BindingTrace {
    context: BindingContext,
}

impl BindingTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_reference_target(&mut self, name: NodeId, target: DescriptorId) {
        self.context.reference_targets.insert(name, target);
    }

    pub fn record_resolved_call(&mut self, name: NodeId, call: ResolvedCall) {
        self.context.resolved_calls.insert(name, call);
    }

    pub fn record_expression_type(&mut self, expr: NodeId, ty: KotlinType) {
        self.context.expression_types.insert(expr, ty);
    }

    pub fn report(&mut self, node: NodeId, message: impl Into<String>) {
        self.context.diagnostics.push(Diagnostic {
            node,
            message: message.into(),
        });
    }

    pub fn binding_context(&self) -> &BindingContext {
        &self.context
    }

    pub fn into_binding_context(self) -> BindingContext {
        self.context
    }
}
