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

//! Expression typing: name resolution, overload selection and inference of
//! type arguments.
//!
//! Resolution walks the scope chain from the innermost level outwards. At each
//! level declared descriptors are tried before the members of the level's
//! implicit receiver, and the first level yielding an applicable candidate
//! wins. Inference unifies parameter types with argument types; it does not
//! propagate expected types into arguments.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::descriptors::{
    DescriptorId, DescriptorKind, Descriptors, KotlinType, TypeSubstitution,
};
use crate::name::{FqName, Name};
use crate::resolve::binding::{BindingTrace, ReceiverValue, ResolutionStatus, ResolvedCall};
use crate::scope::LexicalScope;
use crate::syntax::{
    BinaryOp, CallExpr, Expr, ExprKind, Literal, NodeId, QualifiedExpr, SimpleName,
    TypeReference, UnaryOp,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation was canceled")]
pub struct Canceled;

/// Shared cancellation flag checked by front-end services.
#[derive(Debug, Clone, Default)]
pub struct ProgressIndicator {
    canceled: Arc<AtomicBool>,
}

impl ProgressIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn check_canceled(&self) -> Result<(), Canceled> {
        if self.is_canceled() {
            Err(Canceled)
        } else {
            Ok(())
        }
    }
}

/// Facts known about values before the expression runs. Replacement
/// expressions are always typed with no prior facts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataFlowInfo;

impl DataFlowInfo {
    pub const EMPTY: DataFlowInfo = DataFlowInfo;
}

pub struct ExpressionTypingServices<'a> {
    descriptors: &'a Descriptors,
    visible_modules: HashSet<DescriptorId>,
    progress: ProgressIndicator,
}

impl<'a> ExpressionTypingServices<'a> {
    pub fn new(descriptors: &'a Descriptors, module: DescriptorId, progress: ProgressIndicator) -> Self {
        Self {
            descriptors,
            visible_modules: descriptors.visible_modules(module),
            progress,
        }
    }

    /// Type `expression` in `scope`, recording everything learned in `trace`.
    ///
    /// Returns `Ok(None)` when the expression has no value type, for example
    /// an unresolved reference or a package name.
    pub fn get_type_info(
        &self,
        scope: &LexicalScope,
        expression: &Expr,
        expected_type: Option<&KotlinType>,
        _data_flow_info: &DataFlowInfo,
        trace: &mut BindingTrace,
        is_statement: bool,
    ) -> Result<Option<KotlinType>, Canceled> {
        let expected_type = if is_statement { None } else { expected_type };
        let mut typer = Typer {
            services: self,
            descriptors: self.descriptors,
            scope,
            trace,
        };
        typer.infer(expression, expected_type)
    }

    fn is_visible(&self, id: DescriptorId) -> bool {
        match self.descriptors.module_of(id) {
            Some(module) => self.visible_modules.contains(&module),
            None => true,
        }
    }
}

/// What an expression denotes.
#[derive(Debug, Clone)]
enum Evaluated {
    Value(KotlinType),
    Package(DescriptorId),
    Class(DescriptorId),
    Unknown,
}

/// An explicit receiver to the left of `.` or `?.`.
#[derive(Debug, Clone)]
enum Explicit {
    Value { node: NodeId, ty: KotlinType },
    Package(DescriptorId),
    Class(DescriptorId),
}

#[derive(Debug, Clone)]
struct Candidate {
    descriptor: DescriptorId,
    dispatch: Option<ReceiverValue>,
    extension: Option<ReceiverValue>,
}

struct Attempt {
    status: ResolutionStatus,
    type_arguments: TypeSubstitution,
    result_type: KotlinType,
}

struct Typer<'a> {
    services: &'a ExpressionTypingServices<'a>,
    descriptors: &'a Descriptors,
    scope: &'a LexicalScope,
    trace: &'a mut BindingTrace,
}

impl<'a> Typer<'a> {
    fn infer(&mut self, expr: &Expr, expected: Option<&KotlinType>) -> Result<Option<KotlinType>, Canceled> {
        let evaluated = self.evaluate(expr, expected)?;
        Ok(self.value_of(&evaluated))
    }

    fn value_of(&self, evaluated: &Evaluated) -> Option<KotlinType> {
        match evaluated {
            Evaluated::Value(ty) => Some(ty.clone()),
            Evaluated::Class(class) => self
                .descriptors
                .class(*class)
                .and_then(|data| data.companion)
                .map(|companion| self.descriptors.default_type(companion)),
            Evaluated::Package(_) | Evaluated::Unknown => None,
        }
    }

    fn evaluate(&mut self, expr: &Expr, expected: Option<&KotlinType>) -> Result<Evaluated, Canceled> {
        self.services.progress.check_canceled()?;
        let evaluated = match &expr.kind {
            ExprKind::Name(name) => self.evaluate_name(name)?,
            ExprKind::This(this) => self.evaluate_this(expr.id, this.label.as_ref()),
            ExprKind::Literal(literal) => Evaluated::Value(self.literal_type(literal)),
            ExprKind::StringTemplate(entries) => {
                for entry in entries {
                    if let Some(inner) = entry.expression() {
                        self.infer(inner, None)?;
                    }
                }
                Evaluated::Value(self.builtin_type("String"))
            }
            ExprKind::Call(call) => self.evaluate_call(call, None, expected)?,
            ExprKind::Qualified(qualified) => self.evaluate_qualified(qualified, expected)?,
            ExprKind::Binary(binary) => {
                let left = self.infer(&binary.left, None)?;
                let right = self.infer(&binary.right, None)?;
                match binary.op {
                    BinaryOp::Elvis => match left.or(right) {
                        Some(ty) => Evaluated::Value(ty.make_not_nullable()),
                        None => Evaluated::Unknown,
                    },
                    BinaryOp::Add
                    | BinaryOp::Subtract
                    | BinaryOp::Multiply
                    | BinaryOp::Divide
                    | BinaryOp::Remainder => match left {
                        Some(ty) => Evaluated::Value(ty),
                        None => Evaluated::Unknown,
                    },
                    BinaryOp::Less
                    | BinaryOp::Greater
                    | BinaryOp::LessOrEqual
                    | BinaryOp::GreaterOrEqual
                    | BinaryOp::Equal
                    | BinaryOp::NotEqual
                    | BinaryOp::And
                    | BinaryOp::Or => Evaluated::Value(self.builtin_type("Boolean")),
                }
            }
            ExprKind::Unary(unary) => {
                let operand = self.infer(&unary.operand, None)?;
                match (unary.op, operand) {
                    (UnaryOp::Not, _) => Evaluated::Value(self.builtin_type("Boolean")),
                    (UnaryOp::NotNullAssertion, Some(ty)) => Evaluated::Value(ty.make_not_nullable()),
                    (UnaryOp::Minus | UnaryOp::Plus, Some(ty)) => Evaluated::Value(ty),
                    (_, None) => Evaluated::Unknown,
                }
            }
            ExprKind::Paren(inner) => self.evaluate(inner, expected)?,
        };
        if let Evaluated::Value(ty) = &evaluated {
            self.trace.record_expression_type(expr.id, ty.clone());
        }
        Ok(evaluated)
    }

    fn builtin_type(&self, name: &str) -> KotlinType {
        match self.descriptors.find_class(&format!("kotlin.{}", name)) {
            Some(class) => KotlinType::simple(class),
            None => KotlinType::Error,
        }
    }

    fn literal_type(&self, literal: &Literal) -> KotlinType {
        match literal {
            Literal::Int(text) if text.ends_with(['L', 'l']) => self.builtin_type("Long"),
            Literal::Int(_) => self.builtin_type("Int"),
            Literal::Decimal(text) if text.ends_with(['F', 'f']) => self.builtin_type("Float"),
            Literal::Decimal(_) => self.builtin_type("Double"),
            Literal::Char(_) => self.builtin_type("Char"),
            Literal::String(_) => self.builtin_type("String"),
            Literal::Boolean(_) => self.builtin_type("Boolean"),
            Literal::Null => self.builtin_type("Nothing").make_nullable(),
        }
    }

    fn evaluate_this(&mut self, node: NodeId, label: Option<&Name>) -> Evaluated {
        let receiver = self
            .scope
            .implicit_receivers()
            .into_iter()
            .find(|receiver| match label {
                Some(label) => self.descriptors.name(receiver.owner) == label,
                None => true,
            })
            .cloned();
        match receiver {
            Some(receiver) => Evaluated::Value(receiver.ty),
            None => {
                self.trace.report(node, "'this' is not defined in this context");
                Evaluated::Unknown
            }
        }
    }

    fn unresolved(&mut self, name: &SimpleName) {
        tracing::debug!("Unresolved reference: {}", name.name);
        self.trace
            .report(name.id, format!("unresolved reference: {}", name.name));
    }

    fn receiver_type(&self, receiver: &ReceiverValue) -> KotlinType {
        match receiver {
            ReceiverValue::This(this) => this.ty.clone(),
            ReceiverValue::Expression { ty, .. } => ty.clone(),
            ReceiverValue::Qualifier(class) => self.descriptors.default_type(*class),
        }
    }

    /// Dispatch receiver for declarations reached without a receiver, such
    /// as imported object members.
    fn static_dispatch(&self, id: DescriptorId) -> Option<ReceiverValue> {
        let containing = self.descriptors.containing(id)?;
        match self.descriptors.class(containing) {
            Some(class) if class.kind.is_singleton() => Some(ReceiverValue::Qualifier(containing)),
            _ => None,
        }
    }

    fn members_of_type(&self, ty: &KotlinType, name: &Name) -> Vec<DescriptorId> {
        self.members_of_type_inner(ty, name, &mut HashSet::new())
    }

    fn members_of_type_inner(
        &self,
        ty: &KotlinType,
        name: &Name,
        visited: &mut HashSet<DescriptorId>,
    ) -> Vec<DescriptorId> {
        match ty {
            KotlinType::Class { class, .. } => self.descriptors.class_members(*class, name),
            KotlinType::TypeParameter { parameter, .. } => {
                if !visited.insert(*parameter) {
                    return Vec::new();
                }
                let bounds = self.descriptors.upper_bounds(*parameter);
                let mut members: Vec<DescriptorId> = bounds
                    .iter()
                    .flat_map(|bound| self.members_of_type_inner(bound, name, visited))
                    .collect();
                if bounds.is_empty() {
                    if let Some(any) = self.descriptors.find_class("kotlin.Any") {
                        members = self.descriptors.class_members(any, name);
                    }
                }
                members
            }
            KotlinType::Error => Vec::new(),
        }
    }

    fn extension_fits(&self, callable: DescriptorId, receiver_type: &KotlinType) -> bool {
        let Some(data) = self.descriptors.callable(callable) else {
            return false;
        };
        let Some(extension_type) = &data.extension_receiver else {
            return false;
        };
        let mut substitution = TypeSubstitution::new();
        self.unify(extension_type, receiver_type, &data.type_parameters, &mut substitution);
        let extension_type = extension_type.substitute(&substitution);
        self.is_compatible(receiver_type, &extension_type, &data.type_parameters)
    }

    /// Bind the free type parameters in `parameter_type` from `argument_type`.
    fn unify(
        &self,
        parameter_type: &KotlinType,
        argument_type: &KotlinType,
        free: &[DescriptorId],
        substitution: &mut TypeSubstitution,
    ) {
        if argument_type.contains_error() {
            return;
        }
        match parameter_type {
            KotlinType::TypeParameter {
                parameter,
                nullable,
            } if free.contains(parameter) => {
                if !substitution.contains_key(parameter) {
                    let bound = if *nullable {
                        argument_type.clone().make_not_nullable()
                    } else {
                        argument_type.clone()
                    };
                    substitution.insert(*parameter, bound);
                }
            }
            KotlinType::Class {
                class, arguments, ..
            } => {
                let view = self
                    .descriptors
                    .supertype_view(&argument_type.clone().make_not_nullable(), *class);
                if let Some(KotlinType::Class {
                    arguments: argument_arguments,
                    ..
                }) = view
                {
                    for (parameter_argument, argument_argument) in arguments.iter().zip(&argument_arguments) {
                        self.unify(parameter_argument, argument_argument, free, substitution);
                    }
                }
            }
            _ => {}
        }
    }

    fn is_compatible(&self, argument_type: &KotlinType, parameter_type: &KotlinType, free: &[DescriptorId]) -> bool {
        if mentions_any(parameter_type, free) {
            return true;
        }
        self.descriptors.is_subtype(argument_type, parameter_type)
    }

    // ---- names without a receiver ----

    fn evaluate_name(&mut self, name: &SimpleName) -> Result<Evaluated, Canceled> {
        let scope = self.scope;
        for level in scope.levels() {
            for id in level.contributed(self.descriptors, &name.name) {
                if !self.services.is_visible(id) {
                    continue;
                }
                if let Some(evaluated) = self.evaluate_declared(name, id) {
                    return Ok(evaluated);
                }
            }
            if let Some(receiver) = level.implicit_receiver() {
                let dispatch = ReceiverValue::This(receiver.clone());
                if let Some(evaluated) = self.member_property(name, &receiver.ty, dispatch) {
                    return Ok(evaluated);
                }
            }
        }
        if let Some(view) = self.descriptors.package_view(&FqName::root().child(&name.name)) {
            self.trace.record_reference_target(name.id, view);
            return Ok(Evaluated::Package(view));
        }
        self.unresolved(name);
        Ok(Evaluated::Unknown)
    }

    /// Try a descriptor found by name in a scope level as a value, class or package.
    fn evaluate_declared(&mut self, name: &SimpleName, id: DescriptorId) -> Option<Evaluated> {
        let descriptors = self.descriptors;
        let evaluated = match &descriptors.get(id).kind {
            DescriptorKind::LocalVariable { ty } => {
                self.trace.record_reference_target(name.id, id);
                Evaluated::Value(ty.clone())
            }
            DescriptorKind::ValueParameter(data) => {
                self.trace.record_reference_target(name.id, id);
                Evaluated::Value(data.ty.clone())
            }
            DescriptorKind::Property(data) => {
                let extension = match &data.extension_receiver {
                    Some(_) => {
                        let receivers = self.scope.implicit_receivers();
                        match receivers.into_iter().find(|r| self.extension_fits(id, &r.ty)) {
                            Some(receiver) => Some(ReceiverValue::This(receiver.clone())),
                            None => return None,
                        }
                    }
                    None => None,
                };
                let candidate = Candidate {
                    descriptor: id,
                    dispatch: self.static_dispatch(id),
                    extension,
                };
                Evaluated::Value(self.commit_property(name, candidate))
            }
            DescriptorKind::Class(data) => {
                self.trace.record_reference_target(name.id, id);
                if data.kind.is_singleton() {
                    Evaluated::Value(descriptors.default_type(id))
                } else {
                    Evaluated::Class(id)
                }
            }
            DescriptorKind::PackageView { .. } => {
                self.trace.record_reference_target(name.id, id);
                Evaluated::Package(id)
            }
            _ => return None,
        };
        Some(evaluated)
    }

    fn member_property(&mut self, name: &SimpleName, receiver_type: &KotlinType, dispatch: ReceiverValue) -> Option<Evaluated> {
        let property = self
            .members_of_type(receiver_type, &name.name)
            .into_iter()
            .find(|member| {
                matches!(self.descriptors.get(*member).kind, DescriptorKind::Property(_))
                    && !self.descriptors.is_extension(*member)
            })?;
        let candidate = Candidate {
            descriptor: property,
            dispatch: Some(dispatch),
            extension: None,
        };
        Some(Evaluated::Value(self.commit_property(name, candidate)))
    }

    fn commit_property(&mut self, name: &SimpleName, candidate: Candidate) -> KotlinType {
        let attempt = self.complete(&candidate, &[], None, None, None);
        match attempt {
            Some(attempt) => self.commit(name, candidate, attempt),
            None => KotlinType::Error,
        }
    }

    // ---- names after an explicit receiver ----

    fn evaluate_qualified(&mut self, qualified: &QualifiedExpr, expected: Option<&KotlinType>) -> Result<Evaluated, Canceled> {
        let receiver = self.evaluate(&qualified.receiver, None)?;
        let explicit = match receiver {
            Evaluated::Value(ty) => Explicit::Value {
                node: qualified.receiver.id,
                ty: if qualified.safe { ty.make_not_nullable() } else { ty },
            },
            Evaluated::Package(view) => Explicit::Package(view),
            Evaluated::Class(class) => Explicit::Class(class),
            Evaluated::Unknown => {
                // Arguments still resolve on their own.
                if let ExprKind::Call(call) = &qualified.selector.kind {
                    for argument in &call.arguments {
                        self.infer(&argument.value, None)?;
                    }
                }
                return Ok(Evaluated::Unknown);
            }
        };
        let evaluated = match &qualified.selector.kind {
            ExprKind::Name(name) => self.evaluate_member_name(name, &explicit),
            ExprKind::Call(call) => self.evaluate_call(call, Some(&explicit), expected)?,
            _ => {
                self.evaluate(&qualified.selector, None)?;
                Evaluated::Unknown
            }
        };
        if let Evaluated::Value(ty) = &evaluated {
            self.trace.record_expression_type(qualified.selector.id, ty.clone());
        }
        Ok(match evaluated {
            Evaluated::Value(ty) if qualified.safe => Evaluated::Value(ty.make_nullable()),
            other => other,
        })
    }

    fn evaluate_member_name(&mut self, name: &SimpleName, explicit: &Explicit) -> Evaluated {
        let descriptors = self.descriptors;
        match explicit {
            Explicit::Value { node, ty } => {
                let dispatch = ReceiverValue::Expression {
                    node: *node,
                    ty: ty.clone(),
                };
                if let Some(evaluated) = self.member_property(name, ty, dispatch) {
                    return evaluated;
                }
                let extension = self.scope.levels().find_map(|level| {
                    level
                        .contributed(descriptors, &name.name)
                        .into_iter()
                        .find(|id| {
                            matches!(descriptors.get(*id).kind, DescriptorKind::Property(_))
                                && self.services.is_visible(*id)
                                && self.extension_fits(*id, ty)
                        })
                });
                if let Some(property) = extension {
                    let candidate = Candidate {
                        descriptor: property,
                        dispatch: None,
                        extension: Some(ReceiverValue::Expression {
                            node: *node,
                            ty: ty.clone(),
                        }),
                    };
                    return Evaluated::Value(self.commit_property(name, candidate));
                }
            }
            Explicit::Package(view) => {
                for id in descriptors.package_members(*view, &name.name) {
                    if !self.services.is_visible(id) || descriptors.is_extension(id) {
                        continue;
                    }
                    if let Some(evaluated) = self.evaluate_declared(name, id) {
                        return evaluated;
                    }
                }
            }
            Explicit::Class(class) => {
                if let Some(nested) = descriptors.nested_classifiers(*class, &name.name).first() {
                    if let Some(evaluated) = self.evaluate_declared(name, *nested) {
                        return evaluated;
                    }
                }
                for holder in self.static_holders(*class) {
                    let ty = descriptors.default_type(holder);
                    if let Some(evaluated) = self.member_property(name, &ty, ReceiverValue::Qualifier(holder)) {
                        return evaluated;
                    }
                }
            }
        }
        self.unresolved(name);
        Evaluated::Unknown
    }

    /// The singletons whose members are reachable through a class name.
    fn static_holders(&self, class: DescriptorId) -> Vec<DescriptorId> {
        let mut holders = Vec::new();
        if let Some(data) = self.descriptors.class(class) {
            if data.kind.is_singleton() {
                holders.push(class);
            }
            holders.extend(data.companion);
        }
        holders
    }

    // ---- calls ----

    fn evaluate_call(
        &mut self,
        call: &CallExpr,
        explicit: Option<&Explicit>,
        expected: Option<&KotlinType>,
    ) -> Result<Evaluated, Canceled> {
        let Some(name) = call.callee_name() else {
            self.evaluate(&call.callee, None)?;
            for argument in &call.arguments {
                self.infer(&argument.value, None)?;
            }
            return Ok(Evaluated::Unknown);
        };
        Ok(match self.resolve_call(call, name, explicit, expected)? {
            Some(ty) => Evaluated::Value(ty),
            None => Evaluated::Unknown,
        })
    }

    fn resolve_call(
        &mut self,
        call: &CallExpr,
        name: &SimpleName,
        explicit: Option<&Explicit>,
        expected: Option<&KotlinType>,
    ) -> Result<Option<KotlinType>, Canceled> {
        let explicit_type_arguments: Option<Vec<KotlinType>> = call
            .type_arguments
            .as_ref()
            .map(|list| list.arguments.iter().map(|t| self.resolve_type(t)).collect());
        let mut argument_types = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            argument_types.push(self.infer(&argument.value, None)?);
        }

        let mut fallback = None;
        for group in self.call_candidates(&name.name, explicit) {
            for candidate in group {
                self.services.progress.check_canceled()?;
                match self.complete(
                    &candidate,
                    &argument_types,
                    Some(call),
                    explicit_type_arguments.as_deref(),
                    expected,
                ) {
                    Some(attempt) => return Ok(Some(self.commit(name, candidate, attempt))),
                    None => {
                        if fallback.is_none() {
                            fallback = Some(candidate);
                        }
                    }
                }
            }
        }

        match fallback {
            Some(candidate) => {
                tracing::debug!("No applicable overload for {}", name.name);
                self.trace
                    .report(name.id, format!("no applicable overload for {}", name.name));
                let attempt = Attempt {
                    status: ResolutionStatus::ArgumentMismatch,
                    type_arguments: TypeSubstitution::new(),
                    result_type: KotlinType::Error,
                };
                self.commit(name, candidate, attempt);
            }
            None => self.unresolved(name),
        }
        Ok(None)
    }

    fn commit(&mut self, name: &SimpleName, candidate: Candidate, attempt: Attempt) -> KotlinType {
        self.trace.record_reference_target(name.id, candidate.descriptor);
        let result_type = attempt.result_type.clone();
        self.trace.record_resolved_call(
            name.id,
            ResolvedCall {
                candidate: candidate.descriptor,
                status: attempt.status,
                dispatch_receiver: candidate.dispatch,
                extension_receiver: candidate.extension,
                type_arguments: attempt.type_arguments,
                result_type: attempt.result_type,
            },
        );
        result_type
    }

    /// Candidates grouped by priority; earlier groups shadow later ones.
    fn call_candidates(&self, name: &Name, explicit: Option<&Explicit>) -> Vec<Vec<Candidate>> {
        let descriptors = self.descriptors;
        let mut groups = Vec::new();
        match explicit {
            None => {
                let receivers = self.scope.implicit_receivers();
                for level in self.scope.levels() {
                    let mut group = Vec::new();
                    for id in level.contributed(descriptors, name) {
                        if !self.services.is_visible(id) {
                            continue;
                        }
                        match &descriptors.get(id).kind {
                            DescriptorKind::Function(data) if data.extension_receiver.is_some() => {
                                if let Some(receiver) = receivers.iter().find(|r| self.extension_fits(id, &r.ty)) {
                                    group.push(Candidate {
                                        descriptor: id,
                                        dispatch: None,
                                        extension: Some(ReceiverValue::This((*receiver).clone())),
                                    });
                                }
                            }
                            DescriptorKind::Function(_) => group.push(Candidate {
                                descriptor: id,
                                dispatch: self.static_dispatch(id),
                                extension: None,
                            }),
                            DescriptorKind::Class(_) => group.extend(self.constructor_candidates(id)),
                            _ => {}
                        }
                    }
                    if let Some(receiver) = level.implicit_receiver() {
                        group.extend(self.member_function_candidates(
                            &receiver.ty,
                            name,
                            ReceiverValue::This(receiver.clone()),
                        ));
                    }
                    if !group.is_empty() {
                        groups.push(group);
                    }
                }
            }
            Some(Explicit::Value { node, ty }) => {
                let dispatch = ReceiverValue::Expression {
                    node: *node,
                    ty: ty.clone(),
                };
                groups.push(self.member_function_candidates(ty, name, dispatch.clone()));
                for level in self.scope.levels() {
                    let group: Vec<Candidate> = level
                        .contributed(descriptors, name)
                        .into_iter()
                        .filter(|id| {
                            matches!(descriptors.get(*id).kind, DescriptorKind::Function(_))
                                && self.services.is_visible(*id)
                                && self.extension_fits(*id, ty)
                        })
                        .map(|id| Candidate {
                            descriptor: id,
                            dispatch: None,
                            extension: Some(dispatch.clone()),
                        })
                        .collect();
                    groups.push(group);
                }
            }
            Some(Explicit::Package(view)) => {
                let mut group = Vec::new();
                for id in descriptors.package_members(*view, name) {
                    if !self.services.is_visible(id) || descriptors.is_extension(id) {
                        continue;
                    }
                    match descriptors.get(id).kind {
                        DescriptorKind::Function(_) => group.push(Candidate {
                            descriptor: id,
                            dispatch: None,
                            extension: None,
                        }),
                        DescriptorKind::Class(_) => group.extend(self.constructor_candidates(id)),
                        _ => {}
                    }
                }
                groups.push(group);
            }
            Some(Explicit::Class(class)) => {
                let mut group = Vec::new();
                for nested in descriptors.nested_classifiers(*class, name) {
                    group.extend(self.constructor_candidates(nested));
                }
                for holder in self.static_holders(*class) {
                    group.extend(self.member_function_candidates(
                        &descriptors.default_type(holder),
                        name,
                        ReceiverValue::Qualifier(holder),
                    ));
                }
                groups.push(group);
            }
        }
        groups.retain(|group| !group.is_empty());
        groups
    }

    fn constructor_candidates(&self, class: DescriptorId) -> Vec<Candidate> {
        self.descriptors
            .constructors(class)
            .into_iter()
            .map(|constructor| Candidate {
                descriptor: constructor,
                dispatch: None,
                extension: None,
            })
            .collect()
    }

    fn member_function_candidates(&self, ty: &KotlinType, name: &Name, dispatch: ReceiverValue) -> Vec<Candidate> {
        self.members_of_type(ty, name)
            .into_iter()
            .filter(|member| {
                matches!(self.descriptors.get(*member).kind, DescriptorKind::Function(_))
                    && !self.descriptors.is_extension(*member)
            })
            .map(|member| Candidate {
                descriptor: member,
                dispatch: Some(dispatch.clone()),
                extension: None,
            })
            .collect()
    }

    /// Check a candidate against the call and infer its type arguments.
    ///
    /// Returns `None` when the candidate does not accept the arguments.
    fn complete(
        &self,
        candidate: &Candidate,
        argument_types: &[Option<KotlinType>],
        call: Option<&CallExpr>,
        explicit_type_arguments: Option<&[KotlinType]>,
        expected: Option<&KotlinType>,
    ) -> Option<Attempt> {
        let descriptors = self.descriptors;
        let data = descriptors.callable(candidate.descriptor)?;
        let free = &data.type_parameters;
        let mut substitution = TypeSubstitution::new();

        if let (Some(dispatch), Some(owner)) =
            (&candidate.dispatch, descriptors.containing(candidate.descriptor))
        {
            if let Some(KotlinType::Class { arguments, .. }) =
                descriptors.supertype_view(&self.receiver_type(dispatch), owner)
            {
                for (parameter, argument) in descriptors.type_parameters(owner).iter().zip(arguments) {
                    substitution.entry(*parameter).or_insert(argument);
                }
            }
        }

        if let Some(explicit) = explicit_type_arguments {
            if explicit.len() != free.len() {
                return None;
            }
            for (parameter, argument) in free.iter().zip(explicit) {
                substitution.insert(*parameter, argument.clone());
            }
        }

        if let (Some(extension_type), Some(receiver)) = (&data.extension_receiver, &candidate.extension) {
            self.unify(extension_type, &self.receiver_type(receiver), free, &mut substitution);
        }

        let mapping = match call {
            Some(call) => self.map_arguments(candidate.descriptor, call)?,
            None => Vec::new(),
        };
        for (parameter, arguments) in &mapping {
            let parameter_type = descriptors.variable_type(*parameter)?;
            for index in arguments {
                if let Some(Some(argument_type)) = argument_types.get(*index) {
                    self.unify(parameter_type, argument_type, free, &mut substitution);
                }
            }
        }
        for (parameter, arguments) in &mapping {
            let parameter_type = descriptors.variable_type(*parameter)?.substitute(&substitution);
            for index in arguments {
                if let Some(Some(argument_type)) = argument_types.get(*index) {
                    if !self.is_compatible(argument_type, &parameter_type, free) {
                        return None;
                    }
                }
            }
        }

        if let Some(expected) = expected {
            self.unify(&data.return_type, expected, free, &mut substitution);
        }

        let type_arguments: TypeSubstitution = free
            .iter()
            .map(|parameter| {
                let argument = substitution.get(parameter).cloned().unwrap_or(KotlinType::Error);
                (*parameter, argument)
            })
            .collect();
        for (parameter, argument) in &type_arguments {
            substitution.insert(*parameter, argument.clone());
        }
        let status = if type_arguments.values().any(KotlinType::contains_error) {
            ResolutionStatus::IncompleteTypeInference
        } else {
            ResolutionStatus::Success
        };
        Some(Attempt {
            status,
            type_arguments,
            result_type: data.return_type.substitute(&substitution),
        })
    }

    /// Match call arguments to value parameters.
    ///
    /// Positional arguments fill parameters in order, a vararg parameter
    /// takes every remaining positional argument, and no positional argument
    /// may follow a named one. Parameters left without arguments need a
    /// default value.
    fn map_arguments(&self, callable: DescriptorId, call: &CallExpr) -> Option<Vec<(DescriptorId, Vec<usize>)>> {
        let descriptors = self.descriptors;
        let parameters = descriptors.value_parameters(callable);
        let mut assigned: Vec<Vec<usize>> = vec![Vec::new(); parameters.len()];
        let mut position = 0;
        let mut seen_named = false;
        for (index, argument) in call.arguments.iter().enumerate() {
            match &argument.name {
                Some(name) => {
                    seen_named = true;
                    let slot = parameters.iter().position(|p| descriptors.name(*p) == name)?;
                    if !assigned[slot].is_empty() {
                        return None;
                    }
                    assigned[slot].push(index);
                }
                None => {
                    if seen_named {
                        return None;
                    }
                    let parameter = *parameters.get(position)?;
                    assigned[position].push(index);
                    if !descriptors.value_parameter(parameter)?.is_vararg {
                        position += 1;
                    }
                }
            }
        }
        for (parameter, arguments) in parameters.iter().zip(&assigned) {
            let data = descriptors.value_parameter(*parameter)?;
            if arguments.is_empty() && !data.has_default && !data.is_vararg {
                return None;
            }
        }
        Some(parameters.iter().copied().zip(assigned).collect())
    }

    // ---- types ----

    fn resolve_type(&mut self, type_reference: &TypeReference) -> KotlinType {
        let arguments: Vec<KotlinType> = type_reference
            .arguments
            .iter()
            .map(|argument| self.resolve_type(argument))
            .collect();

        let mut container: Option<DescriptorId> = None;
        for segment in type_reference.qualifier.iter().chain(std::iter::once(&type_reference.name)) {
            let is_last = segment.id == type_reference.name.id;
            let found = match container {
                None => self.lookup_classifier(&segment.name, !is_last),
                Some(container) => self.member_classifier(container, &segment.name, !is_last),
            };
            match found {
                Some(id) => {
                    self.trace.record_reference_target(segment.id, id);
                    container = Some(id);
                }
                None => {
                    self.unresolved(segment);
                    return KotlinType::Error;
                }
            }
        }

        let Some(found) = container else {
            return KotlinType::Error;
        };
        let descriptors = self.descriptors;
        match &descriptors.get(found).kind {
            DescriptorKind::Class(data) => {
                if data.type_parameters.len() != arguments.len() {
                    self.trace.report(
                        type_reference.id,
                        format!(
                            "{} expects {} type arguments",
                            type_reference.name.name,
                            data.type_parameters.len()
                        ),
                    );
                    return KotlinType::Error;
                }
                KotlinType::class(found, arguments).with_nullability(type_reference.nullable)
            }
            DescriptorKind::TypeParameter(_) => {
                KotlinType::type_parameter(found).with_nullability(type_reference.nullable)
            }
            _ => KotlinType::Error,
        }
    }

    fn lookup_classifier(&self, name: &Name, allow_package: bool) -> Option<DescriptorId> {
        for level in self.scope.levels() {
            let found = level.contributed(self.descriptors, name).into_iter().find(|id| {
                self.services.is_visible(*id)
                    && match self.descriptors.get(*id).kind {
                        DescriptorKind::Class(_) | DescriptorKind::TypeParameter(_) => true,
                        DescriptorKind::PackageView { .. } => allow_package,
                        _ => false,
                    }
            });
            if found.is_some() {
                return found;
            }
        }
        if allow_package {
            return self.descriptors.package_view(&FqName::root().child(name));
        }
        None
    }

    fn member_classifier(&self, container: DescriptorId, name: &Name, allow_package: bool) -> Option<DescriptorId> {
        let descriptors = self.descriptors;
        match descriptors.get(container).kind {
            DescriptorKind::PackageView { .. } => descriptors
                .package_members(container, name)
                .into_iter()
                .find(|id| {
                    self.services.is_visible(*id)
                        && match descriptors.get(*id).kind {
                            DescriptorKind::Class(_) => true,
                            DescriptorKind::PackageView { .. } => allow_package,
                            _ => false,
                        }
                }),
            DescriptorKind::Class(_) => descriptors.nested_classifiers(container, name).first().copied(),
            _ => None,
        }
    }
}

fn mentions_any(ty: &KotlinType, parameters: &[DescriptorId]) -> bool {
    match ty {
        KotlinType::TypeParameter { parameter, .. } => parameters.contains(parameter),
        KotlinType::Class { arguments, .. } => arguments.iter().any(|a| mentions_any(a, parameters)),
        KotlinType::Error => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{add_builtins, ClassKind};
    use crate::scope::{chained_package_scope, function_inner_scope, MemberScope, ThisReceiver};
    use crate::syntax::ExpressionFactory;

    struct Fixture {
        descriptors: Descriptors,
        module: DescriptorId,
        fragment: DescriptorId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut descriptors = Descriptors::new();
            let builtins = add_builtins(&mut descriptors);
            let module = descriptors.add_module("main", vec![builtins]);
            let fragment = descriptors.add_package_fragment(module, FqName::from_trusted("p"), Vec::new());
            Self {
                descriptors,
                module,
                fragment,
            }
        }

        fn scope_of(&self, function: DescriptorId) -> Arc<LexicalScope> {
            let view = self.descriptors.package_view(&FqName::from_trusted("p")).unwrap();
            let defaults = [
                MemberScope::AllUnderImport(self.descriptors.package_view(&FqName::from_trusted("kotlin")).unwrap()),
                MemberScope::AllUnderImport(
                    self.descriptors
                        .package_view(&FqName::from_trusted("kotlin.collections"))
                        .unwrap(),
                ),
            ];
            function_inner_scope(chained_package_scope(view, &defaults), function, &self.descriptors)
        }

        fn type_expression(&self, function: DescriptorId, text: &str) -> (Expr, crate::resolve::BindingContext) {
            let expr = ExpressionFactory::new().create_expression(text).unwrap();
            let services = ExpressionTypingServices::new(&self.descriptors, self.module, ProgressIndicator::new());
            let mut trace = BindingTrace::new();
            services
                .get_type_info(
                    &self.scope_of(function),
                    &expr,
                    None,
                    &DataFlowInfo::EMPTY,
                    &mut trace,
                    false,
                )
                .unwrap();
            (expr, trace.into_binding_context())
        }
    }

    #[test]
    fn test_infers_type_argument_from_argument() {
        let mut fx = Fixture::new();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        let t = fx.descriptors.add_type_parameter(f, "T");
        fx.descriptors.add_value_parameter(f, "x", KotlinType::type_parameter(t));

        let (expr, binding) = fx.type_expression(f, "listOf(x)");
        let callee = expr.simple_names()[0].id;
        let call = binding.resolved_call(callee).unwrap();
        assert_eq!(call.status, ResolutionStatus::Success);
        assert_eq!(
            call.type_arguments.values().cloned().collect::<Vec<_>>(),
            vec![KotlinType::type_parameter(t)]
        );
        let list = fx.descriptors.find_class("kotlin.collections.List").unwrap();
        assert_eq!(
            binding.expression_type(expr.id),
            Some(&KotlinType::class(list, vec![KotlinType::type_parameter(t)]))
        );
    }

    #[test]
    fn test_uninferable_type_argument_is_incomplete() {
        let mut fx = Fixture::new();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        let (expr, binding) = fx.type_expression(f, "emptyList()");
        let call = binding.resolved_call(expr.simple_names()[0].id).unwrap();
        assert_eq!(call.status, ResolutionStatus::IncompleteTypeInference);
        assert!(call.type_arguments.values().all(KotlinType::is_error));
    }

    #[test]
    fn test_overload_by_argument_type() {
        let mut fx = Fixture::new();
        let int = KotlinType::simple(fx.descriptors.find_class("kotlin.Int").unwrap());
        let string = KotlinType::simple(fx.descriptors.find_class("kotlin.String").unwrap());
        let takes_int = fx.descriptors.add_function(fx.fragment, "g");
        fx.descriptors.add_value_parameter(takes_int, "a", int);
        let takes_string = fx.descriptors.add_function(fx.fragment, "g");
        fx.descriptors.add_value_parameter(takes_string, "a", string);
        let f = fx.descriptors.add_function(fx.fragment, "f");

        let (expr, binding) = fx.type_expression(f, "g(\"s\")");
        assert_eq!(
            binding.reference_target(expr.simple_names()[0].id),
            Some(takes_string)
        );
        let (expr, binding) = fx.type_expression(f, "g(1)");
        assert_eq!(binding.reference_target(expr.simple_names()[0].id), Some(takes_int));
    }

    #[test]
    fn test_named_and_default_arguments() {
        let mut fx = Fixture::new();
        let int = KotlinType::simple(fx.descriptors.find_class("kotlin.Int").unwrap());
        let g = fx.descriptors.add_function(fx.fragment, "g");
        fx.descriptors.add_value_parameter(g, "a", int.clone());
        let b = fx.descriptors.add_value_parameter(g, "b", int);
        fx.descriptors.set_parameter_flags(b, true, false);
        let f = fx.descriptors.add_function(fx.fragment, "f");

        for text in ["g(1)", "g(1, 2)", "g(b = 2, a = 1)"] {
            let (expr, binding) = fx.type_expression(f, text);
            assert_eq!(binding.reference_target(expr.simple_names()[0].id), Some(g), "{}", text);
        }
        let (expr, binding) = fx.type_expression(f, "g(b = 1, 2)");
        assert_eq!(
            binding.resolved_call(expr.simple_names()[0].id).map(|c| c.status),
            Some(ResolutionStatus::ArgumentMismatch)
        );
    }

    #[test]
    fn test_member_call_through_implicit_receiver() {
        let mut fx = Fixture::new();
        let class = fx.descriptors.add_class(fx.fragment, "C", ClassKind::Class);
        let h = fx.descriptors.add_function(class, "h");
        let m = fx.descriptors.add_function(class, "m");
        let view = fx.descriptors.package_view(&FqName::from_trusted("p")).unwrap();
        let class_scope = crate::scope::ClassResolutionScopesSupport::new(class, chained_package_scope(view, &[]))
            .scope_for_member_declaration_resolution(&fx.descriptors);
        let scope = function_inner_scope(class_scope, m, &fx.descriptors);

        let expr = ExpressionFactory::new().create_expression("h()").unwrap();
        let services = ExpressionTypingServices::new(&fx.descriptors, fx.module, ProgressIndicator::new());
        let mut trace = BindingTrace::new();
        services
            .get_type_info(&scope, &expr, None, &DataFlowInfo::EMPTY, &mut trace, false)
            .unwrap();
        let call = trace
            .binding_context()
            .resolved_call(expr.simple_names()[0].id)
            .cloned()
            .unwrap();
        assert_eq!(call.candidate, h);
        assert_eq!(
            call.dispatch_receiver,
            Some(ReceiverValue::This(ThisReceiver {
                owner: class,
                ty: KotlinType::simple(class),
            }))
        );
    }

    #[test]
    fn test_qualified_package_access() {
        let mut fx = Fixture::new();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        let (expr, binding) = fx.type_expression(f, "kotlin.collections.listOf(1)");
        let names = expr.simple_names();
        assert!(binding.reference_target(names[0].id).is_some());
        let list_of = binding.reference_target(names[2].id).unwrap();
        assert_eq!(
            fx.descriptors.fq_name(list_of),
            Some(FqName::from_trusted("kotlin.collections.listOf"))
        );
    }

    #[test]
    fn test_unresolved_reference_is_reported() {
        let mut fx = Fixture::new();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        let (expr, binding) = fx.type_expression(f, "nope()");
        assert_eq!(binding.reference_target(expr.simple_names()[0].id), None);
        assert_eq!(binding.diagnostics().len(), 1);
        assert!(binding.diagnostics()[0].message.contains("nope"));
    }

    #[test]
    fn test_string_template_entries_are_resolved() {
        let mut fx = Fixture::new();
        let int = KotlinType::simple(fx.descriptors.find_class("kotlin.Int").unwrap());
        let string = fx.descriptors.find_class("kotlin.String").unwrap();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        let x = fx.descriptors.add_value_parameter(f, "x", int);

        let (expr, binding) = fx.type_expression(f, r#""$x items, ${listOf(x).size} total""#);
        assert_eq!(binding.expression_type(expr.id), Some(&KotlinType::simple(string)));
        let names = expr.simple_names();
        assert_eq!(binding.reference_target(names[0].id), Some(x));
        assert!(binding.resolved_call(names[1].id).is_some());
        assert!(binding.diagnostics().is_empty());
    }

    #[test]
    fn test_char_literal_type() {
        let mut fx = Fixture::new();
        let char_class = fx.descriptors.find_class("kotlin.Char").unwrap();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        let (expr, binding) = fx.type_expression(f, "'c'");
        assert_eq!(binding.expression_type(expr.id), Some(&KotlinType::simple(char_class)));
    }

    #[test]
    fn test_cyclic_bounds_terminate() {
        let mut fx = Fixture::new();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        let t = fx.descriptors.add_type_parameter(f, "T");
        let u = fx.descriptors.add_type_parameter(f, "U");
        fx.descriptors.set_upper_bounds(t, vec![KotlinType::type_parameter(u)]);
        fx.descriptors.set_upper_bounds(u, vec![KotlinType::type_parameter(t)]);
        fx.descriptors.add_value_parameter(f, "x", KotlinType::type_parameter(t));

        let (expr, binding) = fx.type_expression(f, "x.foo()");
        assert_eq!(binding.reference_target(expr.simple_names()[1].id), None);
        assert!(binding.diagnostics()[0].message.contains("foo"));

        let list = fx.descriptors.find_class("kotlin.collections.List").unwrap();
        assert_eq!(
            fx.descriptors.supertype_view(&KotlinType::type_parameter(t), list),
            None
        );
    }

    #[test]
    fn test_cancellation() {
        let mut fx = Fixture::new();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        let progress = ProgressIndicator::new();
        progress.cancel();
        let services = ExpressionTypingServices::new(&fx.descriptors, fx.module, progress);
        let expr = ExpressionFactory::new().create_expression("listOf(1)").unwrap();
        let mut trace = BindingTrace::new();
        let result = services.get_type_info(
            &fx.scope_of(f),
            &expr,
            None,
            &DataFlowInfo::EMPTY,
            &mut trace,
            false,
        );
        assert_eq!(result, Err(Canceled));
    }

    #[test]
    fn test_extension_on_member_property() {
        let mut fx = Fixture::new();
        let int = fx.descriptors.find_class("kotlin.Int").unwrap();
        let list = fx.descriptors.find_class("kotlin.collections.List").unwrap();
        let f = fx.descriptors.add_function(fx.fragment, "f");
        fx.descriptors.add_value_parameter(
            f,
            "xs",
            KotlinType::class(list, vec![KotlinType::simple(int)]),
        );
        let (expr, binding) = fx.type_expression(f, "xs.firstOrNull()");
        assert_eq!(
            binding.expression_type(expr.id),
            Some(&KotlinType::simple(int).make_nullable())
        );
        let first_or_null = expr.simple_names()[1].id;
        let call = binding.resolved_call(first_or_null).unwrap();
        assert!(matches!(
            call.extension_receiver,
            Some(ReceiverValue::Expression { .. })
        ));
    }
}
