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

//! Expression tree for replacement expressions.
//!
//! Every node carries a [`NodeId`] handed out by the
//! [`ExpressionFactory`](super::ExpressionFactory) that created it. Binding
//! information is keyed by these ids, so a cloned tree binds exactly like the
//! tree it was cloned from.

use crate::name::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// What a reference stands for once the template is instantiated at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Plain,
    /// A use of a value parameter of the deprecated callable.
    Parameter(Name),
    /// A use of a type parameter of the deprecated callable.
    TypeParameter(Name),
}

/// An identifier use, either in expression or in type position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleName {
    pub id: NodeId,
    pub name: Name,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Name(SimpleName),
    This(ThisExpr),
    Literal(Literal),
    StringTemplate(Vec<TemplateEntry>),
    Call(CallExpr),
    Qualified(QualifiedExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Paren(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThisExpr {
    pub label: Option<Name>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(String),
    Decimal(String),
    Char(char),
    String(String),
    Boolean(bool),
    Null,
}

/// A piece of a string template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateEntry {
    Text(String),
    /// `$name`
    Short(Expr),
    /// `${expression}`
    Block(Expr),
}

impl TemplateEntry {
    pub fn expression(&self) -> Option<&Expr> {
        match self {
            TemplateEntry::Text(_) => None,
            TemplateEntry::Short(expr) | TemplateEntry::Block(expr) => Some(expr),
        }
    }

    fn expression_mut(&mut self) -> Option<&mut Expr> {
        match self {
            TemplateEntry::Text(_) => None,
            TemplateEntry::Short(expr) | TemplateEntry::Block(expr) => Some(expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub type_arguments: Option<TypeArgumentList>,
    pub arguments: Vec<ValueArgument>,
}

impl CallExpr {
    /// The callee when it is a plain name, which is the only callee shape
    /// that goes through overload resolution.
    pub fn callee_name(&self) -> Option<&SimpleName> {
        match &self.callee.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeArgumentList {
    pub id: NodeId,
    pub arguments: Vec<TypeReference>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueArgument {
    pub name: Option<Name>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedExpr {
    pub receiver: Box<Expr>,
    pub selector: Box<Expr>,
    /// `?.` rather than `.`
    pub safe: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Multiply,
    Divide,
    Remainder,
    Add,
    Subtract,
    Elvis,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Elvis => "?:",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    /// Postfix `!!`.
    NotNullAssertion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
}

/// A user type such as `kotlin.collections.List<T>?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    pub id: NodeId,
    pub qualifier: Vec<SimpleName>,
    pub name: SimpleName,
    pub arguments: Vec<TypeReference>,
    pub nullable: bool,
}

/// Where a [`SimpleName`] sits relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameContext {
    /// The name is selected from an explicit receiver or qualifier.
    pub has_receiver: bool,
    /// Set when the name is the direct callee of this call expression.
    pub callee_of: Option<NodeId>,
    /// The `Name` expression holding the name; unset inside type references.
    pub expression: Option<NodeId>,
}

impl NameContext {
    const FREE: NameContext = NameContext {
        has_receiver: false,
        callee_of: None,
        expression: None,
    };
}

impl Expr {
    pub fn new(id: NodeId, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    fn placeholder() -> Self {
        Self {
            id: NodeId(u32::MAX),
            kind: ExprKind::Literal(Literal::Null),
        }
    }

    /// Find a node by id.
    pub fn find(&self, id: NodeId) -> Option<&Expr> {
        if self.id == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(id))
    }

    /// Direct sub-expressions in source order. Type references are not expressions.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Name(_) | ExprKind::This(_) | ExprKind::Literal(_) => Vec::new(),
            ExprKind::StringTemplate(entries) => {
                entries.iter().filter_map(TemplateEntry::expression).collect()
            }
            ExprKind::Call(call) => {
                let mut children = vec![call.callee.as_ref()];
                children.extend(call.arguments.iter().map(|arg| &arg.value));
                children
            }
            ExprKind::Qualified(qualified) => {
                vec![qualified.receiver.as_ref(), qualified.selector.as_ref()]
            }
            ExprKind::Binary(binary) => vec![binary.left.as_ref(), binary.right.as_ref()],
            ExprKind::Unary(unary) => vec![unary.operand.as_ref()],
            ExprKind::Paren(inner) => vec![inner.as_ref()],
        }
    }

    /// Visit every call expression in pre-order.
    pub fn for_each_call<'a>(&'a self, f: &mut dyn FnMut(&'a Expr, &'a CallExpr)) {
        if let ExprKind::Call(call) = &self.kind {
            f(self, call);
        }
        for child in self.children() {
            child.for_each_call(f);
        }
    }

    /// Visit every simple name, including names inside type references, in
    /// pre-order.
    pub fn for_each_simple_name<'a>(&'a self, f: &mut dyn FnMut(&'a SimpleName, NameContext)) {
        self.walk_names(NameContext::FREE, f);
    }

    fn walk_names<'a>(&'a self, context: NameContext, f: &mut dyn FnMut(&'a SimpleName, NameContext)) {
        match &self.kind {
            ExprKind::Name(name) => f(
                name,
                NameContext {
                    expression: Some(self.id),
                    ..context
                },
            ),
            ExprKind::This(_) | ExprKind::Literal(_) => {}
            ExprKind::StringTemplate(entries) => {
                for expr in entries.iter().filter_map(TemplateEntry::expression) {
                    expr.walk_names(NameContext::FREE, f);
                }
            }
            ExprKind::Call(call) => {
                let callee_context = NameContext {
                    has_receiver: context.has_receiver,
                    callee_of: Some(self.id),
                    expression: Some(call.callee.id),
                };
                match &call.callee.kind {
                    ExprKind::Name(name) => f(name, callee_context),
                    _ => call.callee.walk_names(NameContext::FREE, f),
                }
                if let Some(type_arguments) = &call.type_arguments {
                    for type_reference in &type_arguments.arguments {
                        type_reference.for_each_simple_name(f);
                    }
                }
                for argument in &call.arguments {
                    argument.value.walk_names(NameContext::FREE, f);
                }
            }
            ExprKind::Qualified(qualified) => {
                qualified.receiver.walk_names(NameContext::FREE, f);
                qualified.selector.walk_names(
                    NameContext {
                        has_receiver: true,
                        ..NameContext::FREE
                    },
                    f,
                );
            }
            ExprKind::Binary(binary) => {
                binary.left.walk_names(NameContext::FREE, f);
                binary.right.walk_names(NameContext::FREE, f);
            }
            ExprKind::Unary(unary) => unary.operand.walk_names(NameContext::FREE, f),
            ExprKind::Paren(inner) => inner.walk_names(NameContext::FREE, f),
        }
    }

    /// All simple names in pre-order.
    pub fn simple_names(&self) -> Vec<&SimpleName> {
        let mut names = Vec::new();
        self.for_each_simple_name(&mut |name, _| names.push(name));
        names
    }

    pub fn simple_name_mut(&mut self, id: NodeId) -> Option<&mut SimpleName> {
        match &mut self.kind {
            ExprKind::Name(name) => (name.id == id).then_some(name),
            ExprKind::This(_) | ExprKind::Literal(_) => None,
            ExprKind::StringTemplate(entries) => entries
                .iter_mut()
                .filter_map(TemplateEntry::expression_mut)
                .find_map(|expr| expr.simple_name_mut(id)),
            ExprKind::Call(call) => {
                if let Some(found) = call.callee.simple_name_mut(id) {
                    return Some(found);
                }
                if let Some(type_arguments) = &mut call.type_arguments {
                    for type_reference in &mut type_arguments.arguments {
                        if let Some(found) = type_reference.simple_name_mut(id) {
                            return Some(found);
                        }
                    }
                }
                call.arguments
                    .iter_mut()
                    .find_map(|argument| argument.value.simple_name_mut(id))
            }
            ExprKind::Qualified(qualified) => match qualified.receiver.simple_name_mut(id) {
                Some(found) => Some(found),
                None => qualified.selector.simple_name_mut(id),
            },
            ExprKind::Binary(binary) => match binary.left.simple_name_mut(id) {
                Some(found) => Some(found),
                None => binary.right.simple_name_mut(id),
            },
            ExprKind::Unary(unary) => unary.operand.simple_name_mut(id),
            ExprKind::Paren(inner) => inner.simple_name_mut(id),
        }
    }

    /// Find the call expression node with the given id.
    pub fn call_mut(&mut self, id: NodeId) -> Option<&mut CallExpr> {
        if self.id == id {
            return match &mut self.kind {
                ExprKind::Call(call) => Some(call),
                _ => None,
            };
        }
        match &mut self.kind {
            ExprKind::Name(_) | ExprKind::This(_) | ExprKind::Literal(_) => None,
            ExprKind::StringTemplate(entries) => entries
                .iter_mut()
                .filter_map(TemplateEntry::expression_mut)
                .find_map(|expr| expr.call_mut(id)),
            ExprKind::Call(call) => match call.callee.call_mut(id) {
                Some(found) => Some(found),
                None => call
                    .arguments
                    .iter_mut()
                    .find_map(|argument| argument.value.call_mut(id)),
            },
            ExprKind::Qualified(qualified) => match qualified.receiver.call_mut(id) {
                Some(found) => Some(found),
                None => qualified.selector.call_mut(id),
            },
            ExprKind::Binary(binary) => match binary.left.call_mut(id) {
                Some(found) => Some(found),
                None => binary.right.call_mut(id),
            },
            ExprKind::Unary(unary) => unary.operand.call_mut(id),
            ExprKind::Paren(inner) => inner.call_mut(id),
        }
    }

    /// Replace the node with the given id by `replacement(old_node)`.
    ///
    /// The node may be `self`. Returns whether a node was replaced.
    pub fn replace<F>(&mut self, id: NodeId, replacement: F) -> bool
    where
        F: FnOnce(Expr) -> Expr,
    {
        let mut replacement = Some(replacement);
        self.replace_in_place(id, &mut replacement)
    }

    fn replace_in_place<F>(&mut self, id: NodeId, replacement: &mut Option<F>) -> bool
    where
        F: FnOnce(Expr) -> Expr,
    {
        if self.id == id {
            if let Some(replacement) = replacement.take() {
                let old = std::mem::replace(self, Expr::placeholder());
                *self = replacement(old);
                return true;
            }
            return false;
        }
        match &mut self.kind {
            ExprKind::Name(_) | ExprKind::This(_) | ExprKind::Literal(_) => false,
            ExprKind::StringTemplate(entries) => entries
                .iter_mut()
                .filter_map(TemplateEntry::expression_mut)
                .any(|expr| expr.replace_in_place(id, replacement)),
            ExprKind::Call(call) => {
                call.callee.replace_in_place(id, replacement)
                    || call
                        .arguments
                        .iter_mut()
                        .any(|argument| argument.value.replace_in_place(id, replacement))
            }
            ExprKind::Qualified(qualified) => {
                qualified.receiver.replace_in_place(id, replacement)
                    || qualified.selector.replace_in_place(id, replacement)
            }
            ExprKind::Binary(binary) => {
                binary.left.replace_in_place(id, replacement)
                    || binary.right.replace_in_place(id, replacement)
            }
            ExprKind::Unary(unary) => unary.operand.replace_in_place(id, replacement),
            ExprKind::Paren(inner) => inner.replace_in_place(id, replacement),
        }
    }
}

impl TypeReference {
    pub fn for_each_simple_name<'a>(&'a self, f: &mut dyn FnMut(&'a SimpleName, NameContext)) {
        for (index, segment) in self.qualifier.iter().enumerate() {
            f(
                segment,
                NameContext {
                    has_receiver: index > 0,
                    ..NameContext::FREE
                },
            );
        }
        f(
            &self.name,
            NameContext {
                has_receiver: !self.qualifier.is_empty(),
                ..NameContext::FREE
            },
        );
        for argument in &self.arguments {
            argument.for_each_simple_name(f);
        }
    }

    fn simple_name_mut(&mut self, id: NodeId) -> Option<&mut SimpleName> {
        if let Some(segment) = self.qualifier.iter_mut().find(|segment| segment.id == id) {
            return Some(segment);
        }
        if self.name.id == id {
            return Some(&mut self.name);
        }
        self.arguments
            .iter_mut()
            .find_map(|argument| argument.simple_name_mut(id))
    }
}
