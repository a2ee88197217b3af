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

//! Recursive-descent parser for replacement expressions.
//!
//! [`ExpressionFactory`] is the only entry point. It owns the node id counter,
//! so every node of one analysis comes from the same factory and ids never
//! collide when later passes splice new nodes into an existing tree.

use std::cell::Cell;
use std::collections::HashMap;

use super::ast::*;
use super::lexer::{lex, TemplatePart, Token, TokenKind};
use super::{ParseError, MAX_NESTING};
use crate::name::Name;

/// Creates expression trees from text and builds synthetic nodes.
#[derive(Debug, Default)]
pub struct ExpressionFactory {
    next_id: Cell<u32>,
}

impl ExpressionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    /// Parse a complete expression.
    pub fn create_expression(&self, text: &str) -> Result<Expr, ParseError> {
        let mut parser = Parser::new(lex(text)?, self);
        let expr = parser.parse_expr()?;
        parser.expect_end()?;
        Ok(expr)
    }

    /// Parse a type argument list such as `<T, kotlin.String>`.
    pub fn create_type_arguments(&self, text: &str) -> Result<TypeArgumentList, ParseError> {
        let mut parser = Parser::new(lex(text)?, self);
        let arguments = parser.parse_type_argument_list()?;
        parser.expect_end()?;
        Ok(arguments)
    }

    /// Parse a single type reference such as `kotlin.collections.List<T>?`.
    pub fn create_type_reference(&self, text: &str) -> Result<TypeReference, ParseError> {
        let mut parser = Parser::new(lex(text)?, self);
        let type_reference = parser.parse_type_reference()?;
        parser.expect_end()?;
        Ok(type_reference)
    }

    /// Build `receiver.selector`.
    pub fn create_qualified(&self, receiver: Expr, selector: Expr) -> Expr {
        Expr::new(
            self.next_id(),
            ExprKind::Qualified(QualifiedExpr {
                receiver: Box::new(receiver),
                selector: Box::new(selector),
                safe: false,
            }),
        )
    }

    /// Build `this` or `this@label`.
    pub fn create_this(&self, label: Option<Name>) -> Expr {
        Expr::new(self.next_id(), ExprKind::This(ThisExpr { label }))
    }

    pub fn create_simple_name(&self, name: Name) -> SimpleName {
        SimpleName {
            id: self.next_id(),
            name,
            role: Role::Plain,
        }
    }
}

const BINARY_LEVEL_COUNT: usize = 7;

/// Binary operators by precedence level, loosest first.
fn binary_operator(level: usize, kind: &TokenKind) -> Option<BinaryOp> {
    let op = match (level, kind) {
        (0, TokenKind::OrOr) => BinaryOp::Or,
        (1, TokenKind::AndAnd) => BinaryOp::And,
        (2, TokenKind::EqualEqual) => BinaryOp::Equal,
        (2, TokenKind::BangEqual) => BinaryOp::NotEqual,
        (3, TokenKind::Lt) => BinaryOp::Less,
        (3, TokenKind::Gt) => BinaryOp::Greater,
        (3, TokenKind::LtEqual) => BinaryOp::LessOrEqual,
        (3, TokenKind::GtEqual) => BinaryOp::GreaterOrEqual,
        (4, TokenKind::Elvis) => BinaryOp::Elvis,
        (5, TokenKind::Plus) => BinaryOp::Add,
        (5, TokenKind::Minus) => BinaryOp::Subtract,
        (6, TokenKind::Star) => BinaryOp::Multiply,
        (6, TokenKind::Slash) => BinaryOp::Divide,
        (6, TokenKind::Percent) => BinaryOp::Remainder,
        _ => return None,
    };
    Some(op)
}

struct Parser<'f> {
    tokens: Vec<Token>,
    cursor: usize,
    factory: &'f ExpressionFactory,
    /// Current depth of recursive productions.
    nesting: usize,
    /// Height of every subtree built so far.
    heights: HashMap<NodeId, usize>,
}

impl<'f> Parser<'f> {
    fn new(tokens: Vec<Token>, factory: &'f ExpressionFactory) -> Self {
        Self {
            tokens,
            cursor: 0,
            factory,
            nesting: 0,
            heights: HashMap::new(),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.nested(|parser| parser.parse_binary(0))
    }

    /// Run a recursive production, failing once nesting gets too deep.
    fn nested<T>(
        &mut self,
        production: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.nesting >= MAX_NESTING {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let result = production(self);
        self.nesting -= 1;
        result
    }

    /// Create a node, rejecting trees taller than [`MAX_NESTING`].
    ///
    /// Operator and call chains grow the tree without recursing in the
    /// parser, so the height is tracked separately from `nesting`.
    fn node(&mut self, kind: ExprKind) -> Result<Expr, ParseError> {
        let expr = Expr::new(self.factory.next_id(), kind);
        let height = 1 + expr
            .children()
            .iter()
            .map(|child| self.heights.get(&child.id).copied().unwrap_or(1))
            .max()
            .unwrap_or(0);
        if height > MAX_NESTING {
            return Err(self.too_deep());
        }
        self.heights.insert(expr.id, height);
        Ok(expr)
    }

    fn too_deep(&self) -> ParseError {
        ParseError::new("Expression is nested too deeply", self.peek().offset)
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr, ParseError> {
        if level == BINARY_LEVEL_COUNT {
            return self.parse_prefix();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = binary_operator(level, self.peek_kind()) {
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = self.node(ExprKind::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }))?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.nested(|parser| parser.parse_prefix())?;
        self.node(ExprKind::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
        }))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    expr = self.parse_call_suffix(expr, None)?;
                }
                TokenKind::Lt if matches!(expr.kind, ExprKind::Name(_)) => {
                    match self.try_parse_call_type_arguments() {
                        Some(type_arguments) => {
                            expr = self.parse_call_suffix(expr, Some(type_arguments))?;
                        }
                        None => break,
                    }
                }
                TokenKind::Dot | TokenKind::SafeDot => {
                    let safe = self.at(&TokenKind::SafeDot);
                    self.advance();
                    let selector = self.parse_selector()?;
                    expr = self.node(ExprKind::Qualified(QualifiedExpr {
                        receiver: Box::new(expr),
                        selector: Box::new(selector),
                        safe,
                    }))?;
                }
                TokenKind::BangBang => {
                    self.advance();
                    expr = self.node(ExprKind::Unary(UnaryExpr {
                        op: UnaryOp::NotNullAssertion,
                        operand: Box::new(expr),
                    }))?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// The part after `.`: a name, optionally called.
    fn parse_selector(&mut self) -> Result<Expr, ParseError> {
        let name = self.expect_ident("Expecting member name after '.'")?;
        let callee = self.node(ExprKind::Name(name))?;
        match self.peek_kind() {
            TokenKind::LParen => self.parse_call_suffix(callee, None),
            TokenKind::Lt => match self.try_parse_call_type_arguments() {
                Some(type_arguments) => self.parse_call_suffix(callee, Some(type_arguments)),
                None => Ok(callee),
            },
            _ => Ok(callee),
        }
    }

    fn try_parse_call_type_arguments(&mut self) -> Option<TypeArgumentList> {
        let start = self.cursor;
        let result = self.parse_type_argument_list();
        match result {
            Ok(type_arguments) if self.at(&TokenKind::LParen) => Some(type_arguments),
            _ => {
                self.cursor = start;
                None
            }
        }
    }

    fn parse_call_suffix(
        &mut self,
        callee: Expr,
        type_arguments: Option<TypeArgumentList>,
    ) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen, "Expecting '('")?;
        let mut arguments = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let name = match (self.peek_kind(), self.peek_kind_at(1)) {
                (TokenKind::Identifier(name), TokenKind::Equal) => {
                    let name = Name::new(name.as_str());
                    self.advance();
                    self.advance();
                    Some(name)
                }
                _ => None,
            };
            let value = self.parse_expr()?;
            arguments.push(ValueArgument { name, value });
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expecting ')' after call arguments")?;
        self.node(ExprKind::Call(CallExpr {
            callee: Box::new(callee),
            type_arguments,
            arguments,
        }))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Identifier(_) => {
                let name = self.expect_ident("Expecting a name")?;
                ExprKind::Name(name)
            }
            TokenKind::This => {
                self.advance();
                let label = if self.match_kind(&TokenKind::At) {
                    Some(self.expect_ident("Expecting label after 'this@'")?.name)
                } else {
                    None
                };
                ExprKind::This(ThisExpr { label })
            }
            TokenKind::IntLiteral(text) => {
                self.advance();
                ExprKind::Literal(Literal::Int(text))
            }
            TokenKind::DecimalLiteral(text) => {
                self.advance();
                ExprKind::Literal(Literal::Decimal(text))
            }
            TokenKind::CharLiteral(value) => {
                self.advance();
                ExprKind::Literal(Literal::Char(value))
            }
            TokenKind::StringLiteral(value) => {
                self.advance();
                ExprKind::Literal(Literal::String(value))
            }
            TokenKind::StringTemplate(parts) => {
                self.advance();
                ExprKind::StringTemplate(self.parse_template(parts)?)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(Literal::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(Literal::Boolean(false))
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Literal(Literal::Null)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "Expecting ')'")?;
                ExprKind::Paren(Box::new(inner))
            }
            other => {
                return Err(ParseError::new(
                    format!("Expecting an element, found {}", other.describe()),
                    token.offset,
                ))
            }
        };
        self.node(kind)
    }

    fn parse_template(&mut self, parts: Vec<TemplatePart>) -> Result<Vec<TemplateEntry>, ParseError> {
        let mut entries = Vec::with_capacity(parts.len());
        for part in parts {
            let entry = match part {
                TemplatePart::Text(text) => TemplateEntry::Text(text),
                TemplatePart::Name { name, .. } if name == "this" => {
                    TemplateEntry::Short(self.node(ExprKind::This(ThisExpr { label: None }))?)
                }
                TemplatePart::Name { name, .. } => {
                    let name = self.factory.create_simple_name(Name::new(name.as_str()));
                    TemplateEntry::Short(self.node(ExprKind::Name(name))?)
                }
                TemplatePart::Block(tokens) => {
                    // Parse the entry in place so ids, nesting and heights
                    // continue from the enclosing expression.
                    let outer_tokens = std::mem::replace(&mut self.tokens, tokens);
                    let outer_cursor = std::mem::replace(&mut self.cursor, 0);
                    let inner = self.parse_expr().and_then(|expr| {
                        self.expect_end()?;
                        Ok(expr)
                    });
                    self.tokens = outer_tokens;
                    self.cursor = outer_cursor;
                    TemplateEntry::Block(inner?)
                }
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    fn parse_type_argument_list(&mut self) -> Result<TypeArgumentList, ParseError> {
        self.expect(TokenKind::Lt, "Expecting '<'")?;
        let mut arguments = vec![self.parse_type_reference()?];
        while self.match_kind(&TokenKind::Comma) {
            arguments.push(self.parse_type_reference()?);
        }
        self.expect(TokenKind::Gt, "Expecting '>'")?;
        Ok(TypeArgumentList {
            id: self.factory.next_id(),
            arguments,
        })
    }

    fn parse_type_reference(&mut self) -> Result<TypeReference, ParseError> {
        self.nested(|parser| parser.parse_type_reference_inner())
    }

    fn parse_type_reference_inner(&mut self) -> Result<TypeReference, ParseError> {
        let mut qualifier = Vec::new();
        let mut name = self.expect_ident("Expecting type name")?;
        while self.match_kind(&TokenKind::Dot) {
            qualifier.push(name);
            name = self.expect_ident("Expecting type name after '.'")?;
        }
        let arguments = if self.at(&TokenKind::Lt) {
            self.parse_type_argument_list()?.arguments
        } else {
            Vec::new()
        };
        let nullable = self.match_kind(&TokenKind::Question);
        Ok(TypeReference {
            id: self.factory.next_id(),
            qualifier,
            name,
            arguments,
            nullable,
        })
    }

    fn expect_ident(&mut self, message: &str) -> Result<SimpleName, ParseError> {
        match self.peek_kind() {
            TokenKind::Identifier(name) => {
                let name = Name::new(name.as_str());
                self.advance();
                Ok(self.factory.create_simple_name(name))
            }
            _ => Err(self.error_current(message)),
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<(), ParseError> {
        if self.match_kind(&kind) {
            Ok(())
        } else {
            Err(self.error_current(message))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_current("Unexpected trailing input"))
        }
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) {
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_kind_at(&self, distance: usize) -> &TokenKind {
        let index = (self.cursor + distance).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn error_current(&self, message: &str) -> ParseError {
        let token = self.peek();
        ParseError::new(
            format!("{}, found {}", message, token.kind.describe()),
            token.offset,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Expr {
        ExpressionFactory::new().create_expression(text).unwrap()
    }

    #[test]
    fn test_parse_call_with_type_arguments() {
        let expr = parse("listOf<T>(x)");
        match &expr.kind {
            ExprKind::Call(call) => {
                assert_eq!(call.callee_name().unwrap().name, "listOf");
                let type_arguments = call.type_arguments.as_ref().unwrap();
                assert_eq!(type_arguments.arguments.len(), 1);
                assert_eq!(type_arguments.arguments[0].name.name, "T");
                assert_eq!(call.arguments.len(), 1);
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_less_than_is_not_type_arguments() {
        let expr = parse("a < b");
        assert!(matches!(
            expr.kind,
            ExprKind::Binary(BinaryExpr {
                op: BinaryOp::Less,
                ..
            })
        ));

        let expr = parse("a < b && c > d");
        assert!(matches!(
            expr.kind,
            ExprKind::Binary(BinaryExpr {
                op: BinaryOp::And,
                ..
            })
        ));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse("a + b * c").to_string(), "a + b * c");
        match parse("a + b * c").kind {
            ExprKind::Binary(binary) => {
                assert_eq!(binary.op, BinaryOp::Add);
                assert!(matches!(
                    binary.right.kind,
                    ExprKind::Binary(BinaryExpr {
                        op: BinaryOp::Multiply,
                        ..
                    })
                ));
            }
            other => panic!("Expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_qualified_call_chain() {
        let expr = parse("a.b(c)?.d!!");
        assert_eq!(expr.to_string(), "a.b(c)?.d!!");
        assert!(matches!(
            expr.kind,
            ExprKind::Unary(UnaryExpr {
                op: UnaryOp::NotNullAssertion,
                ..
            })
        ));
    }

    #[test]
    fn test_named_arguments() {
        let expr = parse("f(1, mode = \"legacy\")");
        match &expr.kind {
            ExprKind::Call(call) => {
                assert_eq!(call.arguments[0].name, None);
                assert_eq!(call.arguments[1].name, Some(Name::new("mode")));
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_this_with_label() {
        let expr = parse("this@Outer.h()");
        assert_eq!(expr.to_string(), "this@Outer.h()");
    }

    #[test]
    fn test_malformed_expressions() {
        let factory = ExpressionFactory::new();
        assert!(factory.create_expression("(").is_err());
        assert!(factory.create_expression("").is_err());
        assert!(factory.create_expression("f(").is_err());
        assert!(factory.create_expression("a b").is_err());
        assert!(factory.create_expression("a.").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let factory = ExpressionFactory::new();
        let parenthesized = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        assert!(factory.create_expression(&parenthesized(32)).is_ok());
        let err = factory.create_expression(&parenthesized(200)).unwrap_err();
        assert!(err.message.contains("nested too deeply"), "{}", err);

        let negated = format!("{}x", "-".repeat(500));
        assert!(factory.create_expression(&negated).is_err());

        let type_arguments = format!("f<{}T{}>()", "List<".repeat(100), ">".repeat(100));
        assert!(factory.create_expression(&type_arguments).is_err());
    }

    #[test]
    fn test_long_chains_are_limited() {
        let factory = ExpressionFactory::new();
        let sum = vec!["x"; 10].join(" + ");
        assert!(factory.create_expression(&sum).is_ok());
        let sum = vec!["x"; 1000].join(" + ");
        assert!(factory.create_expression(&sum).is_err());
        let chain = format!("x{}", ".f()".repeat(1000));
        assert!(factory.create_expression(&chain).is_err());
    }

    #[test]
    fn test_parse_string_template() {
        let expr = parse(r#""$x is ${y + 1}, $this""#);
        match &expr.kind {
            ExprKind::StringTemplate(entries) => {
                assert_eq!(entries.len(), 5);
                assert!(matches!(&entries[0], TemplateEntry::Short(e) if matches!(e.kind, ExprKind::Name(_))));
                assert_eq!(entries[1], TemplateEntry::Text(" is ".to_string()));
                assert!(matches!(&entries[2], TemplateEntry::Block(e) if matches!(e.kind, ExprKind::Binary(_))));
                assert!(matches!(&entries[4], TemplateEntry::Short(e) if matches!(e.kind, ExprKind::This(_))));
            }
            other => panic!("Expected template, got {:?}", other),
        }
        assert!(ExpressionFactory::new().create_expression(r#""${a b}""#).is_err());
        assert!(ExpressionFactory::new().create_expression(r#""${}""#).is_err());
    }

    #[test]
    fn test_parse_literal_forms() {
        for text in ["1e5", "0x1F", "0b101", "1_000L", "'a'", "2.5e-3f"] {
            assert!(
                matches!(parse(text).kind, ExprKind::Literal(_)),
                "{} is not a literal",
                text
            );
        }
        assert_eq!(parse("'a'").kind, ExprKind::Literal(Literal::Char('a')));
    }

    #[test]
    fn test_create_type_arguments() {
        let factory = ExpressionFactory::new();
        let list = factory
            .create_type_arguments("<T, kotlin.collections.List<String>?>")
            .unwrap();
        assert_eq!(list.arguments.len(), 2);
        let second = &list.arguments[1];
        assert_eq!(second.qualifier.len(), 2);
        assert_eq!(second.name.name, "List");
        assert!(second.nullable);
        assert_eq!(second.arguments[0].name.name, "String");
    }

    #[test]
    fn test_ids_are_unique_and_deterministic() {
        let first = ExpressionFactory::new()
            .create_expression("f(x, g(y))")
            .unwrap();
        let second = ExpressionFactory::new()
            .create_expression("f(x, g(y))")
            .unwrap();
        assert_eq!(first, second);

        let mut ids: Vec<NodeId> = first.simple_names().iter().map(|n| n.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}
