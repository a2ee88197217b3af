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

//! Convert expression trees back to source code.

use std::fmt::{self, Write};

use super::ast::*;
use crate::name::{is_identifier, Name};

const KEYWORDS: &[&str] = &["true", "false", "null", "this"];

/// Render an expression with parameter references replaced by `{name}`
/// placeholders, the way replacement templates are displayed.
pub fn render_with_placeholders(expr: &Expr) -> String {
    let mut out = String::new();
    let printer = Printer { placeholders: true };
    // Writing into a String cannot fail.
    let _ = printer.expr(&mut out, expr);
    out
}

struct Printer {
    placeholders: bool,
}

impl Printer {
    fn expr(&self, out: &mut dyn Write, expr: &Expr) -> fmt::Result {
        match &expr.kind {
            ExprKind::Name(name) => self.simple_name(out, name),
            ExprKind::This(this) => match &this.label {
                Some(label) => write!(out, "this@{}", escape_name(label)),
                None => out.write_str("this"),
            },
            ExprKind::Literal(literal) => literal_to_source(out, literal),
            ExprKind::StringTemplate(entries) => {
                out.write_char('"')?;
                for (index, entry) in entries.iter().enumerate() {
                    match entry {
                        TemplateEntry::Text(text) => write_string_content(out, text)?,
                        TemplateEntry::Short(expr)
                            if self.prints_short(expr) && !continues_identifier(entries.get(index + 1)) =>
                        {
                            out.write_char('$')?;
                            self.expr(out, expr)?;
                        }
                        TemplateEntry::Short(expr) | TemplateEntry::Block(expr) => {
                            out.write_str("${")?;
                            self.expr(out, expr)?;
                            out.write_char('}')?;
                        }
                    }
                }
                out.write_char('"')
            }
            ExprKind::Call(call) => {
                self.expr(out, &call.callee)?;
                if let Some(type_arguments) = &call.type_arguments {
                    self.type_arguments(out, &type_arguments.arguments)?;
                }
                out.write_char('(')?;
                for (index, argument) in call.arguments.iter().enumerate() {
                    if index > 0 {
                        out.write_str(", ")?;
                    }
                    if let Some(name) = &argument.name {
                        write!(out, "{} = ", escape_name(name))?;
                    }
                    self.expr(out, &argument.value)?;
                }
                out.write_char(')')
            }
            ExprKind::Qualified(qualified) => {
                self.expr(out, &qualified.receiver)?;
                out.write_str(if qualified.safe { "?." } else { "." })?;
                self.expr(out, &qualified.selector)
            }
            ExprKind::Binary(binary) => {
                self.expr(out, &binary.left)?;
                write!(out, " {} ", binary.op.as_str())?;
                self.expr(out, &binary.right)
            }
            ExprKind::Unary(unary) => match unary.op {
                UnaryOp::NotNullAssertion => {
                    self.expr(out, &unary.operand)?;
                    out.write_str("!!")
                }
                UnaryOp::Minus => {
                    out.write_char('-')?;
                    self.expr(out, &unary.operand)
                }
                UnaryOp::Plus => {
                    out.write_char('+')?;
                    self.expr(out, &unary.operand)
                }
                UnaryOp::Not => {
                    out.write_char('!')?;
                    self.expr(out, &unary.operand)
                }
            },
            ExprKind::Paren(inner) => {
                out.write_char('(')?;
                self.expr(out, inner)?;
                out.write_char(')')
            }
        }
    }

    /// Whether a template entry can be written as `$name`.
    fn prints_short(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::This(this) => this.label.is_none(),
            ExprKind::Name(name) => {
                !(self.placeholders && matches!(name.role, Role::Parameter(_)))
                    && escape_name(&name.name) == name.name.as_str()
            }
            _ => false,
        }
    }

    fn simple_name(&self, out: &mut dyn Write, name: &SimpleName) -> fmt::Result {
        match (&name.role, self.placeholders) {
            (Role::Parameter(parameter), true) => write!(out, "{{{}}}", parameter),
            _ => out.write_str(&escape_name(&name.name)),
        }
    }

    fn type_arguments(&self, out: &mut dyn Write, arguments: &[TypeReference]) -> fmt::Result {
        out.write_char('<')?;
        for (index, argument) in arguments.iter().enumerate() {
            if index > 0 {
                out.write_str(", ")?;
            }
            self.type_reference(out, argument)?;
        }
        out.write_char('>')
    }

    fn type_reference(&self, out: &mut dyn Write, type_reference: &TypeReference) -> fmt::Result {
        for segment in &type_reference.qualifier {
            self.simple_name(out, segment)?;
            out.write_char('.')?;
        }
        self.simple_name(out, &type_reference.name)?;
        if !type_reference.arguments.is_empty() {
            self.type_arguments(out, &type_reference.arguments)?;
        }
        if type_reference.nullable {
            out.write_char('?')?;
        }
        Ok(())
    }
}

fn escape_name(name: &Name) -> String {
    if is_identifier(name.as_str()) && !KEYWORDS.contains(&name.as_str()) {
        name.to_string()
    } else {
        format!("`{}`", name)
    }
}

/// Text following `$name` must not extend the name.
fn continues_identifier(next: Option<&TemplateEntry>) -> bool {
    match next {
        Some(TemplateEntry::Text(text)) => text
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn write_escaped(out: &mut dyn Write, c: char) -> fmt::Result {
    match c {
        '\\' => out.write_str("\\\\"),
        '$' => out.write_str("\\$"),
        '\n' => out.write_str("\\n"),
        '\r' => out.write_str("\\r"),
        '\t' => out.write_str("\\t"),
        '\u{8}' => out.write_str("\\b"),
        c => out.write_char(c),
    }
}

fn write_string_content(out: &mut dyn Write, content: &str) -> fmt::Result {
    for c in content.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            c => write_escaped(out, c)?,
        }
    }
    Ok(())
}

fn literal_to_source(out: &mut dyn Write, literal: &Literal) -> fmt::Result {
    match literal {
        Literal::Int(text) | Literal::Decimal(text) => out.write_str(text),
        Literal::Boolean(value) => write!(out, "{}", value),
        Literal::Null => out.write_str("null"),
        Literal::Char(c) => {
            out.write_char('\'')?;
            match c {
                '\'' => out.write_str("\\'")?,
                '$' => out.write_char('$')?,
                c => write_escaped(out, *c)?,
            }
            out.write_char('\'')
        }
        Literal::String(content) => {
            out.write_char('"')?;
            write_string_content(out, content)?;
            out.write_char('"')
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer {
            placeholders: false,
        }
        .expr(f, self)
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer {
            placeholders: false,
        }
        .type_reference(f, self)
    }
}

impl fmt::Display for TypeArgumentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer {
            placeholders: false,
        }
        .type_arguments(f, &self.arguments)
    }
}
