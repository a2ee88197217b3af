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

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::{FqName, Name};
use crate::resolve::Canceled;
use crate::syntax::{render_with_placeholders, Expr, Role, SimpleName};

/// The contents of a `ReplaceWith` annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceWith {
    pub expression: String,
    #[serde(default)]
    pub imports: Vec<String>,
}

impl ReplaceWith {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            imports: Vec::new(),
        }
    }

    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports.extend(imports.into_iter().map(Into::into));
        self
    }
}

/// A replacement template: the rewritten expression plus the names a call
/// site has to import for it to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementExpression {
    expression: Expr,
    fq_names_to_import: IndexSet<FqName>,
}

impl ReplacementExpression {
    pub fn new(expression: Expr, fq_names_to_import: IndexSet<FqName>) -> Self {
        Self {
            expression,
            fq_names_to_import,
        }
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn fq_names_to_import(&self) -> &IndexSet<FqName> {
        &self.fq_names_to_import
    }

    /// A deep copy; parameter and type parameter usages survive.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// The expression with parameter usages rendered as `{name}`.
    pub fn placeholder_text(&self) -> String {
        render_with_placeholders(&self.expression)
    }

    /// Names referring to a value parameter of the deprecated callable.
    pub fn parameter_usages(&self) -> Vec<&SimpleName> {
        self.expression
            .simple_names()
            .into_iter()
            .filter(|name| matches!(name.role, Role::Parameter(_)))
            .collect()
    }

    /// Names referring to a type parameter of the deprecated callable.
    pub fn type_parameter_usages(&self) -> Vec<&SimpleName> {
        self.expression
            .simple_names()
            .into_iter()
            .filter(|name| matches!(name.role, Role::TypeParameter(_)))
            .collect()
    }

    /// Whether the parameter `name` occurs in the template.
    pub fn uses_parameter(&self, name: &Name) -> bool {
        self.parameter_usages()
            .iter()
            .any(|usage| matches!(&usage.role, Role::Parameter(p) if p == name))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Malformed replacement expression `{expression}`: {message}")]
    MalformedReplacement { expression: String, message: String },

    #[error("Unsupported declaration kind: {0}")]
    UnsupportedDeclarationKind(String),

    #[error("Analysis was canceled")]
    Canceled,
}

impl From<Canceled> for AnalysisError {
    fn from(_: Canceled) -> Self {
        AnalysisError::Canceled
    }
}
