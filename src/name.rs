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

//! Simple and fully-qualified names.
//!
//! Import entries of a `ReplaceWith` annotation arrive as free text, so they
//! go through [`FqNameUnsafe::parse`] first. Only names whose segments are all
//! ordinary identifiers survive [`FqNameUnsafe::to_safe`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*$").unwrap());

static SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<[^<>.\s]+>$").unwrap());

/// Check whether `text` is a plain identifier.
pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

/// A single (unqualified) name such as `listOf` or `<init>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Names such as `<init>` or `<anonymous>` that cannot be written in source.
    pub fn special(name: &str) -> Self {
        Self(format!("<{}>", name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_special(&self) -> bool {
        self.0.starts_with('<')
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A fully-qualified name made only of ordinary identifiers.
///
/// The root name is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FqName(String);

impl FqName {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Build from text the caller already knows to be safe.
    ///
    /// Use [`FqNameUnsafe::parse`] for untrusted input.
    pub fn from_trusted(text: &str) -> Self {
        Self(text.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn child(&self, name: &Name) -> Self {
        if self.is_root() {
            Self(name.as_str().to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('.') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    pub fn short_name(&self) -> Name {
        match self.0.rfind('.') {
            Some(idx) => Name::new(&self.0[idx + 1..]),
            None => Name::new(self.0.as_str()),
        }
    }

    pub fn segments(&self) -> Vec<Name> {
        if self.is_root() {
            return Vec::new();
        }
        self.0.split('.').map(Name::new).collect()
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A dotted name that may contain special segments such as `<init>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FqNameUnsafe {
    segments: Vec<String>,
}

impl FqNameUnsafe {
    /// Parse `text` as a dotted name.
    ///
    /// Returns `None` when the text is empty or when a segment is neither an
    /// identifier nor a special `<name>`.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        let segments: Vec<String> = text.split('.').map(str::to_string).collect();
        if segments
            .iter()
            .all(|s| IDENTIFIER.is_match(s) || SPECIAL.is_match(s))
        {
            Some(Self { segments })
        } else {
            None
        }
    }

    pub fn is_valid(text: &str) -> bool {
        Self::parse(text).is_some()
    }

    pub fn is_safe(&self) -> bool {
        self.segments.iter().all(|s| !s.starts_with('<'))
    }

    pub fn to_safe(&self) -> Option<FqName> {
        if self.is_safe() {
            Some(FqName(self.segments.join(".")))
        } else {
            None
        }
    }
}

impl fmt::Display for FqNameUnsafe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}
