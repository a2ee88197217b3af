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

//! Lexical scopes and the utilities that build them for declarations.
//!
//! A [`LexicalScope`] is one level of a chain. Lookups walk from the innermost
//! level outwards; each level may contribute declared descriptors, member
//! scopes (packages, imports) and an implicit `this` receiver.

use once_cell::unsync::OnceCell;
use std::sync::Arc;

use crate::descriptors::{DescriptorId, DescriptorKind, Descriptors, KotlinType};
use crate::name::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Package,
    ClassHeader,
    CompanionObject,
    ClassMemberDeclaration,
    FunctionInner,
    PropertyInner,
    Local,
}

/// An implicit receiver available in a scope.
///
/// `owner` is the class for class and object receivers, or the callable for
/// extension receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThisReceiver {
    pub owner: DescriptorId,
    pub ty: KotlinType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberScope {
    /// All members of a package, subpackages included.
    Package(DescriptorId),
    /// A star import: top-level declarations of a package, no subpackages.
    AllUnderImport(DescriptorId),
    /// Descriptors named by explicit imports.
    ExplicitImports(Vec<DescriptorId>),
}

impl MemberScope {
    pub fn contributed(&self, descriptors: &Descriptors, name: &Name) -> Vec<DescriptorId> {
        match self {
            MemberScope::Package(view) => descriptors.package_members(*view, name),
            MemberScope::AllUnderImport(view) => descriptors
                .package_members(*view, name)
                .into_iter()
                .filter(|id| {
                    !matches!(descriptors.get(*id).kind, DescriptorKind::PackageView { .. })
                })
                .collect(),
            MemberScope::ExplicitImports(imported) => imported
                .iter()
                .filter(|id| descriptors.name(**id) == name)
                .copied()
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LexicalScope {
    parent: Option<Arc<LexicalScope>>,
    owner: DescriptorId,
    kind: ScopeKind,
    implicit_receiver: Option<ThisReceiver>,
    declarations: Vec<DescriptorId>,
    member_scopes: Vec<MemberScope>,
}

impl LexicalScope {
    pub fn new(parent: Option<Arc<LexicalScope>>, owner: DescriptorId, kind: ScopeKind) -> Self {
        Self {
            parent,
            owner,
            kind,
            implicit_receiver: None,
            declarations: Vec::new(),
            member_scopes: Vec::new(),
        }
    }

    pub fn with_implicit_receiver(mut self, receiver: Option<ThisReceiver>) -> Self {
        self.implicit_receiver = receiver;
        self
    }

    pub fn with_declarations(mut self, declarations: impl IntoIterator<Item = DescriptorId>) -> Self {
        self.declarations.extend(declarations);
        self
    }

    pub fn with_member_scopes(mut self, scopes: impl IntoIterator<Item = MemberScope>) -> Self {
        self.member_scopes.extend(scopes);
        self
    }

    pub fn parent(&self) -> Option<&Arc<LexicalScope>> {
        self.parent.as_ref()
    }

    pub fn owner(&self) -> DescriptorId {
        self.owner
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn implicit_receiver(&self) -> Option<&ThisReceiver> {
        self.implicit_receiver.as_ref()
    }

    pub fn declarations(&self) -> &[DescriptorId] {
        &self.declarations
    }

    pub fn member_scopes(&self) -> &[MemberScope] {
        &self.member_scopes
    }

    /// This level followed by every enclosing level.
    pub fn levels(&self) -> Levels<'_> {
        Levels {
            current: Some(self),
        }
    }

    /// Implicit receivers, innermost first.
    pub fn implicit_receivers(&self) -> Vec<&ThisReceiver> {
        self.levels()
            .filter_map(|level| level.implicit_receiver.as_ref())
            .collect()
    }

    /// Descriptors named `name` contributed by this level only: declarations
    /// first, then member scopes in order.
    pub fn contributed(&self, descriptors: &Descriptors, name: &Name) -> Vec<DescriptorId> {
        let mut found: Vec<DescriptorId> = self
            .declarations
            .iter()
            .filter(|id| descriptors.name(**id) == name)
            .copied()
            .collect();
        for scope in &self.member_scopes {
            for id in scope.contributed(descriptors, name) {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }
}

pub struct Levels<'a> {
    current: Option<&'a LexicalScope>,
}

impl<'a> Iterator for Levels<'a> {
    type Item = &'a LexicalScope;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.parent.as_deref();
        Some(current)
    }
}

/// The scope of a package: its own members followed by `additional` scopes.
pub fn chained_package_scope(view: DescriptorId, additional: &[MemberScope]) -> Arc<LexicalScope> {
    let mut member_scopes = vec![MemberScope::Package(view)];
    member_scopes.extend(additional.iter().cloned());
    Arc::new(LexicalScope::new(None, view, ScopeKind::Package).with_member_scopes(member_scopes))
}

/// Builds the resolution scopes of a class over the scope of its container.
///
/// Scopes are computed on first use and kept in a single-threaded cell.
pub struct ClassResolutionScopesSupport {
    class: DescriptorId,
    outer: Arc<LexicalScope>,
    header: OnceCell<Arc<LexicalScope>>,
    member_declaration: OnceCell<Arc<LexicalScope>>,
}

impl ClassResolutionScopesSupport {
    pub fn new(class: DescriptorId, outer: Arc<LexicalScope>) -> Self {
        Self {
            class,
            outer,
            header: OnceCell::new(),
            member_declaration: OnceCell::new(),
        }
    }

    /// Type parameters of the class over the outer scope.
    pub fn scope_for_class_header_resolution(&self, descriptors: &Descriptors) -> Arc<LexicalScope> {
        self.header
            .get_or_init(|| {
                Arc::new(
                    LexicalScope::new(Some(self.outer.clone()), self.class, ScopeKind::ClassHeader)
                        .with_declarations(descriptors.type_parameters(self.class).iter().copied()),
                )
            })
            .clone()
    }

    /// The scope member declarations of the class are resolved in: the
    /// companion object receiver, then the class receiver with its nested
    /// classifiers.
    pub fn scope_for_member_declaration_resolution(&self, descriptors: &Descriptors) -> Arc<LexicalScope> {
        self.member_declaration
            .get_or_init(|| {
                let mut scope = self.scope_for_class_header_resolution(descriptors);
                let companion = descriptors.class(self.class).and_then(|data| data.companion);
                if let Some(companion) = companion {
                    scope = Arc::new(
                        LexicalScope::new(Some(scope), companion, ScopeKind::CompanionObject)
                            .with_implicit_receiver(Some(ThisReceiver {
                                owner: companion,
                                ty: descriptors.default_type(companion),
                            }))
                            .with_declarations(nested_classifiers(descriptors, companion)),
                    );
                }
                Arc::new(
                    LexicalScope::new(Some(scope), self.class, ScopeKind::ClassMemberDeclaration)
                        .with_implicit_receiver(Some(ThisReceiver {
                            owner: self.class,
                            ty: descriptors.default_type(self.class),
                        }))
                        .with_declarations(nested_classifiers(descriptors, self.class)),
                )
            })
            .clone()
    }
}

fn nested_classifiers(descriptors: &Descriptors, class: DescriptorId) -> Vec<DescriptorId> {
    descriptors
        .children(class)
        .iter()
        .filter(|child| descriptors.class(**child).is_some())
        .copied()
        .collect()
}

fn extension_receiver(descriptors: &Descriptors, callable: DescriptorId) -> Option<ThisReceiver> {
    let ty = descriptors.callable(callable)?.extension_receiver.clone()?;
    Some(ThisReceiver { owner: callable, ty })
}

/// The scope inside a function body: type parameters, value parameters and
/// the extension receiver. A later declaration with an already declared name
/// is shadowed by the earlier one.
pub fn function_inner_scope(
    outer: Arc<LexicalScope>,
    function: DescriptorId,
    descriptors: &Descriptors,
) -> Arc<LexicalScope> {
    let own_type_parameters = match descriptors.get(function).kind {
        // Constructor type parameters are the class's and already in scope.
        DescriptorKind::Constructor(_) => Vec::new(),
        _ => descriptors.type_parameters(function).to_vec(),
    };
    Arc::new(
        LexicalScope::new(Some(outer), function, ScopeKind::FunctionInner)
            .with_implicit_receiver(extension_receiver(descriptors, function))
            .with_declarations(own_type_parameters)
            .with_declarations(descriptors.value_parameters(function).iter().copied()),
    )
}

/// The scope a property's accessors and initializer see.
pub fn property_declaration_inner_scope(
    outer: Arc<LexicalScope>,
    property: DescriptorId,
    descriptors: &Descriptors,
) -> Arc<LexicalScope> {
    Arc::new(
        LexicalScope::new(Some(outer), property, ScopeKind::PropertyInner)
            .with_implicit_receiver(extension_receiver(descriptors, property))
            .with_declarations(descriptors.type_parameters(property).iter().copied()),
    )
}
