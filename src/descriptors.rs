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

//! Declaration descriptors: modules, packages, classes, callables and types.
//!
//! Descriptors live in an append-only arena. A descriptor can only name an
//! already existing descriptor as its container, so the container of a
//! descriptor always has a smaller id and every walk up the containment chain
//! terminates.

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::name::{FqName, Name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(u32);

impl DescriptorId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type arguments chosen for a generic declaration, keyed by type parameter.
pub type TypeSubstitution = IndexMap<DescriptorId, KotlinType>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KotlinType {
    Class {
        class: DescriptorId,
        arguments: Vec<KotlinType>,
        nullable: bool,
    },
    TypeParameter {
        parameter: DescriptorId,
        nullable: bool,
    },
    Error,
}

impl KotlinType {
    pub fn class(class: DescriptorId, arguments: Vec<KotlinType>) -> Self {
        KotlinType::Class {
            class,
            arguments,
            nullable: false,
        }
    }

    pub fn simple(class: DescriptorId) -> Self {
        Self::class(class, Vec::new())
    }

    pub fn type_parameter(parameter: DescriptorId) -> Self {
        KotlinType::TypeParameter {
            parameter,
            nullable: false,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            KotlinType::Class { nullable, .. } | KotlinType::TypeParameter { nullable, .. } => {
                *nullable
            }
            KotlinType::Error => false,
        }
    }

    pub fn with_nullability(self, value: bool) -> Self {
        match self {
            KotlinType::Class {
                class, arguments, ..
            } => KotlinType::Class {
                class,
                arguments,
                nullable: value,
            },
            KotlinType::TypeParameter { parameter, .. } => KotlinType::TypeParameter {
                parameter,
                nullable: value,
            },
            KotlinType::Error => KotlinType::Error,
        }
    }

    pub fn make_nullable(self) -> Self {
        self.with_nullability(true)
    }

    pub fn make_not_nullable(self) -> Self {
        self.with_nullability(false)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, KotlinType::Error)
    }

    pub fn contains_error(&self) -> bool {
        match self {
            KotlinType::Error => true,
            KotlinType::Class { arguments, .. } => arguments.iter().any(KotlinType::contains_error),
            KotlinType::TypeParameter { .. } => false,
        }
    }

    /// Replace type parameters according to `substitution`.
    pub fn substitute(&self, substitution: &TypeSubstitution) -> KotlinType {
        match self {
            KotlinType::TypeParameter {
                parameter,
                nullable,
            } => match substitution.get(parameter) {
                Some(replacement) if *nullable => replacement.clone().make_nullable(),
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            },
            KotlinType::Class {
                class,
                arguments,
                nullable,
            } => KotlinType::Class {
                class: *class,
                arguments: arguments.iter().map(|a| a.substitute(substitution)).collect(),
                nullable: *nullable,
            },
            KotlinType::Error => KotlinType::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Object,
    CompanionObject,
    EnumClass,
}

impl ClassKind {
    pub fn is_singleton(&self) -> bool {
        matches!(self, ClassKind::Object | ClassKind::CompanionObject)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Declaration,
    FakeOverride,
    Delegation,
    Synthesized,
}

#[derive(Debug, Clone)]
pub struct CallableData {
    pub type_parameters: Vec<DescriptorId>,
    pub value_parameters: Vec<DescriptorId>,
    pub return_type: KotlinType,
    pub extension_receiver: Option<KotlinType>,
    pub kind: CallableKind,
    pub overridden: Vec<DescriptorId>,
    /// Set on substituted copies; points at the declaration they were made from.
    pub original: Option<DescriptorId>,
}

impl CallableData {
    fn new(return_type: KotlinType) -> Self {
        Self {
            type_parameters: Vec::new(),
            value_parameters: Vec::new(),
            return_type,
            extension_receiver: None,
            kind: CallableKind::Declaration,
            overridden: Vec::new(),
            original: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassData {
    pub kind: ClassKind,
    pub type_parameters: Vec<DescriptorId>,
    pub supertypes: Vec<KotlinType>,
    /// Source classes come with a precomputed member-declaration scope.
    pub has_resolution_scopes: bool,
    pub companion: Option<DescriptorId>,
}

#[derive(Debug, Clone)]
pub struct ValueParameterData {
    pub ty: KotlinType,
    pub has_default: bool,
    pub is_vararg: bool,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct TypeParameterData {
    pub upper_bounds: Vec<KotlinType>,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct PackageFragmentData {
    pub fq_name: FqName,
    /// Explicit imports of the file this fragment was declared in.
    pub imports: Vec<FqName>,
}

#[derive(Debug, Clone)]
pub enum DescriptorKind {
    Module { dependencies: Vec<DescriptorId> },
    PackageView { fq_name: FqName },
    PackageFragment(PackageFragmentData),
    Class(ClassData),
    Constructor(CallableData),
    Function(CallableData),
    Property(CallableData),
    ValueParameter(ValueParameterData),
    TypeParameter(TypeParameterData),
    LocalVariable { ty: KotlinType },
}

#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: Name,
    pub containing: Option<DescriptorId>,
    pub kind: DescriptorKind,
}

impl Descriptor {
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            DescriptorKind::Module { .. } => "module",
            DescriptorKind::PackageView { .. } => "package",
            DescriptorKind::PackageFragment(_) => "package fragment",
            DescriptorKind::Class(class) => match class.kind {
                ClassKind::Class => "class",
                ClassKind::Interface => "interface",
                ClassKind::Object => "object",
                ClassKind::CompanionObject => "companion object",
                ClassKind::EnumClass => "enum class",
            },
            DescriptorKind::Constructor(_) => "constructor",
            DescriptorKind::Function(_) => "function",
            DescriptorKind::Property(_) => "property",
            DescriptorKind::ValueParameter(_) => "value parameter",
            DescriptorKind::TypeParameter(_) => "type parameter",
            DescriptorKind::LocalVariable { .. } => "local variable",
        }
    }
}

/// Arena of all descriptors known to a front-end.
#[derive(Debug, Clone)]
pub struct Descriptors {
    entries: Vec<Descriptor>,
    children: Vec<Vec<DescriptorId>>,
    package_views: HashMap<FqName, DescriptorId>,
    fragments: HashMap<FqName, Vec<DescriptorId>>,
    any_class: Option<DescriptorId>,
}

impl Default for Descriptors {
    fn default() -> Self {
        Self::new()
    }
}

impl Descriptors {
    pub fn new() -> Self {
        let mut descriptors = Self {
            entries: Vec::new(),
            children: Vec::new(),
            package_views: HashMap::new(),
            fragments: HashMap::new(),
            any_class: None,
        };
        let root = descriptors.push(Descriptor {
            name: Name::special("root"),
            containing: None,
            kind: DescriptorKind::PackageView {
                fq_name: FqName::root(),
            },
        });
        descriptors.package_views.insert(FqName::root(), root);
        descriptors
    }

    fn push(&mut self, descriptor: Descriptor) -> DescriptorId {
        let id = DescriptorId(self.entries.len() as u32);
        if let Some(containing) = descriptor.containing {
            debug_assert!(containing < id, "container must precede its members");
            self.children[containing.index()].push(id);
        }
        self.entries.push(descriptor);
        self.children.push(Vec::new());
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = DescriptorId> + '_ {
        (0..self.entries.len()).map(|index| DescriptorId(index as u32))
    }

    pub fn get(&self, id: DescriptorId) -> &Descriptor {
        &self.entries[id.index()]
    }

    fn get_mut(&mut self, id: DescriptorId) -> &mut Descriptor {
        &mut self.entries[id.index()]
    }

    pub fn name(&self, id: DescriptorId) -> &Name {
        &self.get(id).name
    }

    pub fn containing(&self, id: DescriptorId) -> Option<DescriptorId> {
        self.get(id).containing
    }

    pub fn children(&self, id: DescriptorId) -> &[DescriptorId] {
        &self.children[id.index()]
    }

    // ---- construction ----

    pub fn add_module(&mut self, name: &str, dependencies: Vec<DescriptorId>) -> DescriptorId {
        self.push(Descriptor {
            name: Name::new(format!("<{}>", name)),
            containing: None,
            kind: DescriptorKind::Module { dependencies },
        })
    }

    /// Add a package fragment (one file's worth of top-level declarations).
    ///
    /// Package views for `fq_name` and all of its parents are created as needed.
    pub fn add_package_fragment(
        &mut self,
        module: DescriptorId,
        fq_name: FqName,
        imports: Vec<FqName>,
    ) -> DescriptorId {
        self.ensure_package_view(&fq_name);
        let fragment = self.push(Descriptor {
            name: fq_name.short_name(),
            containing: Some(module),
            kind: DescriptorKind::PackageFragment(PackageFragmentData {
                fq_name: fq_name.clone(),
                imports,
            }),
        });
        self.fragments.entry(fq_name).or_default().push(fragment);
        fragment
    }

    fn ensure_package_view(&mut self, fq_name: &FqName) -> DescriptorId {
        if let Some(view) = self.package_views.get(fq_name) {
            return *view;
        }
        let parent = match fq_name.parent() {
            Some(parent) => self.ensure_package_view(&parent),
            None => return self.package_views[&FqName::root()],
        };
        let view = self.push(Descriptor {
            name: fq_name.short_name(),
            containing: Some(parent),
            kind: DescriptorKind::PackageView {
                fq_name: fq_name.clone(),
            },
        });
        self.package_views.insert(fq_name.clone(), view);
        view
    }

    pub fn add_class(&mut self, containing: DescriptorId, name: &str, kind: ClassKind) -> DescriptorId {
        let class = self.push(Descriptor {
            name: Name::new(name),
            containing: Some(containing),
            kind: DescriptorKind::Class(ClassData {
                kind,
                type_parameters: Vec::new(),
                supertypes: Vec::new(),
                has_resolution_scopes: false,
                companion: None,
            }),
        });
        if kind == ClassKind::CompanionObject {
            if let DescriptorKind::Class(outer) = &mut self.get_mut(containing).kind {
                outer.companion = Some(class);
            }
        }
        class
    }

    pub fn set_supertypes(&mut self, class: DescriptorId, supertypes: Vec<KotlinType>) {
        if let DescriptorKind::Class(data) = &mut self.get_mut(class).kind {
            data.supertypes = supertypes;
        }
    }

    pub fn set_has_resolution_scopes(&mut self, class: DescriptorId, value: bool) {
        if let DescriptorKind::Class(data) = &mut self.get_mut(class).kind {
            data.has_resolution_scopes = value;
        }
    }

    pub fn add_function(&mut self, containing: DescriptorId, name: &str) -> DescriptorId {
        self.push(Descriptor {
            name: Name::new(name),
            containing: Some(containing),
            kind: DescriptorKind::Function(CallableData::new(KotlinType::Error)),
        })
    }

    pub fn add_property(&mut self, containing: DescriptorId, name: &str, ty: KotlinType) -> DescriptorId {
        self.push(Descriptor {
            name: Name::new(name),
            containing: Some(containing),
            kind: DescriptorKind::Property(CallableData::new(ty)),
        })
    }

    /// Add a constructor to `class`. Its type parameters are the class's.
    pub fn add_constructor(&mut self, class: DescriptorId) -> DescriptorId {
        let mut data = CallableData::new(self.default_type(class));
        data.type_parameters = self.type_parameters(class).to_vec();
        self.push(Descriptor {
            name: Name::special("init"),
            containing: Some(class),
            kind: DescriptorKind::Constructor(data),
        })
    }

    pub fn add_local_variable(&mut self, containing: DescriptorId, name: &str, ty: KotlinType) -> DescriptorId {
        self.push(Descriptor {
            name: Name::new(name),
            containing: Some(containing),
            kind: DescriptorKind::LocalVariable { ty },
        })
    }

    /// Add a type parameter to a class or callable.
    pub fn add_type_parameter(&mut self, owner: DescriptorId, name: &str) -> DescriptorId {
        let index = self.type_parameters(owner).len();
        let parameter = self.push(Descriptor {
            name: Name::new(name),
            containing: Some(owner),
            kind: DescriptorKind::TypeParameter(TypeParameterData {
                upper_bounds: Vec::new(),
                index,
            }),
        });
        match &mut self.get_mut(owner).kind {
            DescriptorKind::Class(data) => data.type_parameters.push(parameter),
            DescriptorKind::Function(data)
            | DescriptorKind::Property(data)
            | DescriptorKind::Constructor(data) => data.type_parameters.push(parameter),
            _ => {}
        }
        parameter
    }

    pub fn set_upper_bounds(&mut self, parameter: DescriptorId, bounds: Vec<KotlinType>) {
        if let DescriptorKind::TypeParameter(data) = &mut self.get_mut(parameter).kind {
            data.upper_bounds = bounds;
        }
    }

    /// Add a value parameter to a function or constructor.
    pub fn add_value_parameter(&mut self, owner: DescriptorId, name: &str, ty: KotlinType) -> DescriptorId {
        let index = self.value_parameters(owner).len();
        let parameter = self.push(Descriptor {
            name: Name::new(name),
            containing: Some(owner),
            kind: DescriptorKind::ValueParameter(ValueParameterData {
                ty,
                has_default: false,
                is_vararg: false,
                index,
            }),
        });
        if let Some(data) = self.callable_mut(owner) {
            data.value_parameters.push(parameter);
        }
        parameter
    }

    pub fn set_parameter_flags(&mut self, parameter: DescriptorId, has_default: bool, is_vararg: bool) {
        if let DescriptorKind::ValueParameter(data) = &mut self.get_mut(parameter).kind {
            data.has_default = has_default;
            data.is_vararg = is_vararg;
        }
    }

    pub fn set_return_type(&mut self, callable: DescriptorId, ty: KotlinType) {
        if let Some(data) = self.callable_mut(callable) {
            data.return_type = ty;
        }
    }

    pub fn set_extension_receiver(&mut self, callable: DescriptorId, ty: KotlinType) {
        if let Some(data) = self.callable_mut(callable) {
            data.extension_receiver = Some(ty);
        }
    }

    /// Add a fake override of `overridden` to `class`, copying its signature.
    pub fn add_fake_override(&mut self, class: DescriptorId, overridden: DescriptorId) -> DescriptorId {
        let source = self.get(overridden).clone();
        let Some(source_data) = self.callable(overridden).cloned() else {
            return overridden;
        };
        let mut data = CallableData::new(source_data.return_type.clone());
        data.kind = CallableKind::FakeOverride;
        data.overridden = vec![overridden];
        data.extension_receiver = source_data.extension_receiver.clone();
        data.type_parameters = source_data.type_parameters.clone();
        let kind = match source.kind {
            DescriptorKind::Property(_) => DescriptorKind::Property(data),
            _ => DescriptorKind::Function(data),
        };
        let fake = self.push(Descriptor {
            name: source.name.clone(),
            containing: Some(class),
            kind,
        });
        for parameter in source_data.value_parameters {
            let (name, data) = match &self.get(parameter).kind {
                DescriptorKind::ValueParameter(data) => (self.name(parameter).clone(), data.clone()),
                _ => continue,
            };
            let copy = self.add_value_parameter(fake, name.as_str(), data.ty);
            self.set_parameter_flags(copy, data.has_default, data.is_vararg);
        }
        fake
    }

    pub fn set_original(&mut self, callable: DescriptorId, original: DescriptorId) {
        if let Some(data) = self.callable_mut(callable) {
            data.original = Some(original);
        }
    }

    pub(crate) fn set_any_class(&mut self, class: DescriptorId) {
        self.any_class = Some(class);
    }

    // ---- queries ----

    pub fn callable(&self, id: DescriptorId) -> Option<&CallableData> {
        match &self.get(id).kind {
            DescriptorKind::Function(data)
            | DescriptorKind::Property(data)
            | DescriptorKind::Constructor(data) => Some(data),
            _ => None,
        }
    }

    fn callable_mut(&mut self, id: DescriptorId) -> Option<&mut CallableData> {
        match &mut self.get_mut(id).kind {
            DescriptorKind::Function(data)
            | DescriptorKind::Property(data)
            | DescriptorKind::Constructor(data) => Some(data),
            _ => None,
        }
    }

    pub fn class(&self, id: DescriptorId) -> Option<&ClassData> {
        match &self.get(id).kind {
            DescriptorKind::Class(data) => Some(data),
            _ => None,
        }
    }

    pub fn value_parameter(&self, id: DescriptorId) -> Option<&ValueParameterData> {
        match &self.get(id).kind {
            DescriptorKind::ValueParameter(data) => Some(data),
            _ => None,
        }
    }

    /// Whether the descriptor can be the subject of a `ReplaceWith` annotation.
    pub fn is_callable(&self, id: DescriptorId) -> bool {
        matches!(
            self.get(id).kind,
            DescriptorKind::Function(_)
                | DescriptorKind::Property(_)
                | DescriptorKind::Constructor(_)
                | DescriptorKind::ValueParameter(_)
                | DescriptorKind::LocalVariable { .. }
        )
    }

    pub fn type_parameters(&self, id: DescriptorId) -> &[DescriptorId] {
        match &self.get(id).kind {
            DescriptorKind::Class(data) => &data.type_parameters,
            DescriptorKind::Function(data)
            | DescriptorKind::Property(data)
            | DescriptorKind::Constructor(data) => &data.type_parameters,
            _ => &[],
        }
    }

    pub fn value_parameters(&self, id: DescriptorId) -> &[DescriptorId] {
        match self.callable(id) {
            Some(data) => &data.value_parameters,
            None => &[],
        }
    }

    pub fn is_extension(&self, id: DescriptorId) -> bool {
        self.callable(id)
            .is_some_and(|data| data.extension_receiver.is_some())
    }

    /// The declared type of a variable-like descriptor.
    pub fn variable_type(&self, id: DescriptorId) -> Option<&KotlinType> {
        match &self.get(id).kind {
            DescriptorKind::Property(data) => Some(&data.return_type),
            DescriptorKind::ValueParameter(data) => Some(&data.ty),
            DescriptorKind::LocalVariable { ty } => Some(ty),
            _ => None,
        }
    }

    /// Follow fake overrides down to a real declaration.
    pub fn unwrap_fake_override(&self, id: DescriptorId) -> DescriptorId {
        let mut current = id;
        while let Some(data) = self.callable(current) {
            match (data.kind, data.overridden.first()) {
                (CallableKind::FakeOverride, Some(overridden)) => current = *overridden,
                _ => break,
            }
        }
        current
    }

    pub fn original(&self, id: DescriptorId) -> DescriptorId {
        let mut current = id;
        while let Some(original) = self.callable(current).and_then(|data| data.original) {
            current = original;
        }
        current
    }

    pub fn is_class_member(&self, id: DescriptorId) -> bool {
        self.containing(id)
            .is_some_and(|containing| self.class(containing).is_some())
    }

    pub fn module_of(&self, id: DescriptorId) -> Option<DescriptorId> {
        let mut current = Some(id);
        while let Some(descriptor) = current {
            if let DescriptorKind::Module { .. } = self.get(descriptor).kind {
                return Some(descriptor);
            }
            current = self.containing(descriptor);
        }
        None
    }

    /// The module and everything it depends on, transitively.
    pub fn visible_modules(&self, module: DescriptorId) -> HashSet<DescriptorId> {
        let mut visible = HashSet::new();
        let mut pending = vec![module];
        while let Some(current) = pending.pop() {
            if !visible.insert(current) {
                continue;
            }
            if let DescriptorKind::Module { dependencies } = &self.get(current).kind {
                pending.extend(dependencies.iter().copied());
            }
        }
        visible
    }

    pub fn package_view(&self, fq_name: &FqName) -> Option<DescriptorId> {
        self.package_views.get(fq_name).copied()
    }

    pub fn package_fq_name(&self, id: DescriptorId) -> Option<&FqName> {
        match &self.get(id).kind {
            DescriptorKind::PackageView { fq_name } => Some(fq_name),
            DescriptorKind::PackageFragment(data) => Some(&data.fq_name),
            _ => None,
        }
    }

    /// Members of a package view named `name`: top-level declarations from
    /// every fragment of the package, and the subpackage of that name.
    pub fn package_members(&self, view: DescriptorId, name: &Name) -> Vec<DescriptorId> {
        let Some(fq_name) = self.package_fq_name(view) else {
            return Vec::new();
        };
        let mut members: Vec<DescriptorId> = self
            .fragments
            .get(fq_name)
            .into_iter()
            .flatten()
            .flat_map(|fragment| self.children(*fragment))
            .filter(|member| self.name(**member) == name)
            .copied()
            .collect();
        if let Some(subpackage) = self.package_view(&fq_name.child(name)) {
            members.push(subpackage);
        }
        members
    }

    /// Nested classifiers of a class named `name`.
    pub fn nested_classifiers(&self, class: DescriptorId, name: &Name) -> Vec<DescriptorId> {
        self.children(class)
            .iter()
            .filter(|child| self.class(**child).is_some() && self.name(**child) == name)
            .copied()
            .collect()
    }

    pub fn constructors(&self, class: DescriptorId) -> Vec<DescriptorId> {
        self.children(class)
            .iter()
            .filter(|child| matches!(self.get(**child).kind, DescriptorKind::Constructor(_)))
            .copied()
            .collect()
    }

    /// Declared supertypes, with `kotlin.Any` standing in when none are declared.
    pub fn supertypes(&self, class: DescriptorId) -> Vec<KotlinType> {
        let Some(data) = self.class(class) else {
            return Vec::new();
        };
        if !data.supertypes.is_empty() {
            return data.supertypes.clone();
        }
        match self.any_class {
            Some(any) if any != class => vec![KotlinType::simple(any)],
            _ => Vec::new(),
        }
    }

    pub fn default_type(&self, class: DescriptorId) -> KotlinType {
        KotlinType::class(
            class,
            self.type_parameters(class)
                .iter()
                .map(|p| KotlinType::type_parameter(*p))
                .collect(),
        )
    }

    /// Functions and properties named `name` declared in `class` or inherited
    /// from its supertypes. Inherited members hidden by a declared member with
    /// the same number of value parameters are dropped.
    pub fn class_members(&self, class: DescriptorId, name: &Name) -> Vec<DescriptorId> {
        let mut visited = HashSet::new();
        self.collect_members(class, name, &mut visited)
    }

    fn collect_members(
        &self,
        class: DescriptorId,
        name: &Name,
        visited: &mut HashSet<DescriptorId>,
    ) -> Vec<DescriptorId> {
        if !visited.insert(class) {
            return Vec::new();
        }
        let mut members: Vec<DescriptorId> = self
            .children(class)
            .iter()
            .filter(|child| {
                matches!(
                    self.get(**child).kind,
                    DescriptorKind::Function(_) | DescriptorKind::Property(_)
                ) && self.name(**child) == name
            })
            .copied()
            .collect();
        for supertype in self.supertypes(class) {
            let KotlinType::Class { class: superclass, .. } = supertype else {
                continue;
            };
            for inherited in self.collect_members(superclass, name, visited) {
                let hidden = members.iter().any(|member| {
                    std::mem::discriminant(&self.get(*member).kind)
                        == std::mem::discriminant(&self.get(inherited).kind)
                        && self.value_parameters(*member).len()
                            == self.value_parameters(inherited).len()
                });
                if !hidden {
                    members.push(inherited);
                }
            }
        }
        members
    }

    /// View `ty` as an instance of `target`, substituting type arguments
    /// through the supertype chain.
    pub fn supertype_view(&self, ty: &KotlinType, target: DescriptorId) -> Option<KotlinType> {
        let mut visited = HashSet::new();
        self.supertype_view_inner(ty, target, &mut visited)
    }

    fn supertype_view_inner(
        &self,
        ty: &KotlinType,
        target: DescriptorId,
        visited: &mut HashSet<DescriptorId>,
    ) -> Option<KotlinType> {
        match ty {
            KotlinType::Class {
                class, arguments, ..
            } => {
                if *class == target {
                    return Some(ty.clone());
                }
                if !visited.insert(*class) {
                    return None;
                }
                let substitution: TypeSubstitution = self
                    .type_parameters(*class)
                    .iter()
                    .copied()
                    .zip(arguments.iter().cloned())
                    .collect();
                self.supertypes(*class).iter().find_map(|supertype| {
                    self.supertype_view_inner(&supertype.substitute(&substitution), target, visited)
                })
            }
            KotlinType::TypeParameter { parameter, .. } => {
                // Bounds may refer to each other in a cycle.
                if !visited.insert(*parameter) {
                    return None;
                }
                self.upper_bounds(*parameter).iter().find_map(|bound| {
                    self.supertype_view_inner(bound, target, visited)
                })
            }
            KotlinType::Error => None,
        }
    }

    pub fn upper_bounds(&self, parameter: DescriptorId) -> Vec<KotlinType> {
        match &self.get(parameter).kind {
            DescriptorKind::TypeParameter(data) => data.upper_bounds.clone(),
            _ => Vec::new(),
        }
    }

    /// Subtyping with invariant type arguments. Error types are compatible
    /// with everything.
    pub fn is_subtype(&self, sub: &KotlinType, sup: &KotlinType) -> bool {
        if sub.contains_error() || sup.contains_error() {
            return true;
        }
        if sub.is_nullable() && !sup.is_nullable() {
            return false;
        }
        match (sub, sup) {
            (KotlinType::Class { class, .. }, _) if self.is_nothing(*class) => true,
            (_, KotlinType::Class { class, .. }) if Some(*class) == self.any_class => true,
            (
                KotlinType::TypeParameter { parameter: a, .. },
                KotlinType::TypeParameter { parameter: b, .. },
            ) if a == b => true,
            (_, KotlinType::Class { class, arguments, .. }) => {
                match self.supertype_view(&sub.clone().make_not_nullable(), *class) {
                    Some(KotlinType::Class {
                        arguments: view_arguments,
                        ..
                    }) => view_arguments.len() == arguments.len()
                        && view_arguments.iter().zip(arguments).all(|(a, b)| {
                            a.clone().make_not_nullable() == b.clone().make_not_nullable()
                                || matches!(a, KotlinType::TypeParameter { .. })
                                || matches!(b, KotlinType::TypeParameter { .. })
                        }),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn is_nothing(&self, class: DescriptorId) -> bool {
        self.fq_name(class)
            .is_some_and(|fq_name| fq_name.as_str() == "kotlin.Nothing")
    }

    /// The fully-qualified name of a package or of a declaration nested only
    /// in packages and classes.
    pub fn fq_name(&self, id: DescriptorId) -> Option<FqName> {
        let descriptor = self.get(id);
        match &descriptor.kind {
            DescriptorKind::PackageView { fq_name } => Some(fq_name.clone()),
            DescriptorKind::PackageFragment(data) => Some(data.fq_name.clone()),
            DescriptorKind::Class(_) | DescriptorKind::Function(_) | DescriptorKind::Property(_) => {
                let containing = descriptor.containing?;
                match &self.get(containing).kind {
                    DescriptorKind::PackageFragment(_)
                    | DescriptorKind::PackageView { .. }
                    | DescriptorKind::Class(_) => {
                        Some(self.fq_name(containing)?.child(&descriptor.name))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The name under which the descriptor can be imported, if any.
    pub fn importable_fq_name(&self, id: DescriptorId) -> Option<FqName> {
        let descriptor = self.get(id);
        let containing = descriptor.containing?;
        match &descriptor.kind {
            DescriptorKind::Class(_) => self.fq_name(id),
            DescriptorKind::Function(_) | DescriptorKind::Property(_) => {
                match &self.get(containing).kind {
                    DescriptorKind::PackageFragment(_) => self.fq_name(id),
                    DescriptorKind::Class(class) if class.kind.is_singleton() => self.fq_name(id),
                    _ => None,
                }
            }
            DescriptorKind::Constructor(_) => self.importable_fq_name(containing),
            _ => None,
        }
    }

    /// Every descriptor whose fully-qualified name is `fq_name`.
    pub fn resolve_fq_name(&self, fq_name: &FqName) -> Vec<DescriptorId> {
        let Some(parent) = fq_name.parent() else {
            return self.package_view(fq_name).into_iter().collect();
        };
        let name = fq_name.short_name();
        let mut found = Vec::new();
        for container in self.resolve_fq_name(&parent) {
            match &self.get(container).kind {
                DescriptorKind::PackageView { .. } => {
                    found.extend(self.package_members(container, &name));
                }
                DescriptorKind::Class(class) => {
                    found.extend(self.nested_classifiers(container, &name));
                    if class.kind.is_singleton() {
                        found.extend(self.class_members(container, &name));
                    }
                }
                _ => {}
            }
        }
        let mut seen = HashSet::new();
        found.retain(|id| seen.insert(*id));
        found
    }

    /// Find the class named by `fq_name`.
    pub fn find_class(&self, fq_name: &str) -> Option<DescriptorId> {
        self.resolve_fq_name(&FqName::from_trusted(fq_name))
            .into_iter()
            .find(|id| self.class(*id).is_some())
    }

    /// A human readable description used in diagnostics.
    pub fn description(&self, id: DescriptorId) -> String {
        let descriptor = self.get(id);
        let name = match self.fq_name(id) {
            Some(fq_name) if !fq_name.is_root() => fq_name.to_string(),
            _ => match descriptor.containing.and_then(|c| self.fq_name(c)) {
                Some(owner) if !owner.is_root() => format!("{} of {}", descriptor.name, owner),
                _ => descriptor.name.to_string(),
            },
        };
        format!("{} {}", descriptor.kind_name(), name)
    }

    /// Render a type as source code, with classes fully qualified.
    pub fn render_type(&self, ty: &KotlinType) -> String {
        match ty {
            KotlinType::Class {
                class,
                arguments,
                nullable,
            } => {
                let mut rendered = match self.fq_name(*class) {
                    Some(fq_name) => fq_name.to_string(),
                    None => self.name(*class).to_string(),
                };
                if !arguments.is_empty() {
                    let arguments: Vec<String> =
                        arguments.iter().map(|a| self.render_type(a)).collect();
                    rendered.push_str(&format!("<{}>", arguments.join(", ")));
                }
                if *nullable {
                    rendered.push('?');
                }
                rendered
            }
            KotlinType::TypeParameter {
                parameter,
                nullable,
            } => format!("{}{}", self.name(*parameter), if *nullable { "?" } else { "" }),
            KotlinType::Error => "???".to_string(),
        }
    }
}

/// Populate the `kotlin` and `kotlin.collections` packages in a module of
/// their own and return that module.
pub fn add_builtins(descriptors: &mut Descriptors) -> DescriptorId {
    let module = descriptors.add_module("builtins", Vec::new());
    let kotlin = descriptors.add_package_fragment(module, FqName::from_trusted("kotlin"), Vec::new());

    let any = descriptors.add_class(kotlin, "Any", ClassKind::Class);
    descriptors.set_any_class(any);
    let nothing = descriptors.add_class(kotlin, "Nothing", ClassKind::Class);
    descriptors.add_class(kotlin, "Unit", ClassKind::Object);
    let boolean = descriptors.add_class(kotlin, "Boolean", ClassKind::Class);
    let int = descriptors.add_class(kotlin, "Int", ClassKind::Class);
    descriptors.add_class(kotlin, "Long", ClassKind::Class);
    descriptors.add_class(kotlin, "Double", ClassKind::Class);
    descriptors.add_class(kotlin, "Float", ClassKind::Class);
    descriptors.add_class(kotlin, "Char", ClassKind::Class);
    let string = descriptors.add_class(kotlin, "String", ClassKind::Class);

    let to_string = descriptors.add_function(any, "toString");
    descriptors.set_return_type(to_string, KotlinType::simple(string));
    let hash_code = descriptors.add_function(any, "hashCode");
    descriptors.set_return_type(hash_code, KotlinType::simple(int));
    let equals = descriptors.add_function(any, "equals");
    descriptors.add_value_parameter(equals, "other", KotlinType::simple(any).make_nullable());
    descriptors.set_return_type(equals, KotlinType::simple(boolean));
    descriptors.add_property(string, "length", KotlinType::simple(int));

    let todo = descriptors.add_function(kotlin, "TODO");
    descriptors.set_return_type(todo, KotlinType::simple(nothing));

    let collections = descriptors.add_package_fragment(
        module,
        FqName::from_trusted("kotlin.collections"),
        Vec::new(),
    );
    let list = descriptors.add_class(collections, "List", ClassKind::Interface);
    let element = descriptors.add_type_parameter(list, "E");
    descriptors.add_property(list, "size", KotlinType::simple(int));
    let get = descriptors.add_function(list, "get");
    descriptors.add_value_parameter(get, "index", KotlinType::simple(int));
    descriptors.set_return_type(get, KotlinType::type_parameter(element));

    let list_of = descriptors.add_function(collections, "listOf");
    let t = descriptors.add_type_parameter(list_of, "T");
    let elements = descriptors.add_value_parameter(list_of, "elements", KotlinType::type_parameter(t));
    descriptors.set_parameter_flags(elements, false, true);
    descriptors.set_return_type(list_of, KotlinType::class(list, vec![KotlinType::type_parameter(t)]));

    let empty_list = descriptors.add_function(collections, "emptyList");
    let t = descriptors.add_type_parameter(empty_list, "T");
    descriptors.set_return_type(empty_list, KotlinType::class(list, vec![KotlinType::type_parameter(t)]));

    let first_or_null = descriptors.add_function(collections, "firstOrNull");
    let t = descriptors.add_type_parameter(first_or_null, "T");
    descriptors.set_extension_receiver(first_or_null, KotlinType::class(list, vec![KotlinType::type_parameter(t)]));
    descriptors.set_return_type(first_or_null, KotlinType::type_parameter(t).make_nullable());

    module
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> (Descriptors, DescriptorId) {
        let mut descriptors = Descriptors::new();
        let builtins = add_builtins(&mut descriptors);
        let module = descriptors.add_module("main", vec![builtins]);
        (descriptors, module)
    }

    #[test]
    fn test_fq_names() {
        let (mut d, module) = world();
        let pkg = d.add_package_fragment(module, FqName::from_trusted("a.b"), Vec::new());
        let class = d.add_class(pkg, "C", ClassKind::Class);
        let method = d.add_function(class, "m");
        let parameter = d.add_value_parameter(method, "x", KotlinType::Error);

        assert_eq!(d.fq_name(method), Some(FqName::from_trusted("a.b.C.m")));
        assert_eq!(d.importable_fq_name(method), None);
        assert_eq!(d.importable_fq_name(class), Some(FqName::from_trusted("a.b.C")));
        assert_eq!(d.importable_fq_name(parameter), None);
        assert_eq!(d.description(parameter), "value parameter x of a.b.C.m");
        assert_eq!(d.module_of(parameter), Some(module));
    }

    #[test]
    fn test_object_members_are_importable() {
        let (mut d, module) = world();
        let pkg = d.add_package_fragment(module, FqName::from_trusted("p"), Vec::new());
        let object = d.add_class(pkg, "Obj", ClassKind::Object);
        let member = d.add_function(object, "run");
        assert_eq!(d.importable_fq_name(member), Some(FqName::from_trusted("p.Obj.run")));
        assert_eq!(d.resolve_fq_name(&FqName::from_trusted("p.Obj.run")), vec![member]);
    }

    #[test]
    fn test_resolve_fq_name_through_packages() {
        let (d, _) = world();
        let found = d.resolve_fq_name(&FqName::from_trusted("kotlin.collections.listOf"));
        assert_eq!(found.len(), 1);
        assert_eq!(d.name(found[0]), "listOf");
        assert!(d
            .resolve_fq_name(&FqName::from_trusted("kotlin.collections.nope"))
            .is_empty());
        let views = d.resolve_fq_name(&FqName::from_trusted("kotlin"));
        assert_eq!(views, vec![d.package_view(&FqName::from_trusted("kotlin")).unwrap()]);
    }

    #[test]
    fn test_unwrap_fake_override() {
        let (mut d, module) = world();
        let pkg = d.add_package_fragment(module, FqName::from_trusted("p"), Vec::new());
        let base = d.add_class(pkg, "Base", ClassKind::Class);
        let method = d.add_function(base, "m");
        d.add_value_parameter(method, "x", KotlinType::Error);
        let derived = d.add_class(pkg, "Derived", ClassKind::Class);
        d.set_supertypes(derived, vec![KotlinType::simple(base)]);
        let fake = d.add_fake_override(derived, method);

        assert_ne!(fake, method);
        assert_eq!(d.value_parameters(fake).len(), 1);
        assert_eq!(d.unwrap_fake_override(fake), method);
        assert_eq!(d.unwrap_fake_override(method), method);
    }

    #[test]
    fn test_class_members_with_inheritance() {
        let (mut d, module) = world();
        let pkg = d.add_package_fragment(module, FqName::from_trusted("p"), Vec::new());
        let base = d.add_class(pkg, "Base", ClassKind::Class);
        let inherited = d.add_function(base, "h");
        let derived = d.add_class(pkg, "Derived", ClassKind::Class);
        d.set_supertypes(derived, vec![KotlinType::simple(base)]);

        assert_eq!(d.class_members(derived, &Name::new("h")), vec![inherited]);
        assert_eq!(d.class_members(derived, &Name::new("toString")).len(), 1);

        let own = d.add_function(derived, "h");
        assert_eq!(d.class_members(derived, &Name::new("h")), vec![own]);
    }

    #[test]
    fn test_subtyping() {
        let (mut d, module) = world();
        let int = d.find_class("kotlin.Int").unwrap();
        let any = d.find_class("kotlin.Any").unwrap();
        let list = d.find_class("kotlin.collections.List").unwrap();
        let pkg = d.add_package_fragment(module, FqName::from_trusted("p"), Vec::new());
        let my_list = d.add_class(pkg, "IntList", ClassKind::Class);
        d.set_supertypes(my_list, vec![KotlinType::class(list, vec![KotlinType::simple(int)])]);

        let int_type = KotlinType::simple(int);
        assert!(d.is_subtype(&int_type, &KotlinType::simple(any)));
        assert!(!d.is_subtype(&int_type.clone().make_nullable(), &int_type));
        assert!(d.is_subtype(&int_type, &int_type.clone().make_nullable()));
        assert!(d.is_subtype(
            &KotlinType::simple(my_list),
            &KotlinType::class(list, vec![int_type.clone()])
        ));
        assert!(!d.is_subtype(&KotlinType::simple(my_list), &int_type));
        assert_eq!(
            d.supertype_view(&KotlinType::simple(my_list), list),
            Some(KotlinType::class(list, vec![int_type]))
        );
    }

    #[test]
    fn test_render_type() {
        let (mut d, module) = world();
        let list = d.find_class("kotlin.collections.List").unwrap();
        let string = d.find_class("kotlin.String").unwrap();
        let pkg = d.add_package_fragment(module, FqName::from_trusted("p"), Vec::new());
        let f = d.add_function(pkg, "f");
        let t = d.add_type_parameter(f, "T");
        let ty = KotlinType::class(
            list,
            vec![KotlinType::simple(string).make_nullable(), KotlinType::type_parameter(t)],
        );
        assert_eq!(
            d.render_type(&ty),
            "kotlin.collections.List<kotlin.String?, T>"
        );
    }
}
