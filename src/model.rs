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

//! Declaration models stored as JSON.
//!
//! A model describes modules, the files in them and the declarations those
//! files contain. Types are written as source text (`List<T>?`) and are
//! resolved the way the compiler would: type parameters first, then
//! enclosing classes, the file's package, its imports and finally the
//! default packages.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::ReplaceWith;
use crate::descriptors::{add_builtins, ClassKind, DescriptorId, DescriptorKind, Descriptors, KotlinType};
use crate::name::{FqName, FqNameUnsafe, Name};
use crate::resolve::{FrontendConfig, InMemoryFrontend};
use crate::syntax::{ExpressionFactory, TypeReference};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub modules: Vec<ModuleDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDecl {
    pub name: String,
    /// Names of modules declared earlier in the same model.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDecl {
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    Class(ClassDecl),
    Interface(ClassDecl),
    Object(ClassDecl),
    CompanionObject(ClassDecl),
    EnumClass(ClassDecl),
    Function(FunctionDecl),
    Property(PropertyDecl),
    Constructor(ConstructorDecl),
    FakeOverride(FakeOverrideDecl),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Companion objects default to `Companion`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterDecl>,
    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub members: Vec<Declaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeParameterDecl {
    pub name: String,
    #[serde(default)]
    pub bounds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub vararg: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceWithDecl {
    pub expression: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterDecl>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDecl>,
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default)]
    pub replace_with: Option<ReplaceWithDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameterDecl>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub replace_with: Option<ReplaceWithDecl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructorDecl {
    #[serde(default)]
    pub parameters: Vec<ParameterDecl>,
    #[serde(default)]
    pub replace_with: Option<ReplaceWithDecl>,
}

/// A member inherited without being redeclared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FakeOverrideDecl {
    /// Fully-qualified name of the overridden member, such as `p.Base.m`.
    pub overrides: String,
}

/// A declaration carrying a `ReplaceWith` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedDeclaration {
    pub descriptor: DescriptorId,
    /// Display name such as `p.C.m` or `p.C.<init>`.
    pub name: String,
    pub replace_with: ReplaceWith,
    pub message: Option<String>,
}

/// A model loaded into a descriptor arena.
#[derive(Debug)]
pub struct LoadedModel {
    pub descriptors: Descriptors,
    pub annotated: Vec<AnnotatedDeclaration>,
}

impl LoadedModel {
    /// Find a function, property or constructor by its display name.
    pub fn lookup(&self, name: &str) -> Option<DescriptorId> {
        if let Some(annotated) = self.annotated.iter().find(|a| a.name == name) {
            return Some(annotated.descriptor);
        }
        let d = &self.descriptors;
        let fq_name = FqName::from_trusted(name);
        let parent = fq_name.parent()?;
        let short_name = fq_name.short_name();
        if short_name.is_special() {
            return d.constructors(d.find_class(parent.as_str())?).first().copied();
        }
        if let Some(class) = d.find_class(parent.as_str()) {
            return d.class_members(class, &short_name).first().copied();
        }
        d.resolve_fq_name(&fq_name)
            .into_iter()
            .find(|id| d.is_callable(*id))
    }

    /// The annotation that applies to `descriptor`, following fake overrides.
    pub fn annotation_for(&self, descriptor: DescriptorId) -> Option<&AnnotatedDeclaration> {
        let d = &self.descriptors;
        let declaration = d.original(d.unwrap_fake_override(descriptor));
        self.annotated.iter().find(|a| a.descriptor == declaration)
    }

    pub fn into_frontend(self, config: FrontendConfig) -> (InMemoryFrontend, Vec<AnnotatedDeclaration>) {
        (
            InMemoryFrontend::with_config(self.descriptors, config),
            self.annotated,
        )
    }
}

pub fn parse_model(text: &str) -> Result<Model> {
    serde_json::from_str(text).context("Invalid declaration model")
}

pub fn load_model_file(path: &Path) -> Result<LoadedModel> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model {}", path.display()))?;
    let model = parse_model(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    load_model(&model).with_context(|| format!("Failed to load {}", path.display()))
}

/// Build a descriptor arena from `model`, with the builtins module first.
pub fn load_model(model: &Model) -> Result<LoadedModel> {
    let mut loader = Loader::new();
    loader.declare_modules(model)?;
    loader.resolve_classes()?;
    loader.declare_callables()?;
    loader.declare_fake_overrides()?;
    debug!(
        "Loaded {} descriptors, {} annotated declarations",
        loader.descriptors.len(),
        loader.annotated.len()
    );
    Ok(LoadedModel {
        descriptors: loader.descriptors,
        annotated: loader.annotated,
    })
}

/// Where type text is resolved.
#[derive(Debug, Clone)]
struct TypeContext {
    package: FqName,
    imports: Vec<FqName>,
    /// Declarations whose type parameters and nested classes are visible,
    /// innermost first.
    owners: Vec<DescriptorId>,
}

impl TypeContext {
    fn inside(&self, owner: DescriptorId) -> Self {
        let mut context = self.clone();
        context.owners.insert(0, owner);
        context
    }
}

struct PendingClass<'m> {
    class: DescriptorId,
    decl: &'m ClassDecl,
    context: TypeContext,
}

struct PendingMember<'m> {
    containing: DescriptorId,
    decl: &'m Declaration,
    context: TypeContext,
}

struct Loader<'m> {
    descriptors: Descriptors,
    builtins: DescriptorId,
    factory: ExpressionFactory,
    classes: Vec<PendingClass<'m>>,
    members: Vec<PendingMember<'m>>,
    annotated: Vec<AnnotatedDeclaration>,
}

const DEFAULT_PACKAGES: [&str; 2] = ["kotlin", "kotlin.collections"];

impl<'m> Loader<'m> {
    fn new() -> Self {
        let mut descriptors = Descriptors::new();
        let builtins = add_builtins(&mut descriptors);
        Self {
            descriptors,
            builtins,
            factory: ExpressionFactory::new(),
            classes: Vec::new(),
            members: Vec::new(),
            annotated: Vec::new(),
        }
    }

    fn declare_modules(&mut self, model: &'m Model) -> Result<()> {
        let mut modules: HashMap<&str, DescriptorId> = HashMap::new();
        for module in &model.modules {
            let mut dependencies = vec![self.builtins];
            for dependency in &module.dependencies {
                let id = modules.get(dependency.as_str()).ok_or_else(|| {
                    anyhow!(
                        "Module {} depends on {}, which is not declared before it",
                        module.name,
                        dependency
                    )
                })?;
                dependencies.push(*id);
            }
            let id = self.descriptors.add_module(&module.name, dependencies);
            if modules.insert(module.name.as_str(), id).is_some() {
                bail!("Module {} is declared twice", module.name);
            }
            for file in &module.files {
                self.declare_file(id, file)
                    .with_context(|| format!("In module {}", module.name))?;
            }
        }
        Ok(())
    }

    fn declare_file(&mut self, module: DescriptorId, file: &'m FileDecl) -> Result<()> {
        let package = parse_fq_name(&file.package)
            .with_context(|| format!("Invalid package name {:?}", file.package))?;
        let imports = file
            .imports
            .iter()
            .map(|import| {
                parse_fq_name(import).with_context(|| format!("Invalid import {:?}", import))
            })
            .collect::<Result<Vec<_>>>()?;
        let fragment = self
            .descriptors
            .add_package_fragment(module, package.clone(), imports.clone());
        let context = TypeContext {
            package,
            imports,
            owners: Vec::new(),
        };
        self.declare_members(fragment, &file.declarations, &context)
    }

    /// Classes are created right away so that types can refer to them;
    /// callables wait until every class exists.
    fn declare_members(
        &mut self,
        containing: DescriptorId,
        declarations: &'m [Declaration],
        context: &TypeContext,
    ) -> Result<()> {
        for decl in declarations {
            let (class_decl, kind) = match decl {
                Declaration::Class(c) => (c, ClassKind::Class),
                Declaration::Interface(c) => (c, ClassKind::Interface),
                Declaration::Object(c) => (c, ClassKind::Object),
                Declaration::CompanionObject(c) => (c, ClassKind::CompanionObject),
                Declaration::EnumClass(c) => (c, ClassKind::EnumClass),
                _ => {
                    self.members.push(PendingMember {
                        containing,
                        decl,
                        context: context.clone(),
                    });
                    continue;
                }
            };
            let name = match (kind, class_decl.name.as_str()) {
                (ClassKind::CompanionObject, "") => "Companion",
                (_, "") => bail!("A class declaration has no name"),
                (_, name) => name,
            };
            if kind == ClassKind::CompanionObject && self.descriptors.class(containing).is_none() {
                bail!("Companion object {} is not inside a class", name);
            }
            let class = self.descriptors.add_class(containing, name, kind);
            self.descriptors.set_has_resolution_scopes(class, true);
            for parameter in &class_decl.type_parameters {
                self.descriptors.add_type_parameter(class, &parameter.name);
            }
            let inner = context.inside(class);
            self.classes.push(PendingClass {
                class,
                decl: class_decl,
                context: inner.clone(),
            });
            self.declare_members(class, &class_decl.members, &inner)?;
        }
        Ok(())
    }

    fn resolve_classes(&mut self) -> Result<()> {
        let classes = std::mem::take(&mut self.classes);
        for pending in &classes {
            let supertypes = pending
                .decl
                .supertypes
                .iter()
                .map(|text| self.resolve_type_text(text, &pending.context))
                .collect::<Result<Vec<_>>>()
                .with_context(|| self.in_declaration(pending.class))?;
            self.descriptors.set_supertypes(pending.class, supertypes);
            let parameters = self.descriptors.type_parameters(pending.class).to_vec();
            self.resolve_bounds(&parameters, &pending.decl.type_parameters, &pending.context)
                .with_context(|| self.in_declaration(pending.class))?;
        }
        Ok(())
    }

    fn resolve_bounds(
        &mut self,
        parameters: &[DescriptorId],
        decls: &[TypeParameterDecl],
        context: &TypeContext,
    ) -> Result<()> {
        for (parameter, decl) in parameters.iter().zip(decls) {
            let bounds = decl
                .bounds
                .iter()
                .map(|text| self.resolve_type_text(text, context))
                .collect::<Result<Vec<_>>>()?;
            self.descriptors.set_upper_bounds(*parameter, bounds);
        }
        Ok(())
    }

    fn declare_callables(&mut self) -> Result<()> {
        let members = std::mem::take(&mut self.members);
        let mut fake_overrides = Vec::new();
        for pending in members {
            let decl = pending.decl;
            match decl {
                Declaration::Function(decl) => self.declare_function(&pending, decl)?,
                Declaration::Property(decl) => self.declare_property(&pending, decl)?,
                Declaration::Constructor(decl) => self.declare_constructor(&pending, decl)?,
                Declaration::FakeOverride(_) => fake_overrides.push(pending),
                _ => {}
            }
        }
        self.members = fake_overrides;
        Ok(())
    }

    fn declare_function(&mut self, pending: &PendingMember<'m>, decl: &FunctionDecl) -> Result<()> {
        let function = self.descriptors.add_function(pending.containing, &decl.name);
        let context = pending.context.inside(function);
        self.declare_signature(function, &decl.type_parameters, decl.receiver.as_deref(), &context)
            .and_then(|_| self.declare_parameters(function, &decl.parameters, &context))
            .and_then(|_| {
                let returns = decl.returns.as_deref().unwrap_or("kotlin.Unit");
                let ty = self.resolve_type_text(returns, &context)?;
                self.descriptors.set_return_type(function, ty);
                Ok(())
            })
            .with_context(|| self.in_declaration(function))?;
        self.record_annotation(function, decl.replace_with.as_ref());
        Ok(())
    }

    fn declare_property(&mut self, pending: &PendingMember<'m>, decl: &PropertyDecl) -> Result<()> {
        let property = self
            .descriptors
            .add_property(pending.containing, &decl.name, KotlinType::Error);
        let context = pending.context.inside(property);
        self.declare_signature(property, &decl.type_parameters, decl.receiver.as_deref(), &context)
            .and_then(|_| {
                let ty = self.resolve_type_text(&decl.ty, &context)?;
                self.descriptors.set_return_type(property, ty);
                Ok(())
            })
            .with_context(|| self.in_declaration(property))?;
        self.record_annotation(property, decl.replace_with.as_ref());
        Ok(())
    }

    fn declare_constructor(&mut self, pending: &PendingMember<'m>, decl: &ConstructorDecl) -> Result<()> {
        if self.descriptors.class(pending.containing).is_none() {
            bail!("A constructor must be declared inside a class");
        }
        let constructor = self.descriptors.add_constructor(pending.containing);
        let context = pending.context.inside(constructor);
        self.declare_parameters(constructor, &decl.parameters, &context)
            .with_context(|| self.in_declaration(constructor))?;
        self.record_annotation(constructor, decl.replace_with.as_ref());
        Ok(())
    }

    fn declare_signature(
        &mut self,
        callable: DescriptorId,
        type_parameters: &[TypeParameterDecl],
        receiver: Option<&str>,
        context: &TypeContext,
    ) -> Result<()> {
        let parameters: Vec<DescriptorId> = type_parameters
            .iter()
            .map(|decl| self.descriptors.add_type_parameter(callable, &decl.name))
            .collect();
        self.resolve_bounds(&parameters, type_parameters, context)?;
        if let Some(receiver) = receiver {
            let ty = self.resolve_type_text(receiver, context)?;
            self.descriptors.set_extension_receiver(callable, ty);
        }
        Ok(())
    }

    fn declare_parameters(
        &mut self,
        callable: DescriptorId,
        parameters: &[ParameterDecl],
        context: &TypeContext,
    ) -> Result<()> {
        for decl in parameters {
            let ty = self.resolve_type_text(&decl.ty, context)?;
            let parameter = self.descriptors.add_value_parameter(callable, &decl.name, ty);
            self.descriptors
                .set_parameter_flags(parameter, decl.default, decl.vararg);
        }
        Ok(())
    }

    fn declare_fake_overrides(&mut self) -> Result<()> {
        let members = std::mem::take(&mut self.members);
        for pending in members {
            let Declaration::FakeOverride(decl) = pending.decl else {
                continue;
            };
            if self.descriptors.class(pending.containing).is_none() {
                bail!("Fake override of {} is not inside a class", decl.overrides);
            }
            let overridden = self
                .find_member(&decl.overrides)
                .ok_or_else(|| anyhow!("Overridden member {} not found", decl.overrides))?;
            self.descriptors.add_fake_override(pending.containing, overridden);
        }
        Ok(())
    }

    fn find_member(&self, name: &str) -> Option<DescriptorId> {
        let fq_name = parse_fq_name(name).ok()?;
        let class = self.descriptors.find_class(fq_name.parent()?.as_str())?;
        self.descriptors
            .class_members(class, &fq_name.short_name())
            .first()
            .copied()
    }

    fn record_annotation(&mut self, descriptor: DescriptorId, replace_with: Option<&ReplaceWithDecl>) {
        let Some(replace_with) = replace_with else {
            return;
        };
        let name = self.display_name(descriptor);
        debug!("{} is annotated with ReplaceWith({:?})", name, replace_with.expression);
        self.annotated.push(AnnotatedDeclaration {
            descriptor,
            name,
            replace_with: ReplaceWith::new(replace_with.expression.clone())
                .with_imports(replace_with.imports.iter().cloned()),
            message: replace_with.message.clone(),
        });
    }

    fn display_name(&self, descriptor: DescriptorId) -> String {
        let d = &self.descriptors;
        match d.fq_name(descriptor) {
            Some(fq_name) => fq_name.to_string(),
            None => match d.containing(descriptor).and_then(|c| d.fq_name(c)) {
                Some(owner) => owner.child(d.name(descriptor)).to_string(),
                None => d.name(descriptor).to_string(),
            },
        }
    }

    fn in_declaration(&self, descriptor: DescriptorId) -> String {
        format!("In {}", self.descriptors.description(descriptor))
    }

    fn resolve_type_text(&self, text: &str, context: &TypeContext) -> Result<KotlinType> {
        let reference = self
            .factory
            .create_type_reference(text)
            .with_context(|| format!("Invalid type {:?}", text))?;
        self.resolve_type_reference(&reference, context)
    }

    fn resolve_type_reference(&self, reference: &TypeReference, context: &TypeContext) -> Result<KotlinType> {
        let arguments = reference
            .arguments
            .iter()
            .map(|argument| self.resolve_type_reference(argument, context))
            .collect::<Result<Vec<_>>>()?;

        let mut segments = reference
            .qualifier
            .iter()
            .chain(std::iter::once(&reference.name))
            .map(|segment| &segment.name);
        let first = segments
            .next()
            .ok_or_else(|| anyhow!("Empty type reference"))?;
        let mut found = self
            .lookup_first_segment(first, context)
            .ok_or_else(|| anyhow!("Unresolved type {}", reference))?;
        for segment in segments {
            let d = &self.descriptors;
            found = match &d.get(found).kind {
                DescriptorKind::PackageView { .. } => d.package_members(found, segment).into_iter().find(|id| {
                    matches!(
                        d.get(*id).kind,
                        DescriptorKind::Class(_) | DescriptorKind::PackageView { .. }
                    )
                }),
                DescriptorKind::Class(_) => d.nested_classifiers(found, segment).first().copied(),
                _ => None,
            }
            .ok_or_else(|| anyhow!("Unresolved type {}", reference))?;
        }

        match &self.descriptors.get(found).kind {
            DescriptorKind::Class(data) => {
                if data.type_parameters.len() != arguments.len() {
                    bail!(
                        "Type {} expects {} type arguments",
                        reference,
                        data.type_parameters.len()
                    );
                }
                Ok(KotlinType::class(found, arguments).with_nullability(reference.nullable))
            }
            DescriptorKind::TypeParameter(_) if arguments.is_empty() => {
                Ok(KotlinType::type_parameter(found).with_nullability(reference.nullable))
            }
            _ => bail!("{} does not name a type", reference),
        }
    }

    fn lookup_first_segment(&self, name: &Name, context: &TypeContext) -> Option<DescriptorId> {
        let d = &self.descriptors;
        let is_classifier = |id: &DescriptorId| d.class(*id).is_some();

        for owner in &context.owners {
            if let Some(parameter) = d
                .type_parameters(*owner)
                .iter()
                .find(|p| d.name(**p) == name)
            {
                return Some(*parameter);
            }
            if d.class(*owner).is_some() {
                if let Some(nested) = d.nested_classifiers(*owner, name).first() {
                    return Some(*nested);
                }
            }
        }
        if let Some(view) = d.package_view(&context.package) {
            if let Some(class) = d.package_members(view, name).into_iter().find(is_classifier) {
                return Some(class);
            }
        }
        for import in &context.imports {
            if import.short_name() == *name {
                if let Some(class) = d.resolve_fq_name(import).into_iter().find(is_classifier) {
                    return Some(class);
                }
            }
        }
        for package in DEFAULT_PACKAGES {
            if let Some(view) = d.package_view(&FqName::from_trusted(package)) {
                if let Some(class) = d.package_members(view, name).into_iter().find(is_classifier) {
                    return Some(class);
                }
            }
        }
        d.package_view(&FqName::root().child(name))
    }
}

fn parse_fq_name(text: &str) -> Result<FqName> {
    if text.is_empty() {
        return Ok(FqName::root());
    }
    FqNameUnsafe::parse(text)
        .and_then(|name| name.to_safe())
        .ok_or_else(|| anyhow!("{:?} is not a valid qualified name", text))
}
