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

#[cfg(test)]
mod test_explicit_type_arguments {
    use crate::descriptors::KotlinType;
    use crate::name::Name;
    use crate::syntax::Role;
    use crate::test_utils::{analyze_text, import_names, roles_of, TestWorld};

    fn generic_function(world: &mut TestWorld) -> crate::descriptors::DescriptorId {
        let f = world.descriptors.add_function(world.fragment, "f");
        let t = world.descriptors.add_type_parameter(f, "T");
        world
            .descriptors
            .add_value_parameter(f, "x", KotlinType::type_parameter(t));
        f
    }

    #[test]
    fn test_literal_arguments() {
        let mut world = TestWorld::new();
        let unit = world.ty("kotlin.Unit");
        let f = world.function("f", &[], unit);
        let frontend = world.frontend();

        let template = analyze_text(&frontend, f, "listOf(1, 2)", &[]).unwrap();
        assert_eq!(template.expression().to_string(), "listOf<kotlin.Int>(1, 2)");
        assert_eq!(import_names(&template), vec!["kotlin.collections.listOf"]);
    }

    #[test]
    fn test_nested_calls() {
        let mut world = TestWorld::new();
        let f = generic_function(&mut world);
        let frontend = world.frontend();

        let template = analyze_text(&frontend, f, "listOf(listOf(x))", &[]).unwrap();
        assert_eq!(
            template.expression().to_string(),
            "listOf<kotlin.collections.List<T>>(listOf<T>(x))"
        );
        assert_eq!(
            roles_of(&template, "T"),
            vec![
                Role::TypeParameter(Name::new("T")),
                Role::TypeParameter(Name::new("T"))
            ]
        );
        assert_eq!(import_names(&template), vec!["kotlin.collections.listOf"]);
    }

    #[test]
    fn test_uninferable_call_is_unchanged() {
        let mut world = TestWorld::new();
        let unit = world.ty("kotlin.Unit");
        let f = world.function("f", &[], unit);
        let frontend = world.frontend();

        let template = analyze_text(&frontend, f, "emptyList()", &[]).unwrap();
        assert_eq!(template.expression().to_string(), "emptyList()");
    }

    #[test]
    fn test_explicit_arguments_are_kept() {
        let mut world = TestWorld::new();
        let unit = world.ty("kotlin.Unit");
        let f = world.function("f", &[], unit);
        let frontend = world.frontend();

        let template = analyze_text(&frontend, f, "listOf<Int>(1)", &[]).unwrap();
        assert_eq!(template.expression().to_string(), "listOf<Int>(1)");
        assert_eq!(
            import_names(&template),
            vec!["kotlin.collections.listOf", "kotlin.Int"]
        );
    }

    #[test]
    fn test_non_generic_call_is_unchanged() {
        let mut world = TestWorld::new();
        let int = world.int();
        let unit = world.ty("kotlin.Unit");
        world.function("g", &[("value", int.clone())], unit.clone());
        let f = world.function("f", &[("x", int)], unit);
        let frontend = world.frontend();

        let template = analyze_text(&frontend, f, "g(x)", &[]).unwrap();
        assert_eq!(template.expression().to_string(), "g(x)");
    }

    #[test]
    fn test_class_type_parameter_is_not_tagged() {
        let mut world = TestWorld::new();
        let class = world.descriptors.add_class(
            world.fragment,
            "Box",
            crate::descriptors::ClassKind::Class,
        );
        let t = world.descriptors.add_type_parameter(class, "T");
        world
            .descriptors
            .add_property(class, "value", KotlinType::type_parameter(t));
        let list = world.list_of(KotlinType::type_parameter(t));
        let old = world.member_function(class, "old", &[], list);
        let frontend = world.frontend();

        let template = analyze_text(&frontend, old, "listOf(value)", &[]).unwrap();
        assert_eq!(template.expression().to_string(), "listOf<T>(this.value)");
        assert_eq!(roles_of(&template, "T"), vec![Role::Plain]);
    }
}
