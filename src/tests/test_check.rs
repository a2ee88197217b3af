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
mod test_check_annotations {
    use crate::checker::check_model;
    use crate::model::load_model_file;
    use crate::resolve::FrontendConfig;
    use std::path::Path;

    fn model_with(declarations: &str) -> String {
        format!(
            r#"{{"modules": [{{"name": "app", "files": [{{"package": "p", "declarations": [{}]}}]}}]}}"#,
            declarations
        )
    }

    #[test]
    fn test_valid_replacement() {
        let source = model_with(
            r#"
            {"kind": "function", "name": "g", "parameters": [{"name": "value", "type": "Int"}]},
            {"kind": "function", "name": "old", "parameters": [{"name": "x", "type": "Int"}],
             "replace_with": {"expression": "g(x)"}}
            "#,
        );

        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        let result = check_model(model, FrontendConfig::default());
        assert!(result.success);
        assert_eq!(result.checked_declarations, vec!["p.old"]);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_unresolved_reference_is_reported() {
        let source = model_with(
            r#"
            {"kind": "function", "name": "old", "replace_with": {"expression": "nope()"}}
            "#,
        );

        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        let result = check_model(model, FrontendConfig::default());
        assert!(!result.success);
        assert_eq!(result.checked_declarations, vec!["p.old"]);
        assert_eq!(result.errors, vec!["p.old: unresolved reference: nope"]);
    }

    #[test]
    fn test_malformed_replacement_is_reported() {
        let source = model_with(
            r#"
            {"kind": "function", "name": "old", "replace_with": {"expression": "g(("}}
            "#,
        );

        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        let result = check_model(model, FrontendConfig::default());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("p.old: "));
        assert!(result.errors[0].contains("Malformed replacement"));
    }

    #[test]
    fn test_default_imports_can_be_disabled() {
        let source = model_with(
            r#"
            {"kind": "function", "name": "old", "parameters": [{"name": "x", "type": "Int"}],
             "replace_with": {"expression": "listOf(x)"}}
            "#,
        );

        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        assert!(check_model(model, FrontendConfig::default()).success);

        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        let result = check_model(model, FrontendConfig::without_default_imports());
        assert!(!result.success);
        assert_eq!(result.errors, vec!["p.old: unresolved reference: listOf"]);
    }

    #[test]
    fn test_annotation_import_is_carried_into_template() {
        let source = model_with(
            r#"
            {"kind": "function", "name": "old", "parameters": [{"name": "x", "type": "Int"}],
             "replace_with": {"expression": "listOf(x)", "imports": ["kotlin.collections.listOf"]}}
            "#,
        );

        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        let result = check_model(model, FrontendConfig::without_default_imports());
        assert!(result.success, "{:?}", result.errors);
    }

    #[test]
    fn test_unknown_declaration_kind_is_rejected() {
        let source = model_with(r#"{"kind": "typealias", "name": "Alias"}"#);

        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let err = load_model_file(Path::new(&test_ctx.file_path)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn test_cyclic_type_parameter_bounds() {
        let source = model_with(
            r#"
            {"kind": "function", "name": "old",
             "type_parameters": [{"name": "T", "bounds": ["U"]}, {"name": "U", "bounds": ["T"]}],
             "parameters": [{"name": "x", "type": "T"}],
             "replace_with": {"expression": "x.foo()"}}
            "#,
        );

        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        let result = check_model(model, FrontendConfig::default());
        assert!(!result.success);
        assert_eq!(result.errors, vec!["p.old: unresolved reference: foo"]);
    }

    #[test]
    fn test_deeply_nested_replacement_is_malformed() {
        let expression = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        let source = model_with(&format!(
            r#"{{"kind": "function", "name": "old", "parameters": [{{"name": "x", "type": "Int"}}],
                "replace_with": {{"expression": "{}"}}}}"#,
            expression
        ));

        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        let result = check_model(model, FrontendConfig::default());
        assert!(!result.success);
        assert!(result.errors[0].contains("Malformed replacement"));
        assert!(result.errors[0].contains("nested too deeply"));
    }

    #[test]
    fn test_member_replacements_through_inheritance() {
        let source = model_with(
            r#"
            {"kind": "class", "name": "Base", "members": [
                {"kind": "function", "name": "h"},
                {"kind": "function", "name": "old", "replace_with": {"expression": "h()"}}
            ]},
            {"kind": "class", "name": "Derived", "supertypes": ["Base"], "members": [
                {"kind": "fake_override", "overrides": "p.Base.old"}
            ]}
            "#,
        );
        let test_ctx = crate::tests::test_utils::TestContext::new(&source);
        let model = load_model_file(Path::new(&test_ctx.file_path)).unwrap();
        let result = check_model(model, FrontendConfig::default());
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.checked_declarations, vec!["p.Base.old"]);
    }
}
