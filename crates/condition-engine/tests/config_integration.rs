//! 配置加载集成测试

use condition_engine::{ChoicesConfig, ConditionChoices, ConditionSet, EvaluationContext};
use serde_json::json;
use std::path::PathBuf;

/// 在临时目录中写入配置文件，测试结束时删除
struct TempConfigFile {
    path: PathBuf,
}

impl TempConfigFile {
    fn new(name: &str, content: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "condition-engine-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, content).unwrap();
        Self { path }
    }
}

impl Drop for TempConfigFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[test]
fn test_load_toml_file_and_evaluate() {
    let file = TempConfigFile::new(
        "choices.toml",
        r#"
        [[choices]]
        id = "status"
        path = "review_request.status"

        [[choices.operators]]
        kind = "is"
        value = { type = "enum", options = ["pending", "submitted", "discarded"] }

        [[choices.operators]]
        kind = "is_not"
        value = { type = "enum", options = ["pending", "submitted", "discarded"] }

        [[choices]]
        id = "repository"
        path = "review_request.repository.name"

        [[choices.operators]]
        kind = "one_of"

        [[choices.operators]]
        kind = "is_empty"
        "#,
    );

    let config = ChoicesConfig::load(&file.path).unwrap();
    let choices = ConditionChoices::from_config(&config).unwrap();

    let set = ConditionSet::deserialize(
        &choices,
        &json!({
            "mode": "all",
            "conditions": [
                {"choice": "status", "op": "is_not", "value": "discarded"},
                {"choice": "repository", "op": "one_of", "value": ["core", "web"]}
            ]
        }),
    )
    .unwrap();

    let ctx = EvaluationContext::new(json!({
        "review_request": {
            "status": "pending",
            "repository": {"name": "web"}
        }
    }));
    assert!(set.matches(&ctx));

    let discarded = EvaluationContext::new(json!({
        "review_request": {
            "status": "discarded",
            "repository": {"name": "web"}
        }
    }));
    assert!(!set.matches(&discarded));
}

#[test]
fn test_load_json_file() {
    let file = TempConfigFile::new(
        "choices.json",
        r#"{
            "choices": [
                {"id": "lines", "path": "diff.lines", "operators": [
                    {"id": "at_most", "kind": "less_than_or_equal", "value": {"type": "integer", "max": 1000}}
                ]}
            ]
        }"#,
    );

    let config = ChoicesConfig::load(&file.path).unwrap();
    let choices = ConditionChoices::from_config(&config).unwrap();

    let err = ConditionSet::deserialize(
        &choices,
        &json!({"mode": "all", "conditions": [
            {"choice": "lines", "op": "at_most", "value": 5000}
        ]}),
    )
    .unwrap_err();
    assert_eq!(err.condition_index(), Some(0));

    let set = ConditionSet::deserialize(
        &choices,
        &json!({"mode": "all", "conditions": [
            {"choice": "lines", "op": "at_most", "value": 500}
        ]}),
    )
    .unwrap();
    assert!(set.matches(&EvaluationContext::new(json!({"diff": {"lines": 20}}))));
}

#[test]
fn test_missing_file_is_an_error() {
    let result = ChoicesConfig::load(std::env::temp_dir().join("condition-engine-missing.toml"));
    assert!(result.is_err());
}
