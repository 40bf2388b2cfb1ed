//! 条件字段及其注册表
//!
//! 条件字段（choice）决定条件检查运行时数据的哪一部分，并持有该字段可用的操作符。
//! 条件本身只通过 [`ChoiceRegistry`] 按 ID 解析条件字段，不关心它们如何注册。

use crate::error::{ConditionError, Result};
use crate::models::EvaluationContext;
use crate::operators::{ConditionOperator, ConditionOperators};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// 条件字段
pub trait ConditionChoice: Send + Sync {
    /// 条件字段 ID，在注册表内唯一
    fn choice_id(&self) -> &str;

    /// 按 ID 查找该字段可用的操作符
    fn get_operator(&self, operator_id: &str) -> Result<Arc<dyn ConditionOperator>>;

    /// 从运行时数据中提取用于比较的值
    fn get_match_value(&self, context: &EvaluationContext) -> Option<Value>;
}

impl fmt::Debug for dyn ConditionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionChoice")
            .field("choice_id", &self.choice_id())
            .finish_non_exhaustive()
    }
}

/// 条件字段注册表
pub trait ChoiceRegistry: Send + Sync {
    /// 按 ID 解析条件字段，未找到时返回 `ChoiceNotFound`
    fn get_choice(&self, choice_id: &str) -> Result<Arc<dyn ConditionChoice>>;
}

/// 按路径提取上下文字段的条件字段
pub struct FieldChoice {
    choice_id: String,
    path: String,
    operators: ConditionOperators,
}

impl FieldChoice {
    /// 创建条件字段，默认按与 ID 同名的路径取值
    pub fn new(choice_id: impl Into<String>) -> Self {
        let choice_id = choice_id.into();
        Self {
            path: choice_id.clone(),
            choice_id,
            operators: ConditionOperators::new(),
        }
    }

    /// 指定取值路径（点号分隔）
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// 添加操作符，同 ID 的操作符会被替换
    pub fn with_operator(mut self, operator: impl ConditionOperator + 'static) -> Self {
        self.operators.replace(Arc::new(operator));
        self
    }

    pub fn with_operators(mut self, operators: ConditionOperators) -> Self {
        self.operators = operators;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn operators(&self) -> &ConditionOperators {
        &self.operators
    }
}

impl ConditionChoice for FieldChoice {
    fn choice_id(&self) -> &str {
        &self.choice_id
    }

    fn get_operator(&self, operator_id: &str) -> Result<Arc<dyn ConditionOperator>> {
        self.operators.get_operator(operator_id)
    }

    fn get_match_value(&self, context: &EvaluationContext) -> Option<Value> {
        context.get_field(&self.path).cloned()
    }
}

impl fmt::Debug for FieldChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldChoice")
            .field("choice_id", &self.choice_id)
            .field("path", &self.path)
            .field("operators", &self.operators)
            .finish()
    }
}

/// 线程安全的条件字段注册表
#[derive(Clone, Default)]
pub struct ConditionChoices {
    choices: Arc<DashMap<String, Arc<dyn ConditionChoice>>>,
}

impl ConditionChoices {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册条件字段，ID 重复时返回错误
    pub fn register(&self, choice: impl ConditionChoice + 'static) -> Result<()> {
        self.register_arc(Arc::new(choice))
    }

    pub fn register_arc(&self, choice: Arc<dyn ConditionChoice>) -> Result<()> {
        let choice_id = choice.choice_id().to_string();

        match self.choices.entry(choice_id.clone()) {
            Entry::Occupied(_) => {
                warn!(choice_id = %choice_id, "条件字段重复注册");
                Err(ConditionError::AlreadyRegistered {
                    kind: "条件字段",
                    id: choice_id,
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(choice);
                info!(choice_id = %choice_id, "条件字段已注册");
                Ok(())
            }
        }
    }

    /// 注销条件字段
    pub fn unregister(&self, choice_id: &str) -> Result<()> {
        if self.choices.remove(choice_id).is_some() {
            info!(choice_id = %choice_id, "条件字段已注销");
            Ok(())
        } else {
            warn!(choice_id = %choice_id, "注销不存在的条件字段");
            Err(Self::not_found(choice_id))
        }
    }

    pub fn contains(&self, choice_id: &str) -> bool {
        self.choices.contains_key(choice_id)
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// 获取所有条件字段 ID（已排序）
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.choices.iter().map(|c| c.key().clone()).collect();
        ids.sort();
        ids
    }

    fn not_found(choice_id: &str) -> ConditionError {
        ConditionError::choice_not_found(format!("未找到条件字段: {}", choice_id))
    }
}

impl ChoiceRegistry for ConditionChoices {
    fn get_choice(&self, choice_id: &str) -> Result<Arc<dyn ConditionChoice>> {
        self.choices
            .get(choice_id)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| Self::not_found(choice_id))
    }
}

impl fmt::Debug for ConditionChoices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionChoices")
            .field("choices", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{BuiltinOperator, StandardOperator};
    use serde_json::json;

    fn status_choice() -> FieldChoice {
        FieldChoice::new("status")
            .with_path("review_request.status")
            .with_operator(StandardOperator::new(BuiltinOperator::Is))
            .with_operator(StandardOperator::new(BuiltinOperator::IsEmpty))
    }

    #[test]
    fn test_field_choice_extracts_path() {
        let choice = status_choice();
        let ctx = EvaluationContext::new(json!({"review_request": {"status": "open"}}));

        assert_eq!(choice.get_match_value(&ctx), Some(json!("open")));
        assert_eq!(
            choice.get_match_value(&EvaluationContext::new(json!({}))),
            None
        );
        assert_eq!(choice.operators().len(), 2);
    }

    #[test]
    fn test_field_choice_operator_lookup() {
        let choice = status_choice();
        assert_eq!(choice.get_operator("is").unwrap().operator_id(), "is");
        assert!(matches!(
            choice.get_operator("contains"),
            Err(ConditionError::OperatorNotFound { .. })
        ));
    }

    #[test]
    fn test_registry_register_and_lookup() {
        let choices = ConditionChoices::new();
        choices.register(status_choice()).unwrap();
        choices.register(FieldChoice::new("branch")).unwrap();

        assert_eq!(choices.len(), 2);
        assert_eq!(choices.ids(), vec!["branch", "status"]);
        assert_eq!(choices.get_choice("status").unwrap().choice_id(), "status");

        let err = choices.get_choice("summary").unwrap_err();
        assert!(matches!(err, ConditionError::ChoiceNotFound { .. }));
        assert!(err.to_string().contains("summary"));
    }

    #[test]
    fn test_registry_duplicate_and_unregister() {
        let choices = ConditionChoices::new();
        choices.register(status_choice()).unwrap();

        assert!(matches!(
            choices.register(status_choice()),
            Err(ConditionError::AlreadyRegistered { .. })
        ));

        choices.unregister("status").unwrap();
        assert!(choices.is_empty());
        assert!(matches!(
            choices.unregister("status"),
            Err(ConditionError::ChoiceNotFound { .. })
        ));
    }
}
