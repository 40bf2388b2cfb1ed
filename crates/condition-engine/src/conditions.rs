//! 条件与条件集
//!
//! 条件由条件字段、操作符和值组成；条件集按匹配模式（all/any）组合多个条件，
//! 同时也是序列化、存储和评估的基本单位。载荷格式：
//!
//! ```json
//! {
//!     "mode": "all",
//!     "conditions": [
//!         {"choice": "status", "op": "is", "value": "open"},
//!         {"choice": "summary", "op": "is_empty"}
//!     ]
//! }
//! ```

use crate::choices::{ChoiceRegistry, ConditionChoice};
use crate::error::{ConditionError, Result};
use crate::models::{ConditionMode, EvaluationContext};
use crate::operators::ConditionOperator;
use crate::values::ConditionValue;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// 单个条件
#[derive(Debug, Clone)]
pub struct Condition {
    choice: Arc<dyn ConditionChoice>,
    operator: Arc<dyn ConditionOperator>,
    value: Option<ConditionValue>,
    raw_value: Option<Value>,
}

impl Condition {
    /// 直接构造条件
    ///
    /// 原始值由操作符的值字段序列化得到。操作符没有值字段时忽略传入的值。
    pub fn new(
        choice: Arc<dyn ConditionChoice>,
        operator: Arc<dyn ConditionOperator>,
        value: Option<ConditionValue>,
    ) -> Self {
        let raw_value = match (operator.value_field(), value.as_ref()) {
            (Some(field), Some(v)) => Some(field.serialize_value(v)),
            _ => None,
        };

        Self::with_raw_value(choice, operator, value, raw_value)
    }

    /// 使用显式的原始值构造条件
    ///
    /// 操作符没有值字段时，值与原始值都不会被保存。
    pub fn with_raw_value(
        choice: Arc<dyn ConditionChoice>,
        operator: Arc<dyn ConditionOperator>,
        value: Option<ConditionValue>,
        raw_value: Option<Value>,
    ) -> Self {
        let (value, raw_value) = match operator.value_field() {
            Some(_) => (value, raw_value),
            None => (None, None),
        };

        Self {
            choice,
            operator,
            value,
            raw_value,
        }
    }

    /// 从载荷反序列化条件
    ///
    /// 依次解析条件字段、操作符和值，遇到第一个错误即返回，
    /// 错误中携带 `condition_index` 以便调用方定位出错的条件。
    pub fn deserialize(
        choices: &dyn ChoiceRegistry,
        data: &Value,
        condition_index: Option<usize>,
    ) -> Result<Self> {
        let Some(choice_id) = data.get("choice") else {
            debug!(
                condition = %data,
                condition_index = ?condition_index,
                "条件反序列化失败: 缺少 \"choice\" 键"
            );
            return Err(
                ConditionError::choice_not_found("必须指定条件字段")
                    .with_condition_index(condition_index),
            );
        };

        let Some(operator_id) = data.get("op") else {
            debug!(
                condition = %data,
                condition_index = ?condition_index,
                "条件反序列化失败: 缺少 \"op\" 键"
            );
            return Err(
                ConditionError::operator_not_found("必须指定操作符")
                    .with_condition_index(condition_index),
            );
        };

        let choice_id = id_text(choice_id);
        let choice = choices.get_choice(&choice_id).map_err(|e| match e {
            ConditionError::ChoiceNotFound { message, .. } => {
                debug!(
                    choice_id = %choice_id,
                    condition = %data,
                    condition_index = ?condition_index,
                    "条件反序列化失败: 无效的 \"choice\""
                );
                ConditionError::ChoiceNotFound {
                    message,
                    choice_id: Some(choice_id.clone()),
                    condition_index,
                }
            }
            other => {
                debug!(
                    choice_id = %choice_id,
                    condition = %data,
                    condition_index = ?condition_index,
                    error = %other,
                    "条件反序列化失败: 查找条件字段出错"
                );
                other.with_condition_index(condition_index)
            }
        })?;

        let operator_id = id_text(operator_id);
        let operator = choice.get_operator(&operator_id).map_err(|e| match e {
            ConditionError::OperatorNotFound { message, .. } => {
                debug!(
                    choice_id = %choice_id,
                    operator_id = %operator_id,
                    condition = %data,
                    condition_index = ?condition_index,
                    "条件反序列化失败: 无效的 \"op\""
                );
                ConditionError::OperatorNotFound {
                    message,
                    operator_id: Some(operator_id.clone()),
                    condition_index,
                }
            }
            other => {
                debug!(
                    choice_id = %choice_id,
                    operator_id = %operator_id,
                    condition = %data,
                    condition_index = ?condition_index,
                    error = %other,
                    "条件反序列化失败: 查找操作符出错"
                );
                other.with_condition_index(condition_index)
            }
        })?;

        let (value, raw_value) = match operator.value_field() {
            None => (None, None),
            Some(field) => {
                let Some(raw_value) = data.get("value") else {
                    debug!(
                        choice_id = %choice_id,
                        operator_id = %operator_id,
                        condition = %data,
                        condition_index = ?condition_index,
                        "条件反序列化失败: 缺少 \"value\" 键"
                    );
                    return Err(
                        ConditionError::invalid_value_with_code("必须提供值", "required")
                            .with_condition_index(condition_index),
                    );
                };

                let value = field.deserialize_value(raw_value).map_err(|e| {
                    debug!(
                        choice_id = %choice_id,
                        operator_id = %operator_id,
                        value = %raw_value,
                        condition = %data,
                        condition_index = ?condition_index,
                        error = %e,
                        "条件反序列化失败: 无效的 \"value\""
                    );
                    e.with_condition_index(condition_index)
                })?;

                (Some(value), Some(raw_value.clone()))
            }
        };

        Ok(Self::with_raw_value(choice, operator, value, raw_value))
    }

    /// 判断运行时数据是否满足该条件
    pub fn matches(&self, context: &EvaluationContext) -> bool {
        let match_value = self.choice.get_match_value(context);
        self.operator
            .matches(match_value.as_ref(), self.value.as_ref())
    }

    /// 序列化为 JSON 载荷
    pub fn serialize(&self) -> Value {
        let mut data = Map::new();
        data.insert(
            "choice".to_string(),
            Value::String(self.choice.choice_id().to_string()),
        );
        data.insert(
            "op".to_string(),
            Value::String(self.operator.operator_id().to_string()),
        );

        if let Some(field) = self.operator.value_field() {
            let value = match &self.value {
                Some(value) => field.serialize_value(value),
                None => Value::Null,
            };
            data.insert("value".to_string(), value);
        }

        Value::Object(data)
    }

    pub fn choice(&self) -> &Arc<dyn ConditionChoice> {
        &self.choice
    }

    pub fn operator(&self) -> &Arc<dyn ConditionOperator> {
        &self.operator
    }

    pub fn value(&self) -> Option<&ConditionValue> {
        self.value.as_ref()
    }

    /// 原始（序列化形式的）值
    pub fn raw_value(&self) -> Option<&Value> {
        self.raw_value.as_ref()
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.choice.choice_id() == other.choice.choice_id()
            && self.operator.operator_id() == other.operator.operator_id()
            && self.value == other.value
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Condition::serialize(self).serialize(serializer)
    }
}

/// 条件集
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    mode: ConditionMode,
    conditions: Vec<Condition>,
}

impl ConditionSet {
    pub fn new(mode: ConditionMode, conditions: Vec<Condition>) -> Self {
        Self { mode, conditions }
    }

    /// 使用文本形式的匹配模式构造条件集，模式无效时返回 `InvalidMode`
    pub fn try_new(mode: &str, conditions: Vec<Condition>) -> Result<Self> {
        Ok(Self::new(mode.parse()?, conditions))
    }

    /// 从载荷反序列化条件集
    ///
    /// 任一条件反序列化失败即中止，不会返回部分结果。
    #[instrument(level = "debug", skip_all)]
    pub fn deserialize(choices: &dyn ChoiceRegistry, data: &Value) -> Result<Self> {
        let mode = match data.get("mode") {
            Some(Value::String(mode)) => mode.parse::<ConditionMode>().ok(),
            _ => None,
        };

        let Some(mode) = mode else {
            let shown = describe_mode(data.get("mode"));
            debug!(
                mode = %shown,
                condition_set = %data,
                "条件集反序列化失败: 无效的 \"mode\""
            );
            return Err(ConditionError::invalid_mode(shown));
        };

        let conditions = match data.get("conditions") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Condition::deserialize(choices, item, Some(i)))
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                debug!(
                    conditions = %other,
                    condition_set = %data,
                    "条件集反序列化失败: \"conditions\" 不是数组"
                );
                return Err(ConditionError::InvalidPayload(
                    "\"conditions\" 必须是数组".to_string(),
                ));
            }
        };

        debug!(mode = %mode, count = conditions.len(), "条件集反序列化完成");
        Ok(Self::new(mode, conditions))
    }

    /// 从 JSON 文本反序列化
    pub fn from_json(choices: &dyn ChoiceRegistry, json: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(json)?;
        Self::deserialize(choices, &data)
    }

    /// 判断运行时数据是否满足条件集
    ///
    /// all 模式下空条件集恒为 true，any 模式下恒为 false。
    pub fn matches(&self, context: &EvaluationContext) -> bool {
        match self.mode {
            ConditionMode::All => self.conditions.iter().all(|c| c.matches(context)),
            ConditionMode::Any => self.conditions.iter().any(|c| c.matches(context)),
        }
    }

    /// 序列化为 JSON 载荷
    pub fn serialize(&self) -> Value {
        let mut data = Map::new();
        data.insert(
            "mode".to_string(),
            Value::String(self.mode.as_str().to_string()),
        );
        data.insert(
            "conditions".to_string(),
            Value::Array(self.conditions.iter().map(Condition::serialize).collect()),
        );
        Value::Object(data)
    }

    /// 序列化为 JSON 文本
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&ConditionSet::serialize(self))?)
    }

    pub fn mode(&self) -> ConditionMode {
        self.mode
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl Serialize for ConditionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ConditionSet::serialize(self).serialize(serializer)
    }
}

/// 标识符的文本形式，非字符串按 JSON 文本处理
fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 匹配模式在错误消息中的展示形式，缺失或 null 显示为 None
fn describe_mode(mode: Option<&Value>) -> String {
    match mode {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
