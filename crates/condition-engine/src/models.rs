//! 条件引擎领域模型

use crate::error::ConditionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// 条件集匹配模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionMode {
    /// 所有条件都满足才算匹配
    #[default]
    All,
    /// 任一条件满足即算匹配
    Any,
}

impl ConditionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ConditionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionMode {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            other => Err(ConditionError::invalid_mode(other)),
        }
    }
}

/// 评估上下文 - 条件匹配时的运行时数据
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    data: Value,
}

impl EvaluationContext {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// 从 JSON 文本创建
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let data: Value = serde_json::from_str(json)?;
        Ok(Self { data })
    }

    /// 获取字段值（支持点号分隔的路径，如 "event.type" 或 "items.0.name"）
    pub fn get_field(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.data);
        }

        let mut current = &self.data;
        for part in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// 获取底层数据
    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl From<Value> for EvaluationContext {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}
