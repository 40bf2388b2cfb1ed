//! 条件字段配置
//!
//! 支持从配置文件声明条件字段、取值路径、操作符及其值字段，并由环境变量覆盖。
//!
//! ```toml
//! root = "review_request"
//!
//! [[choices]]
//! id = "status"
//! path = "status"
//!
//! [[choices.operators]]
//! kind = "is"
//! value = { type = "enum", options = ["open", "closed"] }
//!
//! [[choices.operators]]
//! kind = "is_empty"
//! ```

use crate::choices::{ConditionChoices, FieldChoice};
use crate::error::{ConditionError, Result};
use crate::operators::{BuiltinOperator, ConditionOperators, StandardOperator};
use crate::values::BuiltinValueField;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 环境变量前缀（CONDITION_ENGINE__ROOT -> root）
pub const ENV_PREFIX: &str = "CONDITION_ENGINE";

/// 操作符配置
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    /// 操作符 ID，缺省时使用操作符类型名
    #[serde(default)]
    pub id: Option<String>,
    pub kind: BuiltinOperator,
    /// 值字段，缺省时使用操作符类型的默认值字段
    #[serde(default)]
    pub value: Option<BuiltinValueField>,
}

/// 条件字段配置
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceConfig {
    pub id: String,
    /// 取值路径，缺省时与 ID 相同
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub operators: Vec<OperatorConfig>,
}

/// 条件字段注册表配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChoicesConfig {
    /// 所有取值路径的公共前缀
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceConfig>,
}

impl ChoicesConfig {
    /// 从配置文件和环境变量加载
    ///
    /// 文件格式由扩展名决定（toml/json/yaml），随后应用 `CONDITION_ENGINE__` 前缀的环境变量。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let config: Self = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        info!(
            path = %path.display(),
            root = ?config.root,
            choices = config.choices.len(),
            "条件字段配置已加载"
        );
        Ok(config)
    }

    /// 从配置文本解析
    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        Ok(Config::builder()
            .add_source(File::from_str(content, format))
            .build()?
            .try_deserialize()?)
    }
}

impl OperatorConfig {
    fn build(&self, choice_id: &str) -> Result<StandardOperator> {
        let mut operator = StandardOperator::new(self.kind);

        if let Some(id) = &self.id {
            operator = operator.with_id(id.clone());
        }

        match (&self.value, self.kind.requires_value()) {
            (Some(_), false) => Err(ConditionError::InvalidConfig(format!(
                "条件字段 {} 的操作符 {} 不接受值",
                choice_id, self.kind
            ))),
            (Some(field), true) if !self.kind.accepts_value_field(field) => {
                Err(ConditionError::InvalidConfig(format!(
                    "条件字段 {} 的操作符 {} 不支持值类型 {:?}",
                    choice_id, self.kind, field
                )))
            }
            (Some(field), true) => Ok(operator.with_value_field(field.clone())),
            (None, _) => Ok(operator),
        }
    }
}

impl ChoiceConfig {
    fn build(&self, root: Option<&str>) -> Result<FieldChoice> {
        let mut operators = ConditionOperators::new();
        for op in &self.operators {
            operators.register(Arc::new(op.build(&self.id)?))?;
        }

        let path = self.path.as_deref().unwrap_or(&self.id);
        let path = match root.filter(|root| !root.is_empty()) {
            Some(root) => format!("{}.{}", root, path),
            None => path.to_string(),
        };

        Ok(FieldChoice::new(self.id.clone())
            .with_path(path)
            .with_operators(operators))
    }
}

impl ConditionChoices {
    /// 根据配置构建注册表
    pub fn from_config(config: &ChoicesConfig) -> Result<Self> {
        let choices = Self::new();
        for choice in &config.choices {
            choices.register(choice.build(config.root.as_deref())?)?;
        }
        Ok(choices)
    }
}
