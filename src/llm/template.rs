//! 提示词模板 - 基于handlebars的 `{{name}}` 占位符渲染与参数校验

use handlebars::template::{Template, TemplateElement};
use handlebars::{Handlebars, RenderErrorReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

/// 模板参数数据
pub type TemplateData = BTreeMap<String, String>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("模板参数不完整，缺少: {param_name}")]
    MissingParameter { param_name: String },

    #[error("模板格式错误: {reason}")]
    Malformed { reason: String },
}

/// 严格模式：引用未提供的参数即报错；提示词是纯文本，不做HTML转义
static RENDERER: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
});

/// 提示词模板
///
/// 占位符写作 `{{name}}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn compile(&self) -> Result<Template, TemplateError> {
        Template::compile(&self.source).map_err(|e| TemplateError::Malformed {
            reason: e.to_string(),
        })
    }

    /// 模板中引用的全部参数名（按首次出现顺序，去重）
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        if let Ok(template) = self.compile() {
            for element in &template.elements {
                if let TemplateElement::Expression(expr) | TemplateElement::HtmlExpression(expr) =
                    element
                    && expr.params.is_empty()
                    && let Some(name) = expr.name.as_name()
                    && !names.iter().any(|n| n == name)
                {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// 检查给定数据缺少哪些参数
    pub fn validate(&self, data: &TemplateData) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .filter(|name| !data.contains_key(name))
            .collect()
    }

    /// 渲染模板
    pub fn render(&self, data: &TemplateData) -> Result<String, TemplateError> {
        RENDERER
            .render_template(&self.source, data)
            .map_err(|e| match e.reason() {
                RenderErrorReason::MissingVariable(name) => TemplateError::MissingParameter {
                    param_name: name
                        .clone()
                        .or_else(|| self.validate(data).into_iter().next())
                        .unwrap_or_default(),
                },
                _ => TemplateError::Malformed {
                    reason: e.to_string(),
                },
            })
    }
}

impl From<&str> for PromptTemplate {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}
