use thiserror::Error;

/// 模型调用失败（传输、鉴权、超时或响应格式异常）
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<rig::completion::PromptError> for ProviderError {
    fn from(err: rig::completion::PromptError) -> Self {
        Self::new(err.to_string())
    }
}

/// 角色Agent一次对话的失败原因
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error(transparent)]
    Template(#[from] crate::llm::template::TemplateError),

    #[error("Agent调用失败: {0}")]
    Provider(#[from] ProviderError),
}
