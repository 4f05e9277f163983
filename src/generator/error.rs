use thiserror::Error;

use crate::llm::error::{AgentError, ProviderError};
use crate::llm::template::TemplateError;

/// 工作流错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    /// 模型调用失败，可重试
    #[error("模型调用失败: {0}")]
    Provider(#[from] ProviderError),

    /// 模型返回成功但清理后内容过短，可重试
    #[error("返回内容过短: {content}")]
    ContentTooShort { content: String },

    /// 模板参数缺失，不重试
    #[error("模板参数不完整，缺少: {param_name}")]
    MissingParameter { param_name: String },

    /// 模板本身无法解析，不重试
    #[error("模板格式错误: {0}")]
    InvalidTemplate(String),

    /// 任务被取消，始终向上传播
    #[error("任务已被用户取消: {job_id}")]
    Cancelled { job_id: String },

    /// 评价阶段模型调用失败，只会跳过改进阶段
    #[error("报告评价不可用: {0}")]
    EvaluationUnavailable(String),

    /// 无法创建角色Agent
    #[error("无法创建角色Agent: {0}")]
    Agent(String),
}

impl WorkflowError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkflowError::Cancelled { .. })
    }

    /// 该错误是否值得在同一阶段内重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Provider(_) | WorkflowError::ContentTooShort { .. }
        )
    }
}

impl From<TemplateError> for WorkflowError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::MissingParameter { param_name } => {
                WorkflowError::MissingParameter { param_name }
            }
            malformed => WorkflowError::InvalidTemplate(malformed.to_string()),
        }
    }
}

impl From<AgentError> for WorkflowError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Template(e) => e.into(),
            AgentError::Provider(e) => e.into(),
        }
    }
}
