//! 角色写作者：带重试的调用框架 + 各角色的模板数据构造

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::WorkflowConfig;
use crate::generator::context::JobContext;
use crate::generator::error::WorkflowError;
use crate::generator::progress::ProgressEvent;
use crate::generator::types::{ResearchData, SectionContext};
use crate::llm::agent::RoleAgent;
use crate::llm::template::TemplateData;
use crate::utils::text_normalizer::{count_words, strip_markdown, strip_reasoning_artifacts};

mod case;
mod conclusion;
mod generic;
mod market;
mod policy;
mod societal;
mod technical;

pub use case::CaseSpecialist;
pub use conclusion::{ConclusionGenerator, DEFAULT_CONCLUSION};
pub use generic::{FieldProjection, GenericWriter};
pub use market::MarketResearcher;
pub use policy::PolicyAnalyst;
pub use societal::SocietalObserver;
pub use technical::TechnicalInterpreter;

/// 发给角色Agent的统一指令
pub const WRITE_INSTRUCTION: &str = "请根据提供的数据生成内容";

/// 一次阶段调用的描述
pub struct StageCall<'a> {
    pub agent: &'a RoleAgent,
    pub step_name: &'a str,
    pub data: TemplateData,
}

/// 带重试的阶段调用
///
/// 每次尝试：发出尝试事件、渲染并调用模型、校验清理后的内容。
/// 失败后按 `base^attempt` 秒退避，最后一次失败后不再等待。
/// 取消与模板错误不重试。
pub async fn call_with_retry(
    job: &JobContext,
    config: &WorkflowConfig,
    call: StageCall<'_>,
) -> Result<String, WorkflowError> {
    let role = call.agent.display_name().to_string();
    let step = call.step_name.to_string();
    let max_attempts = config.max_attempts.max(1);

    job.emit(ProgressEvent::StageStart {
        role: role.clone(),
        step: step.clone(),
    })?;

    let mut last_error = None;
    for attempt in 1..=max_attempts {
        job.emit(ProgressEvent::Attempt {
            role: role.clone(),
            step: step.clone(),
            attempt,
            max_attempts,
        })?;

        let outcome = match call.agent.chat(WRITE_INSTRUCTION, &call.data).await {
            Ok(raw) => validate_content(&raw, config.min_content_chars),
            Err(e) => Err(WorkflowError::from(e)),
        };
        job.ensure_active()?;

        match outcome {
            Ok(content) => {
                job.emit(ProgressEvent::StageSuccess {
                    role: role.clone(),
                    step: step.clone(),
                    word_count: count_words(&content),
                    content: content.clone(),
                })?;
                return Ok(content);
            }
            Err(e) => {
                warn!("   ❌ [{}] {} - 尝试 {} 失败: {}", role, step, attempt, e);
                job.emit(ProgressEvent::StageError {
                    role: role.clone(),
                    step: step.clone(),
                    message: e.to_string().chars().take(100).collect(),
                })?;
                let retryable = e.is_retryable();
                last_error = Some(e);
                if !retryable {
                    break;
                }
                if attempt < max_attempts {
                    let delay = backoff_delay(config.backoff_base_secs, attempt);
                    info!("   ⏳ 等待 {} 秒后重试...", delay.as_secs());
                    tokio::time::sleep(delay).await;
                    job.ensure_active()?;
                }
            }
        }
    }

    Err(last_error.unwrap_or(WorkflowError::ContentTooShort {
        content: String::new(),
    }))
}

/// 第 `attempt` 次失败后的等待时长：`base^attempt` 秒，溢出时取上限
pub fn backoff_delay(base_secs: u64, attempt: u32) -> Duration {
    Duration::from_secs(base_secs.saturating_pow(attempt))
}

/// 清理思考过程后，内容至少要有 `min_chars` 个字符
fn validate_content(raw: &str, min_chars: usize) -> Result<String, WorkflowError> {
    let content = strip_reasoning_artifacts(raw.trim());
    if content.chars().count() < min_chars {
        return Err(WorkflowError::ContentTooShort { content });
    }
    Ok(content)
}

/// 角色写作者
///
/// 各角色只在模板数据的构造与兜底文本上不同，重试、清理与降级由默认的 `write` 完成。
#[async_trait]
pub trait RoleWriter: Send + Sync {
    /// 配置中的角色标识
    fn role_key(&self) -> &str;

    /// 步骤名称，用于进度事件
    fn step_name(&self) -> &str;

    /// 章节名称，产出章节的角色在完成时发出章节完成事件
    fn section_name(&self) -> Option<&str> {
        None
    }

    /// 重试耗尽后的兜底文本
    fn fallback_text(&self) -> &str;

    /// 构造模板数据
    fn template_data(&self, research: &ResearchData, section: &SectionContext) -> TemplateData;

    /// 对成功的输出做最终整理，返回错误时同样走兜底
    fn finalize(&self, content: String, _config: &WorkflowConfig) -> Result<String, WorkflowError> {
        Ok(strip_markdown(&strip_reasoning_artifacts(&content)))
    }

    /// 撰写本角色负责的内容，除取消外不会失败
    async fn write(
        &self,
        job: &JobContext,
        agent: &RoleAgent,
        config: &WorkflowConfig,
        research: &ResearchData,
        section: &SectionContext,
    ) -> Result<String, WorkflowError> {
        info!("📝 [{}] 正在{}...", agent.display_name(), self.step_name());
        let call = StageCall {
            agent,
            step_name: self.step_name(),
            data: self.template_data(research, section),
        };

        let result = match call_with_retry(job, config, call).await {
            Ok(content) => self.finalize(content, config),
            Err(e) => Err(e),
        };

        match result {
            Ok(content) => {
                if let Some(section_name) = self.section_name() {
                    let word_count = count_words(&content);
                    job.emit(ProgressEvent::SectionComplete {
                        section: section_name.to_string(),
                        word_count,
                    })?;
                    info!("✅ {}完成: {} 个字", section_name, word_count);
                }
                Ok(content)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(
                    "❌ [{}] {}出错，使用兜底内容: {}",
                    agent.display_name(),
                    self.step_name(),
                    e
                );
                Ok(self.fallback_text().to_string())
            }
        }
    }
}

/// 把多条资料逐行拼接，资料为空时使用 `empty`
pub(crate) fn join_lines<T>(items: &[T], empty: &str, render: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items.iter().map(render).collect::<Vec<_>>().join("\n")
}

/// 区段角色共用的模板字段：问题、核心结论、前文
pub(crate) fn section_fields(section: &SectionContext) -> TemplateData {
    let mut data = TemplateData::new();
    data.insert("question".to_string(), section.question.clone());
    data.insert("conclusion".to_string(), section.core_conclusion.clone());
    data.insert(
        "context".to_string(),
        section.preceding_section_text.clone(),
    );
    data
}

#[cfg(test)]
mod tests;
