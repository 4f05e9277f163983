use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::LLMProvider;
use crate::generator::error::WorkflowError;
use crate::generator::progress::{CancelChecker, NeverCancelled, ProgressEvent, ProgressSink};

/// 单个任务的运行上下文，沿调用链向下传递
#[derive(Clone)]
pub struct JobContext {
    /// 任务ID，用于事件路由与取消查询
    job_id: String,
    /// 进度事件接收方
    sink: Arc<dyn ProgressSink>,
    /// 取消检查器
    cancel_checker: Arc<dyn CancelChecker>,
    /// 本任务使用的Provider（为空时使用控制器默认值）
    provider: Option<LLMProvider>,
}

impl JobContext {
    pub fn new(
        job_id: &str,
        sink: Arc<dyn ProgressSink>,
        cancel_checker: Arc<dyn CancelChecker>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            sink,
            cancel_checker,
            provider: None,
        }
    }

    /// 不可取消的上下文
    pub fn detached(job_id: &str, sink: Arc<dyn ProgressSink>) -> Self {
        Self::new(job_id, sink, Arc::new(NeverCancelled))
    }

    pub fn with_provider(mut self, provider: Option<LLMProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn provider(&self) -> Option<LLMProvider> {
        self.provider
    }

    /// 检查任务是否已被取消
    pub fn ensure_active(&self) -> Result<(), WorkflowError> {
        if self.cancel_checker.is_cancelled(&self.job_id) {
            debug!("⏹️ 任务 {} 已被取消", self.job_id);
            return Err(WorkflowError::Cancelled {
                job_id: self.job_id.clone(),
            });
        }
        Ok(())
    }

    /// 先检查取消，再投递事件；投递失败只记录日志
    pub fn emit(&self, event: ProgressEvent) -> Result<(), WorkflowError> {
        self.ensure_active()?;
        if let Err(e) = self.sink.deliver(&self.job_id, &event) {
            warn!("⚠️ 进度事件投递失败: {}", e);
        }
        Ok(())
    }
}
