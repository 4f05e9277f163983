//! 进度事件、事件接收方与取消检查

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::info;

/// 工作流进度事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageStart {
        role: String,
        step: String,
    },
    Attempt {
        role: String,
        step: String,
        attempt: u32,
        max_attempts: u32,
    },
    StageSuccess {
        role: String,
        step: String,
        content: String,
        word_count: usize,
    },
    StageError {
        role: String,
        step: String,
        message: String,
    },
    SectionComplete {
        section: String,
        word_count: usize,
    },
    EvaluationStart {
        report_id: String,
    },
    ImprovementStart {
        report_id: String,
        attempt: u32,
        max_attempts: u32,
    },
    ImprovementSuccess {
        report_id: String,
        word_count: usize,
        target: usize,
    },
}

impl ProgressEvent {
    /// 面向用户的进度描述
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::StageStart { role, step } => format!("🤖 [{}] 开始{}", role, step),
            ProgressEvent::Attempt {
                role,
                step,
                attempt,
                max_attempts,
            } => format!("🔁 [{}] {} - 尝试 {}/{}", role, step, attempt, max_attempts),
            ProgressEvent::StageSuccess {
                role,
                step,
                word_count,
                ..
            } => format!("✅ [{}] {} 完成，{} 个字", role, step, word_count),
            ProgressEvent::StageError { role, step, message } => {
                format!("❌ [{}] {} 出错: {}", role, step, message)
            }
            ProgressEvent::SectionComplete {
                section,
                word_count,
            } => format!("✅ {} 完成: {} 个字", section, word_count),
            ProgressEvent::EvaluationStart { report_id } => {
                format!("🔍 严厉评价师 开始评价报告 {}", report_id)
            }
            ProgressEvent::ImprovementStart {
                report_id,
                attempt,
                max_attempts,
            } => format!(
                "🔧 精确改进师 开始改进报告 {}... 第 {}/{} 次改进尝试",
                report_id, attempt, max_attempts
            ),
            ProgressEvent::ImprovementSuccess {
                report_id,
                word_count,
                target,
            } => format!(
                "🎯 报告 {} 字数完全匹配: {} / {}",
                report_id, word_count, target
            ),
        }
    }

    /// 当前步骤名称（若事件与某个阶段相关）
    pub fn step(&self) -> Option<&str> {
        match self {
            ProgressEvent::StageStart { step, .. }
            | ProgressEvent::Attempt { step, .. }
            | ProgressEvent::StageSuccess { step, .. }
            | ProgressEvent::StageError { step, .. } => Some(step),
            ProgressEvent::SectionComplete { section, .. } => Some(section),
            ProgressEvent::EvaluationStart { .. } => Some("评价报告"),
            ProgressEvent::ImprovementStart { .. } | ProgressEvent::ImprovementSuccess { .. } => {
                Some("改进报告")
            }
        }
    }
}

/// 进度投递失败
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("任务 {0} 没有订阅者")]
    NoSubscriber(String),

    #[error("任务 {0} 的订阅通道已关闭")]
    Closed(String),
}

/// 进度事件接收方
///
/// 投递是即发即弃的：失败只会被记录，不会中断工作流。
pub trait ProgressSink: Send + Sync {
    fn deliver(&self, job_id: &str, event: &ProgressEvent) -> Result<(), DeliveryError>;
}

/// 写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn deliver(&self, job_id: &str, event: &ProgressEvent) -> Result<(), DeliveryError> {
        info!("[{}] {}", job_id, event.message());
        Ok(())
    }
}

/// 把事件推送给唯一的观察者
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn deliver(&self, job_id: &str, event: &ProgressEvent) -> Result<(), DeliveryError> {
        self.tx
            .send(event.clone())
            .map_err(|_| DeliveryError::Closed(job_id.to_string()))
    }
}

/// 按任务路由的事件中心：一个任务的事件只会送到该任务的订阅者
#[derive(Debug, Default)]
pub struct ProgressHub {
    subscribers: DashMap<String, UnboundedSender<ProgressEvent>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅任务事件，重复订阅会替换之前的订阅者
    pub fn subscribe(&self, job_id: &str) -> UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.insert(job_id.to_string(), tx);
        rx
    }

    pub fn unsubscribe(&self, job_id: &str) {
        self.subscribers.remove(job_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl ProgressSink for ProgressHub {
    fn deliver(&self, job_id: &str, event: &ProgressEvent) -> Result<(), DeliveryError> {
        let sent = match self.subscribers.get(job_id) {
            Some(tx) => tx.send(event.clone()).is_ok(),
            None => return Err(DeliveryError::NoSubscriber(job_id.to_string())),
        };
        if !sent {
            self.subscribers.remove(job_id);
            return Err(DeliveryError::Closed(job_id.to_string()));
        }
        Ok(())
    }
}

/// 同时投递给多个接收方
#[derive(Default, Clone)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl CompositeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressSink for CompositeSink {
    /// 每个接收方都会收到事件，返回第一个失败
    fn deliver(&self, job_id: &str, event: &ProgressEvent) -> Result<(), DeliveryError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(job_id, event) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// 取消检查：以任务ID查询是否已被取消
pub trait CancelChecker: Send + Sync {
    fn is_cancelled(&self, job_id: &str) -> bool;
}

impl<F> CancelChecker for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_cancelled(&self, job_id: &str) -> bool {
        self(job_id)
    }
}

/// 从不取消
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancelled;

impl CancelChecker for NeverCancelled {
    fn is_cancelled(&self, _job_id: &str) -> bool {
        false
    }
}

/// 任务取消登记表，可在多个任务间共享
#[derive(Debug, Default)]
pub struct CancelRegistry {
    cancelled: DashSet<String>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, job_id: &str) {
        info!("⏹️ 收到取消请求: {}", job_id);
        self.cancelled.insert(job_id.to_string());
    }

    /// 任务结束后清除标记
    pub fn clear(&self, job_id: &str) {
        self.cancelled.remove(job_id);
    }
}

impl CancelChecker for CancelRegistry {
    fn is_cancelled(&self, job_id: &str) -> bool {
        self.cancelled.contains(job_id)
    }
}
