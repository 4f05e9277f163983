//! 内存中的任务状态，不做持久化

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::generator::progress::{DeliveryError, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// 任务状态记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 任务看板
#[derive(Debug, Default)]
pub struct TaskBoard {
    tasks: DashMap<String, TaskRecord>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, task_id: &str) -> TaskRecord {
        let now = Utc::now();
        let record = TaskRecord {
            task_id: task_id.to_string(),
            status: TaskStatus::Created,
            message: "任务已创建".to_string(),
            current_step: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task_id.to_string(), record.clone());
        record
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }

    /// 按创建时间排序的全部任务
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> =
            self.tasks.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    pub fn start(&self, task_id: &str) -> bool {
        self.transition(task_id, TaskStatus::Running, "任务运行中")
    }

    pub fn complete(&self, task_id: &str) -> bool {
        self.transition(task_id, TaskStatus::Completed, "任务已完成")
    }

    pub fn fail(&self, task_id: &str, message: &str) -> bool {
        self.transition(task_id, TaskStatus::Failed, message)
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        self.transition(task_id, TaskStatus::Cancelled, "任务已被用户取消")
    }

    /// 已结束的任务不再改变状态
    fn transition(&self, task_id: &str, status: TaskStatus, message: &str) -> bool {
        match self.tasks.get_mut(task_id) {
            Some(mut record) if !record.status.is_finished() => {
                record.status = status;
                record.message = message.to_string();
                record.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

impl ProgressSink for TaskBoard {
    fn deliver(&self, job_id: &str, event: &ProgressEvent) -> Result<(), DeliveryError> {
        let mut record = self
            .tasks
            .get_mut(job_id)
            .ok_or_else(|| DeliveryError::NoSubscriber(job_id.to_string()))?;
        if record.status == TaskStatus::Created {
            record.status = TaskStatus::Running;
        }
        record.message = event.message();
        record.current_step = event.step().map(str::to_string);
        record.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_lifecycle() {
        let board = TaskBoard::new();
        let record = board.create("t1");
        assert_eq!(record.status, TaskStatus::Created);

        assert!(board.start("t1"));
        assert_eq!(board.get("t1").unwrap().status, TaskStatus::Running);

        assert!(board.complete("t1"));
        assert_eq!(board.get("t1").unwrap().status, TaskStatus::Completed);

        // 已完成的任务不能再被取消
        assert!(!board.cancel("t1"));
        assert_eq!(board.get("t1").unwrap().status, TaskStatus::Completed);
        assert!(!board.start("missing"));
    }

    #[test]
    fn test_board_tracks_progress_events() {
        let board = TaskBoard::new();
        board.create("t2");

        board
            .deliver(
                "t2",
                &ProgressEvent::Attempt {
                    role: "政策分析师".to_string(),
                    step: "撰写政策与监管框架".to_string(),
                    attempt: 1,
                    max_attempts: 3,
                },
            )
            .unwrap();

        let record = board.get("t2").unwrap();
        assert_eq!(record.status, TaskStatus::Running);
        assert_eq!(record.current_step.as_deref(), Some("撰写政策与监管框架"));
        assert!(record.message.contains("1/3"));

        assert!(board.deliver("unknown", &ProgressEvent::EvaluationStart {
            report_id: "r".to_string()
        })
        .is_err());
    }

    #[test]
    fn test_failed_and_cancelled_states() {
        let board = TaskBoard::new();
        board.create("a");
        board.create("b");

        assert!(board.fail("a", "模型不可用"));
        assert!(board.cancel("b"));

        let records = board.list();
        assert_eq!(records.len(), 2);
        assert_eq!(board.get("a").unwrap().message, "模型不可用");
        assert_eq!(board.get("b").unwrap().status, TaskStatus::Cancelled);
    }
}
