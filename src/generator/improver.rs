use std::time::Duration;
use tracing::{info, warn};

use crate::config::WorkflowConfig;
use crate::generator::context::JobContext;
use crate::generator::error::WorkflowError;
use crate::generator::progress::ProgressEvent;
use crate::generator::types::{EvaluationResult, Report};
use crate::llm::agent::RoleAgent;
use crate::llm::template::TemplateData;
use crate::utils::text_normalizer::{count_words, strip_markdown, strip_reasoning_artifacts};

const IMPROVE_INSTRUCTION: &str = "请根据评价改进报告";

/// 精确改进师：根据评价意见改写报告，逼近目标字数
///
/// 最多尝试 `improvement_attempts` 次。字数恰好等于目标时立即返回并标记为已改进；
/// 否则返回所有候选（含原报告）中与目标差距最小的一份，标记为未改进。
pub struct ReportImprover<'a> {
    agent: &'a RoleAgent,
    config: &'a WorkflowConfig,
}

impl<'a> ReportImprover<'a> {
    pub fn new(agent: &'a RoleAgent, config: &'a WorkflowConfig) -> Self {
        Self { agent, config }
    }

    pub fn template_data(report: &Report, evaluation: &EvaluationResult) -> TemplateData {
        let metrics = &evaluation.metrics;
        let mut data = TemplateData::new();
        data.insert("report_id".to_string(), report.id.clone());
        data.insert("question".to_string(), report.question.clone());
        data.insert(
            "target_word_limit".to_string(),
            report.word_limit.to_string(),
        );
        data.insert(
            "original_report".to_string(),
            report.body_text().to_string(),
        );
        data.insert(
            "evaluation_feedback".to_string(),
            evaluation.feedback.clone(),
        );
        data.insert(
            "current_metrics".to_string(),
            serde_json::to_string(metrics).unwrap_or_default(),
        );
        data.insert(
            "current_actual_word_count".to_string(),
            metrics.actual_word_count.to_string(),
        );
        data.insert(
            "current_word_difference".to_string(),
            metrics.word_difference.to_string(),
        );
        data.insert(
            "current_word_match_rate".to_string(),
            format!("{:.1}", metrics.word_match_rate),
        );
        data
    }

    pub async fn improve(
        &self,
        job: &JobContext,
        report: &Report,
        evaluation: &EvaluationResult,
    ) -> Result<Report, WorkflowError> {
        let role = self.agent.display_name();
        let target = report.word_limit;
        let max_attempts = self.config.improvement_attempts.max(1);
        let data = Self::template_data(report, evaluation);

        let mut best: Option<String> = None;
        let mut best_difference = report.word_difference();

        for attempt in 1..=max_attempts {
            job.emit(ProgressEvent::ImprovementStart {
                report_id: report.id.clone(),
                attempt,
                max_attempts,
            })?;
            info!("🔄 [{}] 第 {}/{} 次改进尝试...", role, attempt, max_attempts);

            let response = self.agent.chat(IMPROVE_INSTRUCTION, &data).await;
            job.ensure_active()?;

            match response {
                Ok(raw) => {
                    let candidate = strip_markdown(&strip_reasoning_artifacts(&raw));
                    let word_count = count_words(&candidate);
                    info!("   📊 改进结果: {} 个字 (目标: {})", word_count, target);

                    if word_count == target {
                        job.emit(ProgressEvent::ImprovementSuccess {
                            report_id: report.id.clone(),
                            word_count,
                            target,
                        })?;
                        info!("🎯 [{}] 成功！字数完全匹配: {} 个字", role, word_count);
                        return Ok(report.with_body(candidate, true));
                    }

                    let difference = word_count.abs_diff(target);
                    if difference < best_difference {
                        best_difference = difference;
                        best = Some(candidate);
                    }
                }
                Err(e) => {
                    warn!("❌ [{}] 改进过程出错: {}", role, e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(Duration::from_secs(self.config.improvement_delay_secs)).await;
                job.ensure_active()?;
            }
        }

        let final_report = match best {
            Some(text) => report.with_body(text, false),
            None => report.with_body(report.body_text().to_string(), false),
        };
        warn!(
            "⚠️ [{}] 无法完全匹配字数，返回最佳结果: {} 个字 (目标: {})",
            role,
            final_report.word_count(),
            target
        );
        Ok(final_report)
    }
}
