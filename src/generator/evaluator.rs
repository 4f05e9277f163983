use tracing::{info, warn};

use crate::generator::context::JobContext;
use crate::generator::error::WorkflowError;
use crate::generator::progress::ProgressEvent;
use crate::generator::types::{EvaluationMetrics, EvaluationResult, Report};
use crate::llm::agent::RoleAgent;
use crate::llm::template::TemplateData;
use crate::utils::text_normalizer::strip_reasoning_artifacts;

const EVALUATE_INSTRUCTION: &str = "请对报告进行严厉评价";

/// 严厉评价师：计算字数指标并请模型给出评价意见
///
/// 模型只调用一次；调用失败时返回 [`WorkflowError::EvaluationUnavailable`]。
pub struct ReportEvaluator<'a> {
    agent: &'a RoleAgent,
}

impl<'a> ReportEvaluator<'a> {
    pub fn new(agent: &'a RoleAgent) -> Self {
        Self { agent }
    }

    pub fn template_data(report: &Report, metrics: &EvaluationMetrics) -> TemplateData {
        let mut data = TemplateData::new();
        data.insert("report_id".to_string(), report.id.clone());
        data.insert("question".to_string(), report.question.clone());
        data.insert(
            "target_word_limit".to_string(),
            metrics.target_word_limit.to_string(),
        );
        data.insert(
            "reported_word_count".to_string(),
            metrics
                .reported_word_count
                .unwrap_or(metrics.actual_word_count)
                .to_string(),
        );
        data.insert(
            "actual_word_count".to_string(),
            metrics.actual_word_count.to_string(),
        );
        data.insert(
            "word_difference".to_string(),
            metrics.word_difference.to_string(),
        );
        data.insert(
            "word_match_rate".to_string(),
            format!("{:.1}", metrics.word_match_rate),
        );
        data.insert("report_content".to_string(), report.body_text().to_string());
        data
    }

    pub async fn evaluate(
        &self,
        job: &JobContext,
        report: &Report,
    ) -> Result<EvaluationResult, WorkflowError> {
        job.emit(ProgressEvent::EvaluationStart {
            report_id: report.id.clone(),
        })?;

        let metrics = EvaluationMetrics::compute(
            report.word_count(),
            report.word_limit,
            Some(report.word_count()),
        );
        info!(
            "🔍 [{}] 开始评价报告 {}... 目标字数: {} | 实际字数: {}",
            self.agent.display_name(),
            report.id,
            metrics.target_word_limit,
            metrics.actual_word_count
        );

        let data = Self::template_data(report, &metrics);
        let response = self.agent.chat(EVALUATE_INSTRUCTION, &data).await;
        job.ensure_active()?;

        match response {
            Ok(raw) => {
                info!(
                    "✅ [{}] 评价完成，实际字数: {} (匹配度: {:.1}%)",
                    self.agent.display_name(),
                    metrics.actual_word_count,
                    metrics.word_match_rate
                );
                Ok(EvaluationResult {
                    report_id: report.id.clone(),
                    feedback: strip_reasoning_artifacts(&raw),
                    metrics,
                })
            }
            Err(e) => {
                warn!("❌ [{}] 评价失败: {}", self.agent.display_name(), e);
                Err(WorkflowError::EvaluationUnavailable(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleKey;
    use crate::generator::progress::ChannelSink;
    use crate::generator::types::{ReportTask, ResearchData};
    use crate::llm::scripted::ScriptedAgent;
    use std::sync::Arc;

    fn report(body: &str, word_limit: usize) -> Report {
        let task = ReportTask {
            id: "r-eval".to_string(),
            question: "AI教育".to_string(),
            report_type: "analysis".to_string(),
            word_limit,
            research_data: ResearchData::default(),
            provider: None,
        };
        Report::new(&task, body.to_string())
    }

    fn evaluator_agent(script: Arc<ScriptedAgent>) -> RoleAgent {
        let role = RoleKey::ReportEvaluator;
        RoleAgent::new(role.as_str(), &role.default_config(), script)
    }

    #[test]
    fn test_template_data_carries_metrics() {
        let report = report("一二三四五六七八", 10);
        let metrics = EvaluationMetrics::compute(report.word_count(), 10, None);
        let data = ReportEvaluator::template_data(&report, &metrics);

        assert_eq!(data["actual_word_count"], "8");
        assert_eq!(data["reported_word_count"], "8");
        assert_eq!(data["word_difference"], "2");
        assert_eq!(data["word_match_rate"], "80.0");
        assert_eq!(data["report_content"], "一二三四五六七八");
    }

    #[tokio::test]
    async fn test_evaluate_returns_feedback_and_metrics() {
        let script = Arc::new(ScriptedAgent::always(
            "<think>先数一下字数</think>报告偏短，需要补充约两个字的内容。",
        ));
        let agent = evaluator_agent(script.clone());
        let (sink, mut rx) = ChannelSink::new();
        let job = JobContext::detached("job-e", Arc::new(sink));

        let result = ReportEvaluator::new(&agent)
            .evaluate(&job, &report("一二三四五六七八", 10))
            .await
            .unwrap();

        assert_eq!(result.report_id, "r-eval");
        assert_eq!(result.feedback, "报告偏短，需要补充约两个字的内容。");
        assert_eq!(result.metrics.word_difference, 2);
        assert!(script.calls()[0].prompt.contains("一二三四五六七八"));
        assert_eq!(
            rx.try_recv().unwrap(),
            ProgressEvent::EvaluationStart {
                report_id: "r-eval".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_evaluate_failure_is_unavailable() {
        let script = Arc::new(ScriptedAgent::failing("503 Service Unavailable"));
        let agent = evaluator_agent(script.clone());
        let (sink, _rx) = ChannelSink::new();
        let job = JobContext::detached("job-e2", Arc::new(sink));

        let err = ReportEvaluator::new(&agent)
            .evaluate(&job, &report("abc", 3))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::EvaluationUnavailable(_)));
        assert_eq!(script.call_count(), 1);
    }
}
