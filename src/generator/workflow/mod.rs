use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{LLMProvider, RoleKey, WorkflowConfig};
use crate::generator::context::JobContext;
use crate::generator::error::WorkflowError;
use crate::generator::evaluator::ReportEvaluator;
use crate::generator::improver::ReportImprover;
use crate::generator::progress::{CancelChecker, CancelRegistry, ProgressSink};
use crate::generator::tasks::TaskBoard;
use crate::generator::types::{Report, ReportTask, SectionContext};
use crate::generator::writers::{
    CaseSpecialist, ConclusionGenerator, MarketResearcher, PolicyAnalyst, RoleWriter,
    SocietalObserver, TechnicalInterpreter,
};
use crate::llm::agent::{AgentFactory, RoleAgent};
use crate::utils::text_normalizer::{strip_markdown, strip_reasoning_artifacts};

/// 核心结论之后依次执行的章节角色，顺序即报告中的章节顺序
const SECTION_WRITERS: [&dyn RoleWriter; 5] = [
    &PolicyAnalyst,
    &MarketResearcher,
    &CaseSpecialist,
    &TechnicalInterpreter,
    &SocietalObserver,
];

/// 报告生成工作流控制器
///
/// 控制器本身不持有任务状态，同一个控制器可以并发服务多个任务。
pub struct WorkflowController {
    factory: Arc<dyn AgentFactory>,
    config: WorkflowConfig,
    default_provider: LLMProvider,
}

impl WorkflowController {
    pub fn new(
        factory: Arc<dyn AgentFactory>,
        config: WorkflowConfig,
        default_provider: LLMProvider,
    ) -> Self {
        Self {
            factory,
            config,
            default_provider,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// 任务指定 > 上下文指定 > 控制器默认
    fn resolve_provider(&self, job: &JobContext, task_provider: Option<LLMProvider>) -> LLMProvider {
        task_provider
            .or_else(|| job.provider())
            .unwrap_or(self.default_provider)
    }

    fn agent(&self, provider: LLMProvider, role_key: &str) -> Result<Arc<RoleAgent>, WorkflowError> {
        self.factory
            .create_role_agent(provider, role_key)
            .map_err(|e| WorkflowError::Agent(format!("{:#}", e)))
    }

    /// 依次执行六个写作阶段并组装报告
    pub async fn generate_single_report(
        &self,
        job: &JobContext,
        task: &ReportTask,
    ) -> Result<Report, WorkflowError> {
        job.ensure_active()?;
        let provider = self.resolve_provider(job, task.provider);
        let research = &task.research_data;
        info!(
            "🚀 开始生成报告 {} (Provider: {}, 目标字数: {})",
            task.id, provider, task.word_limit
        );

        let conclusion_agent = self.agent(provider, ConclusionGenerator.role_key())?;
        let conclusion = ConclusionGenerator
            .write(
                job,
                &conclusion_agent,
                &self.config,
                research,
                &SectionContext::new(&task.question),
            )
            .await?;
        info!("💡 核心结论: {}", conclusion);

        let mut section = SectionContext::new(&task.question).with_conclusion(&conclusion);
        let mut sections = Vec::with_capacity(SECTION_WRITERS.len() + 1);
        sections.push(conclusion.clone());
        for writer in SECTION_WRITERS {
            job.ensure_active()?;
            let agent = self.agent(provider, writer.role_key())?;
            let text = writer
                .write(job, &agent, &self.config, research, &section)
                .await?;
            section.advance(&text);
            sections.push(text);
        }

        job.ensure_active()?;
        let report = Report::new(task, assemble(&sections));
        info!(
            "📄 报告 {} 初稿完成: {} 个字 (目标: {})",
            report.id,
            report.word_count(),
            report.word_limit
        );
        Ok(report)
    }

    /// 评价报告，必要时进入改进循环
    ///
    /// 评价失败时原样返回报告；字数已精确匹配时跳过改进。
    pub async fn evaluate_and_improve(
        &self,
        job: &JobContext,
        report: Report,
        provider: Option<LLMProvider>,
    ) -> Result<Report, WorkflowError> {
        job.ensure_active()?;
        let provider = self.resolve_provider(job, provider);

        let evaluator_agent = self.agent(provider, RoleKey::ReportEvaluator.as_str())?;
        let evaluation = match ReportEvaluator::new(&evaluator_agent)
            .evaluate(job, &report)
            .await
        {
            Ok(evaluation) => evaluation,
            Err(WorkflowError::EvaluationUnavailable(reason)) => {
                warn!("⚠️ 评价不可用，保留原报告: {}", reason);
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        if evaluation.metrics.is_exact_match() {
            info!("🎯 报告 {} 字数已精确匹配，跳过改进", report.id);
            return Ok(report);
        }

        job.ensure_active()?;
        let improver_agent = self.agent(provider, RoleKey::ReportImprover.as_str())?;
        ReportImprover::new(&improver_agent, &self.config)
            .improve(job, &report, &evaluation)
            .await
    }

    /// 完整流程：生成 → 评价 → 改进
    pub async fn run_full_workflow(
        &self,
        task: &ReportTask,
        sink: Arc<dyn ProgressSink>,
        cancel_checker: Arc<dyn CancelChecker>,
    ) -> Result<Report, WorkflowError> {
        let job = JobContext::new(&task.id, sink, cancel_checker).with_provider(task.provider);
        let started = Instant::now();

        let result = async {
            let report = self.generate_single_report(&job, task).await?;
            self.evaluate_and_improve(&job, report, task.provider).await
        }
        .await;

        match &result {
            Ok(report) => info!(
                "✅ 任务 {} 完成，耗时 {:.2} 秒，最终字数: {} (目标: {})",
                task.id,
                started.elapsed().as_secs_f64(),
                report.word_count(),
                report.word_limit
            ),
            Err(e) if e.is_cancelled() => warn!(
                "⏹️ 任务 {} 已取消，耗时 {:.2} 秒",
                task.id,
                started.elapsed().as_secs_f64()
            ),
            Err(e) => warn!(
                "❌ 任务 {} 失败，耗时 {:.2} 秒: {}",
                task.id,
                started.elapsed().as_secs_f64(),
                e
            ),
        }
        result
    }

    /// 在任务看板上登记并运行任务，取消与失败分别记录；结束后清除取消标记
    pub async fn run_tracked(
        &self,
        task: &ReportTask,
        board: &TaskBoard,
        sink: Arc<dyn ProgressSink>,
        cancel_registry: Arc<CancelRegistry>,
    ) -> Result<Report, WorkflowError> {
        board.create(&task.id);
        board.start(&task.id);

        let result = self
            .run_full_workflow(task, sink, cancel_registry.clone())
            .await;
        match &result {
            Ok(_) => board.complete(&task.id),
            Err(e) if e.is_cancelled() => board.cancel(&task.id),
            Err(e) => board.fail(&task.id, &e.to_string()),
        };
        cancel_registry.clear(&task.id);
        result
    }
}

/// 以空行拼接核心结论与各章节，并清理思考痕迹与Markdown格式
pub fn assemble(sections: &[String]) -> String {
    strip_markdown(&strip_reasoning_artifacts(&sections.join("\n\n")))
}
