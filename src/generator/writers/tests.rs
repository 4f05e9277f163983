use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Duration, Instant};

use super::*;
use crate::config::{RoleConfig, RoleKey, WorkflowConfig};
use crate::generator::progress::ChannelSink;
use crate::generator::types::{ResearchCategory, ResearchEntry};
use crate::llm::scripted::ScriptedAgent;

fn agent_for(role: RoleKey, script: ScriptedAgent) -> (RoleAgent, Arc<ScriptedAgent>) {
    let script = Arc::new(script);
    let agent = RoleAgent::new(role.as_str(), &role.default_config(), script.clone());
    (agent, script)
}

fn job() -> (JobContext, UnboundedReceiver<ProgressEvent>) {
    let (sink, rx) = ChannelSink::new();
    (JobContext::detached("job-w", Arc::new(sink)), rx)
}

fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn section() -> SectionContext {
    SectionContext::new("可解释AI在医疗中的应用").with_conclusion("可解释AI是医疗落地的关键。")
}

#[test]
fn test_conclusion_template_defaults_for_empty_data() {
    let data = ConclusionGenerator.template_data(&ResearchData::default(), &section());

    assert_eq!(data["background"], "No background data available");
    assert_eq!(data["statistics"], "No statistics available");
    assert_eq!(data["challenges"], "No challenges identified");
    assert_eq!(data["expert_opinions"], "No expert opinions available");
    assert_eq!(data["question"], "可解释AI在医疗中的应用");
}

#[test]
fn test_conclusion_template_formats_entries() {
    let research = ResearchData::sample("可解释AI");
    let data = ConclusionGenerator.template_data(&research, &section());

    assert_eq!(
        data["statistics"],
        "全球市场规模: 850亿元\nAccuracy loss after explanation: 8.7%"
    );
    assert_eq!(
        data["expert_opinions"],
        "张教授 (人工智能研究院): 需要平衡创新与风险"
    );
}

#[test]
fn test_section_roles_project_research_data() {
    let research = ResearchData::sample("可解释AI");
    let mut ctx = section();
    ctx.advance("前一部分的正文");

    let policy = PolicyAnalyst.template_data(&research, &ctx);
    assert_eq!(policy["context"], "前一部分的正文");
    assert_eq!(policy["conclusion"], "可解释AI是医疗落地的关键。");
    assert!(policy["background_facts"].starts_with("可解释AI技术"));

    let market = MarketResearcher.template_data(&research, &ctx);
    assert_eq!(
        market["statistics"].lines().next(),
        Some("全球市场规模: 850亿元 (市场研究报告)")
    );

    let case = CaseSpecialist.template_data(&research, &ctx);
    assert_eq!(
        case["case_studies"],
        "某三甲医院: 引入SHAP解释的辅助诊断系统 → 诊断效率提升30% (案例研究)"
    );

    let technical = TechnicalInterpreter.template_data(&research, &ctx);
    assert_eq!(technical["methods"], "SHAP");
    assert_eq!(technical["accuracy_metrics"], "8.7%");

    let societal = SocietalObserver.template_data(&research, &ctx);
    assert_eq!(
        societal["social_challenges"],
        "Cultural resistance in education and healthcare sectors"
    );
}

#[test]
fn test_technical_and_societal_defaults() {
    let ctx = section();
    let mut research = ResearchData::default();
    research.case_studies.push(ResearchEntry::new(
        [("implementation", "LIME and Counterfactual probes")],
        "内部评估",
    ));

    let technical = TechnicalInterpreter.template_data(&research, &ctx);
    assert_eq!(technical["methods"], "LIME, counterfactual explanations");
    assert_eq!(technical["accuracy_metrics"], "8.7%");

    let technical = TechnicalInterpreter.template_data(&ResearchData::default(), &ctx);
    assert_eq!(technical["methods"], "SHAP, LIME, counterfactuals");

    let societal = SocietalObserver.template_data(&ResearchData::default(), &ctx);
    assert_eq!(
        societal["social_challenges"],
        "Resistance in education and healthcare sectors"
    );
}

#[test]
fn test_generic_writer_projection() {
    let writer = GenericWriter::new("policy_analyst", "撰写监管综述")
        .section("综述部分")
        .project(
            FieldProjection::new("background_facts", ResearchCategory::Statistics)
                .columns(&["metric", "value"])
                .with_source(),
        );
    let data = writer.template_data(&ResearchData::sample("AI"), &section());

    assert_eq!(
        data["background_facts"].lines().next(),
        Some("全球市场规模: 850亿元 (市场研究报告)")
    );
    assert_eq!(writer.section_name(), Some("综述部分"));
    assert_eq!(writer.fallback_text(), "撰写监管综述因技术问题暂时不可用。");
}

#[tokio::test(start_paused = true)]
async fn test_policy_exhaustion_returns_placeholder_after_backoff() {
    let (agent, script) = agent_for(RoleKey::PolicyAnalyst, ScriptedAgent::always(""));
    let (job, mut rx) = job();
    let config = WorkflowConfig::default();

    let started = Instant::now();
    let text = PolicyAnalyst
        .write(&job, &agent, &config, &ResearchData::default(), &section())
        .await
        .unwrap();

    assert_eq!(text, "政策框架分析因技术问题暂时不可用。");
    assert_eq!(script.call_count(), 3);
    // 第1、2次失败后分别等待 2 秒和 4 秒
    assert_eq!(started.elapsed(), Duration::from_secs(6));

    let events = drain(&mut rx);
    let attempts = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Attempt { .. }))
        .count();
    let errors = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::StageError { .. }))
        .count();
    assert_eq!(attempts, 3);
    assert_eq!(errors, 3);
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::SectionComplete { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_retry_then_success() {
    let script = ScriptedAgent::new()
        .then_fail("connection reset")
        .then_reply("## 市场\n\n**市场规模**持续扩大，采纳率稳步上升。");
    let (agent, script) = agent_for(RoleKey::MarketResearcher, script);
    let (job, mut rx) = job();

    let started = Instant::now();
    let text = MarketResearcher
        .write(
            &job,
            &agent,
            &WorkflowConfig::default(),
            &ResearchData::default(),
            &section(),
        )
        .await
        .unwrap();

    assert_eq!(text, "市场 市场规模持续扩大，采纳率稳步上升。");
    assert_eq!(script.call_count(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(2));

    let events = drain(&mut rx);
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::SectionComplete { section, .. }) if section == "市场部分"
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgressEvent::StageSuccess { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_missing_parameter_is_not_retried() {
    let script = Arc::new(ScriptedAgent::always("不会被调用的回复内容"));
    let role = RoleConfig {
        name: "政策分析师".to_string(),
        system_prompt: String::new(),
        prompt_template: "{{question}} {{undefined_field}}".to_string(),
        temperature: None,
        max_tokens: None,
    };
    let agent = RoleAgent::new("policy_analyst", &role, script.clone());
    let (job, mut rx) = job();

    let started = Instant::now();
    let text = PolicyAnalyst
        .write(
            &job,
            &agent,
            &WorkflowConfig::default(),
            &ResearchData::default(),
            &section(),
        )
        .await
        .unwrap();

    assert_eq!(text, PolicyAnalyst.fallback_text());
    assert_eq!(script.call_count(), 0);
    assert_eq!(started.elapsed(), Duration::ZERO);
    let attempts = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Attempt { .. }))
        .count();
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_cancelled_job_propagates_without_invocation() {
    let (agent, script) = agent_for(RoleKey::CaseSpecialist, ScriptedAgent::always("案例内容足够长。"));
    let (sink, mut rx) = ChannelSink::new();
    let job = JobContext::new("job-x", Arc::new(sink), Arc::new(|_: &str| true));

    let err = CaseSpecialist
        .write(
            &job,
            &agent,
            &WorkflowConfig::default(),
            &ResearchData::default(),
            &section(),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(script.call_count(), 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_short_conclusion_uses_default() {
    let (agent, script) = agent_for(
        RoleKey::ConclusionGenerator,
        ScriptedAgent::always("结论还不够长"),
    );
    let (job, _rx) = job();

    let text = ConclusionGenerator
        .write(
            &job,
            &agent,
            &WorkflowConfig::default(),
            &ResearchData::default(),
            &SectionContext::new("AI"),
        )
        .await
        .unwrap();

    assert_eq!(text, DEFAULT_CONCLUSION);
    assert_eq!(script.call_count(), 1);
}

#[tokio::test]
async fn test_conclusion_strips_reasoning_and_markdown() {
    let (agent, _script) = agent_for(
        RoleKey::ConclusionGenerator,
        ScriptedAgent::always("<think>用户要求一句话结论</think>**可解释AI**将成为医疗AI规模化落地的前提条件。"),
    );
    let (job, _rx) = job();

    let text = ConclusionGenerator
        .write(
            &job,
            &agent,
            &WorkflowConfig::default(),
            &ResearchData::default(),
            &SectionContext::new("AI"),
        )
        .await
        .unwrap();

    assert_eq!(text, "可解释AI将成为医疗AI规模化落地的前提条件。");
}

#[test]
fn test_backoff_delay_saturates() {
    assert_eq!(backoff_delay(2, 1), Duration::from_secs(2));
    assert_eq!(backoff_delay(2, 2), Duration::from_secs(4));
    assert_eq!(backoff_delay(u64::MAX, 3), Duration::from_secs(u64::MAX));
    assert_eq!(backoff_delay(1_000_000, 10), Duration::from_secs(u64::MAX));
}
