use std::sync::{Arc, Mutex};

use report_mind::config::{LLMProvider, WorkflowConfig};
use report_mind::generator::progress::{
    CancelRegistry, DeliveryError, NeverCancelled, ProgressEvent, ProgressHub, ProgressSink,
};
use report_mind::generator::types::{ReportTask, ResearchData};
use report_mind::generator::WorkflowController;
use report_mind::llm::scripted::{ScriptedAgent, ScriptedAgentFactory};
use report_mind::utils::text_normalizer::count_words;

const CONCLUSION: &str = "人工智能正在重塑教育评价体系的基本形态。";

fn words(n: usize) -> String {
    vec!["alpha"; n].join(" ")
}

fn task(id: &str, word_limit: usize) -> ReportTask {
    ReportTask {
        id: id.to_string(),
        question: "人工智能对教育评价的影响".to_string(),
        report_type: "analysis".to_string(),
        word_limit,
        research_data: ResearchData::sample("人工智能教育"),
        provider: None,
    }
}

fn controller(factory: Arc<ScriptedAgentFactory>) -> WorkflowController {
    WorkflowController::new(factory, WorkflowConfig::default(), LLMProvider::Ollama)
}

/// 记录全部事件；看到指定角色成功后取消任务
struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
    cancel_after: Option<(String, Arc<CancelRegistry>)>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    fn cancelling_after(role: &str, registry: Arc<CancelRegistry>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            cancel_after: Some((role.to_string(), registry)),
        }
    }

    fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn deliver(&self, job_id: &str, event: &ProgressEvent) -> Result<(), DeliveryError> {
        self.events.lock().unwrap().push(event.clone());
        if let (Some((trigger, registry)), ProgressEvent::StageSuccess { role, .. }) =
            (&self.cancel_after, event)
            && role == trigger
        {
            registry.cancel(job_id);
        }
        Ok(())
    }
}

fn count_events(events: &[ProgressEvent], pred: impl Fn(&ProgressEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[tokio::test(start_paused = true)]
async fn test_full_workflow_reaches_exact_word_count() {
    let factory = Arc::new(
        ScriptedAgentFactory::new(ScriptedAgent::always(words(500)))
            .script("report_evaluator", ScriptedAgent::always("篇幅远超目标，需要大幅压缩。"))
            .script("report_improver", ScriptedAgent::always(words(500))),
    );
    let sink = Arc::new(RecordingSink::new());

    let report = controller(factory.clone())
        .run_full_workflow(&task("e2e", 500), sink.clone(), Arc::new(NeverCancelled))
        .await
        .unwrap();

    assert!(report.improved());
    assert_eq!(report.word_count(), 500);
    assert_eq!(count_words(report.body_text()), 500);

    let events = sink.events();
    assert!(matches!(
        events.first(),
        Some(ProgressEvent::StageStart { role, .. }) if role == "结论提出者"
    ));
    assert_eq!(
        count_events(&events, |e| matches!(e, ProgressEvent::SectionComplete { .. })),
        5
    );
    assert_eq!(
        count_events(&events, |e| matches!(e, ProgressEvent::EvaluationStart { .. })),
        1
    );
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::ImprovementSuccess {
            word_count: 500,
            target: 500,
            ..
        })
    ));

    // 六个写作角色 + 评价 + 改进
    assert_eq!(factory.requests().len(), 8);
}

#[tokio::test]
async fn test_cancellation_stops_remaining_stages() {
    let factory = Arc::new(
        ScriptedAgentFactory::new(ScriptedAgent::always("各部分的分析正文内容。"))
            .script("conclusion_generator", ScriptedAgent::always(CONCLUSION)),
    );
    let registry = Arc::new(CancelRegistry::new());
    let sink = Arc::new(RecordingSink::cancelling_after("市场研究员", registry.clone()));

    let err = controller(factory.clone())
        .run_full_workflow(&task("cancel-me", 300), sink.clone(), registry.clone())
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    let called_roles: Vec<String> = factory.requests().into_iter().map(|(_, r)| r).collect();
    assert_eq!(
        called_roles,
        vec!["conclusion_generator", "policy_analyst", "market_researcher"]
    );

    let events = sink.events();
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::StageSuccess { role, .. }) if role == "市场研究员"
    ));
    assert!(!events.iter().any(|e| matches!(
        e,
        ProgressEvent::StageStart { role, .. } if role == "案例专家"
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProgressEvent::EvaluationStart { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_policy_failure_does_not_stop_pipeline() {
    let factory = Arc::new(
        ScriptedAgentFactory::new(ScriptedAgent::always("各部分的分析正文内容。"))
            .script("conclusion_generator", ScriptedAgent::always(CONCLUSION))
            .script("policy_analyst", ScriptedAgent::failing("connection refused"))
            .script("report_evaluator", ScriptedAgent::failing("503")),
    );
    let sink = Arc::new(RecordingSink::new());

    let report = controller(factory.clone())
        .run_full_workflow(&task("policy-down", 300), sink.clone(), Arc::new(NeverCancelled))
        .await
        .unwrap();

    assert!(report.body_text().contains("政策框架分析因技术问题暂时不可用。"));
    assert!(!report.improved());
    assert_eq!(factory.script_for("policy_analyst").call_count(), 3);

    // 兜底文本成为下一阶段的前文
    let market_calls = factory.script_for("market_researcher").calls();
    assert!(market_calls
        .iter()
        .any(|c| c.prompt.contains("政策框架分析因技术问题暂时不可用。")));

    let events = sink.events();
    assert_eq!(
        count_events(&events, |e| matches!(e, ProgressEvent::SectionComplete { .. })),
        4
    );
    assert_eq!(
        count_events(&events, |e| matches!(
            e,
            ProgressEvent::StageError { role, .. } if role == "政策分析师"
        )),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn test_improver_keeps_closest_candidate() {
    let factory = Arc::new(
        ScriptedAgentFactory::new(ScriptedAgent::always("各部分的分析正文内容。"))
            .script("conclusion_generator", ScriptedAgent::always(CONCLUSION))
            .script("report_evaluator", ScriptedAgent::always("篇幅不足，需要扩写。"))
            .script(
                "report_improver",
                ScriptedAgent::new()
                    .then_reply(words(450))
                    .then_reply(words(490))
                    .then_reply(words(520)),
            ),
    );

    let report = controller(factory.clone())
        .run_full_workflow(
            &task("closest", 500),
            Arc::new(RecordingSink::new()),
            Arc::new(NeverCancelled),
        )
        .await
        .unwrap();

    assert!(!report.improved());
    assert_eq!(report.word_count(), 490);
    assert_eq!(factory.script_for("report_improver").call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_jobs_receive_only_their_own_events() {
    let factory = Arc::new(
        ScriptedAgentFactory::new(ScriptedAgent::always(words(50)))
            .script("report_evaluator", ScriptedAgent::always("篇幅过长。"))
            .script("report_improver", ScriptedAgent::always(words(120))),
    );
    let controller = controller(factory);
    let hub = Arc::new(ProgressHub::new());
    let mut rx_a = hub.subscribe("job-a");
    let mut rx_b = hub.subscribe("job-b");

    let task_a = task("job-a", 120);
    let task_b = task("job-b", 120);
    let (a, b) = tokio::join!(
        controller.run_full_workflow(&task_a, hub.clone(), Arc::new(NeverCancelled)),
        controller.run_full_workflow(&task_b, hub.clone(), Arc::new(NeverCancelled)),
    );
    assert_eq!(a.unwrap().id, "job-a");
    assert_eq!(b.unwrap().id, "job-b");

    for (rx, job_id) in [(&mut rx_a, "job-a"), (&mut rx_b, "job-b")] {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            count_events(&events, |e| matches!(e, ProgressEvent::StageStart { .. })),
            6
        );
        assert_eq!(
            count_events(&events, |e| matches!(e, ProgressEvent::SectionComplete { .. })),
            5
        );
        assert!(events.iter().all(|e| match e {
            ProgressEvent::EvaluationStart { report_id }
            | ProgressEvent::ImprovementStart { report_id, .. }
            | ProgressEvent::ImprovementSuccess { report_id, .. } => report_id == job_id,
            _ => true,
        }));
    }
}
