use anyhow::{Context, Result};
use clap::Parser;
use report_mind::cli::Args;
use report_mind::generator::progress::{CancelRegistry, CompositeSink, LogSink, ProgressSink};
use report_mind::generator::tasks::TaskBoard;
use report_mind::llm::agent::{AgentFactory, LLMAgentFactory};
use report_mind::llm::scripted::ScriptedAgentFactory;
use report_mind::utils::threads::do_parallel_with_limit;
use report_mind::{Report, WorkflowController};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.load_config()?;
    let tasks = args.load_tasks()?;

    let factory: Arc<dyn AgentFactory> = if args.dry_run {
        info!("🧪 演练模式：使用预设回复，不访问模型服务");
        Arc::new(ScriptedAgentFactory::dry_run(config.roles.clone()))
    } else {
        let factory = LLMAgentFactory::new(config.clone());
        // 启动时检查任务用到的每个模型连接
        let providers: HashSet<_> = tasks
            .iter()
            .map(|task| task.provider.unwrap_or(config.llm.provider))
            .collect();
        for provider in providers {
            factory.client(provider)?.check_connection().await?;
        }
        Arc::new(factory)
    };

    let board = Arc::new(TaskBoard::new());
    let sink: Arc<dyn ProgressSink> = Arc::new(
        CompositeSink::new()
            .with(Arc::new(LogSink))
            .with(board.clone()),
    );
    let controller = WorkflowController::new(factory, config.workflow.clone(), config.llm.provider);

    let cancel_registry = Arc::new(CancelRegistry::new());
    tokio::spawn(cancel_on_ctrl_c(
        cancel_registry.clone(),
        tasks.iter().map(|task| task.id.clone()).collect(),
    ));

    let runs: Vec<_> = tasks
        .iter()
        .map(|task| {
            let cancel_registry = cancel_registry.clone();
            let sink = sink.clone();
            let (controller, board) = (&controller, &board);
            async move {
                controller
                    .run_tracked(task, board, sink, cancel_registry)
                    .await
                    .inspect_err(|e| {
                        if !e.is_cancelled() {
                            error!("❌ 任务 {} 生成失败: {}", task.id, e);
                        }
                    })
            }
        })
        .collect();
    let results = do_parallel_with_limit(runs, args.max_parallels).await;

    let cancelled = results
        .iter()
        .filter(|r| r.as_ref().is_err_and(|e| e.is_cancelled()))
        .count();
    let failed = results.iter().filter(|r| r.is_err()).count() - cancelled;
    let reports: Vec<Report> = results.into_iter().filter_map(Result::ok).collect();
    if failed > 0 {
        error!("❌ {} 个任务失败，共 {} 个任务", failed, tasks.len());
    }
    if cancelled > 0 {
        warn!("⏹️ {} 个任务已取消", cancelled);
    }

    if !reports.is_empty() {
        let json = if tasks.len() == 1 {
            serde_json::to_string_pretty(&reports[0])
        } else {
            serde_json::to_string_pretty(&reports)
        }
        .context("Failed to serialize report")?;

        match &args.output {
            Some(path) => {
                std::fs::write(path, json)
                    .with_context(|| format!("无法写入输出文件 {:?}", path))?;
                info!("💾 报告已保存到 {:?}", path);
            }
            None => println!("{}", json),
        }
    }

    if failed + cancelled > 0 {
        anyhow::bail!("{} 个任务失败，{} 个任务已取消", failed, cancelled);
    }
    Ok(())
}

/// 第一次 Ctrl-C 取消全部任务，第二次直接退出
async fn cancel_on_ctrl_c(cancel_registry: Arc<CancelRegistry>, task_ids: Vec<String>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("⏹️ 收到中断信号，正在取消 {} 个任务，再次按下 Ctrl-C 强制退出", task_ids.len());
    for task_id in &task_ids {
        cancel_registry.cancel(task_id);
    }
    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(130);
    }
}
