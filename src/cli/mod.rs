use crate::config::{Config, LLMProvider};
use crate::generator::types::{ReportTask, ResearchData};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

/// 未指定配置文件时在当前目录查找的默认配置
pub const DEFAULT_CONFIG_FILE: &str = "reportmind.toml";

/// ReportMind - 多角色协作的研究报告生成引擎
#[derive(Parser, Debug)]
#[command(name = "report-mind")]
#[command(
    about = "Multi-role research report generator: a chain of role agents drafts the report, an evaluator critiques it and an improver rewrites it toward the exact target word count."
)]
#[command(version)]
pub struct Args {
    /// 任务文件路径（JSON，单个任务对象或任务数组）
    #[arg(short, long)]
    pub task: PathBuf,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出路径，不指定时输出到标准输出
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// LLM Provider (openai, qwen, zhipu, deepseek, moonshot, anthropic, ollama)
    #[arg(long)]
    pub provider: Option<String>,

    /// 覆盖任务中的目标字数
    #[arg(long)]
    pub word_limit: Option<usize>,

    /// 批量任务时最多同时运行的任务数
    #[arg(long, default_value_t = 2)]
    pub max_parallels: usize,

    /// 任务未提供调研数据时使用示例数据
    #[arg(long)]
    pub sample_data: bool,

    /// 演练模式：不访问模型服务，使用预设回复跑通整个流程
    #[arg(long)]
    pub dry_run: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 加载配置：显式路径 > 当前目录的默认配置文件 > 内置默认值
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path))?,
            None => {
                let default_config_path = std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_CONFIG_FILE);
                if default_config_path.exists() {
                    Config::from_file(&default_config_path).with_context(|| {
                        format!("无法读取默认配置文件 {:?}", default_config_path)
                    })?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(provider) = self.provider()? {
            config.llm.provider = provider;
        }
        config.verbose = self.verbose;
        Ok(config)
    }

    /// 解析命令行指定的Provider
    pub fn provider(&self) -> Result<Option<LLMProvider>> {
        self.provider
            .as_deref()
            .map(|name| {
                name.parse::<LLMProvider>()
                    .map_err(|e| anyhow::anyhow!(e))
                    .with_context(|| format!("未知的provider: {}", name))
            })
            .transpose()
    }

    /// 读取任务文件并应用命令行覆盖
    pub fn load_tasks(&self) -> Result<Vec<ReportTask>> {
        read_tasks(&self.task)?
            .into_iter()
            .map(|task| self.apply_overrides(task))
            .collect()
    }

    pub fn apply_overrides(&self, mut task: ReportTask) -> Result<ReportTask> {
        if let Some(word_limit) = self.word_limit {
            task.word_limit = word_limit;
        }
        if let Some(provider) = self.provider()? {
            task.provider = Some(provider);
        }
        if self.sample_data && task.research_data.is_empty() {
            task.research_data = ResearchData::sample(&task.question);
        }
        ensure_word_limit(&task)?;
        Ok(task)
    }
}

/// 从JSON文件读取任务，文件内容可以是单个任务或任务数组
pub fn read_tasks(path: &Path) -> Result<Vec<ReportTask>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取任务文件 {:?}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("任务文件格式错误 {:?}", path))?;

    let tasks = if value.is_array() {
        serde_json::from_value::<Vec<ReportTask>>(value)
    } else {
        serde_json::from_value::<ReportTask>(value).map(|task| vec![task])
    };
    let tasks = tasks.with_context(|| format!("任务文件格式错误 {:?}", path))?;
    if tasks.is_empty() {
        anyhow::bail!("任务文件中没有任务 {:?}", path);
    }
    for task in &tasks {
        ensure_word_limit(task).with_context(|| format!("任务文件格式错误 {:?}", path))?;
    }
    Ok(tasks)
}

/// 目标字数必须为正整数
fn ensure_word_limit(task: &ReportTask) -> Result<()> {
    if task.word_limit == 0 {
        anyhow::bail!("任务 {} 的目标字数必须大于0", task.id);
    }
    Ok(())
}
