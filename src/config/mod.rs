use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

mod roles;

pub use roles::{RoleKey, default_roles};

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "qwen")]
    Qwen,
    #[serde(rename = "zhipu")]
    Zhipu,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    #[default]
    Ollama,
}

impl LLMProvider {
    pub const ALL: [LLMProvider; 7] = [
        LLMProvider::OpenAI,
        LLMProvider::Qwen,
        LLMProvider::Zhipu,
        LLMProvider::DeepSeek,
        LLMProvider::Moonshot,
        LLMProvider::Anthropic,
        LLMProvider::Ollama,
    ];
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Qwen => write!(f, "qwen"),
            LLMProvider::Zhipu => write!(f, "zhipu"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "qwen" | "dashscope" | "bailian" => Ok(LLMProvider::Qwen),
            "zhipu" | "glm" => Ok(LLMProvider::Zhipu),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// LLM模型配置
    pub llm: LLMConfig,

    /// 工作流配置
    pub workflow: WorkflowConfig,

    /// 角色配置，key为角色标识（如 policy_analyst）
    pub roles: HashMap<String, RoleConfig>,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// 默认使用的Provider
    pub provider: LLMProvider,

    /// 各Provider的服务地址、密钥与模型，key为Provider名称
    pub endpoints: BTreeMap<String, ProviderEndpoint>,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 单次调用超时时间（秒）
    pub timeout_seconds: u64,
}

/// 服务提供商连接配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderEndpoint {
    /// API基地址
    pub api_base_url: String,

    /// API KEY（本地服务可为空）
    #[serde(default)]
    pub api_key: String,

    /// 模型名称
    pub model: String,
}

impl ProviderEndpoint {
    /// Provider的内置默认连接配置
    pub fn default_for(provider: LLMProvider) -> Self {
        let env_key = |name: &str| std::env::var(name).unwrap_or_default();
        match provider {
            LLMProvider::OpenAI => Self {
                api_base_url: "https://api.openai.com/v1".to_string(),
                api_key: env_key("REPORTMIND_LLM_API_KEY"),
                model: "gpt-4o-mini".to_string(),
            },
            LLMProvider::Qwen => Self {
                api_base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
                api_key: env_key("DASHSCOPE_API_KEY"),
                model: "qwen3-0.6b".to_string(),
            },
            LLMProvider::Zhipu => Self {
                api_base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
                api_key: env_key("ZHIPU_API_KEY"),
                model: "glm-4-air".to_string(),
            },
            LLMProvider::DeepSeek => Self {
                api_base_url: "https://api.deepseek.com".to_string(),
                api_key: env_key("REPORTMIND_LLM_API_KEY"),
                model: "deepseek-chat".to_string(),
            },
            LLMProvider::Moonshot => Self {
                api_base_url: "https://api.moonshot.cn/v1".to_string(),
                api_key: env_key("REPORTMIND_LLM_API_KEY"),
                model: "moonshot-v1-8k".to_string(),
            },
            LLMProvider::Anthropic => Self {
                api_base_url: "https://api.anthropic.com".to_string(),
                api_key: env_key("REPORTMIND_LLM_API_KEY"),
                model: "claude-3-5-haiku-latest".to_string(),
            },
            LLMProvider::Ollama => Self {
                api_base_url: "http://localhost:11434".to_string(),
                api_key: String::new(),
                model: "deepseek-r1:32b".to_string(),
            },
        }
    }
}

impl LLMConfig {
    /// 获取Provider的连接配置，未显式配置时使用内置默认值
    pub fn endpoint(&self, provider: LLMProvider) -> ProviderEndpoint {
        self.endpoints
            .get(&provider.to_string())
            .cloned()
            .unwrap_or_else(|| ProviderEndpoint::default_for(provider))
    }
}

/// 工作流配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// 每个阶段的最大尝试次数
    pub max_attempts: u32,

    /// 指数退避的底数（秒），第N次失败后等待 base^N 秒
    pub backoff_base_secs: u64,

    /// 改进阶段的最大尝试次数
    pub improvement_attempts: u32,

    /// 改进尝试之间的固定间隔（秒）
    pub improvement_delay_secs: u64,

    /// 清理后内容的最小字符数
    pub min_content_chars: usize,

    /// 核心结论的最小字符数
    pub min_conclusion_chars: usize,
}

/// 角色配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RoleConfig {
    /// 角色显示名称
    pub name: String,

    /// 系统提示词
    #[serde(default)]
    pub system_prompt: String,

    /// 用户提示词模板
    pub prompt_template: String,

    /// 角色级温度（覆盖全局设置）
    #[serde(default)]
    pub temperature: Option<f64>,

    /// 角色级最大tokens（覆盖全局设置）
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        Self::from_toml_str(&content)
    }

    /// 从TOML文本解析配置，文件中未出现的内置角色会被补齐
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse config file")?;
        for (key, role) in default_roles() {
            config.roles.entry(key).or_insert(role);
        }
        Ok(config)
    }

    /// 获取角色配置
    pub fn role(&self, role_key: &str) -> Option<&RoleConfig> {
        self.roles.get(role_key)
    }

    /// 列出所有可用角色
    pub fn list_available_roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.roles.keys().cloned().collect();
        roles.sort();
        roles
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LLMConfig::default(),
            workflow: WorkflowConfig::default(),
            roles: default_roles(),
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            endpoints: BTreeMap::new(),
            max_tokens: 8192,
            temperature: 0.7,
            timeout_seconds: 300,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 2,
            improvement_attempts: 3,
            improvement_delay_secs: 2,
            min_content_chars: 5,
            min_conclusion_chars: 10,
        }
    }
}
