//! 角色Agent与Agent工厂

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{Config, LLMProvider, RoleConfig};
use crate::llm::client::{InvokeParams, LLMClient};
use crate::llm::error::{AgentError, ProviderError};
use crate::llm::template::{PromptTemplate, TemplateData, TemplateError};

/// 模型调用能力：渲染好的提示词 + 可选系统提示词 -> 文本
///
/// 实现方只做单次调用，重试策略由调用方决定。
#[async_trait]
pub trait AgentCapability: Send + Sync {
    async fn invoke(&self, prompt: &str, system_prompt: Option<&str>)
    -> Result<String, ProviderError>;
}

/// 基于 [`LLMClient`] 的模型调用能力
pub struct LLMCapability {
    client: Arc<LLMClient>,
    params: InvokeParams,
}

impl LLMCapability {
    pub fn new(client: Arc<LLMClient>, params: InvokeParams) -> Self {
        Self { client, params }
    }
}

#[async_trait]
impl AgentCapability for LLMCapability {
    async fn invoke(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.client
            .invoke(system_prompt.unwrap_or_default(), prompt, self.params)
            .await
    }
}

/// 角色Agent：角色配置（系统提示词、提示词模板）与模型调用能力的绑定
pub struct RoleAgent {
    role_key: String,
    display_name: String,
    system_prompt: String,
    template: PromptTemplate,
    capability: Arc<dyn AgentCapability>,
}

impl RoleAgent {
    pub fn new(role_key: &str, role: &RoleConfig, capability: Arc<dyn AgentCapability>) -> Self {
        Self {
            role_key: role_key.to_string(),
            display_name: role.name.clone(),
            system_prompt: role.system_prompt.clone(),
            template: PromptTemplate::new(role.prompt_template.clone()),
            capability,
        }
    }

    pub fn role_key(&self) -> &str {
        &self.role_key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// 渲染提示词，`message` 总会作为模板参数提供，`question` 缺省时也取 `message`
    pub fn render(&self, message: &str, data: &TemplateData) -> Result<String, TemplateError> {
        let mut data = data.clone();
        data.insert("message".to_string(), message.to_string());
        data.entry("question".to_string())
            .or_insert_with(|| message.to_string());
        self.template.render(&data)
    }

    /// 渲染并调用模型，返回原始回复
    pub async fn chat(&self, message: &str, data: &TemplateData) -> Result<String, AgentError> {
        let prompt = self.render(message, data)?;
        debug!(
            "💬 [{}] 发送提示词，长度 {} 字符",
            self.display_name,
            prompt.chars().count()
        );

        let system_prompt = if self.system_prompt.trim().is_empty() {
            None
        } else {
            Some(self.system_prompt.as_str())
        };
        let content = self.capability.invoke(&prompt, system_prompt).await?;
        Ok(content)
    }
}

/// Agent工厂：按 (Provider, 角色) 创建角色Agent
pub trait AgentFactory: Send + Sync {
    fn create_role_agent(&self, provider: LLMProvider, role_key: &str) -> Result<Arc<RoleAgent>>;
}

/// 基于配置的Agent工厂
///
/// 每个Provider的客户端、每个 (Provider, 角色) 的Agent都只构造一次，
/// 之后在并发任务间共享。
pub struct LLMAgentFactory {
    config: Config,
    clients: DashMap<LLMProvider, Arc<LLMClient>>,
    agents: DashMap<(LLMProvider, String), Arc<RoleAgent>>,
}

impl LLMAgentFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clients: DashMap::new(),
            agents: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 获取（必要时创建）Provider客户端
    pub fn client(&self, provider: LLMProvider) -> Result<Arc<LLMClient>> {
        let entry = self.clients.entry(provider).or_try_insert_with(|| {
            info!("🔌 创建 {} 客户端", provider);
            LLMClient::new(&self.config.llm, provider).map(Arc::new)
        })?;
        Ok(entry.value().clone())
    }
}

impl AgentFactory for LLMAgentFactory {
    fn create_role_agent(&self, provider: LLMProvider, role_key: &str) -> Result<Arc<RoleAgent>> {
        let key = (provider, role_key.to_string());
        if let Some(agent) = self.agents.get(&key) {
            return Ok(agent.value().clone());
        }

        let role = self.config.role(role_key).ok_or_else(|| {
            anyhow!(
                "未找到角色配置: {}，可用角色: {}",
                role_key,
                self.config.list_available_roles().join(", ")
            )
        })?;
        let client = self.client(provider)?;

        let defaults = client.default_params();
        let params = InvokeParams {
            temperature: role.temperature.unwrap_or(defaults.temperature),
            max_tokens: role.max_tokens.unwrap_or(defaults.max_tokens),
        };

        let entry = self.agents.entry(key).or_insert_with(|| {
            info!("🤖 创建角色Agent: {} ({})", role.name, provider);
            Arc::new(RoleAgent::new(
                role_key,
                role,
                Arc::new(LLMCapability::new(client, params)),
            ))
        });
        Ok(entry.value().clone())
    }
}
