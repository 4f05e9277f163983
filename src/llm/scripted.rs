//! 脚本化Agent - 按预设回复应答，不访问任何模型服务
//!
//! 用于测试以及命令行的 `--dry-run` 演练模式。

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{Config, LLMProvider, RoleConfig};
use crate::llm::agent::{AgentCapability, AgentFactory, RoleAgent};
use crate::llm::error::ProviderError;

/// 一次调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCall {
    pub prompt: String,
    pub system_prompt: Option<String>,
}

/// 按队列顺序返回预设回复；队列耗尽后使用兜底回复
#[derive(Default)]
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Option<Result<String, ProviderError>>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次调用都返回同一段文本
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(Ok(text.into())),
            ..Self::default()
        }
    }

    /// 每次调用都失败
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fallback: Some(Err(ProviderError::new(message))),
            ..Self::default()
        }
    }

    pub fn then_reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(ProviderError::new(message)))
    }

    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(Ok(text.into()));
        self
    }

    fn push(self, reply: Result<String, ProviderError>) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
        self
    }

    /// 迄今为止的全部调用
    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl AgentCapability for ScriptedAgent {
    async fn invoke(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ScriptedCall {
                prompt: prompt.to_string(),
                system_prompt: system_prompt.map(str::to_string),
            });

        let queued = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match queued {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .unwrap_or_else(|| Err(ProviderError::new("预设回复已耗尽"))),
        }
    }
}

/// 为每个角色分配脚本化Agent的工厂
pub struct ScriptedAgentFactory {
    roles: HashMap<String, RoleConfig>,
    scripts: DashMap<String, Arc<ScriptedAgent>>,
    default_script: Arc<ScriptedAgent>,
    requests: Mutex<Vec<(LLMProvider, String)>>,
}

impl ScriptedAgentFactory {
    /// 使用内置角色配置，未单独指定脚本的角色共用 `default_script`
    pub fn new(default_script: ScriptedAgent) -> Self {
        Self::with_roles(Config::default().roles, default_script)
    }

    pub fn with_roles(roles: HashMap<String, RoleConfig>, default_script: ScriptedAgent) -> Self {
        Self {
            roles,
            scripts: DashMap::new(),
            default_script: Arc::new(default_script),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 演练模式：每个写作角色返回一段固定示例文本
    pub fn dry_run(roles: HashMap<String, RoleConfig>) -> Self {
        let factory = Self::with_roles(
            roles,
            ScriptedAgent::always("这是演练模式生成的示例段落，用于检查工作流各阶段是否正常衔接。"),
        );
        factory.script(
            "conclusion_generator",
            ScriptedAgent::always("演练模式：人工智能正在改变行业格局，需要在创新与治理之间取得平衡。"),
        )
    }

    /// 为指定角色设置脚本
    pub fn script(self, role_key: &str, agent: ScriptedAgent) -> Self {
        self.scripts.insert(role_key.to_string(), Arc::new(agent));
        self
    }

    /// 取得角色当前使用的脚本（用于检查调用记录）
    pub fn script_for(&self, role_key: &str) -> Arc<ScriptedAgent> {
        self.scripts
            .get(role_key)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.default_script.clone())
    }

    /// 创建请求记录：(Provider, 角色)
    pub fn requests(&self) -> Vec<(LLMProvider, String)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AgentFactory for ScriptedAgentFactory {
    fn create_role_agent(&self, provider: LLMProvider, role_key: &str) -> Result<Arc<RoleAgent>> {
        let role = self
            .roles
            .get(role_key)
            .ok_or_else(|| anyhow!("未找到角色配置: {}", role_key))?;

        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((provider, role_key.to_string()));

        Ok(Arc::new(RoleAgent::new(
            role_key,
            role,
            self.script_for(role_key),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let agent = ScriptedAgent::new()
            .then_fail("网络错误")
            .then_reply("第一条")
            .with_fallback("兜底");

        assert_eq!(
            agent.invoke("p1", None).await,
            Err(ProviderError::new("网络错误"))
        );
        assert_eq!(agent.invoke("p2", None).await.unwrap(), "第一条");
        assert_eq!(agent.invoke("p3", Some("sys")).await.unwrap(), "兜底");
        assert_eq!(agent.call_count(), 3);
        assert_eq!(agent.calls()[2].system_prompt.as_deref(), Some("sys"));
    }

    #[tokio::test]
    async fn test_exhausted_script_fails() {
        let agent = ScriptedAgent::new().then_reply("唯一回复");
        assert!(agent.invoke("p", None).await.is_ok());
        assert!(agent.invoke("p", None).await.is_err());
    }

    #[tokio::test]
    async fn test_factory_routes_scripts_by_role() {
        let factory = ScriptedAgentFactory::new(ScriptedAgent::always("默认"))
            .script("policy_analyst", ScriptedAgent::always("政策"));

        let policy = factory
            .create_role_agent(LLMProvider::Qwen, "policy_analyst")
            .unwrap();
        let market = factory
            .create_role_agent(LLMProvider::Qwen, "market_researcher")
            .unwrap();

        let mut data = crate::llm::template::TemplateData::new();
        for key in ["question", "conclusion", "context", "background_facts", "statistics"] {
            data.insert(key.to_string(), String::new());
        }
        assert_eq!(policy.chat("m", &data).await.unwrap(), "政策");
        assert_eq!(market.chat("m", &data).await.unwrap(), "默认");
        assert_eq!(factory.script_for("policy_analyst").call_count(), 1);
        assert_eq!(
            factory.requests(),
            vec![
                (LLMProvider::Qwen, "policy_analyst".to_string()),
                (LLMProvider::Qwen, "market_researcher".to_string())
            ]
        );
    }

    #[test]
    fn test_factory_rejects_unknown_role() {
        let factory = ScriptedAgentFactory::new(ScriptedAgent::always("默认"));
        assert!(factory.create_role_agent(LLMProvider::Ollama, "poet").is_err());
    }
}
