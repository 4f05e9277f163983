//! LLM客户端 - 提供统一的LLM服务接口

use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{LLMConfig, LLMProvider, ProviderEndpoint};
use crate::llm::error::ProviderError;

mod providers;

pub use providers::InvokeParams;

use providers::ProviderClient;

/// LLM客户端 - 单个Provider的单次调用入口，不做任何重试
#[derive(Clone)]
pub struct LLMClient {
    provider: LLMProvider,
    endpoint: ProviderEndpoint,
    client: ProviderClient,
    defaults: InvokeParams,
    timeout: Duration,
}

impl LLMClient {
    /// 按配置创建指定Provider的客户端
    pub fn new(config: &LLMConfig, provider: LLMProvider) -> Result<Self> {
        let endpoint = config.endpoint(provider);
        let client = ProviderClient::new(provider, &endpoint)?;
        Ok(Self {
            provider,
            endpoint,
            client,
            defaults: InvokeParams {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    pub fn provider(&self) -> LLMProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.endpoint.model
    }

    /// 全局默认的生成参数
    pub fn default_params(&self) -> InvokeParams {
        self.defaults
    }

    /// 检查模型连接和功能是否正常
    pub async fn check_connection(&self) -> Result<(), ProviderError> {
        info!("🔄 正在检查模型连接: {} / {}", self.provider, self.endpoint.model);
        match self
            .invoke("You are a helpful assistant.", "Hello", self.defaults)
            .await
        {
            Ok(_) => {
                info!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                error!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 单轮调用，超时视为调用失败
    pub async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        params: InvokeParams,
    ) -> Result<String, ProviderError> {
        let agent = self
            .client
            .create_agent(&self.endpoint.model, system_prompt, params);

        match tokio::time::timeout(self.timeout, agent.prompt(user_prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(format!(
                "调用 {} 超时（{}秒）",
                self.provider,
                self.timeout.as_secs()
            ))),
        }
    }
}
