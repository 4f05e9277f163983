pub mod agent;
pub mod client;
pub mod error;
pub mod scripted;
pub mod template;

pub use agent::{AgentCapability, AgentFactory, LLMAgentFactory, RoleAgent};
pub use error::{AgentError, ProviderError};
pub use template::{PromptTemplate, TemplateData, TemplateError};
