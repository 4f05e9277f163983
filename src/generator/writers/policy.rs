use crate::config::RoleKey;
use crate::generator::types::{ResearchData, SectionContext};
use crate::llm::template::TemplateData;

use super::{RoleWriter, section_fields};

/// 政策分析师：只读取核心结论，前文为空
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyAnalyst;

impl RoleWriter for PolicyAnalyst {
    fn role_key(&self) -> &str {
        RoleKey::PolicyAnalyst.as_str()
    }

    fn step_name(&self) -> &str {
        "撰写政策与监管框架"
    }

    fn section_name(&self) -> Option<&str> {
        Some("政策部分")
    }

    fn fallback_text(&self) -> &str {
        "政策框架分析因技术问题暂时不可用。"
    }

    fn template_data(&self, research: &ResearchData, section: &SectionContext) -> TemplateData {
        let mut data = section_fields(section);
        let facts = research
            .background
            .iter()
            .map(|b| b.field_or("fact", ""))
            .collect::<Vec<_>>()
            .join("\n");
        data.insert("background_facts".to_string(), facts);
        data
    }
}
