use crate::config::RoleKey;
use crate::generator::types::{ResearchData, SectionContext};
use crate::llm::template::TemplateData;

use super::{RoleWriter, section_fields};

const DEFAULT_SOCIAL_CHALLENGE: &str = "Resistance in education and healthcare sectors";

/// 社会观察员：承接技术部分，关注文化层面的阻力
#[derive(Debug, Default, Clone, Copy)]
pub struct SocietalObserver;

impl RoleWriter for SocietalObserver {
    fn role_key(&self) -> &str {
        RoleKey::SocietalObserver.as_str()
    }

    fn step_name(&self) -> &str {
        "分析社会与文化维度"
    }

    fn section_name(&self) -> Option<&str> {
        Some("社会部分")
    }

    fn fallback_text(&self) -> &str {
        "社会影响分析因技术问题暂时不可用。"
    }

    fn template_data(&self, research: &ResearchData, section: &SectionContext) -> TemplateData {
        let mut data = section_fields(section);
        let challenge = research
            .challenges
            .iter()
            .map(|c| c.field_or("limitation", "No limitation specified"))
            .find(|limitation| limitation.to_lowercase().contains("cultural"))
            .unwrap_or_else(|| DEFAULT_SOCIAL_CHALLENGE.to_string());
        data.insert("social_challenges".to_string(), challenge);
        data
    }
}
