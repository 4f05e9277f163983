use crate::config::RoleKey;
use crate::generator::types::{ResearchData, SectionContext};
use crate::llm::template::TemplateData;

use super::{RoleWriter, section_fields};

/// 案例专家：承接市场部分，整理落地案例
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseSpecialist;

impl RoleWriter for CaseSpecialist {
    fn role_key(&self) -> &str {
        RoleKey::CaseSpecialist.as_str()
    }

    fn step_name(&self) -> &str {
        "撰写实际案例研究"
    }

    fn section_name(&self) -> Option<&str> {
        Some("案例部分")
    }

    fn fallback_text(&self) -> &str {
        "案例研究分析因技术问题暂时不可用。"
    }

    fn template_data(&self, research: &ResearchData, section: &SectionContext) -> TemplateData {
        let mut data = section_fields(section);
        let cases = research
            .case_studies
            .iter()
            .map(|c| {
                format!(
                    "{}: {} → {} ({})",
                    c.field_or("location", "Unknown location"),
                    c.field_or("implementation", "N/A"),
                    c.field_or("outcome", "N/A"),
                    c.source_or("N/A")
                )
            })
            .collect::<Vec<_>>()
            .join(" | ");
        data.insert("case_studies".to_string(), cases);
        data
    }
}
