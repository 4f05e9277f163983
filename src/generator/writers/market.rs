use crate::config::RoleKey;
use crate::generator::types::{ResearchData, SectionContext};
use crate::llm::template::TemplateData;

use super::{RoleWriter, section_fields};

/// 市场研究员：承接政策部分，引用带来源的统计数据
#[derive(Debug, Default, Clone, Copy)]
pub struct MarketResearcher;

impl RoleWriter for MarketResearcher {
    fn role_key(&self) -> &str {
        RoleKey::MarketResearcher.as_str()
    }

    fn step_name(&self) -> &str {
        "撰写市场趋势与采纳情况"
    }

    fn section_name(&self) -> Option<&str> {
        Some("市场部分")
    }

    fn fallback_text(&self) -> &str {
        "市场分析因技术问题暂时不可用。"
    }

    fn template_data(&self, research: &ResearchData, section: &SectionContext) -> TemplateData {
        let mut data = section_fields(section);
        let stats = research
            .statistics
            .iter()
            .map(|s| {
                format!(
                    "{}: {} ({})",
                    s.field_or("metric", "Unknown metric"),
                    s.field_or("value", "N/A"),
                    s.source_or("N/A")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        data.insert("statistics".to_string(), stats);
        data
    }
}
