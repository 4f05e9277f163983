use std::collections::BTreeSet;

use crate::config::RoleKey;
use crate::generator::types::{ResearchData, SectionContext};
use crate::llm::template::TemplateData;

use super::{RoleWriter, section_fields};

const DEFAULT_METHODS: &str = "SHAP, LIME, counterfactuals";
const DEFAULT_ACCURACY_LOSS: &str = "8.7%";

/// 技术解释者：承接案例部分，解释案例中出现的可解释性方法
#[derive(Debug, Default, Clone, Copy)]
pub struct TechnicalInterpreter;

impl TechnicalInterpreter {
    /// 从案例的实施描述中识别出的方法
    fn detect_methods(research: &ResearchData) -> String {
        let mut methods = BTreeSet::new();
        for case in &research.case_studies {
            let implementation = case.field_or("implementation", "");
            if implementation.contains("SHAP") {
                methods.insert("SHAP");
            }
            if implementation.contains("LIME") {
                methods.insert("LIME");
            }
            if implementation.to_lowercase().contains("counterfactual") {
                methods.insert("counterfactual explanations");
            }
        }
        if methods.is_empty() {
            return DEFAULT_METHODS.to_string();
        }
        methods.into_iter().collect::<Vec<_>>().join(", ")
    }

    fn accuracy_loss(research: &ResearchData) -> String {
        research
            .statistics
            .iter()
            .find(|s| {
                s.field_or("metric", "")
                    .to_lowercase()
                    .contains("accuracy loss")
            })
            .map(|s| s.field_or("value", "N/A"))
            .unwrap_or_else(|| DEFAULT_ACCURACY_LOSS.to_string())
    }
}

impl RoleWriter for TechnicalInterpreter {
    fn role_key(&self) -> &str {
        RoleKey::TechnicalInterpreter.as_str()
    }

    fn step_name(&self) -> &str {
        "解释技术原理与权衡"
    }

    fn section_name(&self) -> Option<&str> {
        Some("技术部分")
    }

    fn fallback_text(&self) -> &str {
        "技术原理解释因技术问题暂时不可用。"
    }

    fn template_data(&self, research: &ResearchData, section: &SectionContext) -> TemplateData {
        let mut data = section_fields(section);
        data.insert("methods".to_string(), Self::detect_methods(research));
        data.insert("accuracy_metrics".to_string(), Self::accuracy_loss(research));
        data
    }
}
