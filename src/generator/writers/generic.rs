use serde::{Deserialize, Serialize};

use crate::generator::types::{ResearchCategory, ResearchData, ResearchEntry, SectionContext};
use crate::llm::template::TemplateData;

use super::{RoleWriter, section_fields};

/// 把某一类调研资料投影为一个模板字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProjection {
    /// 模板字段名
    pub field: String,
    pub category: ResearchCategory,
    /// 需要输出的资料字段，为空时输出全部字段
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub include_source: bool,
}

impl FieldProjection {
    pub fn new(field: &str, category: ResearchCategory) -> Self {
        Self {
            field: field.to_string(),
            category,
            columns: Vec::new(),
            include_source: false,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_source(mut self) -> Self {
        self.include_source = true;
        self
    }

    fn render_entry(&self, entry: &ResearchEntry) -> String {
        let values: Vec<String> = if self.columns.is_empty() {
            entry
                .fields
                .keys()
                .filter_map(|key| entry.field(key))
                .collect()
        } else {
            self.columns
                .iter()
                .map(|column| entry.field_or(column, "N/A"))
                .collect()
        };
        let line = values.join(": ");
        if self.include_source {
            format!("{} ({})", line, entry.source_or("N/A"))
        } else {
            line
        }
    }

    fn render(&self, research: &ResearchData) -> String {
        research
            .entries(self.category)
            .iter()
            .map(|entry| self.render_entry(entry))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 通用写作者：角色、步骤与字段投影全部由配置决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericWriter {
    pub role_key: String,
    pub step_name: String,
    #[serde(default)]
    pub section_name: Option<String>,
    pub fallback_text: String,
    #[serde(default)]
    pub projections: Vec<FieldProjection>,
}

impl GenericWriter {
    pub fn new(role_key: &str, step_name: &str) -> Self {
        Self {
            role_key: role_key.to_string(),
            step_name: step_name.to_string(),
            section_name: None,
            fallback_text: format!("{}因技术问题暂时不可用。", step_name),
            projections: Vec::new(),
        }
    }

    pub fn section(mut self, section_name: &str) -> Self {
        self.section_name = Some(section_name.to_string());
        self
    }

    pub fn fallback(mut self, text: &str) -> Self {
        self.fallback_text = text.to_string();
        self
    }

    pub fn project(mut self, projection: FieldProjection) -> Self {
        self.projections.push(projection);
        self
    }
}

impl RoleWriter for GenericWriter {
    fn role_key(&self) -> &str {
        &self.role_key
    }

    fn step_name(&self) -> &str {
        &self.step_name
    }

    fn section_name(&self) -> Option<&str> {
        self.section_name.as_deref()
    }

    fn fallback_text(&self) -> &str {
        &self.fallback_text
    }

    fn template_data(&self, research: &ResearchData, section: &SectionContext) -> TemplateData {
        let mut data = section_fields(section);
        for projection in &self.projections {
            data.insert(projection.field.clone(), projection.render(research));
        }
        data
    }
}
