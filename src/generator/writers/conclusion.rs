use crate::config::{RoleKey, WorkflowConfig};
use crate::generator::error::WorkflowError;
use crate::generator::types::{ResearchData, SectionContext};
use crate::llm::template::TemplateData;
use crate::utils::text_normalizer::{strip_markdown, strip_reasoning_artifacts};

use super::{RoleWriter, join_lines};

/// 结论生成失败时使用的默认结论
pub const DEFAULT_CONCLUSION: &str = "人工智能技术正在快速发展，在提高效率方面展现出巨大潜力，但在情感交流和道德判断方面仍存在局限性，需要人机协作来实现最佳效果。";

/// 结论提出者：基于全部调研资料生成核心结论，不读取前文
#[derive(Debug, Default, Clone, Copy)]
pub struct ConclusionGenerator;

impl RoleWriter for ConclusionGenerator {
    fn role_key(&self) -> &str {
        RoleKey::ConclusionGenerator.as_str()
    }

    fn step_name(&self) -> &str {
        "生成核心结论"
    }

    fn fallback_text(&self) -> &str {
        DEFAULT_CONCLUSION
    }

    fn template_data(&self, research: &ResearchData, section: &SectionContext) -> TemplateData {
        let mut data = TemplateData::new();
        data.insert("question".to_string(), section.question.clone());
        data.insert(
            "background".to_string(),
            join_lines(&research.background, "No background data available", |b| {
                b.field_or("fact", "No fact provided")
            }),
        );
        data.insert(
            "statistics".to_string(),
            join_lines(&research.statistics, "No statistics available", |s| {
                format!(
                    "{}: {}",
                    s.field_or("metric", "Unknown metric"),
                    s.field_or("value", "N/A")
                )
            }),
        );
        data.insert(
            "challenges".to_string(),
            join_lines(&research.challenges, "No challenges identified", |c| {
                c.field_or("limitation", "No limitation specified")
            }),
        );
        data.insert(
            "expert_opinions".to_string(),
            join_lines(
                &research.expert_opinions,
                "No expert opinions available",
                |e| {
                    format!(
                        "{} ({}): {}",
                        e.field_or("expert", "Unknown expert"),
                        e.field_or("credentials", "N/A"),
                        e.field_or("viewpoint", "No viewpoint provided")
                    )
                },
            ),
        );
        data
    }

    /// 结论至少要有 `min_conclusion_chars` 个字符
    fn finalize(&self, content: String, config: &WorkflowConfig) -> Result<String, WorkflowError> {
        let conclusion = strip_reasoning_artifacts(&content).trim().to_string();
        if conclusion.chars().count() < config.min_conclusion_chars {
            return Err(WorkflowError::ContentTooShort {
                content: conclusion,
            });
        }
        Ok(strip_markdown(&conclusion))
    }
}
