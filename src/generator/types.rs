use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::LLMProvider;
use crate::utils::text_normalizer::count_words;

/// 一条调研资料：若干命名字段 + 来源
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ResearchEntry {
    pub fn new<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>, source: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect(),
        }
    }

    /// 读取字段文本，非字符串值按JSON文本输出
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }

    pub fn field_or(&self, name: &str, default: &str) -> String {
        self.field(name).unwrap_or_else(|| default.to_string())
    }

    pub fn source_or(&self, default: &str) -> String {
        self.source.clone().unwrap_or_else(|| default.to_string())
    }
}

/// 调研数据：一次任务提供一次，整个流程只读
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchData {
    #[serde(default)]
    pub background: Vec<ResearchEntry>,
    #[serde(default)]
    pub statistics: Vec<ResearchEntry>,
    #[serde(default)]
    pub case_studies: Vec<ResearchEntry>,
    #[serde(default)]
    pub expert_opinions: Vec<ResearchEntry>,
    #[serde(default)]
    pub challenges: Vec<ResearchEntry>,
}

/// 资料类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchCategory {
    Background,
    Statistics,
    CaseStudies,
    ExpertOpinions,
    Challenges,
}

impl ResearchData {
    pub fn entries(&self, category: ResearchCategory) -> &[ResearchEntry] {
        match category {
            ResearchCategory::Background => &self.background,
            ResearchCategory::Statistics => &self.statistics,
            ResearchCategory::CaseStudies => &self.case_studies,
            ResearchCategory::ExpertOpinions => &self.expert_opinions,
            ResearchCategory::Challenges => &self.challenges,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.background.is_empty()
            && self.statistics.is_empty()
            && self.case_studies.is_empty()
            && self.expert_opinions.is_empty()
            && self.challenges.is_empty()
    }

    /// 任务没有附带调研数据时使用的示例资料
    pub fn sample(topic: &str) -> Self {
        let fact = format!("{}技术在全球范围内快速发展，相关监管框架正在逐步建立", topic);
        Self {
            background: vec![ResearchEntry::new([("fact", fact.as_str())], "行业发展白皮书")],
            statistics: vec![
                ResearchEntry::new(
                    [("metric", "全球市场规模"), ("value", "850亿元")],
                    "市场研究报告",
                ),
                ResearchEntry::new(
                    [("metric", "Accuracy loss after explanation"), ("value", "8.7%")],
                    "技术评测报告",
                ),
            ],
            case_studies: vec![ResearchEntry::new(
                [
                    ("location", "某三甲医院"),
                    ("implementation", "引入SHAP解释的辅助诊断系统"),
                    ("outcome", "诊断效率提升30%"),
                ],
                "案例研究",
            )],
            expert_opinions: vec![ResearchEntry::new(
                [
                    ("expert", "张教授"),
                    ("credentials", "人工智能研究院"),
                    ("viewpoint", "需要平衡创新与风险"),
                ],
                "专家访谈",
            )],
            challenges: vec![ResearchEntry::new(
                [("limitation", "Cultural resistance in education and healthcare sectors")],
                "挑战分析",
            )],
        }
    }
}

/// 报告生成任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTask {
    /// 任务文件未提供时自动生成
    #[serde(default = "new_task_id")]
    pub id: String,
    pub question: String,
    #[serde(rename = "type", default)]
    pub report_type: String,
    /// 目标字数，必须大于0
    pub word_limit: usize,
    #[serde(rename = "data", default)]
    pub research_data: ResearchData,
    /// 覆盖控制器默认的Provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<LLMProvider>,
}

pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 在各阶段之间传递的上下文
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionContext {
    pub question: String,
    /// 由第一阶段生成，之后只读
    pub core_conclusion: String,
    /// 上一阶段的输出，每个阶段结束后被替换
    pub preceding_section_text: String,
}

impl SectionContext {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            ..Self::default()
        }
    }

    pub fn with_conclusion(mut self, conclusion: &str) -> Self {
        self.core_conclusion = conclusion.to_string();
        self
    }

    /// 进入下一阶段：上一阶段的输出成为新的前文
    pub fn advance(&mut self, section_text: &str) {
        self.preceding_section_text = section_text.to_string();
    }
}

/// 报告
///
/// 字数总是由正文重新计算得到。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub word_limit: usize,
    #[serde(rename = "answer")]
    body_text: String,
    word_count: usize,
    improved: bool,
}

impl Report {
    pub fn new(task: &ReportTask, body_text: String) -> Self {
        let word_count = count_words(&body_text);
        Self {
            id: task.id.clone(),
            question: task.question.clone(),
            report_type: task.report_type.clone(),
            word_limit: task.word_limit,
            body_text,
            word_count,
            improved: false,
        }
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn improved(&self) -> bool {
        self.improved
    }

    /// 以新的正文生成一份新报告
    pub fn with_body(&self, body_text: String, improved: bool) -> Self {
        let word_count = count_words(&body_text);
        Self {
            body_text,
            word_count,
            improved,
            ..self.clone()
        }
    }

    pub fn word_difference(&self) -> usize {
        self.word_count.abs_diff(self.word_limit)
    }
}

/// 评价指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub target_word_limit: usize,
    pub reported_word_count: Option<usize>,
    pub actual_word_count: usize,
    pub word_difference: usize,
    pub word_match_rate: f64,
}

impl EvaluationMetrics {
    /// 匹配度 = max(0, 100 - 差异/目标*100)
    pub fn compute(
        actual_word_count: usize,
        target_word_limit: usize,
        reported_word_count: Option<usize>,
    ) -> Self {
        let word_difference = actual_word_count.abs_diff(target_word_limit);
        let word_match_rate = if target_word_limit == 0 {
            if word_difference == 0 { 100.0 } else { 0.0 }
        } else {
            (100.0 - word_difference as f64 / target_word_limit as f64 * 100.0).max(0.0)
        };
        Self {
            target_word_limit,
            reported_word_count,
            actual_word_count,
            word_difference,
            word_match_rate,
        }
    }

    pub fn is_exact_match(&self) -> bool {
        self.word_difference == 0
    }
}

/// 评价结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub report_id: String,
    /// 评价意见
    pub feedback: String,
    pub metrics: EvaluationMetrics,
}
