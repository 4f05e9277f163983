//! 内置角色配置

use std::collections::HashMap;

use super::RoleConfig;

/// 内置角色标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKey {
    ConclusionGenerator,
    PolicyAnalyst,
    MarketResearcher,
    CaseSpecialist,
    TechnicalInterpreter,
    SocietalObserver,
    ReportEvaluator,
    ReportImprover,
}

impl RoleKey {
    pub const ALL: [RoleKey; 8] = [
        RoleKey::ConclusionGenerator,
        RoleKey::PolicyAnalyst,
        RoleKey::MarketResearcher,
        RoleKey::CaseSpecialist,
        RoleKey::TechnicalInterpreter,
        RoleKey::SocietalObserver,
        RoleKey::ReportEvaluator,
        RoleKey::ReportImprover,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKey::ConclusionGenerator => "conclusion_generator",
            RoleKey::PolicyAnalyst => "policy_analyst",
            RoleKey::MarketResearcher => "market_researcher",
            RoleKey::CaseSpecialist => "case_specialist",
            RoleKey::TechnicalInterpreter => "technical_interpreter",
            RoleKey::SocietalObserver => "societal_observer",
            RoleKey::ReportEvaluator => "report_evaluator",
            RoleKey::ReportImprover => "report_improver",
        }
    }

    /// 角色显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            RoleKey::ConclusionGenerator => "结论提出者",
            RoleKey::PolicyAnalyst => "政策分析师",
            RoleKey::MarketResearcher => "市场研究员",
            RoleKey::CaseSpecialist => "案例专家",
            RoleKey::TechnicalInterpreter => "技术解释者",
            RoleKey::SocietalObserver => "社会观察员",
            RoleKey::ReportEvaluator => "严厉评价师",
            RoleKey::ReportImprover => "精确改进师",
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            RoleKey::ConclusionGenerator => {
                "你是一名资深研究顾问，擅长从调研资料中提炼出清晰、有判断力的核心结论。只输出结论本身，不要解释你的思考过程。"
            }
            RoleKey::PolicyAnalyst => {
                "你是一名政策分析师，熟悉各国在新兴技术领域的法律法规与监管框架。请使用连贯的段落写作，不要使用标题、列表或Markdown格式。"
            }
            RoleKey::MarketResearcher => {
                "你是一名市场研究员，擅长用数据说明行业趋势与技术采纳情况。请使用连贯的段落写作，不要使用标题、列表或Markdown格式。"
            }
            RoleKey::CaseSpecialist => {
                "你是一名案例研究专家，擅长通过真实落地案例说明技术的实施过程与效果。请使用连贯的段落写作，不要使用标题、列表或Markdown格式。"
            }
            RoleKey::TechnicalInterpreter => {
                "你是一名技术解释者，能够向非专业读者说明技术原理以及其中的取舍。请使用连贯的段落写作，不要使用标题、列表或Markdown格式。"
            }
            RoleKey::SocietalObserver => {
                "你是一名社会观察员，关注技术对社会、文化与公众认知的影响。请使用连贯的段落写作，不要使用标题、列表或Markdown格式。"
            }
            RoleKey::ReportEvaluator => {
                "你是一名严厉的报告评审专家。你会从字数准确性、结构连贯性、论据充分性和语言质量四个维度给出具体、可执行的修改意见。"
            }
            RoleKey::ReportImprover => {
                "你是一名精确的报告改写专家。你必须严格按照目标字数改写报告，只输出改写后的报告正文，不输出任何说明、思考过程或字数统计。"
            }
        }
    }

    fn prompt_template(&self) -> &'static str {
        match self {
            RoleKey::ConclusionGenerator => {
                "研究问题：{{question}}\n\n背景资料：\n{{background}}\n\n统计数据：\n{{statistics}}\n\n面临的挑战：\n{{challenges}}\n\n专家观点：\n{{expert_opinions}}\n\n请基于以上资料，用一到两句话给出该问题的核心结论。"
            }
            RoleKey::PolicyAnalyst => {
                "研究问题：{{question}}\n核心结论：{{conclusion}}\n\n前文内容：\n{{context}}\n\n背景事实：\n{{background_facts}}\n\n请撰写报告的“政策与监管框架”部分，说明相关政策现状、监管要求及其对核心结论的支撑。"
            }
            RoleKey::MarketResearcher => {
                "研究问题：{{question}}\n核心结论：{{conclusion}}\n\n前文内容：\n{{context}}\n\n统计数据：\n{{statistics}}\n\n请承接前文，撰写报告的“市场趋势与采纳情况”部分，引用数据时注明来源。"
            }
            RoleKey::CaseSpecialist => {
                "研究问题：{{question}}\n核心结论：{{conclusion}}\n\n前文内容：\n{{context}}\n\n案例资料：{{case_studies}}\n\n请承接前文，撰写报告的“实际案例研究”部分，说明实施方式与取得的成效。"
            }
            RoleKey::TechnicalInterpreter => {
                "研究问题：{{question}}\n核心结论：{{conclusion}}\n\n前文内容：\n{{context}}\n\n涉及的技术方法：{{methods}}\n准确率损失：{{accuracy_metrics}}\n\n请承接前文，撰写报告的“技术原理与权衡”部分，解释这些方法如何工作以及需要付出的代价。"
            }
            RoleKey::SocietalObserver => {
                "研究问题：{{question}}\n核心结论：{{conclusion}}\n\n前文内容：\n{{context}}\n\n社会层面的挑战：{{social_challenges}}\n\n请承接前文，撰写报告的“社会与文化维度”部分，分析公众接受度与文化阻力。"
            }
            RoleKey::ReportEvaluator => {
                "报告编号：{{report_id}}\n研究问题：{{question}}\n目标字数：{{target_word_limit}}\n声明字数：{{reported_word_count}}\n实际字数：{{actual_word_count}}\n字数差异：{{word_difference}}\n字数匹配度：{{word_match_rate}}%\n\n报告正文：\n{{report_content}}\n\n请对这份报告进行严厉评价，并明确指出需要增加或删减多少字数。"
            }
            RoleKey::ReportImprover => {
                "报告编号：{{report_id}}\n研究问题：{{question}}\n目标字数：{{target_word_limit}}\n当前实际字数：{{current_actual_word_count}}\n当前字数差异：{{current_word_difference}}\n当前字数匹配度：{{current_word_match_rate}}%\n\n评价意见：\n{{evaluation_feedback}}\n\n原始报告：\n{{original_report}}\n\n请根据评价意见改写报告，使其字数恰好等于目标字数。中文每个汉字计一个字，英文每个单词计一个字，每个数字计一个字。"
            }
        }
    }

    /// 角色的内置配置
    pub fn default_config(&self) -> RoleConfig {
        RoleConfig {
            name: self.display_name().to_string(),
            system_prompt: self.system_prompt().to_string(),
            prompt_template: self.prompt_template().to_string(),
            temperature: match self {
                RoleKey::ReportEvaluator => Some(0.3),
                _ => None,
            },
            max_tokens: None,
        }
    }
}

impl std::fmt::Display for RoleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 全部内置角色配置
pub fn default_roles() -> HashMap<String, RoleConfig> {
    RoleKey::ALL
        .iter()
        .map(|key| (key.as_str().to_string(), key.default_config()))
        .collect()
}
