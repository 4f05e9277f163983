//! 文本规范化工具 - 字数统计、思考过程清理与Markdown去除
//!
//! 这里的三个函数是整个报告流水线中"字数"与"干净文本"的唯一来源：
//! 任何阶段的模型输出都必须先经过清理，再参与字数统计或向下游传递。

use regex::Regex;
use std::sync::LazyLock;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static LATIN_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z]+").unwrap());
static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").unwrap());

/// 判断是否为汉字（CJK统一汉字及扩展区）
fn is_han_char(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF |  // CJK统一汉字
        0x3400..=0x4DBF |  // CJK扩展A
        0x20000..=0x2A6DF | // CJK扩展B
        0x2A700..=0x2B73F | // CJK扩展C
        0x2B740..=0x2B81F | // CJK扩展D
        0x2B820..=0x2CEAF | // CJK扩展E
        0x2CEB0..=0x2EBEF | // CJK扩展F
        0x30000..=0x3134F   // CJK扩展G
    )
}

/// 统计混合文本的字数
///
/// 汉字每个算一个词，连续的拉丁字母算一个词，数字（可带一个小数点）算一个词，三者相加。
pub fn count_words(text: &str) -> usize {
    if text.trim().is_empty() {
        return 0;
    }

    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    let text = HTML_TAG.replace_all(&collapsed, " ");

    let han_chars = text.chars().filter(|c| is_han_char(*c)).count();
    let latin_words = LATIN_RUN.find_iter(&text).count();
    let numbers = NUMBER_TOKEN.find_iter(&text).count();

    han_chars + latin_words + numbers
}

/// 思考过程标签的名称
const REASONING_TAGS: &str =
    "think|thinking|reasoning|analysis|thought|internal|reflection|反思|思考";

static REASONING_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?is)<(?:{tags})(?:\s[^>]*)?>.*?</(?:{tags})\s*>",
        tags = REASONING_TAGS
    ))
    .unwrap()
});

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z\p{Han}][^<>]*>").unwrap());

/// 以"思考过程："等标记开头的段落，一直删到下一个空行
static MARKER_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:思考过程|分析过程|推理过程|thought process|reasoning process|analysis process|思考|推理|反思|thinking|thoughts?|reasoning)[ \t]*[:：].*(?:\n.*\S.*)*",
    )
    .unwrap()
});

static LEADING_PARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:嗯+|呃+|哦|嘿|啊)[，,。、！!…\s]*").unwrap());

static LEADING_INTERJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[ \t]*(?:好的|好吧|okay|ok|well|hmm+|alright)[，,][ \t]*").unwrap()
});

/// 元评论短语：模型谈论"自己要怎么写"而不是正文内容
const META_PHRASES: &str = r"让我|我需要|我应该|我得|现在我得|我来写|用户要求|用户希望|用户想要|用户的问题|这部分应该|应该包含|字数控制|需求分析|输出必须|let me|i need to|i should|i'll start|i will start|the user (?:wants|asked|requested|is asking)|as requested|word count";

static META_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){}", META_PHRASES)).unwrap());

static META_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:{})[^，,。！!？?\n]*[，,。！!？?]", META_PHRASES)).unwrap()
});

static TERMINAL_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[。！？.!?]").unwrap());

/// 混杂元评论的行，清理后至少要保留的字符数
const MIN_SURVIVING_LINE_CHARS: usize = 15;

/// 清理模型输出中的思考过程、标签和元评论
///
/// 这是一个启发式过滤器，宁可漏删也不误删：若清理结果不足原文长度的四分之一，
/// 视为误删，直接返回去除首尾空白的原文。
pub fn strip_reasoning_artifacts(text: &str) -> String {
    let original = text.trim();
    if original.is_empty() {
        return String::new();
    }

    let normalized = original.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned = REASONING_BLOCK.replace_all(&normalized, "");
    let cleaned = MARKUP_TAG.replace_all(&cleaned, "");
    let cleaned = MARKER_PARAGRAPH.replace_all(&cleaned, "");
    let cleaned = LEADING_PARTICLE.replace_all(&cleaned, "");
    let cleaned = LEADING_INTERJECTION.replace_all(&cleaned, "");

    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = true;
    for line in cleaned.lines() {
        let Some(line) = filter_meta_line(line.trim()) else {
            continue;
        };
        if line.is_empty() {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let result = lines.join("\n");
    // 以未去空白的输入长度为基准
    let input_len = text.chars().count();
    if result.chars().count() * 4 < input_len {
        tracing::debug!(
            "⚠️ 清理后内容过短，可能误删了有效内容，返回原始内容 (原始长度: {}, 清理后长度: {})",
            input_len,
            result.chars().count()
        );
        return original.to_string();
    }
    result
}

/// 行级过滤：纯元评论的行整行删除，混杂的行只删除元评论片段
fn filter_meta_line(line: &str) -> Option<String> {
    if !META_LINE.is_match(line) {
        return Some(line.to_string());
    }
    if !TERMINAL_PUNCTUATION.is_match(line) {
        return None;
    }

    let remainder = META_SEGMENT.replace_all(line, "");
    let remainder = remainder.trim();
    if remainder.chars().count() > MIN_SURVIVING_LINE_CHARS
        && TERMINAL_PUNCTUATION.is_match(remainder)
    {
        Some(remainder.to_string())
    } else {
        None
    }
}

struct MarkdownRule {
    pattern: Regex,
    replacement: &'static str,
}

impl MarkdownRule {
    fn new(pattern: &str, replacement: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            replacement,
        }
    }
}

static MARKDOWN_RULES: LazyLock<Vec<MarkdownRule>> = LazyLock::new(|| {
    vec![
        // 代码块与行内代码
        MarkdownRule::new(r"(?s)```.*?```", ""),
        MarkdownRule::new(r"`([^`]+)`", "${1}"),
        // 标题
        MarkdownRule::new(r"(?m)^[ \t]*#{1,6}[ \t]*(.*)$", "${1}"),
        // 粗体、斜体、删除线
        MarkdownRule::new(r"\*\*\*(.+?)\*\*\*", "${1}"),
        MarkdownRule::new(r"\*\*(.+?)\*\*", "${1}"),
        MarkdownRule::new(r"\*(.+?)\*", "${1}"),
        MarkdownRule::new(r"___(.+?)___", "${1}"),
        MarkdownRule::new(r"__(.+?)__", "${1}"),
        MarkdownRule::new(r"_(.+?)_", "${1}"),
        MarkdownRule::new(r"~~(.+?)~~", "${1}"),
        // 图片与链接，保留文字
        MarkdownRule::new(r"!\[([^\]]*)\]\([^)]*\)", "${1}"),
        MarkdownRule::new(r"\[([^\]]*)\]\([^)]*\)", "${1}"),
        MarkdownRule::new(r"<(https?://[^>]+)>", "${1}"),
        // 列表、引用、分隔线
        MarkdownRule::new(r"(?m)^[ \t]*[-*+][ \t]+", ""),
        MarkdownRule::new(r"(?m)^[ \t]*\d+\.[ \t]+", ""),
        MarkdownRule::new(r"(?m)^[ \t]*>[ \t]*", ""),
        MarkdownRule::new(r"(?m)^[ \t]*[-*_]{3,}[ \t]*$", ""),
    ]
});

fn strip_markdown_once(text: &str) -> String {
    let mut current = text.to_string();
    for rule in MARKDOWN_RULES.iter() {
        if rule.pattern.is_match(&current) {
            current = rule
                .pattern
                .replace_all(&current, rule.replacement)
                .into_owned();
        }
    }
    WHITESPACE.replace_all(&current, " ").trim().to_string()
}

/// 移除所有Markdown格式并把空白折叠为单个空格
///
/// 重复执行直到文本不再变化，保证结果幂等。
pub fn strip_markdown(text: &str) -> String {
    let mut current = strip_markdown_once(text);
    loop {
        let next = strip_markdown_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
