//! Alert texts in Chinese, English, or both.

use memguard_core::{AlertLevel, MemorySnapshot};
use serde::{Deserialize, Serialize};

/// Output language for alerts and prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
    #[default]
    Bilingual,
}

impl Language {
    /// Pick the text for this language; bilingual joins both with " / "
    pub fn pick(&self, zh: &str, en: &str) -> String {
        match self {
            Language::Zh => zh.to_string(),
            Language::En => en.to_string(),
            Language::Bilingual => format!("{} / {}", zh, en),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub title: String,
    pub body: String,
}

struct Template {
    title_zh: &'static str,
    title_en: &'static str,
    advice_zh: Option<&'static str>,
    advice_en: Option<&'static str>,
}

fn template(level: AlertLevel) -> Template {
    match level {
        AlertLevel::Normal => Template {
            title_zh: "内存状态正常",
            title_en: "Memory Status Normal",
            advice_zh: None,
            advice_en: None,
        },
        AlertLevel::Notice => Template {
            title_zh: "💡 内存提醒",
            title_en: "💡 Memory Notice",
            advice_zh: Some("建议关注内存情况。"),
            advice_en: Some("Consider monitoring memory usage."),
        },
        AlertLevel::Warning => Template {
            title_zh: "⚠️ 内存警告",
            title_en: "⚠️ Memory Warning",
            advice_zh: Some("建议暂停当前任务，避免被迫中断！"),
            advice_en: Some("Consider pausing your task to avoid forced interruption!"),
        },
        AlertLevel::Critical => Template {
            title_zh: "🚨 严重警告！",
            title_en: "🚨 CRITICAL WARNING!",
            advice_zh: Some("⚠️ 内存即将耗尽！系统可能随时崩溃！\n强烈建议立即暂停工作并清理内存！"),
            advice_en: Some(
                "⚠️ Memory almost exhausted! System may crash!\nSTRONGLY recommend pausing work and cleaning memory NOW!",
            ),
        },
    }
}

fn body(figures: String, advice: Option<&str>) -> String {
    match advice {
        Some(advice) => format!("{}\n\n{}", figures, advice),
        None => figures,
    }
}

/// Build the title and body for `level`.
///
/// Both usage and available memory are printed with one decimal, the latter
/// in GB.
pub fn format_alert(level: AlertLevel, snapshot: &MemorySnapshot, language: Language) -> AlertMessage {
    let t = template(level);
    let usage = snapshot.used_percent;
    let available = snapshot.available_gb();

    let body_zh = body(
        format!("当前物理内存使用率: {:.1}%\n可用内存: {:.1} GB", usage, available),
        t.advice_zh,
    );
    let body_en = body(
        format!(
            "Current physical memory usage: {:.1}%\nAvailable: {:.1} GB",
            usage, available
        ),
        t.advice_en,
    );

    match language {
        Language::Zh => AlertMessage {
            title: t.title_zh.to_string(),
            body: body_zh,
        },
        Language::En => AlertMessage {
            title: t.title_en.to_string(),
            body: body_en,
        },
        Language::Bilingual => AlertMessage {
            title: format!("{} / {}", t.title_zh, t.title_en),
            body: format!("{}\n\n{}\n\n{}", body_zh, "─".repeat(40), body_en),
        },
    }
}

/// Cut `text` to at most `limit` characters
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
