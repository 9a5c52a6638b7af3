//! Human-readable rendering of scored results for a MarkdownV2 message channel.

use crate::analysis::ScoredResult;
use chrono::{DateTime, TimeZone};

/// Characters MarkdownV2 treats as markup outside code spans.
const MARKDOWN_V2_SPECIAL: [char; 18] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn display_name(result: &ScoredResult) -> &str {
    match result.symbol_id.as_deref() {
        Some(id) if result.symbol_name == crate::analysis::scoring::UNKNOWN_SYMBOL => id,
        _ => result.symbol_name.as_str(),
    }
}

/// Full report for a single strong-buy verdict.
pub fn generate_signal_report(result: &ScoredResult) -> String {
    let lines = [
        format!(
            "✅ *{}* {}",
            escape_markdown(display_name(result)),
            escape_markdown("- strong buy signal")
        ),
        escape_markdown(&"-".repeat(30)),
        format!("Score: *{}*", escape_markdown(&format!("{:.1} / 10", result.score))),
        format!("Reasons: {}", escape_markdown(&result.reasons.join(", "))),
        format!(
            "Buyer power: {}",
            escape_markdown(&format!("{:.2}", result.power_ratio))
        ),
        format!(
            "Price change: {}",
            escape_markdown(&format!("{:.2}%", result.percent_change))
        ),
        String::new(),
        "💰 *Risk management:*".to_string(),
        format!(
            "Entry: {}",
            escape_markdown(&format!("{} ({})", result.entry, result.last_price))
        ),
        format!("Target: {}", escape_markdown(&result.target.to_string())),
        format!("Stop loss: {}", escape_markdown(&result.stop.to_string())),
        format!(
            "Risk/reward: {}",
            escape_markdown(&format!("1 to {:.1}", result.risk_reward))
        ),
    ];
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// One message summarising every alert of a cycle; `None` when there is nothing to send.
pub fn format_alert_batch<Tz>(alerts: &[ScoredResult], at: &DateTime<Tz>) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if alerts.is_empty() {
        return None;
    }

    let mut lines = Vec::with_capacity(alerts.len() + 1);
    lines.push(format!(
        "🚨 *Strong Buy Signals Detected* {}\n",
        escape_markdown(&format!("({})", at.format("%H:%M")))
    ));

    for alert in alerts {
        // Code spans only need backticks and backslashes escaped, which numbers never contain.
        lines.push(format!(
            "💎 *{}*\n\
             📈 Score: `{:.1}` \\| Power: `{:.2}`\n\
             💰 Price: `{}` \\| Target: `{}`\n\
             📜 Reasons: {}\n\
             {}",
            escape_markdown(display_name(alert)),
            alert.score,
            alert.power_ratio,
            alert.last_price,
            alert.target,
            escape_markdown(&alert.reasons.join(", ")),
            escape_markdown(&"-".repeat(18)),
        ));
    }

    Some(lines.join("\n"))
}
