//! Conversation export renderers.
//!
//! Input is the flat message list from
//! [`Engine::export_messages`](crate::engine::Engine::export_messages).
//! Roles are framed by position: even entries are the user, odd entries the
//! assistant.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

const USER_LABEL: &str = "You";
const ASSISTANT_LABEL: &str = "ChatGPT";
const TEXT_RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    #[serde(alias = "txt")]
    #[value(alias = "txt")]
    Text,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
            Self::Text => "txt",
            Self::Html => "html",
        }
    }
}

/// `chatgpt-conversation-YYYY-MM-DD.<ext>`
pub fn file_name(format: ExportFormat, exported_at: DateTime<Local>) -> String {
    format!(
        "chatgpt-conversation-{}.{}",
        exported_at.format("%Y-%m-%d"),
        format.extension()
    )
}

fn label(idx: usize) -> &'static str {
    if idx % 2 == 0 { USER_LABEL } else { ASSISTANT_LABEL }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    messages: &'a [String],
    export_date: String,
    message_count: usize,
}

/// Render `messages` in `format`.
pub fn render(
    messages: &[String],
    format: ExportFormat,
    exported_at: DateTime<Local>,
) -> Result<String, serde_json::Error> {
    Ok(match format {
        ExportFormat::Json => serde_json::to_string_pretty(&JsonExport {
            messages,
            export_date: exported_at.to_rfc3339(),
            message_count: messages.len(),
        })?,
        ExportFormat::Markdown => messages
            .iter()
            .enumerate()
            .map(|(i, msg)| format!("**{}:**\n\n{msg}\n\n---\n", label(i)))
            .collect::<Vec<_>>()
            .join("\n"),
        ExportFormat::Text => {
            let rule = "=".repeat(TEXT_RULE_WIDTH);
            messages
                .iter()
                .enumerate()
                .map(|(i, msg)| format!("{}:\n{msg}\n\n{rule}\n", label(i)))
                .collect::<Vec<_>>()
                .join("\n")
        }
        ExportFormat::Html => render_html(messages, exported_at),
    })
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_html(messages: &[String], exported_at: DateTime<Local>) -> String {
    let date = exported_at.format("%Y-%m-%d");
    let body = messages
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let class = if i % 2 == 0 { "user" } else { "assistant" };
            format!(
                "<div class=\"message {class}\">\n      <div class=\"role\">{}</div>\n      <div class=\"content\">{}</div>\n    </div>",
                label(i),
                escape_html(msg)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>ChatGPT Conversation - {date}</title>
  <style>
    body {{ font-family: system-ui, sans-serif; max-width: 800px; margin: 40px auto; padding: 20px; line-height: 1.6; }}
    .message {{ margin: 20px 0; padding: 15px; border-radius: 8px; }}
    .user {{ background: #e3f2fd; }}
    .assistant {{ background: #f5f5f5; }}
    .role {{ font-weight: bold; margin-bottom: 8px; }}
    .content {{ white-space: pre-wrap; }}
  </style>
</head>
<body>
  <h1>ChatGPT Conversation</h1>
  <p>Exported: {date}</p>
  {body}
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn msgs() -> Vec<String> {
        vec!["How do I <b>bold</b>?".into(), "Use a & b tags.".into()]
    }

    #[test]
    fn file_name_carries_date_and_extension() {
        assert_eq!(
            file_name(ExportFormat::Markdown, at()),
            "chatgpt-conversation-2026-03-14.md"
        );
    }

    #[test]
    fn json_has_count_and_messages() {
        let out = render(&msgs(), ExportFormat::Json, at()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["messageCount"], 2);
        assert_eq!(v["messages"][1], "Use a & b tags.");
        assert!(v["exportDate"].as_str().unwrap().starts_with("2026-03-14"));
    }

    #[test]
    fn markdown_and_text_frame_by_parity() {
        let md = render(&msgs(), ExportFormat::Markdown, at()).unwrap();
        assert!(md.starts_with("**You:**\n\nHow do I"));
        assert!(md.contains("**ChatGPT:**\n\nUse a & b tags.\n\n---\n"));

        let txt = render(&msgs(), ExportFormat::Text, at()).unwrap();
        assert!(txt.starts_with("You:\n"));
        assert!(txt.contains(&"=".repeat(60)));
    }

    #[test]
    fn html_escapes_markup() {
        let html = render(&msgs(), ExportFormat::Html, at()).unwrap();
        assert!(html.contains("How do I &lt;b&gt;bold&lt;/b&gt;?"));
        assert!(html.contains("Use a &amp; b tags."));
        assert!(html.contains("<div class=\"message assistant\">"));
    }
}
