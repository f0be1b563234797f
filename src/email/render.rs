use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::email::EmailError;

/// One content block of a block-built campaign body. Campaigns store an
/// ordered JSON array of these; unknown block types are dropped at parse
/// time so old admin UIs can keep writing new shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailBlock {
    Header {
        text: String,
    },
    Text {
        text: String,
    },
    Button {
        text: String,
        url: String,
    },
    Divider,
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },
}

pub fn parse_blocks(email_blocks_json: &str) -> Vec<EmailBlock> {
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(email_blocks_json).unwrap_or_default();
    raw.into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect()
}

pub struct Renderer {
    var_re: Regex,
    href_re: Regex,
}

impl Renderer {
    pub fn new() -> Result<Self, EmailError> {
        Ok(Self {
            var_re: Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}")
                .map_err(|e| EmailError::render(format!("var pattern: {e}")))?,
            href_re: Regex::new(r#"href="(https?://[^"]+)""#)
                .map_err(|e| EmailError::render(format!("href pattern: {e}")))?,
        })
    }

    /// `{{firstName}}`-style substitution. Unknown variables render as
    /// the empty string.
    pub fn substitute(&self, template: &str, vars: &HashMap<String, String>) -> String {
        self.var_re
            .replace_all(template, |caps: &regex::Captures| {
                vars.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned()
    }

    /// Plain-body rendering: substitution plus line-break preservation.
    pub fn render_plain(&self, body: &str, vars: &HashMap<String, String>) -> String {
        let substituted = self.substitute(body, vars);
        let with_breaks = substituted.replace('\n', "<br>\n");
        format!(
            "<div style=\"font-family:Arial,Helvetica,sans-serif;font-size:15px;line-height:1.6;color:#1f2933;\">{with_breaks}</div>"
        )
    }

    /// Block rendering for campaigns built in the visual editor.
    pub fn render_blocks(&self, blocks: &[EmailBlock], vars: &HashMap<String, String>) -> String {
        let mut out = String::from(
            "<div style=\"font-family:Arial,Helvetica,sans-serif;max-width:600px;margin:0 auto;color:#1f2933;\">\n",
        );
        for block in blocks {
            match block {
                EmailBlock::Header { text } => {
                    let text = html_escape::encode_text(&self.substitute(text, vars)).into_owned();
                    out.push_str(&format!(
                        "<h1 style=\"font-size:24px;margin:16px 0;\">{text}</h1>\n"
                    ));
                }
                EmailBlock::Text { text } => {
                    let text = html_escape::encode_text(&self.substitute(text, vars))
                        .replace('\n', "<br>");
                    out.push_str(&format!(
                        "<p style=\"font-size:15px;line-height:1.6;margin:12px 0;\">{text}</p>\n"
                    ));
                }
                EmailBlock::Button { text, url } => {
                    let text = html_escape::encode_text(&self.substitute(text, vars)).into_owned();
                    let url = self.substitute(url, vars);
                    out.push_str(&format!(
                        "<a href=\"{url}\" style=\"display:inline-block;background:#2563eb;color:#ffffff;padding:12px 24px;border-radius:6px;text-decoration:none;margin:12px 0;\">{text}</a>\n"
                    ));
                }
                EmailBlock::Divider => {
                    out.push_str("<hr style=\"border:none;border-top:1px solid #e5e7eb;margin:20px 0;\">\n");
                }
                EmailBlock::Image { url, alt } => {
                    let alt = html_escape::encode_text(alt.as_deref().unwrap_or("")).into_owned();
                    out.push_str(&format!(
                        "<img src=\"{url}\" alt=\"{alt}\" style=\"max-width:100%;margin:12px 0;\">\n"
                    ));
                }
            }
        }
        out.push_str("</div>");
        out
    }

    /// Rewrite every external link through the click-tracking redirect and
    /// append the open pixel. Links that already carry a `bid=` marker were
    /// pre-tracked by the editor and are left alone.
    pub fn apply_tracking(&self, html: &str, base_url: &str, send_id: &str) -> String {
        let mut rewritten = self
            .href_re
            .replace_all(html, |caps: &regex::Captures| {
                let url = &caps[1];
                if url.contains("bid=") || url.contains("/track/click") {
                    return caps[0].to_string();
                }
                format!(
                    "href=\"{base_url}/track/click?sid={send_id}&url={}\"",
                    urlencoding::encode(url)
                )
            })
            .into_owned();
        rewritten.push_str(&format!(
            "\n<img src=\"{base_url}/track/open?sid={send_id}\" width=\"1\" height=\"1\" style=\"display:none;\" alt=\"\">"
        ));
        rewritten
    }

    /// Unsubscribe footer appended below the rendered body.
    pub fn unsubscribe_footer(&self, base_url: &str, token: &str) -> String {
        format!(
            "\n<div style=\"font-size:12px;color:#9aa5b1;margin-top:24px;\"><a href=\"{base_url}/unsubscribe?token={token}\" style=\"color:#9aa5b1;\">Unsubscribe</a></div>"
        )
    }
}
