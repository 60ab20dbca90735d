//! Markdown to Confluence storage format (an XHTML subset).
//!
//! Covers what generated summaries use: headings, paragraphs, nested lists,
//! block quotes, fenced code, rules, emphasis, inline code and links.

use anyhow::Result;
use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::Unordered => "ul",
            Self::Ordered => "ol",
        }
    }
}

pub struct StorageFormatter {
    heading: Regex,
    rule: Regex,
    unordered_item: Regex,
    ordered_item: Regex,
    bold: Regex,
    italic: Regex,
    link: Regex,
}

#[derive(Default)]
struct Blocks {
    html: String,
    paragraph: Vec<String>,
    quote: Vec<String>,
    lists: Vec<(ListKind, usize)>,
}

impl StorageFormatter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            heading: Regex::new(r"^(#{1,6})\s+(.*?)\s*#*\s*$")?,
            rule: Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$")?,
            unordered_item: Regex::new(r"^(\s*)[-*+]\s+(.*)$")?,
            ordered_item: Regex::new(r"^(\s*)\d+[.)]\s+(.*)$")?,
            bold: Regex::new(r"\*\*(.+?)\*\*|__(.+?)__")?,
            italic: Regex::new(r"\*([^*\s][^*]*?)\*")?,
            link: Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)")?,
        })
    }

    pub fn convert(&self, markdown: &str) -> String {
        let mut blocks = Blocks::default();
        let mut fence: Option<Vec<String>> = None;

        for line in markdown.lines() {
            if let Some(code) = fence.as_mut() {
                if line.trim_start().starts_with("```") {
                    blocks.html.push_str("<pre><code>");
                    blocks.html.push_str(&escape(&code.join("\n")));
                    blocks.html.push_str("</code></pre>");
                    fence = None;
                } else {
                    code.push(line.to_string());
                }
                continue;
            }

            if line.trim_start().starts_with("```") {
                self.flush_all(&mut blocks);
                fence = Some(Vec::new());
                continue;
            }

            if line.trim().is_empty() {
                self.flush_all(&mut blocks);
                continue;
            }

            if let Some(caps) = self.heading.captures(line) {
                self.flush_all(&mut blocks);
                let level = caps[1].len();
                blocks.html.push_str(&format!(
                    "<h{level}>{}</h{level}>",
                    self.inline(&caps[2])
                ));
                continue;
            }

            if self.rule.is_match(line) {
                self.flush_all(&mut blocks);
                blocks.html.push_str("<hr />");
                continue;
            }

            if let Some(quoted) = line.trim_start().strip_prefix('>') {
                self.flush_paragraph(&mut blocks);
                self.close_lists(&mut blocks);
                blocks.quote.push(quoted.trim().to_string());
                continue;
            }

            let item = self
                .unordered_item
                .captures(line)
                .map(|caps| (ListKind::Unordered, caps[1].len(), caps[2].to_string()))
                .or_else(|| {
                    self.ordered_item
                        .captures(line)
                        .map(|caps| (ListKind::Ordered, caps[1].len(), caps[2].to_string()))
                });
            if let Some((kind, indent, text)) = item {
                self.flush_paragraph(&mut blocks);
                self.flush_quote(&mut blocks);
                self.list_item(&mut blocks, kind, indent, &text);
                continue;
            }

            // Continuation of a list item or a plain paragraph line.
            if !blocks.lists.is_empty() && line.starts_with(' ') {
                blocks.html.push(' ');
                blocks.html.push_str(&self.inline(line.trim()));
                continue;
            }
            self.close_lists(&mut blocks);
            self.flush_quote(&mut blocks);
            blocks.paragraph.push(line.trim().to_string());
        }

        if let Some(code) = fence {
            blocks.html.push_str("<pre><code>");
            blocks.html.push_str(&escape(&code.join("\n")));
            blocks.html.push_str("</code></pre>");
        }
        self.flush_all(&mut blocks);

        debug!(
            "Converted {} chars of markdown to {} chars of storage format",
            markdown.len(),
            blocks.html.len()
        );
        blocks.html
    }

    fn list_item(&self, blocks: &mut Blocks, kind: ListKind, indent: usize, text: &str) {
        while let Some(&(top_kind, top_indent)) = blocks.lists.last() {
            if top_indent <= indent {
                break;
            }
            blocks.lists.pop();
            blocks.html.push_str(&format!("</li></{}>", top_kind.tag()));
        }

        match blocks.lists.last().copied() {
            Some((top_kind, top_indent)) if top_indent == indent && top_kind == kind => {
                blocks.html.push_str("</li><li>");
            }
            Some((top_kind, top_indent)) if top_indent == indent => {
                blocks.lists.pop();
                blocks.html.push_str(&format!("</li></{}>", top_kind.tag()));
                blocks.html.push_str(&format!("<{}><li>", kind.tag()));
                blocks.lists.push((kind, indent));
            }
            _ => {
                blocks.html.push_str(&format!("<{}><li>", kind.tag()));
                blocks.lists.push((kind, indent));
            }
        }
        blocks.html.push_str(&self.inline(text));
    }

    fn close_lists(&self, blocks: &mut Blocks) {
        while let Some((kind, _)) = blocks.lists.pop() {
            blocks.html.push_str(&format!("</li></{}>", kind.tag()));
        }
    }

    fn flush_paragraph(&self, blocks: &mut Blocks) {
        if blocks.paragraph.is_empty() {
            return;
        }
        let text = blocks.paragraph.join(" ");
        blocks.paragraph.clear();
        blocks.html.push_str(&format!("<p>{}</p>", self.inline(&text)));
    }

    fn flush_quote(&self, blocks: &mut Blocks) {
        if blocks.quote.is_empty() {
            return;
        }
        let text = blocks.quote.join(" ");
        blocks.quote.clear();
        blocks
            .html
            .push_str(&format!("<blockquote><p>{}</p></blockquote>", self.inline(&text)));
    }

    fn flush_all(&self, blocks: &mut Blocks) {
        self.flush_paragraph(blocks);
        self.flush_quote(blocks);
        self.close_lists(blocks);
    }

    /// Inline markup. Code spans are escaped verbatim; everything else gets
    /// links and emphasis.
    fn inline(&self, text: &str) -> String {
        let mut out = String::new();
        for (index, segment) in text.split('`').enumerate() {
            let odd = index % 2 == 1;
            if odd {
                out.push_str("<code>");
                out.push_str(&escape(segment));
                out.push_str("</code>");
            } else {
                let escaped = escape(segment);
                let linked = self.link.replace_all(&escaped, r#"<a href="$2">$1</a>"#);
                let bold = self.bold.replace_all(&linked, "<strong>$1$2</strong>");
                let italic = self.italic.replace_all(&bold, "<em>$1</em>");
                out.push_str(&italic);
            }
        }
        // An unmatched backtick leaves the last segment inside <code>.
        if text.matches('`').count() % 2 == 1 {
            if let Some(stripped) = out.strip_suffix("</code>") {
                let open = stripped.rfind("<code>").unwrap_or(0);
                let mut fixed = stripped[..open].to_string();
                fixed.push('`');
                fixed.push_str(&stripped[open + "<code>".len()..]);
                return fixed;
            }
        }
        out
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(markdown: &str) -> String {
        StorageFormatter::new().unwrap().convert(markdown)
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let html = convert("# Summary\n\nThe team met\nto plan.\n\n## Key Points");
        assert_eq!(
            html,
            "<h1>Summary</h1><p>The team met to plan.</p><h2>Key Points</h2>"
        );
    }

    #[test]
    fn test_flat_bullet_list() {
        let html = convert("- first\n- **second**\n* third");
        assert_eq!(
            html,
            "<ul><li>first</li><li><strong>second</strong></li><li>third</li></ul>"
        );
    }

    #[test]
    fn test_nested_and_ordered_lists() {
        let html = convert("1. one\n   - inner\n2. two\n\nafter");
        assert_eq!(
            html,
            "<ol><li>one<ul><li>inner</li></ul></li><li>two</li></ol><p>after</p>"
        );
    }

    #[test]
    fn test_code_fence_is_escaped_verbatim() {
        let html = convert("```\nif a < b && c {\n  **not bold**\n}\n```");
        assert_eq!(
            html,
            "<pre><code>if a &lt; b &amp;&amp; c {\n  **not bold**\n}</code></pre>"
        );
    }

    #[test]
    fn test_inline_markup() {
        let html = convert("See [docs](https://example.com/a) and `x < y` with *care*.");
        assert_eq!(
            html,
            "<p>See <a href=\"https://example.com/a\">docs</a> and <code>x &lt; y</code> with <em>care</em>.</p>"
        );
    }

    #[test]
    fn test_unmatched_backtick_is_literal() {
        assert_eq!(convert("it's a `tick"), "<p>it's a `tick</p>");
    }

    #[test]
    fn test_rule_and_quote() {
        let html = convert("> quoted\n> text\n\n---\n\nend");
        assert_eq!(
            html,
            "<blockquote><p>quoted text</p></blockquote><hr /><p>end</p>"
        );
    }

    #[test]
    fn test_snake_case_survives() {
        assert_eq!(convert("call get_user_id now"), "<p>call get_user_id now</p>");
    }
}
