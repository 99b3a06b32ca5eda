//! Markdown rendering and reading-time estimates
//!
//! Markdown is parsed with pulldown-cmark and fenced code blocks are
//! highlighted with syntect. Raw HTML in the source is escaped and
//! `javascript:` style link targets are neutralised, so the output can be
//! embedded in a page without further sanitising.
//!
//! ```
//! use learnsite::services::markdown::{markdown_to_html, time_estimate};
//!
//! let html = markdown_to_html("# Hello\n\n<script>alert(1)</script>");
//! assert!(html.contains("<h1>Hello</h1>"));
//! assert!(!html.contains("<script>"));
//! assert_eq!(time_estimate(30), 2);
//! ```

use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);
static DEFAULT_RENDERER: Lazy<MarkdownRenderer> = Lazy::new(MarkdownRenderer::new);

const DEFAULT_THEME: &str = "InspiredGitHub";

/// Words read per minute by [`time_estimate`]
pub const WORDS_PER_MINUTE: u64 = 20;

/// Estimated minutes to read `word_count` words.
///
/// `word_count / 20`, rounded half to even: 30 words is 2 minutes and 50
/// words is also 2.
pub fn time_estimate(word_count: u64) -> u64 {
    (word_count as f64 / WORDS_PER_MINUTE as f64).round_ties_even() as u64
}

/// Whitespace separated word count
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Render markdown with the shared default renderer
pub fn markdown_to_html(markdown: &str) -> String {
    DEFAULT_RENDERER.render(markdown)
}

/// Markdown to HTML renderer with syntax highlighting.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    theme_name: String,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::with_theme(DEFAULT_THEME)
    }

    /// Use a specific syntect theme; unknown names fall back to the default
    pub fn with_theme(theme_name: &str) -> Self {
        let theme_name = if THEME_SET.themes.contains_key(theme_name) {
            theme_name.to_string()
        } else {
            DEFAULT_THEME.to_string()
        };
        Self { theme_name }
    }

    /// Render markdown to an HTML fragment
    pub fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let parser = Parser::new_ext(markdown, options);
        let events = self.process_events(parser);

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events.into_iter());
        output
    }

    fn process_events<'a>(&self, parser: Parser<'a>) -> Vec<Event<'a>> {
        let mut events = Vec::new();
        let mut code: Option<(Option<String>, String)> = None;

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.trim().is_empty() => {
                            Some(lang.trim().to_string())
                        }
                        _ => None,
                    };
                    code = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, content)) = code.take() {
                        let html = match lang {
                            Some(lang) => self.highlight_code(&content, &lang),
                            None => plain_code_block(&content, None),
                        };
                        events.push(Event::Html(html.into()));
                    }
                }
                Event::Text(text) if code.is_some() => {
                    if let Some((_, content)) = code.as_mut() {
                        content.push_str(&text);
                    }
                }
                // raw HTML is shown as text, never interpreted
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                other => events.push(other),
            }
        }

        events
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = SYNTAX_SET
            .find_syntax_by_token(lang)
            .or_else(|| SYNTAX_SET.find_syntax_by_extension(lang));

        match (syntax, THEME_SET.themes.get(&self.theme_name)) {
            (Some(syntax), Some(theme)) => {
                highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme)
                    .unwrap_or_else(|_| plain_code_block(code, Some(lang)))
            }
            _ => plain_code_block(code, Some(lang)),
        }
    }
}

fn plain_code_block(code: &str, lang: Option<&str>) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>",
            html_escape(lang),
            html_escape(code)
        ),
        None => format!("<pre><code>{}</code></pre>", html_escape(code)),
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme: String = url
        .trim_start()
        .chars()
        .take_while(|c| *c != ':')
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let has_scheme = url.contains(':');
    if has_scheme && matches!(scheme.as_str(), "javascript" | "vbscript" | "data") {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_time_estimate_reference_values() {
        assert_eq!(time_estimate(0), 0);
        assert_eq!(time_estimate(20), 1);
        assert_eq!(time_estimate(30), 2);
        assert_eq!(time_estimate(50), 2);
        assert_eq!(time_estimate(70), 4);
        assert_eq!(time_estimate(9), 0);
        assert_eq!(time_estimate(11), 1);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("one  two\nthree"), 3);
    }

    #[test]
    fn test_render_basic_markdown() {
        let html = markdown_to_html("# Title\n\nSome **bold** and *italic* text.\n\n- a\n- b");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
        assert!(html.contains("<li>a</li>"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = markdown_to_html("<script>alert('x')</script>\n\nInline <b onclick=\"x\">tag</b>");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b onclick"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_javascript_links_neutralised() {
        let html = markdown_to_html("[click](javascript:alert(1)) [ok](https://example.com)");
        assert!(!html.contains("javascript:"));
        assert!(html.contains("href=\"#\""));
        assert!(html.contains("href=\"https://example.com\""));
    }

    #[test]
    fn test_fenced_code_is_highlighted() {
        let html = markdown_to_html("```rust\nfn main() {}\n```");
        assert!(html.contains("<pre"));
        assert!(html.contains("style="));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain_block() {
        let html = markdown_to_html("```nosuchlang\n<x>\n```");
        assert!(html.contains("class=\"language-nosuchlang\""));
        assert!(html.contains("&lt;x&gt;"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(markdown_to_html(""), "");
    }

    #[test]
    fn test_unknown_theme_falls_back() {
        let renderer = MarkdownRenderer::with_theme("no-such-theme");
        assert_eq!(renderer.theme_name, DEFAULT_THEME);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn property_time_estimate_close_to_exact(words in 0u64..100_000) {
            let minutes = time_estimate(words) as f64;
            let exact = words as f64 / WORDS_PER_MINUTE as f64;
            prop_assert!((minutes - exact).abs() <= 0.5);
        }

        #[test]
        fn property_rendered_html_has_no_script_tags(text in "[a-z<>/ ]{0,60}") {
            let html = markdown_to_html(&format!("{}<script>{}", text, text));
            prop_assert!(!html.contains("<script"));
        }
    }
}
