//! Markdown rendering
//!
//! Post and comment bodies are rendered once, when their file is loaded, and
//! the HTML is kept next to the markdown. Fenced code blocks with a known
//! language are highlighted with syntect; the syntax and theme sets are loaded
//! once per process and shared by every renderer.
//!
//! ```
//! use inkpost::services::markdown::MarkdownRenderer;
//!
//! let html = MarkdownRenderer::new().render("# Hello\n\nSome **bold** text.");
//! assert!(html.contains("<h1>Hello</h1>"));
//! assert!(html.contains("<strong>bold</strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use std::sync::{Arc, OnceLock};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

const HIGHLIGHT_THEME: &str = "base16-ocean.dark";

struct Highlighter {
    syntaxes: SyntaxSet,
    theme: Option<Theme>,
}

impl Highlighter {
    fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<Highlighter>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| {
            let mut themes = ThemeSet::load_defaults();
            Arc::new(Self {
                syntaxes: SyntaxSet::load_defaults_newlines(),
                theme: themes.themes.remove(HIGHLIGHT_THEME),
            })
        }))
    }

    /// Highlighted HTML for `code`, or `None` when the language or the
    /// theme is unavailable.
    fn highlight(&self, code: &str, lang: &str) -> Option<String> {
        let theme = self.theme.as_ref()?;
        let syntax = self
            .syntaxes
            .find_syntax_by_token(lang)
            .or_else(|| self.syntaxes.find_syntax_by_extension(lang))?;
        highlighted_html_for_string(code, &self.syntaxes, syntax, theme).ok()
    }
}

/// Fenced or indented code block being collected
struct PendingCode {
    lang: Option<String>,
    text: String,
}

impl PendingCode {
    fn into_html(self, highlighter: &Highlighter) -> String {
        match self.lang {
            Some(lang) => highlighter.highlight(&self.text, &lang).unwrap_or_else(|| {
                format!(
                    "<pre><code class=\"language-{}\">{}</code></pre>",
                    escape_html(&lang),
                    escape_html(&self.text)
                )
            }),
            None => format!("<pre><code>{}</code></pre>", escape_html(&self.text)),
        }
    }
}

/// Markdown to HTML renderer. Cheap to clone.
#[derive(Clone)]
pub struct MarkdownRenderer {
    highlighter: Arc<Highlighter>,
    options: Options,
}

impl std::fmt::Debug for MarkdownRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkdownRenderer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Renderer with tables, strikethrough, task lists and smart punctuation.
    pub fn new() -> Self {
        Self {
            highlighter: Highlighter::shared(),
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_SMART_PUNCTUATION,
        }
    }

    /// Renders `markdown` to HTML. Never fails; raw HTML in the input is
    /// passed through, so untrusted text must be escaped first.
    pub fn render(&self, markdown: &str) -> String {
        let mut pending: Option<PendingCode> = None;
        let mut events = Vec::new();

        for event in Parser::new_ext(markdown, self.options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    pending = Some(PendingCode {
                        lang,
                        text: String::new(),
                    });
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(code) = pending.take() {
                        events.push(Event::Html(code.into_html(&self.highlighter).into()));
                    }
                }
                Event::Text(text) => match pending.as_mut() {
                    Some(code) => code.text.push_str(&text),
                    None => events.push(Event::Text(text)),
                },
                other => events.push(other),
            }
        }

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}

/// Escapes the five HTML special characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
