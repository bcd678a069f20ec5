//! Blog posts that introduce matchups and announce results

use chrono::{DateTime, Utc};
use pulldown_cmark::{html, Event, Options, Parser};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SaintfestError};
use crate::model::saint::slugify;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub slug: String,
    pub title: String,
    /// Markdown source
    pub body: String,
    pub published: bool,
    pub matchup_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn render_html(&self) -> String {
        render_markdown(&self.body)
    }

    /// First paragraph of the body as plain text, cut at `max_chars`.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let first = self
            .body
            .split("\n\n")
            .map(str::trim)
            .find(|p| !p.is_empty() && !p.starts_with('#'))
            .unwrap_or("");

        let plain: String = first
            .chars()
            .filter(|c| !matches!(c, '*' | '_' | '`' | '#'))
            .collect();

        if plain.chars().count() <= max_chars {
            plain
        } else {
            let cut: String = plain.chars().take(max_chars).collect();
            format!("{}…", cut.trim_end())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub matchup_id: Option<i64>,
    #[serde(default)]
    pub slug: Option<String>,
}

impl PostDraft {
    pub fn validated(mut self) -> Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(SaintfestError::Invalid("post title must not be empty".to_string()));
        }

        let slug = match self.slug.take() {
            Some(s) if !s.trim().is_empty() => slugify(&s),
            _ => slugify(&self.title),
        };
        if slug.is_empty() {
            return Err(SaintfestError::Invalid(format!(
                "cannot derive a slug from '{}'",
                self.title
            )));
        }
        self.slug = Some(slug);
        Ok(self)
    }

    /// Slug after validation; derived from the title otherwise.
    pub fn resolved_slug(&self) -> String {
        self.slug
            .clone()
            .unwrap_or_else(|| slugify(&self.title))
    }
}

/// Markdown to HTML. Raw HTML in the source is escaped and shown as text.
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
