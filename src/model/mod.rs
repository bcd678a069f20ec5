//! Records stored by Saintfest: saints and posts.
//!
//! Brackets and matchups live in [`crate::bracket`].

pub mod post;
pub mod saint;

pub use post::{render_markdown, Post, PostDraft};
pub use saint::{slugify, NewSaint, Saint, SaintCategory};
