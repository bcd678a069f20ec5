//! Saintfest
//!
//! An annual single-elimination tournament of saints, decided by public vote.
//!
//! - `model/`: saints, categories and blog posts
//! - `bracket/`: draw, winner propagation, daily scheduling, layout and SVG export
//! - `voting/`: voter fingerprints, ballot checks and tallies
//! - `import/`: saint catalogues from CSV (Polars) and Excel (calamine)
//! - `store/`: SQLite persistence with numbered migrations
//!
//! With the `api` feature: the Axum server (`api_server`), admin sessions
//! (`auth`) and the Askama pages (`web`).

pub mod bracket;
pub mod config;
pub mod error;
pub mod import;
pub mod model;
pub mod store;
pub mod voting;

#[cfg(feature = "api")]
pub mod api_server;
#[cfg(feature = "api")]
pub mod auth;
#[cfg(feature = "api")]
pub mod web;

// Re-export commonly used types
pub use bracket::{generate_bracket_structure, Bracket, BracketPlan, Matchup, MatchupState};
pub use config::Config;
pub use error::{Result, SaintfestError};
pub use import::{import_saints, ImportFormat, ImportReport};
pub use model::{NewSaint, Post, PostDraft, Saint, SaintCategory};
pub use store::Store;
pub use voting::{fingerprint, VoteTally};

#[cfg(feature = "api")]
pub use api_server::{create_router, AppState};
