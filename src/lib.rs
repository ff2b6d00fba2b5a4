//! A small general web search engine.
//!
//! Two halves share this crate: a polite, resumable web crawler that feeds a
//! keyword index in PostgreSQL from a Redis work queue, and a search service
//! that answers free-text queries by keyword relevance plus a one-pass
//! link-authority boost.

pub mod config;
pub mod crawler;
pub mod extractor;
pub mod fetcher;
pub mod logging;
pub mod models;
pub mod politeness;
pub mod queue;
pub mod robots;
pub mod search;
pub mod store;
pub mod url_utils;
pub mod words;
