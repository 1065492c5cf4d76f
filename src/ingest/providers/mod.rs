// src/ingest/providers/mod.rs
pub mod brave_search;
pub mod hacker_news;

pub use brave_search::BraveSearchProvider;
pub use hacker_news::HackerNewsProvider;
