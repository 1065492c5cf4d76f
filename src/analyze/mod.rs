// src/analyze/mod.rs
//! Per-item analysis: scoring formulas and technology tagging.

pub mod scoring;
pub mod tags;

pub use crate::analyze::scoring::{ranked_story_score, web_result_score};
pub use crate::analyze::tags::extract_tech_tags;
