// src/config/mod.rs
//! Runtime configuration: pipeline tunables (TOML + env) and provider endpoints (env).

pub mod pipeline;
pub mod providers;

pub use pipeline::PipelineConfig;
pub use providers::ProviderSettings;
