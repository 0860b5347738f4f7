//! Hero data-service tools for the chat harness.
//!
//! Each tool is a pass-through JSON GET against the data service at
//! `API_BASE_URL`; `getCardsByOwner` filters the card list locally.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use flux_ai_harness::ToolRegistry;
//! use flux_tools::{ReqwestHeroApi, register_hero_tools};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ToolRegistry::new();
//! register_hero_tools(&mut registry, Arc::new(ReqwestHeroApi::from_env()?))?;
//! # Ok(())
//! # }
//! ```

pub mod api;
mod tools;

pub use api::{
    API_BASE_URL_ENV, DEFAULT_API_BASE_URL, HeroApi, HeroApiConfig, HeroApiError, ReqwestHeroApi,
};
pub use tools::{HeroTool, hero_tool_registry, register_hero_tools};
