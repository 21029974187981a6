//! Shared domain types and configuration for the CodePress extension bridge.
//!
//! - [`types`]: candidate identifiers and the user record carried in auth payloads
//! - [`config`]: TOML configuration with defaults and validation
//! - [`origin`]: page-origin allow-list matching

pub mod config;
pub mod origin;
pub mod types;
