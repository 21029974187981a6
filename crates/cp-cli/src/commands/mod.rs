pub mod candidates;
pub mod config;
