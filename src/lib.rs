// src/lib.rs

pub mod apply;
pub mod cancellation;
pub mod catalog;
pub mod combobox;
pub mod compat_registry;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod domains;
pub mod engine;
pub mod errors;
pub mod events;
pub mod filters;
pub mod global;
pub mod logging;
pub mod models;
pub mod system;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use engine::TweakEngine;
pub use errors::{EngineError, EngineResult};
