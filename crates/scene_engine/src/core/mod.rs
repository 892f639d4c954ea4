//! # Core Engine Module
//!
//! Shared configuration used by every subsystem.

pub mod config;

pub use config::{
    CameraDefaults,
    Config,
    ConfigError,
    EngineConfig,
    RendererConfig,
};
