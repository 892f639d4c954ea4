//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Euler angles and colors
//! - Bounding volumes and frustum culling
//! - Id allocation
//! - Logging utilities

pub mod math;
pub mod euler;
pub mod color;
pub mod bounds;
pub mod ids;
pub mod logging;
