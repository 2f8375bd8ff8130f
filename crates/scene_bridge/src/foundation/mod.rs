//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the bridge:
//! - Identity allocation for nodes, scenes and callbacks
//! - Ordered property bags and patch merging
//! - Math types shared with the engine wire format
//! - Arena handles and timestamps
//! - Logging utilities

pub mod ids;
pub mod props;
pub mod math;
pub mod collections;
pub mod time;
pub mod logging;
