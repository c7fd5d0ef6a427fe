//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own transaction boundaries so callers never manage them directly.

pub mod order_management;
pub mod user_service;
