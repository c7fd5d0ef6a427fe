//! Domain model for users, their profile, their orders and blog posts.
//!
//! # Responsibility
//! - Define the owner (`User`) and dependent (`UserProfile`, `Order`) records.
//! - Define the standalone `BlogPost` record.
//! - Validate caller input before it reaches storage.
//!
//! # Invariants
//! - Identifiers are assigned by storage and never change afterwards.
//! - A `UserProfile` value is owned by exactly one `User`.

pub mod blog_post;
pub mod order;
pub mod user;
pub mod validation;
