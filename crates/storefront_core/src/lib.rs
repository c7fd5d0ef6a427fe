//! Core domain logic for the storefront: users, their profile, their
//! orders and blog posts, persisted in SQLite.
//! This crate is the single source of truth for lifecycle invariants.

pub mod association;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use association::{attach, detach, is_consistent, AssociationError};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::blog_post::{BlogPost, BlogPostId};
pub use model::order::{Amount, Order, OrderId, OrderStatus};
pub use model::user::{ProfileUpdate, User, UserId, UserProfile};
pub use model::validation::ValidationError;
pub use repo::blog_post_repo::{
    BlogPostListQuery, BlogPostRepository, SqliteBlogPostRepository,
};
pub use repo::order_repo::{OrderRepository, OrderSummary, SqliteOrderRepository};
pub use repo::user_repo::{SqliteUserRepository, UserListQuery, UserRepository};
pub use repo::{EntityRef, RepoError, RepoResult};
pub use service::order_management::{
    LifecycleError, LifecycleResult, NewOrder, NewProfile, NewUser, OrderManagementService,
    OrderStats,
};
pub use service::user_service::{UserService, UserServiceError, UsersListResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
