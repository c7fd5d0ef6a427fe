//! User/order lifecycle coordinator.
//!
//! # Responsibility
//! - Create users together with their profile, and orders under a user.
//! - Delete users with cascade to orders and removal of the orphaned
//!   profile; delete single orders after detaching them.
//! - Expose per-user aggregates and recent-order listings.
//!
//! # Invariants
//! - Every operation runs inside exactly one `UnitOfWork`; a failure at any
//!   step rolls back every write of that operation.
//! - Orders are attached to their owner before they are inserted and
//!   detached before they are deleted.
//! - Generated ids are written back onto the returned objects.
//! - Deleting something that does not exist is a no-op reported as `false`.

use crate::association::{attach, detach, AssociationError};
use crate::db::{DbError, UnitOfWork};
use crate::model::order::{Amount, Order, OrderId, OrderStatus};
use crate::model::user::{ProfileUpdate, User, UserId, UserProfile};
use crate::model::validation::ValidationError;
use crate::repo::order_repo::{
    normalize_recent_orders_limit, OrderRepository, OrderSummary, SqliteOrderRepository,
};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::{ensure_schema_ready, EntityRef, RepoError};
use log::{info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Error categories surfaced by lifecycle operations.
#[derive(Debug)]
pub enum LifecycleError {
    /// Referenced record does not exist.
    NotFound(EntityRef),
    /// Malformed input or an association misuse.
    InvalidArgument(String),
    /// A unique natural key (username, order number) is already taken.
    DuplicateKey { table: String, column: String },
    /// Any other backing-store failure.
    Storage(RepoError),
}

impl LifecycleError {
    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::Storage(_) => "storage_failure",
        }
    }
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::DuplicateKey { table, column } => {
                write!(f, "duplicate value for unique key {table}.{column}")
            }
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LifecycleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(entity) => Self::NotFound(entity),
            RepoError::DuplicateKey { table, column } => Self::DuplicateKey { table, column },
            RepoError::Validation(err) => Self::InvalidArgument(err.to_string()),
            err @ (RepoError::AlreadyPersisted(_)
            | RepoError::Unpersisted(_)
            | RepoError::DetachedOrder(_)) => Self::InvalidArgument(err.to_string()),
            other => Self::Storage(other),
        }
    }
}

impl From<DbError> for LifecycleError {
    fn from(value: DbError) -> Self {
        RepoError::from(value).into()
    }
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

impl From<ValidationError> for LifecycleError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

impl From<AssociationError> for LifecycleError {
    fn from(value: AssociationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

/// Account fields for a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
}

/// Profile fields for a new user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProfile {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
}

/// Caller-supplied fields for a new order. Status always starts `Pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_number: String,
    pub total_amount: Amount,
}

/// Aggregate view over one user's orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderStats {
    pub order_count: u64,
    pub total_amount: Amount,
    /// Mean order total rounded half-up to the cent; zero without orders.
    pub average_amount: Amount,
}

/// Coordinator for user/profile/order lifecycles over one connection.
pub struct OrderManagementService<'conn> {
    conn: &'conn mut Connection,
    recent_orders_limit: u32,
}

impl<'conn> OrderManagementService<'conn> {
    /// Creates a coordinator over a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> LifecycleResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self {
            conn,
            recent_orders_limit: normalize_recent_orders_limit(None),
        })
    }

    /// Overrides the default page size of `find_recent_orders`.
    pub fn with_recent_orders_limit(mut self, limit: u32) -> Self {
        self.recent_orders_limit = normalize_recent_orders_limit(Some(limit));
        self
    }

    /// Creates a user and its profile, returning the user with generated ids.
    pub fn create_user_with_profile(
        &mut self,
        new_user: &NewUser,
        new_profile: &NewProfile,
    ) -> LifecycleResult<User> {
        let mut profile = UserProfile::new(
            new_profile.first_name.as_str(),
            new_profile.last_name.as_str(),
        )?;
        if let Some(date_of_birth) = new_profile.date_of_birth.as_deref() {
            profile = profile.with_date_of_birth(date_of_birth)?;
        }
        profile.bio = new_profile.bio.clone();
        profile.phone_number = new_profile.phone_number.clone();

        let mut user = User::new(new_user.username.as_str(), new_user.email.as_str())?;
        user.set_profile(Some(profile));

        self.run("user_create", |conn| {
            SqliteUserRepository::unchecked(conn).create_user(&mut user)?;
            Ok(())
        })?;
        Ok(user)
    }

    /// Creates a `Pending` order under an existing user.
    ///
    /// Fails with `NotFound` when the user does not exist; no row is written
    /// in that case.
    pub fn create_order(&mut self, user_id: UserId, new_order: &NewOrder) -> LifecycleResult<Order> {
        let mut order = Order::new(new_order.order_number.as_str(), new_order.total_amount)?;

        self.run("order_create", |conn| {
            let mut owner = SqliteUserRepository::unchecked(conn)
                .get_user(user_id)?
                .ok_or(LifecycleError::NotFound(EntityRef::User(user_id)))?;

            attach(&mut owner, &mut order)?;
            SqliteOrderRepository::unchecked(conn).create_order(&mut order)?;
            Ok(())
        })?;
        Ok(order)
    }

    /// Deletes a user, its orders and its profile. Returns `false` when the
    /// user does not exist.
    pub fn delete_user(&mut self, user_id: UserId) -> LifecycleResult<bool> {
        self.run("user_delete", |conn| {
            let users = SqliteUserRepository::unchecked(conn);
            let orders = SqliteOrderRepository::unchecked(conn);
            let Some(mut user) = users.get_user(user_id)? else {
                return Ok(false);
            };

            for mut order in user.orders().to_vec() {
                detach(&mut user, &mut order)?;
                if let Some(order_id) = order.id() {
                    orders.delete_order(order_id)?;
                }
            }

            let orphan = user.set_profile(None);
            users.delete_user(user_id)?;
            if let Some(profile_id) = orphan.and_then(|profile| profile.id()) {
                users.delete_profile(profile_id)?;
            }
            Ok(true)
        })
    }

    /// Detaches an order from its owner and deletes it. Returns `false` when
    /// the order does not exist.
    pub fn delete_order(&mut self, order_id: OrderId) -> LifecycleResult<bool> {
        self.run("order_delete", |conn| {
            let orders = SqliteOrderRepository::unchecked(conn);
            let Some(mut order) = orders.get_order(order_id)? else {
                return Ok(false);
            };

            if let Some(owner_id) = order.user_id() {
                let mut owner = SqliteUserRepository::unchecked(conn)
                    .get_user(owner_id)?
                    .ok_or(LifecycleError::NotFound(EntityRef::User(owner_id)))?;
                detach(&mut owner, &mut order)?;
            }
            orders.delete_order(order_id)?;
            Ok(true)
        })
    }

    /// Writes a new status. Returns `false` when the order does not exist.
    pub fn update_order_status(
        &mut self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> LifecycleResult<bool> {
        self.run("order_update_status", |conn| {
            Ok(SqliteOrderRepository::unchecked(conn).update_status(order_id, status)?)
        })
    }

    /// Writes bio and phone number. Returns `false` when the user or its
    /// profile does not exist.
    pub fn update_user_profile(
        &mut self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> LifecycleResult<bool> {
        self.run("profile_update", |conn| {
            Ok(SqliteUserRepository::unchecked(conn).update_profile_fields(user_id, update)?)
        })
    }

    /// Loads a user with profile and orders.
    pub fn find_user_with_orders(&mut self, user_id: UserId) -> LifecycleResult<Option<User>> {
        self.run("user_find", |conn| {
            Ok(SqliteUserRepository::unchecked(conn).get_user(user_id)?)
        })
    }

    pub fn find_order(&mut self, order_id: OrderId) -> LifecycleResult<Option<Order>> {
        self.run("order_find", |conn| {
            Ok(SqliteOrderRepository::unchecked(conn).get_order(order_id)?)
        })
    }

    /// Newest orders first with their owner's username.
    ///
    /// `None` uses the coordinator's configured page size.
    pub fn find_recent_orders(&mut self, limit: Option<u32>) -> LifecycleResult<Vec<OrderSummary>> {
        let limit = limit.unwrap_or(self.recent_orders_limit);
        self.run("order_list_recent", |conn| {
            Ok(SqliteOrderRepository::unchecked(conn).list_recent_orders(Some(limit))?)
        })
    }

    pub fn count_orders_by_user(&mut self, user_id: UserId) -> LifecycleResult<u64> {
        self.run("order_count", |conn| {
            Ok(SqliteOrderRepository::unchecked(conn).count_by_user(user_id)?)
        })
    }

    /// Sum of order totals; `0.00` when the user has no orders.
    pub fn total_amount_by_user(&mut self, user_id: UserId) -> LifecycleResult<Amount> {
        self.run("order_total", |conn| {
            Ok(SqliteOrderRepository::unchecked(conn).sum_by_user(user_id)?)
        })
    }

    pub fn order_stats(&mut self, user_id: UserId) -> LifecycleResult<OrderStats> {
        self.run("order_stats", |conn| {
            let orders = SqliteOrderRepository::unchecked(conn);
            let order_count = orders.count_by_user(user_id)?;
            let total_amount = orders.sum_by_user(user_id)?;
            Ok(OrderStats {
                order_count,
                total_amount,
                average_amount: total_amount.average_over(order_count),
            })
        })
    }

    fn run<T>(
        &mut self,
        operation: &'static str,
        work: impl FnOnce(&Connection) -> LifecycleResult<T>,
    ) -> LifecycleResult<T> {
        let started_at = Instant::now();
        let result = UnitOfWork::begin(&mut *self.conn, operation)
            .map_err(LifecycleError::from)
            .and_then(|uow| {
                let value = work(uow.conn())?;
                uow.commit()?;
                Ok(value)
            });

        match &result {
            Ok(_) => info!(
                "event={operation} module=order_management status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={operation} module=order_management status=error duration_ms={} error_code={} error={err}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }
}
