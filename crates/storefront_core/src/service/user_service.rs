//! User directory service.
//!
//! # Responsibility
//! - Provide create/get/list/count/update APIs for user accounts.
//! - Translate repository not-found and duplicate-key failures into
//!   use-case errors.
//!
//! # Invariants
//! - Users created here have no profile; profile-owning users come from
//!   `OrderManagementService::create_user_with_profile`.
//! - Listings are sorted by `username ASC, id ASC`.

use crate::model::user::{User, UserId};
use crate::repo::user_repo::{normalize_user_limit, UserListQuery, UserRepository};
use crate::repo::{EntityRef, RepoError, RepoResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for user directory use-cases.
#[derive(Debug)]
pub enum UserServiceError {
    /// Target user does not exist.
    UserNotFound(UserId),
    /// Username is already taken.
    UsernameTaken(String),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::UsernameTaken(username) => write!(f, "username already taken: `{username}`"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent user state: {details}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for UserServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(EntityRef::User(id)) => Self::UserNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// List result envelope used by service callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsersListResult {
    /// Users sorted by `username ASC, id ASC`.
    pub items: Vec<User>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// User service facade over repository implementations.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a user without a profile and returns the stored record.
    pub fn create_user(
        &self,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<User, UserServiceError> {
        let mut user = User::new(username, email).map_err(RepoError::from)?;
        let user_id = match self.repo.create_user(&mut user) {
            Ok(id) => id,
            Err(RepoError::DuplicateKey { column, .. }) if column == "username" => {
                return Err(UserServiceError::UsernameTaken(user.username));
            }
            Err(err) => return Err(err.into()),
        };

        self.repo
            .get_user(user_id)?
            .ok_or(UserServiceError::InconsistentState(
                "created user not found in read-back",
            ))
    }

    pub fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.repo.get_user(id)
    }

    pub fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.repo.get_user_by_username(username)
    }

    /// Reports whether any user holds `username`.
    pub fn username_exists(&self, username: &str) -> RepoResult<bool> {
        self.repo.username_exists(username)
    }

    /// Lists users using optional search and pagination.
    pub fn list_users(
        &self,
        search: Option<String>,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<UsersListResult, UserServiceError> {
        let applied_limit = normalize_user_limit(limit);
        let query = UserListQuery {
            search: search.filter(|value| !value.trim().is_empty()),
            limit: Some(applied_limit),
            offset,
        };
        let items = self.repo.list_users(&query)?;
        Ok(UsersListResult {
            items,
            applied_limit,
        })
    }

    pub fn count_users(&self, search: Option<&str>) -> RepoResult<u64> {
        self.repo.count_users(search)
    }

    /// Rewrites username and email, returning the stored record.
    pub fn update_user(&self, user: &User) -> Result<User, UserServiceError> {
        let id = user.id().ok_or(RepoError::Unpersisted("user"))?;
        match self.repo.update_user(user) {
            Ok(()) => {}
            Err(RepoError::DuplicateKey { column, .. }) if column == "username" => {
                return Err(UserServiceError::UsernameTaken(user.username.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        self.repo
            .get_user(id)?
            .ok_or(UserServiceError::InconsistentState(
                "updated user not found in read-back",
            ))
    }
}
