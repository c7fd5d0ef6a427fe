//! User and user-profile repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist users together with their exclusively-owned profile.
//! - Load users with their profile and their full order collection.
//!
//! # Invariants
//! - A profile row is inserted in the same transaction as its user row.
//! - `users.profile_id` is unique, so one profile row backs at most one user.
//! - Loaded order collections come from `orders.user_id`, so both sides of
//!   the relation agree on every read.

use crate::db::within_transaction;
use crate::model::user::{ProfileId, ProfileUpdate, User, UserId, UserProfile};
use crate::repo::order_repo::load_orders_for_user;
use crate::repo::{ensure_schema_ready, like_pattern, EntityRef, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT
    u.id AS id,
    u.username AS username,
    u.email AS email,
    u.created_at AS created_at,
    u.updated_at AS updated_at,
    p.id AS profile_id,
    p.first_name AS first_name,
    p.last_name AS last_name,
    p.date_of_birth AS date_of_birth,
    p.bio AS bio,
    p.phone_number AS phone_number
FROM users u
LEFT JOIN user_profiles p ON p.id = u.profile_id";

const USERS_DEFAULT_LIMIT: u32 = 10;
const USERS_LIMIT_MAX: u32 = 50;

/// Query options for user listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListQuery {
    /// Substring match over username or email.
    pub search: Option<String>,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for users and their profile.
pub trait UserRepository {
    /// Inserts the user (and its profile, if any) and writes generated ids and
    /// timestamps back onto `user`.
    fn create_user(&self, user: &mut User) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Zero-or-one tolerant existence check on the natural key.
    fn username_exists(&self, username: &str) -> RepoResult<bool>;
    /// Users ordered by username, with optional search and pagination.
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>>;
    fn count_users(&self, search: Option<&str>) -> RepoResult<u64>;
    /// Rewrites username and email of an existing user.
    fn update_user(&self, user: &User) -> RepoResult<()>;
    /// Writes bio and phone number; `false` when the user or its profile is
    /// missing.
    fn update_profile_fields(&self, user_id: UserId, update: &ProfileUpdate) -> RepoResult<bool>;
    /// Deletes the user row only; dependents are the caller's responsibility.
    fn delete_user(&self, id: UserId) -> RepoResult<()>;
    fn delete_profile(&self, id: ProfileId) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    /// Skips the schema check for callers that already ran it on `conn`.
    pub(crate) fn unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn find_one(&self, filter: &str, value: Value) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE {filter};"))?;
        let mut rows = stmt.query([value])?;
        match rows.next()? {
            Some(row) => {
                let mut user = parse_user_row(row)?;
                user.orders = load_orders_for_user(self.conn, row.get("id")?)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &mut User) -> RepoResult<UserId> {
        user.validate()?;
        if let Some(id) = user.id {
            return Err(RepoError::AlreadyPersisted(EntityRef::User(id)));
        }

        let (user_id, profile_id, created_at, updated_at) =
            within_transaction(self.conn, |conn| -> RepoResult<_> {
                let profile_id = user
                    .profile
                    .as_ref()
                    .map(|profile| insert_profile(conn, profile))
                    .transpose()?;

                conn.execute(
                    "INSERT INTO users (username, email, profile_id) VALUES (?1, ?2, ?3);",
                    params![user.username.as_str(), user.email.as_str(), profile_id],
                )?;
                let user_id = conn.last_insert_rowid();
                let (created_at, updated_at): (i64, i64) = conn.query_row(
                    "SELECT created_at, updated_at FROM users WHERE id = ?1;",
                    [user_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok((user_id, profile_id, created_at, updated_at))
            })?;

        user.id = Some(user_id);
        user.created_at = Some(created_at);
        user.updated_at = Some(updated_at);
        if let Some(profile) = user.profile.as_mut() {
            profile.id = profile_id;
        }
        Ok(user_id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.find_one("u.id = ?1", Value::Integer(id))
    }

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.find_one("u.username = ?1", Value::Text(username.trim().to_string()))
    }

    fn username_exists(&self, username: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1);",
            [username.trim()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(search) = normalized_search(query.search.as_deref()) {
            sql.push_str(" AND (u.username LIKE ? ESCAPE '\\' OR u.email LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(search);
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }

        sql.push_str(" ORDER BY u.username ASC, u.id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_user_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            let mut user = parse_user_row(row)?;
            user.orders = load_orders_for_user(self.conn, row.get("id")?)?;
            users.push(user);
        }
        Ok(users)
    }

    fn count_users(&self, search: Option<&str>) -> RepoResult<u64> {
        let count: i64 = match normalized_search(search) {
            Some(search) => self.conn.query_row(
                "SELECT COUNT(*)
                 FROM users
                 WHERE username LIKE ?1 ESCAPE '\\'
                    OR email LIKE ?1 ESCAPE '\\';",
                [like_pattern(search)],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))?,
        };
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative user count `{count}`")))
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;
        let id = user.id.ok_or(RepoError::Unpersisted("user"))?;

        let changed = self.conn.execute(
            "UPDATE users
             SET
                username = ?2,
                email = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, user.username.as_str(), user.email.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::User(id)));
        }
        Ok(())
    }

    fn update_profile_fields(&self, user_id: UserId, update: &ProfileUpdate) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE user_profiles
             SET
                bio = ?2,
                phone_number = ?3
             WHERE id = (SELECT profile_id FROM users WHERE id = ?1);",
            params![
                user_id,
                update.bio.as_deref(),
                update.phone_number.as_deref()
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_user(&self, id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::User(id)));
        }
        Ok(())
    }

    fn delete_profile(&self, id: ProfileId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM user_profiles WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Profile(id)));
        }
        Ok(())
    }
}

/// Normalizes list limit according to the user listing contract.
pub fn normalize_user_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => USERS_DEFAULT_LIMIT,
        Some(value) => value.min(USERS_LIMIT_MAX),
    }
}

fn normalized_search(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|value| !value.is_empty())
}

fn insert_profile(conn: &Connection, profile: &UserProfile) -> RepoResult<ProfileId> {
    profile.validate()?;
    if let Some(id) = profile.id {
        return Err(RepoError::AlreadyPersisted(EntityRef::Profile(id)));
    }

    conn.execute(
        "INSERT INTO user_profiles (
            first_name,
            last_name,
            date_of_birth,
            bio,
            phone_number
        ) VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            profile.first_name.as_str(),
            profile.last_name.as_str(),
            profile.date_of_birth.as_deref(),
            profile.bio.as_deref(),
            profile.phone_number.as_deref(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let profile = match row.get::<_, Option<ProfileId>>("profile_id")? {
        Some(profile_id) => Some(UserProfile {
            id: Some(profile_id),
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            date_of_birth: row.get("date_of_birth")?,
            bio: row.get("bio")?,
            phone_number: row.get("phone_number")?,
        }),
        None => None,
    };

    let user = User {
        id: Some(row.get("id")?),
        username: row.get("username")?,
        email: row.get("email")?,
        profile,
        orders: Vec::new(),
        created_at: Some(row.get("created_at")?),
        updated_at: Some(row.get("updated_at")?),
    };
    user.validate()
        .map_err(|err| RepoError::InvalidData(format!("user `{}`: {err}", user.username)))?;
    Ok(user)
}
