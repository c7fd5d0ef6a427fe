//! Order repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Inserted orders must carry a back-reference (`user_id`).
//! - Per-user listings are ordered by id, i.e. insertion order.
//! - Recent-order listings are ordered by `order_date DESC, id DESC`.

use crate::db::within_transaction;
use crate::model::order::{Amount, Order, OrderId, OrderStatus};
use crate::model::user::UserId;
use crate::repo::{ensure_schema_ready, EntityRef, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const ORDER_SELECT_SQL: &str = "SELECT
    id,
    order_number,
    total_amount_cents,
    order_date,
    status,
    user_id
FROM orders";

const RECENT_ORDERS_DEFAULT_LIMIT: u32 = 20;
const RECENT_ORDERS_LIMIT_MAX: u32 = 100;

/// Read model for order listings that show the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub order: Order,
    /// Username of the owning user.
    pub username: String,
}

/// Repository interface for order persistence and aggregates.
pub trait OrderRepository {
    /// Inserts an attached order and writes the generated id and order date
    /// back onto it.
    fn create_order(&self, order: &mut Order) -> RepoResult<OrderId>;
    fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>>;
    fn get_order_by_number(&self, order_number: &str) -> RepoResult<Option<Order>>;
    fn list_orders_for_user(&self, user_id: UserId) -> RepoResult<Vec<Order>>;
    /// Newest orders first, joined with their owner's username.
    fn list_recent_orders(&self, limit: Option<u32>) -> RepoResult<Vec<OrderSummary>>;
    /// Returns `false` when no order has this id.
    fn update_status(&self, id: OrderId, status: OrderStatus) -> RepoResult<bool>;
    fn delete_order(&self, id: OrderId) -> RepoResult<()>;
    fn count_by_user(&self, user_id: UserId) -> RepoResult<u64>;
    /// Sum of order totals; zero when the user has no orders.
    fn sum_by_user(&self, user_id: UserId) -> RepoResult<Amount>;
}

/// SQLite-backed order repository.
pub struct SqliteOrderRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrderRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    /// Skips the schema check for callers that already ran it on `conn`.
    pub(crate) fn unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl OrderRepository for SqliteOrderRepository<'_> {
    fn create_order(&self, order: &mut Order) -> RepoResult<OrderId> {
        order.validate()?;
        if let Some(id) = order.id {
            return Err(RepoError::AlreadyPersisted(EntityRef::Order(id)));
        }
        let user_id = order
            .user_id
            .ok_or_else(|| RepoError::DetachedOrder(order.order_number.clone()))?;

        let (id, order_date) = within_transaction(self.conn, |conn| -> RepoResult<_> {
            conn.execute(
                "INSERT INTO orders (
                    order_number,
                    total_amount_cents,
                    status,
                    user_id
                ) VALUES (?1, ?2, ?3, ?4);",
                params![
                    order.order_number.as_str(),
                    order.total_amount.cents(),
                    order.status.as_str(),
                    user_id,
                ],
            )?;
            let id = conn.last_insert_rowid();
            let order_date: i64 = conn.query_row(
                "SELECT order_date FROM orders WHERE id = ?1;",
                [id],
                |row| row.get(0),
            )?;
            Ok((id, order_date))
        })?;

        order.id = Some(id);
        order.order_date = Some(order_date);
        Ok(id)
    }

    fn get_order(&self, id: OrderId) -> RepoResult<Option<Order>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORDER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_order_row(row)?));
        }
        Ok(None)
    }

    fn get_order_by_number(&self, order_number: &str) -> RepoResult<Option<Order>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORDER_SELECT_SQL} WHERE order_number = ?1;"))?;
        let mut rows = stmt.query([order_number.trim()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_order_row(row)?));
        }
        Ok(None)
    }

    fn list_orders_for_user(&self, user_id: UserId) -> RepoResult<Vec<Order>> {
        load_orders_for_user(self.conn, user_id)
    }

    fn list_recent_orders(&self, limit: Option<u32>) -> RepoResult<Vec<OrderSummary>> {
        let limit = normalize_recent_orders_limit(limit);
        let mut stmt = self.conn.prepare(
            "SELECT
                o.id AS id,
                o.order_number AS order_number,
                o.total_amount_cents AS total_amount_cents,
                o.order_date AS order_date,
                o.status AS status,
                o.user_id AS user_id,
                u.username AS username
             FROM orders o
             INNER JOIN users u ON u.id = o.user_id
             ORDER BY o.order_date DESC, o.id DESC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            summaries.push(OrderSummary {
                order: parse_order_row(row)?,
                username: row.get("username")?,
            });
        }
        Ok(summaries)
    }

    fn update_status(&self, id: OrderId, status: OrderStatus) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE orders
             SET
                status = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, status.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn delete_order(&self, id: OrderId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM orders WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::Order(id)));
        }
        Ok(())
    }

    fn count_by_user(&self, user_id: UserId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE user_id = ?1;",
            [user_id],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative order count `{count}`")))
    }

    fn sum_by_user(&self, user_id: UserId) -> RepoResult<Amount> {
        let cents: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(total_amount_cents), 0) FROM orders WHERE user_id = ?1;",
            [user_id],
            |row| row.get(0),
        )?;
        Amount::from_cents(cents)
            .map_err(|_| RepoError::InvalidData(format!("negative order total `{cents}`")))
    }
}

/// Normalizes the recent-orders limit: default 20, capped at 100.
pub fn normalize_recent_orders_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => RECENT_ORDERS_DEFAULT_LIMIT,
        Some(value) => value.min(RECENT_ORDERS_LIMIT_MAX),
    }
}

pub(crate) fn load_orders_for_user(conn: &Connection, user_id: UserId) -> RepoResult<Vec<Order>> {
    let mut stmt = conn.prepare(&format!(
        "{ORDER_SELECT_SQL} WHERE user_id = ?1 ORDER BY id ASC;"
    ))?;
    let mut rows = stmt.query([user_id])?;
    let mut orders = Vec::new();
    while let Some(row) = rows.next()? {
        orders.push(parse_order_row(row)?);
    }
    Ok(orders)
}

fn parse_order_row(row: &Row<'_>) -> RepoResult<Order> {
    let status_text: String = row.get("status")?;
    let status = OrderStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid order status `{status_text}` in orders.status"))
    })?;

    let cents: i64 = row.get("total_amount_cents")?;
    let total_amount = Amount::from_cents(cents).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid amount `{cents}` in orders.total_amount_cents"
        ))
    })?;

    let order = Order {
        id: Some(row.get("id")?),
        order_number: row.get("order_number")?,
        total_amount,
        order_date: Some(row.get("order_date")?),
        status,
        user_id: Some(row.get("user_id")?),
    };
    order.validate().map_err(|err| {
        RepoError::InvalidData(format!("order `{}`: {err}", order.order_number))
    })?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::{normalize_recent_orders_limit, OrderRepository, SqliteOrderRepository};
    use crate::db::open_db_in_memory;
    use crate::model::order::{Amount, Order};
    use crate::repo::RepoError;

    #[test]
    fn recent_orders_limit_defaults_and_caps() {
        assert_eq!(normalize_recent_orders_limit(None), 20);
        assert_eq!(normalize_recent_orders_limit(Some(0)), 20);
        assert_eq!(normalize_recent_orders_limit(Some(5)), 5);
        assert_eq!(normalize_recent_orders_limit(Some(1_000)), 100);
    }

    #[test]
    fn detached_orders_are_not_inserted() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteOrderRepository::try_new(&conn).unwrap();
        let mut order = Order::new("ORD-1", Amount::parse("1.00").unwrap()).unwrap();

        let err = repo.create_order(&mut order).unwrap_err();
        assert!(matches!(err, RepoError::DetachedOrder(number) if number == "ORD-1"));
        assert_eq!(order.id(), None);
    }

    #[test]
    fn sum_for_user_without_orders_is_zero() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteOrderRepository::try_new(&conn).unwrap();
        assert_eq!(repo.sum_by_user(1).unwrap(), Amount::ZERO);
        assert_eq!(repo.count_by_user(1).unwrap(), 0);
    }
}
