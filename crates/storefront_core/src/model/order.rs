//! Order (many-side dependent) model.
//!
//! # Invariants
//! - New orders always start in `OrderStatus::Pending`.
//! - `user_id` is the back-reference to the owning user and is only written
//!   by the association manager; it is `None` only while detached.
//! - `Amount` is never negative.

use crate::model::user::UserId;
use crate::model::validation::{check_order_number, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Storage-assigned order identifier.
pub type OrderId = i64;

/// Order processing state.
///
/// Any state may follow any other; `update_order_status` is a plain field
/// write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Initial state of every new order.
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All states, in display order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Stable lowercase label, also used as the stored value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a stored label back into a status.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-negative money value in minor units (cents).
///
/// Deserialization goes through [`Amount::from_cents`], so negative input is
/// rejected rather than stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Builds an amount from cents, rejecting negative values.
    pub fn from_cents(cents: i64) -> Result<Self, ValidationError> {
        if cents < 0 {
            return Err(ValidationError::InvalidAmount(cents.to_string()));
        }
        Ok(Self(cents))
    }

    /// Parses decimal text such as `99.99`, `149.5` or `12`.
    ///
    /// At most two fractional digits are accepted; signs and exponents are
    /// rejected.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidAmount(text.to_string());
        let trimmed = text.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) if !fraction.is_empty() => (whole, fraction),
            Some(_) => return Err(invalid()),
            None => (trimmed, ""),
        };

        if whole.is_empty()
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction_cents = match fraction.len() {
            0 => 0,
            1 => i64::from(fraction.as_bytes()[0] - b'0') * 10,
            _ => fraction.parse::<i64>().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction_cents))
            .map(Self)
            .ok_or_else(invalid)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// Adds two amounts, returning `None` on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Mean of `count` amounts summing to `self`, rounded half-up to the cent.
    ///
    /// Returns zero when `count` is zero.
    pub fn average_over(self, count: u64) -> Amount {
        if count == 0 {
            return Self::ZERO;
        }
        let count = i128::from(count);
        let doubled = i128::from(self.0) * 2 + count;
        let cents = doubled / (2 * count);
        // cents <= self.0, so the narrowing cannot fail.
        Self(i64::try_from(cents).unwrap_or(i64::MAX))
    }
}

impl TryFrom<i64> for Amount {
    type Error = ValidationError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        Self::from_cents(cents)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// One order row and its back-reference to the owning user.
///
/// Storage-assigned fields and the back-reference are never read from
/// serialized input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(skip_deserializing)]
    pub(crate) id: Option<OrderId>,
    /// Unique business key, e.g. `ORD-2025-0001`.
    pub order_number: String,
    pub total_amount: Amount,
    /// Epoch milliseconds, assigned by storage on insert.
    #[serde(skip_deserializing)]
    pub(crate) order_date: Option<i64>,
    pub status: OrderStatus,
    #[serde(skip_deserializing)]
    pub(crate) user_id: Option<UserId>,
}

impl Order {
    /// Creates a detached, unsaved order in `Pending` state.
    pub fn new(
        order_number: impl Into<String>,
        total_amount: Amount,
    ) -> Result<Self, ValidationError> {
        let order_number = order_number.into().trim().to_string();
        check_order_number(&order_number)?;
        Ok(Self {
            id: None,
            order_number,
            total_amount,
            order_date: None,
            status: OrderStatus::Pending,
            user_id: None,
        })
    }

    /// Creates a detached order with an identity that already exists in
    /// storage.
    pub fn with_id(
        id: OrderId,
        order_number: impl Into<String>,
        total_amount: Amount,
    ) -> Result<Self, ValidationError> {
        let mut order = Self::new(order_number, total_amount)?;
        order.id = Some(id);
        Ok(order)
    }

    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    pub fn order_date(&self) -> Option<i64> {
        self.order_date
    }

    /// Owning user, `None` while detached.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn is_attached(&self) -> bool {
        self.user_id.is_some()
    }

    /// Checks caller-editable fields before persistence.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_order_number(&self.order_number)?;
        if self.total_amount.cents() < 0 {
            return Err(ValidationError::InvalidAmount(self.total_amount.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Amount, Order, OrderStatus};

    #[test]
    fn amount_parses_decimal_text() {
        assert_eq!(Amount::parse("99.99").unwrap().cents(), 9_999);
        assert_eq!(Amount::parse("149.5").unwrap().cents(), 14_950);
        assert_eq!(Amount::parse(" 12 ").unwrap().cents(), 1_200);
        assert_eq!(Amount::parse("0.07").unwrap().cents(), 7);
    }

    #[test]
    fn amount_rejects_malformed_text() {
        for text in ["", "-1", "1.234", "1.", ".5", "1e3", "abc", "+2"] {
            assert!(Amount::parse(text).is_err(), "`{text}` should be rejected");
        }
        assert!(Amount::from_cents(-1).is_err());
    }

    #[test]
    fn amount_displays_two_decimals() {
        assert_eq!(Amount::parse("149.5").unwrap().to_string(), "149.50");
        assert_eq!(Amount::from_cents(7).unwrap().to_string(), "0.07");
    }

    #[test]
    fn average_rounds_half_up() {
        let total = Amount::parse("249.49").unwrap();
        assert_eq!(total.average_over(2).to_string(), "124.75");
        assert_eq!(Amount::parse("10").unwrap().average_over(3).to_string(), "3.33");
        assert_eq!(total.average_over(0), Amount::ZERO);
    }

    #[test]
    fn amount_deserialization_rejects_negative_cents() {
        assert_eq!(serde_json::from_str::<Amount>("14950").unwrap().cents(), 14_950);
        assert!(serde_json::from_str::<Amount>("-1").is_err());
        assert_eq!(serde_json::to_string(&Amount::from_cents(99).unwrap()).unwrap(), "99");
    }

    #[test]
    fn order_deserialization_ignores_storage_fields() {
        let order: Order = serde_json::from_str(
            r#"{"id": 7, "order_number": "ORD-1", "total_amount": 250,
                "order_date": 1, "status": "shipped", "user_id": 3}"#,
        )
        .unwrap();
        assert_eq!(order.id(), None);
        assert_eq!(order.order_date(), None);
        assert_eq!(order.user_id(), None);
        assert_eq!(order.status, OrderStatus::Shipped);

        assert!(serde_json::from_str::<Order>(
            r#"{"order_number": "ORD-1", "total_amount": -250, "status": "pending"}"#
        )
        .is_err());
    }

    #[test]
    fn new_order_is_pending_and_detached() {
        let order = Order::new("ORD-1", Amount::parse("99.99").unwrap()).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.id(), None);
        assert!(!order.is_attached());
    }

    #[test]
    fn status_labels_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("lost"), None);
    }
}
