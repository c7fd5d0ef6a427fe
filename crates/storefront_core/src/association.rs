//! Owner ↔ dependent association between users and their orders.
//!
//! # Responsibility
//! - Keep `User::orders` and `Order::user_id` consistent in memory.
//! - Be the only code path that writes either side of the relation.
//!
//! # Invariants
//! - After `attach(u, o)`: `o.user_id == u.id` and `o` appears once in
//!   `u.orders`.
//! - After `detach(u, o)`: `o.user_id` is `None` and `o` is absent from
//!   `u.orders`.
//! - Every check runs before the first mutation; a failed call changes
//!   nothing.
//!
//! Order identity is the storage id when both sides carry one, and the
//! order number otherwise, so unsaved orders can be attached before insert.

use crate::model::order::Order;
use crate::model::user::{User, UserId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AssociationResult<T> = Result<T, AssociationError>;

/// Invalid-argument conditions for association calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationError {
    /// Owner has not been persisted, so it has no identity to point at.
    UnpersistedOwner { username: String },
    /// Order already belongs to another user.
    AttachedElsewhere {
        order_number: String,
        current_owner: UserId,
        requested_owner: UserId,
    },
    /// Detach was asked of a user that does not own the order.
    OwnerMismatch {
        order_number: String,
        owner: UserId,
        actual_owner: UserId,
    },
}

impl Display for AssociationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnpersistedOwner { username } => {
                write!(f, "user `{username}` has no id; persist it before linking orders")
            }
            Self::AttachedElsewhere {
                order_number,
                current_owner,
                requested_owner,
            } => write!(
                f,
                "order `{order_number}` belongs to user {current_owner}, cannot attach to user {requested_owner}"
            ),
            Self::OwnerMismatch {
                order_number,
                owner,
                actual_owner,
            } => write!(
                f,
                "order `{order_number}` belongs to user {actual_owner}, not user {owner}"
            ),
        }
    }
}

impl Error for AssociationError {}

/// Links `order` to `owner` on both sides.
///
/// Calling it again with the same pair refreshes the owner's copy of the
/// order and never adds a second entry.
pub fn attach(owner: &mut User, order: &mut Order) -> AssociationResult<()> {
    let owner_id = persisted_id(owner)?;
    if let Some(current_owner) = order.user_id {
        if current_owner != owner_id {
            return Err(AssociationError::AttachedElsewhere {
                order_number: order.order_number.clone(),
                current_owner,
                requested_owner: owner_id,
            });
        }
    }

    order.user_id = Some(owner_id);
    match owner
        .orders
        .iter_mut()
        .find(|entry| same_order(entry, order))
    {
        Some(entry) => *entry = order.clone(),
        None => owner.orders.push(order.clone()),
    }
    Ok(())
}

/// Unlinks `order` from `owner` on both sides.
///
/// Absent orders are a no-op on the collection side; the back-reference is
/// still cleared.
pub fn detach(owner: &mut User, order: &mut Order) -> AssociationResult<()> {
    let owner_id = persisted_id(owner)?;
    if let Some(actual_owner) = order.user_id {
        if actual_owner != owner_id {
            return Err(AssociationError::OwnerMismatch {
                order_number: order.order_number.clone(),
                owner: owner_id,
                actual_owner,
            });
        }
    }

    owner.orders.retain(|entry| !same_order(entry, order));
    order.user_id = None;
    Ok(())
}

/// Checks the in-memory side of the relation for `owner`.
///
/// True when the owner is persisted, every listed order points back at it,
/// and no order is listed twice.
pub fn is_consistent(owner: &User) -> bool {
    let Some(owner_id) = owner.id else {
        return owner.orders.is_empty();
    };

    owner.orders.iter().enumerate().all(|(index, order)| {
        order.user_id == Some(owner_id)
            && !owner.orders[..index]
                .iter()
                .any(|earlier| same_order(earlier, order))
    })
}

fn persisted_id(owner: &User) -> AssociationResult<UserId> {
    owner.id.ok_or_else(|| AssociationError::UnpersistedOwner {
        username: owner.username.clone(),
    })
}

fn same_order(left: &Order, right: &Order) -> bool {
    match (left.id, right.id) {
        (Some(left_id), Some(right_id)) => left_id == right_id,
        _ => left.order_number == right.order_number,
    }
}

#[cfg(test)]
mod tests {
    use super::{attach, detach, is_consistent, AssociationError};
    use crate::model::order::{Amount, Order};
    use crate::model::user::User;

    fn owner(id: i64, username: &str) -> User {
        User::with_id(id, username, format!("{username}@example.com")).unwrap()
    }

    fn order(number: &str) -> Order {
        Order::new(number, Amount::parse("10.00").unwrap()).unwrap()
    }

    #[test]
    fn attach_links_both_sides() {
        let mut alice = owner(1, "alice");
        let mut first = order("ORD-1");

        attach(&mut alice, &mut first).unwrap();

        assert_eq!(first.user_id(), Some(1));
        assert_eq!(alice.orders().len(), 1);
        assert_eq!(alice.orders()[0].order_number, "ORD-1");
        assert!(is_consistent(&alice));
    }

    #[test]
    fn attach_twice_keeps_one_entry() {
        let mut alice = owner(1, "alice");
        let mut first = order("ORD-1");

        attach(&mut alice, &mut first).unwrap();
        attach(&mut alice, &mut first).unwrap();

        assert_eq!(alice.orders().len(), 1);
    }

    #[test]
    fn attach_requires_persisted_owner() {
        let mut draft = User::new("draft", "draft@example.com").unwrap();
        let mut first = order("ORD-1");

        let err = attach(&mut draft, &mut first).unwrap_err();
        assert!(matches!(err, AssociationError::UnpersistedOwner { .. }));
        assert!(first.user_id().is_none());
        assert!(draft.orders().is_empty());
    }

    #[test]
    fn detach_from_wrong_owner_changes_nothing() {
        let mut alice = owner(1, "alice");
        let mut bob = owner(2, "bob");
        let mut first = order("ORD-1");
        attach(&mut alice, &mut first).unwrap();

        let err = detach(&mut bob, &mut first).unwrap_err();
        assert!(matches!(
            err,
            AssociationError::OwnerMismatch {
                owner: 2,
                actual_owner: 1,
                ..
            }
        ));
        assert_eq!(first.user_id(), Some(1));
        assert_eq!(alice.orders().len(), 1);
    }

    #[test]
    fn unsaved_and_saved_copies_share_identity_by_number() {
        let mut alice = owner(1, "alice");
        let mut draft = order("ORD-1");
        attach(&mut alice, &mut draft).unwrap();

        let mut saved = Order::with_id(10, "ORD-1", Amount::parse("10.00").unwrap()).unwrap();
        detach(&mut alice, &mut saved).unwrap();

        assert!(alice.orders().is_empty());
    }
}
