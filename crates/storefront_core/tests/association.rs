use storefront_core::{attach, detach, is_consistent, Amount, AssociationError, Order, User};

fn owner(id: i64, username: &str) -> User {
    User::with_id(id, username, format!("{username}@example.com")).unwrap()
}

fn orders(count: usize) -> Vec<Order> {
    (1..=count)
        .map(|index| {
            Order::with_id(
                index as i64,
                format!("ORD-{index}"),
                Amount::from_cents(index as i64 * 100).unwrap(),
            )
            .unwrap()
        })
        .collect()
}

/// Both directions of the relation agree for every owner and order.
fn assert_bidirectional(owners: &[User], orders: &[Order]) {
    for owner in owners {
        assert!(is_consistent(owner), "{} lists a foreign order", owner.username);
        for order in orders {
            let listed = owner
                .orders()
                .iter()
                .any(|entry| entry.id() == order.id());
            assert_eq!(
                listed,
                order.user_id() == owner.id(),
                "{} and {} disagree",
                owner.username,
                order.order_number
            );
        }
    }
}

#[test]
fn attach_detach_sequences_keep_both_sides_in_sync() {
    let mut owners = vec![owner(1, "alice"), owner(2, "bob")];
    let mut orders = orders(5);

    // Deterministic LCG walk over (owner, order, attach|detach).
    let mut state: u64 = 0x2545_f491;
    for _ in 0..200 {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let owner_index = (state >> 33) as usize % owners.len();
        let order_index = (state >> 17) as usize % orders.len();
        let should_attach = (state >> 7) & 1 == 0;

        let owner = &mut owners[owner_index];
        let order = &mut orders[order_index];
        let result = if should_attach {
            attach(owner, order)
        } else {
            detach(owner, order)
        };

        match result {
            Ok(()) => {}
            Err(AssociationError::AttachedElsewhere { .. })
            | Err(AssociationError::OwnerMismatch { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
        assert_bidirectional(&owners, &orders);
    }
}

#[test]
fn order_moves_between_owners_only_through_detach() {
    let mut alice = owner(1, "alice");
    let mut bob = owner(2, "bob");
    let mut order = orders(1).remove(0);

    attach(&mut alice, &mut order).unwrap();
    assert!(matches!(
        attach(&mut bob, &mut order),
        Err(AssociationError::AttachedElsewhere {
            current_owner: 1,
            requested_owner: 2,
            ..
        })
    ));
    assert!(bob.orders().is_empty());

    detach(&mut alice, &mut order).unwrap();
    attach(&mut bob, &mut order).unwrap();

    assert!(alice.orders().is_empty());
    assert_eq!(bob.orders().len(), 1);
    assert_eq!(order.user_id(), Some(2));
}

#[test]
fn detach_of_absent_order_only_clears_back_reference() {
    let mut alice = owner(1, "alice");
    let mut listed = orders(2);
    attach(&mut alice, &mut listed[0]).unwrap();

    let mut stray = listed.remove(1);
    detach(&mut alice, &mut stray).unwrap();

    assert_eq!(stray.user_id(), None);
    assert_eq!(alice.orders().len(), 1);
    assert_eq!(alice.orders()[0].order_number, "ORD-1");
}

#[test]
fn attach_preserves_insertion_order() {
    let mut alice = owner(1, "alice");
    let mut all = orders(4);
    for index in [2, 0, 3, 1] {
        attach(&mut alice, &mut all[index]).unwrap();
    }

    let numbers: Vec<&str> = alice
        .orders()
        .iter()
        .map(|order| order.order_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["ORD-3", "ORD-1", "ORD-4", "ORD-2"]);
}
