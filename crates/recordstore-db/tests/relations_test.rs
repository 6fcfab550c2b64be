//! Integration tests for saving and loading related entities.

mod common;

use assert_matches::assert_matches;
use common::TestHarness;
use recordstore_db::models::{
    Address, Product, Todo, User, Wallet, ADDRESS_USER, PRODUCT_LIKED_BY_USERS, USER_ADDRESSES,
    USER_LIKED_PRODUCTS, USER_TODOS, USER_WALLET, WALLET_USER,
};
use recordstore_db::{values, ConstraintKind, Db, Error, Filter, Preload, Query};

#[test]
fn create_with_saves_children_with_foreign_keys() {
    let h = TestHarness::new();
    let user = h.create_user_with_wallet("99", 1_000_000, &["Jalan A", "Jalan B"]);

    let wallet = h.store.find_one(&Query::<Wallet>::by_key("W99")).unwrap();
    assert_eq!(wallet.user_id.as_str(), "99");
    assert_eq!(wallet.balance, 1_000_000);

    let addresses = h
        .store
        .find_all(&Query::<Address>::new().where_raw("user_id = ?", values!["99"]))
        .unwrap();
    assert_eq!(addresses.len(), 2);
    assert!(user.addresses.iter().all(|a| a.id > 0 && a.user_id.as_str() == "99"));
}

#[test]
fn create_with_rolls_back_when_a_child_fails() {
    let h = TestHarness::new();
    let mut user = User::new("77", "Rollback", "");
    // an empty wallet key is written as NULL and breaks the NOT NULL key
    user.wallet = Some(Wallet::new("", "", 10));

    let err = h.store.create_with(&mut user, &[&USER_WALLET]).unwrap_err();
    assert_matches!(
        err,
        Error::ConstraintViolation {
            kind: ConstraintKind::NotNull,
            ..
        }
    );
    assert_matches!(
        h.store.find_one(&Query::<User>::by_key("77")),
        Err(Error::NotFound { .. })
    );
}

#[test]
fn preload_has_one_and_has_many() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &["Jalan A", "Jalan B"]);
    h.store.insert(&mut User::new("2", "No", "Children")).unwrap();

    let users = h
        .store
        .find_all(
            &Query::<User>::new()
                .order_by("id")
                .preload(&USER_WALLET)
                .preload(&USER_ADDRESSES),
        )
        .unwrap();
    assert_eq!(users.len(), 2);

    let with = &users[0];
    assert_eq!(with.wallet.as_ref().map(|w| w.balance), Some(500));
    assert_eq!(with.addresses.len(), 2);

    let without = &users[1];
    assert!(without.wallet.is_none());
    assert!(without.addresses.is_empty());
}

#[test]
fn preload_with_condition_filters_children_not_parents() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &["Jalan A", "Jalan B", "Jalan C"]);

    let step = Preload::new(&USER_ADDRESSES).filter(Filter::raw("address <> ?", values!["Jalan B"]));
    let user = h
        .store
        .find_one(&Query::<User>::by_key("1").preload(step))
        .unwrap();
    let addresses: Vec<&str> = user.addresses.iter().map(|a| a.address.as_str()).collect();
    assert_eq!(addresses, ["Jalan A", "Jalan C"]);
}

#[test]
fn nested_preload_walks_belongs_to_then_has_many() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &["Jalan A", "Jalan B"]);

    let step = Preload::new(&WALLET_USER).then(&USER_ADDRESSES);
    let wallets = h.store.find_all(&Query::<Wallet>::new().preload(step)).unwrap();
    assert_eq!(wallets.len(), 1);

    let owner = wallets[0].user.as_deref().expect("wallet owner loaded");
    assert_eq!(owner.id.as_str(), "1");
    assert_eq!(owner.addresses.len(), 2);
}

#[test]
fn preload_skips_soft_deleted_children() {
    let h = TestHarness::new();
    h.seed_users(1);
    let mut kept = Todo::new("1", "Kept", "");
    let mut gone = Todo::new("1", "Gone", "");
    h.store.insert(&mut kept).unwrap();
    h.store.insert(&mut gone).unwrap();
    h.store.delete_entity(&mut gone).unwrap();

    let user = h
        .store
        .find_one(&Query::<User>::by_key("1").preload(&USER_TODOS))
        .unwrap();
    assert_eq!(user.todos.len(), 1);
    assert_eq!(user.todos[0].title, "Kept");
}

#[test]
fn load_on_fetched_rows() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &["Jalan A"]);

    let mut addresses = h.store.find_all(&Query::<Address>::new()).unwrap();
    h.store.load(&mut addresses, &&ADDRESS_USER).unwrap();
    let owner = addresses[0].user.as_deref().expect("address owner loaded");
    assert_eq!(owner.name.first_name, "User 1");
}

#[test]
fn preload_many_to_many_both_directions() {
    let h = TestHarness::new();
    let mut user = User::new("1", "Eko", "");
    user.liked_products = vec![Product::new("P001", "Kopi", 1000), Product::new("P002", "Teh", 500)];
    h.store.create_with(&mut user, &[&USER_LIKED_PRODUCTS]).unwrap();

    let user = h
        .store
        .find_one(&Query::<User>::by_key("1").preload(&USER_LIKED_PRODUCTS))
        .unwrap();
    let ids: Vec<&str> = user.liked_products.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["P001", "P002"]);

    let product = h
        .store
        .find_one(&Query::<Product>::by_key("P002").preload(&PRODUCT_LIKED_BY_USERS))
        .unwrap();
    assert_eq!(product.liked_by_users.len(), 1);
    assert_eq!(product.liked_by_users[0].id.as_str(), "1");
}

#[test]
fn preload_all_loads_every_declared_relation() {
    let h = TestHarness::new();
    let mut user = User::new("1", "Eko", "Khannedy");
    user.wallet = Some(Wallet::new("W1", "", 1_000_000));
    user.addresses = vec![Address::new("", "Jalan A"), Address::new("", "Jalan B")];
    user.liked_products = vec![Product::new("P001", "Kopi", 1000)];
    h.store
        .create_with(&mut user, &[&USER_WALLET, &USER_ADDRESSES, &USER_LIKED_PRODUCTS])
        .unwrap();
    h.store.insert(&mut User::new("2", "Budi", "")).unwrap();

    let users = h
        .store
        .find_all(&Query::<User>::new().order_by("users.id").preload_all())
        .unwrap();
    assert_eq!(users.len(), 2);

    let eko = &users[0];
    assert_eq!(eko.wallet.as_ref().map(|w| w.id.as_str()), Some("W1"));
    assert_eq!(eko.addresses.len(), 2);
    assert_eq!(eko.liked_products.len(), 1);
    assert_eq!(eko.liked_products[0].id.as_str(), "P001");

    let budi = &users[1];
    assert!(budi.wallet.is_none());
    assert!(budi.addresses.is_empty() && budi.liked_products.is_empty());

    let wallet = h
        .store
        .find_one(&Query::<Wallet>::by_key("W1").preload_all())
        .unwrap();
    assert_eq!(wallet.user.as_ref().map(|u| u.id.as_str()), Some("1"));
}

#[test]
fn join_has_one_fills_child_or_leaves_it_absent() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &[]);
    h.store.insert(&mut User::new("2", "No", "Wallet")).unwrap();

    let users = h
        .store
        .find_all(&Query::<User>::new().join(&USER_WALLET).order_by("users.id"))
        .unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].wallet.as_ref().map(|w| w.id.as_str()), Some("W1"));
    assert!(users[1].wallet.is_none());
}

#[test]
fn join_filters_on_child_columns() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &[]);
    h.create_user_with_wallet("2", 2_000_000, &[]);

    let rich = h
        .store
        .find_all(
            &Query::<User>::new()
                .join(&USER_WALLET)
                .where_raw("\"Wallet\".balance > ?", values![1_000_000]),
        )
        .unwrap();
    assert_eq!(rich.len(), 1);
    assert_eq!(rich[0].id.as_str(), "2");
}

#[test]
fn join_has_many_repeats_the_parent_per_child() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &["Jalan A", "Jalan B"]);

    let rows = h
        .store
        .find_all(&Query::<User>::new().join(&USER_ADDRESSES))
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|u| u.id.as_str() == "1" && u.addresses.len() == 1));
}

#[test]
fn join_many_to_many_is_refused() {
    let h = TestHarness::new();
    let err = h
        .store
        .find_all(&Query::<User>::new().join(&USER_LIKED_PRODUCTS))
        .unwrap_err();
    assert_matches!(err, Error::Invalid(_));
}

#[test]
fn raw_join_with_parameters_and_count() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &[]);
    h.create_user_with_wallet("2", 600_000, &[]);
    h.create_user_with_wallet("3", 700_000, &[]);

    let q = Query::<User>::new().join_raw(
        "JOIN wallets ON wallets.user_id = users.id AND wallets.balance > ?",
        values![500_000],
    );
    assert_eq!(h.store.count(&q).unwrap(), 2);
    let users = h.store.find_all(&q.order_by("users.id")).unwrap();
    let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, ["2", "3"]);
    // a raw join loads nothing into the entity
    assert!(users[0].wallet.is_none());
}

#[test]
fn count_with_relation_join() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &[]);
    h.create_user_with_wallet("2", 700_000, &[]);
    h.store.insert(&mut User::new("3", "No", "Wallet")).unwrap();

    let q = Query::<User>::new()
        .join(&USER_WALLET)
        .where_raw("\"Wallet\".balance > ?", values![100]);
    assert_eq!(h.store.count(&q).unwrap(), 2);
}
