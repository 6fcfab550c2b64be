//! Integration tests for association mode: find, append, replace, delete,
//! clear and count on a single owner.

mod common;

use assert_matches::assert_matches;
use common::TestHarness;
use recordstore_db::models::{
    Address, Product, Todo, User, Wallet, USER_ADDRESSES, USER_LIKED_PRODUCTS, USER_TODOS,
    WALLET_USER,
};
use recordstore_db::{values, ConstraintKind, Db, Error, Filter, Query};

fn product_ids(products: &[Product]) -> Vec<&str> {
    products.iter().map(|p| p.id.as_str()).collect()
}

#[test]
fn many_to_many_find_append_delete() {
    let h = TestHarness::new();
    let users = h.seed_users(1);
    let likes = h.store.association(&users[0], &USER_LIKED_PRODUCTS);

    let mut products = vec![
        Product::new("P001", "Kopi", 1000),
        Product::new("P002", "Teh", 500),
        Product::new("P003", "Susu", 750),
    ];
    likes.append(&mut products).unwrap();
    assert_eq!(likes.count().unwrap(), 3);

    let cheap = likes
        .find(Some(Filter::raw("price < ?", values![800])))
        .unwrap();
    assert_eq!(product_ids(&cheap), ["P002", "P003"]);

    assert_eq!(likes.delete(&products[..1]).unwrap(), 1);
    assert_eq!(product_ids(&likes.find(None).unwrap()), ["P002", "P003"]);
    // unlinking leaves the product in place
    assert!(h.store.find_one(&Query::<Product>::by_key("P001")).is_ok());
}

#[test]
fn many_to_many_replace_swaps_links() {
    let h = TestHarness::new();
    let users = h.seed_users(1);
    let likes = h.store.association(&users[0], &USER_LIKED_PRODUCTS);

    likes
        .append(&mut [Product::new("P001", "Kopi", 1000), Product::new("P002", "Teh", 500)])
        .unwrap();
    likes
        .replace(&mut [Product::new("P002", "Teh", 500), Product::new("P004", "Air", 100)])
        .unwrap();
    assert_eq!(product_ids(&likes.find(None).unwrap()), ["P002", "P004"]);
}

#[test]
fn has_many_append_sets_foreign_key() {
    let h = TestHarness::new();
    let users = h.seed_users(2);
    let addresses = h.store.association(&users[1], &USER_ADDRESSES);

    let mut added = vec![Address::new("", "Jalan Baru")];
    addresses.append(&mut added).unwrap();
    assert_eq!(added[0].user_id.as_str(), "2");
    assert!(added[0].id > 0);
    assert_eq!(addresses.count().unwrap(), 1);

    // appending keeps what is already linked
    addresses.append(&mut [Address::new("", "Jalan Lama")]).unwrap();
    assert_eq!(addresses.count().unwrap(), 2);
}

#[test]
fn has_many_clear_on_not_null_key_writes_nothing() {
    let h = TestHarness::new();
    h.create_user_with_wallet("1", 500, &["Jalan A", "Jalan B"]);
    let user = h.store.find_one(&Query::<User>::by_key("1")).unwrap();
    let addresses = h.store.association(&user, &USER_ADDRESSES);

    let err = addresses.clear().unwrap_err();
    assert_matches!(
        err,
        Error::ConstraintViolation {
            kind: ConstraintKind::NotNull,
            ..
        }
    );
    assert_eq!(addresses.count().unwrap(), 2);
}

#[test]
fn has_many_nullable_key_detaches() {
    let h = TestHarness::new();
    let users = h.seed_users(1);
    let todos = h.store.association(&users[0], &USER_TODOS);

    let mut items = vec![Todo::new("", "Satu", ""), Todo::new("", "Dua", ""), Todo::new("", "Tiga", "")];
    todos.append(&mut items).unwrap();
    assert_eq!(todos.count().unwrap(), 3);

    assert_eq!(todos.delete(&items[..1]).unwrap(), 1);
    assert_eq!(todos.count().unwrap(), 2);

    todos.replace(&mut items[2..]).unwrap();
    let left: Vec<String> = todos.find(None).unwrap().into_iter().map(|t| t.title).collect();
    assert_eq!(left, ["Tiga"]);

    assert_eq!(todos.clear().unwrap(), 1);
    assert_eq!(todos.count().unwrap(), 0);
    // detached todos still exist with no owner
    let orphans = h
        .store
        .count(&Query::<Todo>::new().where_raw("user_id IS NULL", values![]))
        .unwrap();
    assert_eq!(orphans, 3);
}

#[test]
fn belongs_to_append_points_owner_at_child() {
    let h = TestHarness::new();
    let users = h.seed_users(2);
    let mut wallet = Wallet::new("W1", "1", 500);
    h.store.insert(&mut wallet).unwrap();

    let owner = h.store.association(&wallet, &WALLET_USER);
    assert_eq!(owner.find(None).unwrap()[0].id.as_str(), "1");

    let mut second = users[1].clone();
    owner.append(std::slice::from_mut(&mut second)).unwrap();
    let stored = h.store.find_one(&Query::<Wallet>::by_key("W1")).unwrap();
    assert_eq!(stored.user_id.as_str(), "2");

    let err = owner.clear().unwrap_err();
    assert_matches!(
        err,
        Error::ConstraintViolation {
            kind: ConstraintKind::NotNull,
            ..
        }
    );
}

#[test]
fn belongs_to_takes_exactly_one_child() {
    let h = TestHarness::new();
    let mut users = h.seed_users(2);
    let mut wallet = Wallet::new("W1", "1", 500);
    h.store.insert(&mut wallet).unwrap();

    let err = h
        .store
        .association(&wallet, &WALLET_USER)
        .replace(&mut users)
        .unwrap_err();
    assert_matches!(err, Error::Invalid(_));
}

#[test]
fn association_inside_transaction() {
    let h = TestHarness::new();
    let users = h.seed_users(1);

    h.store
        .transaction(|tx| {
            tx.association(&users[0], &USER_LIKED_PRODUCTS)
                .append(&mut [Product::new("P001", "Kopi", 1000)])?;
            Ok(())
        })
        .unwrap();
    assert_eq!(
        h.store.association(&users[0], &USER_LIKED_PRODUCTS).count().unwrap(),
        1
    );
}
