//! Shared test harness for record store integration tests.
//!
//! [`TestHarness`] opens a private temporary store with every demo table
//! created, plus helpers that seed the fixtures most tests start from.

#![allow(dead_code)]

use recordstore_db::models::{self, Address, Sample, User, Wallet, USER_ADDRESSES, USER_WALLET};
use recordstore_db::{Db, Store};

/// Temporary store with the demo schema migrated.
pub struct TestHarness {
    pub store: Store,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Store::open_temporary().expect("failed to open temporary store");
        store
            .migrate(models::ALL_SCHEMAS)
            .expect("failed to migrate demo schema");
        Self { store }
    }

    /// Samples "1".."4": Lingga, Budi, Joko, Rully.
    pub fn seed_samples(&self) -> Vec<Sample> {
        let mut samples = vec![
            Sample::new("1", "Lingga"),
            Sample::new("2", "Budi"),
            Sample::new("3", "Joko"),
            Sample::new("4", "Rully"),
        ];
        self.store
            .insert_batch(&mut samples)
            .expect("failed to seed samples");
        samples
    }

    /// Users "1".."count" named "User N", all with password "rahasia".
    pub fn seed_users(&self, count: usize) -> Vec<User> {
        let mut users: Vec<User> = (1..=count)
            .map(|i| User::new(&i.to_string(), &format!("User {i}"), "Khannedy").with_password("rahasia"))
            .collect();
        self.store
            .insert_batch(&mut users)
            .expect("failed to seed users");
        users
    }

    /// A user with one wallet and the given addresses, created in one call.
    pub fn create_user_with_wallet(&self, id: &str, balance: i64, addresses: &[&str]) -> User {
        let mut user = User::new(id, &format!("User {id}"), "Khannedy").with_password("rahasia");
        user.wallet = Some(Wallet::new(&format!("W{id}"), "", balance));
        user.addresses = addresses.iter().map(|a| Address::new("", a)).collect();
        self.store
            .create_with(&mut user, &[&USER_WALLET, &USER_ADDRESSES])
            .expect("failed to create user with wallet");
        user
    }
}
