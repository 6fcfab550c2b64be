//! Demo dataset and reports used by the CLI.

use recordstore_db::models::{
    Address, Product, Todo, User, Wallet, USER_ADDRESSES, USER_LIKED_PRODUCTS, USER_WALLET,
};
use recordstore_db::{values, Db, Query, Result, Store};
use serde::Serialize;

/// What [`seed`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub users: usize,
    pub wallets: usize,
    pub addresses: usize,
    pub products: usize,
    pub likes: usize,
    pub todos: usize,
    /// The database already had users; nothing was written.
    pub skipped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceSummary {
    pub total: i64,
    pub min: i64,
    pub max: i64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub users: i64,
    pub wallets: i64,
    pub addresses: i64,
    pub products: i64,
    pub likes: i64,
    pub todos: i64,
    pub deleted_todos: i64,
    pub balance: BalanceSummary,
}

/// Fill an empty database with `users` users, each with a wallet, one
/// address, a todo and some liked products. Runs in one transaction.
pub fn seed(store: &Store, users: usize) -> Result<SeedReport> {
    store.transaction(|tx| {
        if tx.count(&Query::<User>::new())? > 0 {
            tracing::info!("Users already present; skipping seed");
            return Ok(SeedReport {
                skipped: true,
                ..SeedReport::default()
            });
        }

        let mut products = vec![
            Product::new("P001", "Kopi", 15_000),
            Product::new("P002", "Teh", 8_000),
            Product::new("P003", "Susu", 12_000),
        ];
        let mut report = SeedReport {
            products: tx.insert_batch(&mut products)?,
            ..SeedReport::default()
        };

        for i in 1..=users {
            let id = i.to_string();
            let mut user = User::new(&id, &format!("User {i}"), "Khannedy").with_password("rahasia");
            user.wallet = Some(Wallet::new(&format!("W{i}"), "", i as i64 * 1_000_000));
            user.addresses = vec![Address::new("", &format!("Jalan {i}"))];
            // odd users like two products, even users one
            let liked = if i % 2 == 1 { 2 } else { 1 };
            user.liked_products = products.iter().take(liked).cloned().collect();
            tx.create_with(&mut user, &[&USER_WALLET, &USER_ADDRESSES, &USER_LIKED_PRODUCTS])?;

            let mut todo = Todo::new(&id, "Belajar", "Belajar recordstore");
            report.todos += tx.insert(&mut todo)?;
            report.users += 1;
            report.wallets += 1;
            report.addresses += user.addresses.len();
            report.likes += user.liked_products.len();
        }

        tracing::info!(users = report.users, products = report.products, "Demo data seeded");
        Ok(report)
    })
}

/// Row counts and wallet balance aggregates.
pub fn stats(db: &impl Db) -> Result<Stats> {
    let balance = db
        .aggregate(
            &Query::<Wallet>::new(),
            &[
                "coalesce(sum(balance), 0)",
                "coalesce(min(balance), 0)",
                "coalesce(max(balance), 0)",
                "coalesce(avg(balance), 0.0)",
            ],
            |row| {
                Ok(BalanceSummary {
                    total: row.get(0)?,
                    min: row.get(1)?,
                    max: row.get(2)?,
                    average: row.get(3)?,
                })
            },
        )?
        .into_iter()
        .next()
        .unwrap_or_default();

    let todos = db.count(&Query::<Todo>::new())?;
    let all_todos = db.count(&Query::<Todo>::new().unscoped())?;

    Ok(Stats {
        users: db.count(&Query::<User>::new())?,
        wallets: db.count(&Query::<Wallet>::new())?,
        addresses: db.count(&Query::<Address>::new())?,
        products: db.count(&Query::<Product>::new())?,
        likes: db.raw_one("SELECT COUNT(*) FROM user_like_product", &[], |row| row.get(0))?,
        todos,
        deleted_todos: all_todos - todos,
        balance,
    })
}

/// Users ordered by id with addresses and liked products loaded. With
/// `min_balance`, only users whose wallet holds at least that much.
pub fn list_users(db: &impl Db, limit: i64, min_balance: Option<i64>) -> Result<Vec<User>> {
    let query = Query::<User>::new()
        .order_by("users.id")
        .limit(limit)
        .preload(&USER_ADDRESSES)
        .preload(&USER_LIKED_PRODUCTS);
    let query = match min_balance {
        Some(min) => query
            .join(&USER_WALLET)
            .where_raw("\"Wallet\".balance >= ?", values![min]),
        None => query.preload(&USER_WALLET),
    };
    db.find_all(&query)
}
