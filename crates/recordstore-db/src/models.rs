//! Demo entities: users with a wallet, addresses, todos and liked products.
//!
//! Each entity maps to one table through a static [`TableSchema`]; relations
//! between them are declared as [`Relation`] statics.

use chrono::Utc;
use recordstore_common::{ProductId, Result, UserId, WalletId};
use rusqlite::types::Value;
use rusqlite::Row;

use crate::relation::{PreloadStep, Relation, RelationKind};
use crate::schema::{Column, ColumnRole, Entity, TableSchema};

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

pub static USERS: TableSchema = TableSchema {
    table: "users",
    columns: &[
        Column::text("id").primary_key(),
        Column::text("password"),
        Column::text("first_name").not_null(),
        Column::text("middle_name"),
        Column::text("last_name"),
        Column::integer("created_at").role(ColumnRole::CreatedAt),
        Column::integer("updated_at").role(ColumnRole::UpdatedAt),
    ],
    primary_key: &["id"],
};

pub static WALLETS: TableSchema = TableSchema {
    table: "wallets",
    columns: &[
        Column::text("id").primary_key(),
        Column::text("user_id").not_null().references("users", "id"),
        Column::integer("balance").not_null().default_sql("0").keep_zero(),
    ],
    primary_key: &["id"],
};

pub static ADDRESSES: TableSchema = TableSchema {
    table: "addresses",
    columns: &[
        Column::integer("id").auto_increment(),
        Column::text("user_id").not_null().references("users", "id"),
        Column::text("address").not_null(),
        Column::integer("created_at").role(ColumnRole::CreatedAt),
        Column::integer("updated_at").role(ColumnRole::UpdatedAt),
    ],
    primary_key: &["id"],
};

pub static PRODUCTS: TableSchema = TableSchema {
    table: "products",
    columns: &[
        Column::text("id").primary_key(),
        Column::text("name").not_null(),
        Column::integer("price").not_null().default_sql("0").keep_zero(),
        Column::integer("created_at").role(ColumnRole::CreatedAt),
        Column::integer("updated_at").role(ColumnRole::UpdatedAt),
    ],
    primary_key: &["id"],
};

/// Join table of users and the products they like.
pub static USER_LIKE_PRODUCT: TableSchema = TableSchema {
    table: "user_like_product",
    columns: &[
        Column::text("user_id").not_null().references("users", "id"),
        Column::text("product_id").not_null().references("products", "id"),
    ],
    primary_key: &["user_id", "product_id"],
};

pub static USER_LOGS: TableSchema = TableSchema {
    table: "user_logs",
    columns: &[
        Column::integer("id").auto_increment(),
        Column::text("user_id"),
        Column::text("action"),
        Column::integer("created_at").role(ColumnRole::CreatedAt),
        Column::integer("updated_at").role(ColumnRole::UpdatedAt),
    ],
    primary_key: &["id"],
};

pub static TODOS: TableSchema = TableSchema {
    table: "todos",
    columns: &[
        Column::integer("id").auto_increment(),
        Column::text("user_id").references("users", "id"),
        Column::text("title").not_null(),
        Column::text("description"),
        Column::integer("created_at").role(ColumnRole::CreatedAt),
        Column::integer("updated_at").role(ColumnRole::UpdatedAt),
        Column::integer("deleted_at").role(ColumnRole::Tombstone),
    ],
    primary_key: &["id"],
};

pub static GUEST_BOOKS: TableSchema = TableSchema {
    table: "guest_books",
    columns: &[
        Column::integer("id").auto_increment(),
        Column::text("name"),
        Column::text("email"),
        Column::text("message"),
        Column::integer("created_at").role(ColumnRole::CreatedAt),
        Column::integer("updated_at").role(ColumnRole::UpdatedAt),
    ],
    primary_key: &["id"],
};

/// Scratch table for raw SQL.
pub static SAMPLE: TableSchema = TableSchema {
    table: "sample",
    columns: &[Column::text("id").primary_key(), Column::text("name")],
    primary_key: &["id"],
};

/// Every demo table, parents before children.
pub static ALL_SCHEMAS: &[&TableSchema] = &[
    &USERS,
    &PRODUCTS,
    &WALLETS,
    &ADDRESSES,
    &USER_LIKE_PRODUCT,
    &USER_LOGS,
    &TODOS,
    &GUEST_BOOKS,
    &SAMPLE,
];

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

pub static USER_WALLET: Relation<User, Wallet> = Relation {
    name: "Wallet",
    kind: RelationKind::HasOne {
        foreign_key: "user_id",
    },
    attach: |user, wallets| user.wallet = wallets.into_iter().next(),
    loaded: |user| user.wallet.iter_mut().collect(),
};

pub static USER_ADDRESSES: Relation<User, Address> = Relation {
    name: "Addresses",
    kind: RelationKind::HasMany {
        foreign_key: "user_id",
    },
    attach: |user, addresses| user.addresses = addresses,
    loaded: |user| user.addresses.iter_mut().collect(),
};

pub static USER_TODOS: Relation<User, Todo> = Relation {
    name: "Todos",
    kind: RelationKind::HasMany {
        foreign_key: "user_id",
    },
    attach: |user, todos| user.todos = todos,
    loaded: |user| user.todos.iter_mut().collect(),
};

pub static USER_LIKED_PRODUCTS: Relation<User, Product> = Relation {
    name: "LikedProducts",
    kind: RelationKind::ManyToMany {
        join_table: "user_like_product",
        owner_key: "user_id",
        related_key: "product_id",
    },
    attach: |user, products| user.liked_products = products,
    loaded: |user| user.liked_products.iter_mut().collect(),
};

pub static WALLET_USER: Relation<Wallet, User> = Relation {
    name: "User",
    kind: RelationKind::BelongsTo {
        foreign_key: "user_id",
    },
    attach: |wallet, users| wallet.user = users.into_iter().next().map(Box::new),
    loaded: |wallet| wallet.user.as_deref_mut().into_iter().collect(),
};

pub static ADDRESS_USER: Relation<Address, User> = Relation {
    name: "User",
    kind: RelationKind::BelongsTo {
        foreign_key: "user_id",
    },
    attach: |address, users| address.user = users.into_iter().next().map(Box::new),
    loaded: |address| address.user.as_deref_mut().into_iter().collect(),
};

pub static PRODUCT_LIKED_BY_USERS: Relation<Product, User> = Relation {
    name: "LikedByUsers",
    kind: RelationKind::ManyToMany {
        join_table: "user_like_product",
        owner_key: "product_id",
        related_key: "user_id",
    },
    attach: |product, users| product.liked_by_users = users,
    loaded: |product| product.liked_by_users.iter_mut().collect(),
};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Name {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: UserId,
    pub password: String,
    pub name: Name,
    pub created_at: i64,
    pub updated_at: i64,
    pub wallet: Option<Wallet>,
    pub addresses: Vec<Address>,
    pub liked_products: Vec<Product>,
    pub todos: Vec<Todo>,
}

impl User {
    pub fn new(id: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            id: UserId::from(id),
            name: Name {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                ..Name::default()
            },
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }
}

impl Entity for User {
    fn schema() -> &'static TableSchema {
        &USERS
    }

    fn relations() -> Vec<Box<dyn PreloadStep<Self>>> {
        vec![
            Box::new(&USER_WALLET),
            Box::new(&USER_ADDRESSES),
            Box::new(&USER_LIKED_PRODUCTS),
            Box::new(&USER_TODOS),
        ]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            key(self.id.as_str()),
            Value::Text(self.password.clone()),
            Value::Text(self.name.first_name.clone()),
            Value::Text(self.name.middle_name.clone()),
            Value::Text(self.name.last_name.clone()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: UserId::new(get_text(row, base)?),
            password: get_text(row, base + 1)?,
            name: Name {
                first_name: get_text(row, base + 2)?,
                middle_name: get_text(row, base + 3)?,
                last_name: get_text(row, base + 4)?,
            },
            created_at: get_int(row, base + 5)?,
            updated_at: get_int(row, base + 6)?,
            ..Self::default()
        })
    }

    fn assign(&mut self, column: &str, value: &Value) {
        match column {
            "id" => self.id = UserId::new(text(value)),
            "password" => self.password = text(value),
            "first_name" => self.name.first_name = text(value),
            "middle_name" => self.name.middle_name = text(value),
            "last_name" => self.name.last_name = text(value),
            "created_at" => self.created_at = int(value),
            "updated_at" => self.updated_at = int(value),
            _ => {}
        }
    }

    /// Users created without an id get a timestamped one.
    fn before_create(&mut self) -> Result<()> {
        if self.id.is_empty() {
            self.id = UserId::new(format!("user-{}", Utc::now().format("%Y%m%d%H%M%S%f")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: i64,
    pub user: Option<Box<User>>,
}

impl Wallet {
    pub fn new(id: &str, user_id: &str, balance: i64) -> Self {
        Self {
            id: WalletId::from(id),
            user_id: UserId::from(user_id),
            balance,
            user: None,
        }
    }
}

impl Entity for Wallet {
    fn schema() -> &'static TableSchema {
        &WALLETS
    }

    fn relations() -> Vec<Box<dyn PreloadStep<Self>>> {
        vec![Box::new(&WALLET_USER)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            key(self.id.as_str()),
            key(self.user_id.as_str()),
            Value::Integer(self.balance),
        ]
    }

    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: WalletId::new(get_text(row, base)?),
            user_id: UserId::new(get_text(row, base + 1)?),
            balance: get_int(row, base + 2)?,
            user: None,
        })
    }

    fn assign(&mut self, column: &str, value: &Value) {
        match column {
            "id" => self.id = WalletId::new(text(value)),
            "user_id" => self.user_id = UserId::new(text(value)),
            "balance" => self.balance = int(value),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub id: i64,
    pub user_id: UserId,
    pub address: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub user: Option<Box<User>>,
}

impl Address {
    pub fn new(user_id: &str, address: &str) -> Self {
        Self {
            user_id: UserId::from(user_id),
            address: address.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Address {
    fn schema() -> &'static TableSchema {
        &ADDRESSES
    }

    fn relations() -> Vec<Box<dyn PreloadStep<Self>>> {
        vec![Box::new(&ADDRESS_USER)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            key(self.user_id.as_str()),
            Value::Text(self.address.clone()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: get_int(row, base)?,
            user_id: UserId::new(get_text(row, base + 1)?),
            address: get_text(row, base + 2)?,
            created_at: get_int(row, base + 3)?,
            updated_at: get_int(row, base + 4)?,
            user: None,
        })
    }

    fn assign(&mut self, column: &str, value: &Value) {
        match column {
            "id" => self.id = int(value),
            "user_id" => self.user_id = UserId::new(text(value)),
            "address" => self.address = text(value),
            "created_at" => self.created_at = int(value),
            "updated_at" => self.updated_at = int(value),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub liked_by_users: Vec<User>,
}

impl Product {
    pub fn new(id: &str, name: &str, price: i64) -> Self {
        Self {
            id: ProductId::from(id),
            name: name.to_string(),
            price,
            ..Self::default()
        }
    }
}

impl Entity for Product {
    fn schema() -> &'static TableSchema {
        &PRODUCTS
    }

    fn relations() -> Vec<Box<dyn PreloadStep<Self>>> {
        vec![Box::new(&PRODUCT_LIKED_BY_USERS)]
    }

    fn values(&self) -> Vec<Value> {
        vec![
            key(self.id.as_str()),
            Value::Text(self.name.clone()),
            Value::Integer(self.price),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: ProductId::new(get_text(row, base)?),
            name: get_text(row, base + 1)?,
            price: get_int(row, base + 2)?,
            created_at: get_int(row, base + 3)?,
            updated_at: get_int(row, base + 4)?,
            liked_by_users: Vec::new(),
        })
    }

    fn assign(&mut self, column: &str, value: &Value) {
        match column {
            "id" => self.id = ProductId::new(text(value)),
            "name" => self.name = text(value),
            "price" => self.price = int(value),
            "created_at" => self.created_at = int(value),
            "updated_at" => self.updated_at = int(value),
            _ => {}
        }
    }
}

/// Append-only audit row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserLog {
    pub id: i64,
    pub user_id: String,
    pub action: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserLog {
    pub fn new(user_id: &str, action: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            action: action.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for UserLog {
    fn schema() -> &'static TableSchema {
        &USER_LOGS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.user_id.clone()),
            Value::Text(self.action.clone()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: get_int(row, base)?,
            user_id: get_text(row, base + 1)?,
            action: get_text(row, base + 2)?,
            created_at: get_int(row, base + 3)?,
            updated_at: get_int(row, base + 4)?,
        })
    }

    fn assign(&mut self, column: &str, value: &Value) {
        match column {
            "id" => self.id = int(value),
            "user_id" => self.user_id = text(value),
            "action" => self.action = text(value),
            "created_at" => self.created_at = int(value),
            "updated_at" => self.updated_at = int(value),
            _ => {}
        }
    }
}

/// A soft-deletable task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Todo {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl Todo {
    pub fn new(user_id: &str, title: &str, description: &str) -> Self {
        Self {
            user_id: UserId::from(user_id),
            title: title.to_string(),
            description: description.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Todo {
    fn schema() -> &'static TableSchema {
        &TODOS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            key(self.user_id.as_str()),
            Value::Text(self.title.clone()),
            Value::Text(self.description.clone()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            self.deleted_at.map_or(Value::Null, Value::Integer),
        ]
    }

    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: get_int(row, base)?,
            user_id: UserId::new(get_text(row, base + 1)?),
            title: get_text(row, base + 2)?,
            description: get_text(row, base + 3)?,
            created_at: get_int(row, base + 4)?,
            updated_at: get_int(row, base + 5)?,
            deleted_at: row.get(base + 6)?,
        })
    }

    fn assign(&mut self, column: &str, value: &Value) {
        match column {
            "id" => self.id = int(value),
            "user_id" => self.user_id = UserId::new(text(value)),
            "title" => self.title = text(value),
            "description" => self.description = text(value),
            "created_at" => self.created_at = int(value),
            "updated_at" => self.updated_at = int(value),
            "deleted_at" => {
                self.deleted_at = match value {
                    Value::Integer(ts) => Some(*ts),
                    _ => None,
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuestBook {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GuestBook {
    pub fn new(name: &str, email: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for GuestBook {
    fn schema() -> &'static TableSchema {
        &GUEST_BOOKS
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.name.clone()),
            Value::Text(self.email.clone()),
            Value::Text(self.message.clone()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: get_int(row, base)?,
            name: get_text(row, base + 1)?,
            email: get_text(row, base + 2)?,
            message: get_text(row, base + 3)?,
            created_at: get_int(row, base + 4)?,
            updated_at: get_int(row, base + 5)?,
        })
    }

    fn assign(&mut self, column: &str, value: &Value) {
        match column {
            "id" => self.id = int(value),
            "created_at" => self.created_at = int(value),
            "updated_at" => self.updated_at = int(value),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub id: String,
    pub name: String,
}

impl Sample {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

impl Entity for Sample {
    fn schema() -> &'static TableSchema {
        &SAMPLE
    }

    fn values(&self) -> Vec<Value> {
        vec![key(&self.id), Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: get_text(row, base)?,
            name: get_text(row, base + 1)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

/// Text key; empty means absent and is stored as NULL.
fn key(id: &str) -> Value {
    if id.is_empty() {
        Value::Null
    } else {
        Value::Text(id.to_string())
    }
}

fn get_text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn get_int(row: &Row<'_>, idx: usize) -> rusqlite::Result<i64> {
    Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or_default())
}

fn text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    }
}

fn int(value: &Value) -> i64 {
    match value {
        Value::Integer(i) => *i,
        Value::Real(r) => *r as i64,
        Value::Text(s) => s.parse().unwrap_or_default(),
        Value::Null | Value::Blob(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_follow_schema_order() {
        let user = User::new("1", "Eko", "Khannedy");
        assert_eq!(user.values().len(), USERS.columns.len());
        assert_eq!(Wallet::default().values().len(), WALLETS.columns.len());
        assert_eq!(Todo::default().values().len(), TODOS.columns.len());
        assert_eq!(user.key_value(), Value::Text("1".into()));
    }

    #[test]
    fn empty_keys_are_null() {
        let wallet = Wallet::new("", "", 0);
        assert_eq!(wallet.values()[0], Value::Null);
        assert_eq!(wallet.values()[1], Value::Null);
    }

    #[test]
    fn before_create_generates_missing_id() {
        let mut user = User::new("", "Eko", "Khannedy");
        user.before_create().unwrap();
        assert!(user.id.as_str().starts_with("user-"));

        let mut keyed = User::new("7", "Eko", "Khannedy");
        keyed.before_create().unwrap();
        assert_eq!(keyed.id.as_str(), "7");
    }

    #[test]
    fn assign_writes_back_columns() {
        let mut todo = Todo::default();
        todo.assign("id", &Value::Integer(9));
        todo.assign("deleted_at", &Value::Integer(1_000));
        assert_eq!(todo.id, 9);
        assert_eq!(todo.deleted_at, Some(1_000));
        todo.assign("deleted_at", &Value::Null);
        assert_eq!(todo.deleted_at, None);
    }

    #[test]
    fn relation_functions_attach_and_expose_children() {
        let mut user = User::new("1", "Eko", "Khannedy");
        (USER_WALLET.attach)(&mut user, vec![Wallet::new("W1", "1", 10)]);
        assert_eq!((USER_WALLET.loaded)(&mut user).len(), 1);
        (USER_WALLET.attach)(&mut user, Vec::new());
        assert!(user.wallet.is_none());

        let mut wallet = Wallet::new("W1", "1", 10);
        (WALLET_USER.attach)(&mut wallet, vec![user]);
        assert_eq!(wallet.user.as_ref().map(|u| u.id.as_str()), Some("1"));
    }
}
