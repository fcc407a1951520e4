use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::os::raw::c_int;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

use crate::models::*;
use crate::query::{contains_ignore_case, ProductFilter, CONTAINS_FN};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe SQLite store holding users, products and wishlist entries.
///
/// Every mutation is a single statement or a single transaction on one
/// connection. The wishlist uniqueness rule lives in the schema
/// (`UNIQUE(user_id, product_id)`), and deleting a product cascades to the
/// wishlist rows that reference it.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Create a new store with the given database path
    pub fn new(db_path: &str) -> StoreResult<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.create_scalar_function(
            CONTAINS_FN,
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let haystack = ctx.get::<String>(0)?;
                let needle = ctx.get::<String>(1)?;
                Ok(contains_ignore_case(&haystack, &needle))
            },
        )?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT NOT NULL CHECK (category IN ('Flower', 'Edibles', 'Oils')),
                thc REAL NOT NULL CHECK (thc >= 0 AND thc <= 100),
                cbd REAL NOT NULL CHECK (cbd >= 0 AND cbd <= 100),
                price REAL NOT NULL CHECK (price >= 0),
                image TEXT NOT NULL,
                effects TEXT NOT NULL DEFAULT '[]',
                usage_type TEXT NOT NULL DEFAULT 'Smoking',
                stock INTEGER NOT NULL DEFAULT 10 CHECK (stock >= 0),
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (created_by) REFERENCES users(id)
            );

            CREATE TABLE IF NOT EXISTS wishlist (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                product_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE,
                UNIQUE(user_id, product_id)
            );

            CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);
            CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at);
            CREATE INDEX IF NOT EXISTS idx_wishlist_user_id ON wishlist(user_id);
            CREATE INDEX IF NOT EXISTS idx_wishlist_product_id ON wishlist(product_id);
            "#,
        )?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Insert a user, assigning its id and timestamps. A taken email is a
    /// `Conflict`.
    pub fn create_user(&self, user: &mut User) -> StoreResult<()> {
        let conn = self.conn()?;
        user.id = Uuid::new_v4().to_string();
        let now = now();
        user.created_at = now;
        user.updated_at = now;

        conn.execute(
            r#"INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                &user.id,
                &user.username,
                &user.email,
                &user.password_hash,
                user.role,
                timestamp(&user.created_at),
                timestamp(&user.updated_at),
            ],
        )
        .map_err(|e| {
            if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
                StoreError::Conflict("User already exists".to_string())
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], row_to_user)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StoreError::NotFound("User not found".to_string())
                }
                _ => StoreError::Database(e),
            })
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![email],
            row_to_user,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound("User not found".to_string())
            }
            _ => StoreError::Database(e),
        })
    }

    /// The earliest-registered admin, if any.
    pub fn first_admin(&self) -> StoreResult<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT * FROM users WHERE role = 'admin' ORDER BY created_at ASC, rowid ASC LIMIT 1",
                [],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn count_users(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // ==================== Product Operations ====================

    /// Products matching `filter`, newest first.
    pub fn list_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
        let conn = self.conn()?;
        let predicate = filter.to_sql();
        let sql = format!(
            "SELECT {} {} WHERE {} ORDER BY p.created_at DESC, p.rowid DESC",
            PRODUCT_COLUMNS, PRODUCT_FROM, predicate.clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params_from_iter(predicate.params.iter()), row_to_product)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    pub fn get_product(&self, id: &str) -> StoreResult<Product> {
        let conn = self.conn()?;
        fetch_product(&conn, id)
    }

    /// Validate `fields` and insert a product owned by `created_by`.
    pub fn create_product(
        &self,
        fields: &CreateProductRequest,
        created_by: &str,
    ) -> StoreResult<Product> {
        let new_product = fields.validate()?;
        let conn = self.conn()?;

        let id = Uuid::new_v4().to_string();
        let now = timestamp(&now());
        let effects_json = serde_json::to_string(&new_product.effects)?;

        conn.execute(
            r#"INSERT INTO products (id, name, description, category, thc, cbd, price, image,
                effects, usage_type, stock, created_by, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                &id,
                &new_product.name,
                &new_product.description,
                new_product.category,
                new_product.thc,
                new_product.cbd,
                new_product.price,
                &new_product.image,
                &effects_json,
                new_product.usage_type,
                new_product.stock,
                created_by,
                &now,
                &now,
            ],
        )
        .map_err(|e| {
            if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
                StoreError::NotFound("Creator not found".to_string())
            } else {
                StoreError::Database(e)
            }
        })?;

        fetch_product(&conn, &id)
    }

    /// Apply a partial update. Read, validate and write happen in one
    /// transaction; a validation failure leaves the row untouched.
    pub fn update_product(
        &self,
        id: &str,
        changes: &UpdateProductRequest,
    ) -> StoreResult<Product> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut product = fetch_product(&tx, id)?;
        changes.apply_to(&mut product)?;
        product.updated_at = now();

        let effects_json = serde_json::to_string(&product.effects)?;
        tx.execute(
            r#"UPDATE products SET name = ?1, description = ?2, category = ?3, thc = ?4,
               cbd = ?5, price = ?6, image = ?7, effects = ?8, usage_type = ?9, stock = ?10,
               updated_at = ?11 WHERE id = ?12"#,
            params![
                &product.name,
                &product.description,
                product.category,
                product.thc,
                product.cbd,
                product.price,
                &product.image,
                &effects_json,
                product.usage_type,
                product.stock,
                timestamp(&product.updated_at),
                &product.id,
            ],
        )?;
        tx.commit()?;

        Ok(product)
    }

    /// Delete a product. Wishlist entries pointing at it go with it.
    pub fn delete_product(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound("Product not found".to_string()));
        }
        Ok(())
    }

    pub fn count_products(&self) -> StoreResult<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count)
    }

    // ==================== Wishlist Operations ====================

    /// Save `product_id` for `user_id`. A repeat is rejected by the unique
    /// index, so two racing adds cannot both succeed.
    pub fn add_to_wishlist(&self, user_id: &str, product_id: &str) -> StoreResult<WishlistEntry> {
        let conn = self.conn()?;
        if !product_exists(&conn, product_id)? {
            return Err(StoreError::NotFound("Product not found".to_string()));
        }

        let entry = WishlistEntry {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            created_at: now(),
        };

        conn.execute(
            r#"INSERT INTO wishlist (id, user_id, product_id, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![
                &entry.id,
                &entry.user_id,
                &entry.product_id,
                timestamp(&entry.created_at),
            ],
        )
        .map_err(|e| {
            if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
                StoreError::Conflict("Product already in wishlist".to_string())
            } else if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
                StoreError::NotFound("User not found".to_string())
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(entry)
    }

    pub fn remove_from_wishlist(&self, user_id: &str, product_id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM wishlist WHERE user_id = ?1 AND product_id = ?2",
            params![user_id, product_id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound("Product not in wishlist".to_string()));
        }
        Ok(())
    }

    pub fn wishlist_status(&self, user_id: &str, product_id: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let present: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM wishlist WHERE user_id = ?1 AND product_id = ?2)",
            params![user_id, product_id],
            |row| row.get(0),
        )?;
        Ok(present)
    }

    /// A user's wishlist with resolved products, most recently saved first.
    pub fn list_wishlist(&self, user_id: &str) -> StoreResult<Vec<WishlistItem>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"SELECT w.id AS entry_id, w.user_id AS entry_user_id,
                      w.created_at AS entry_created_at, {}
               {} JOIN wishlist w ON w.product_id = p.id
               WHERE w.user_id = ?1
               ORDER BY w.created_at DESC, w.rowid DESC"#,
            PRODUCT_COLUMNS, PRODUCT_FROM
        );

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![user_id], |row| {
                let product = row_to_product(row)?;
                Ok(WishlistItem {
                    entry: WishlistEntry {
                        id: row.get("entry_id")?,
                        user_id: row.get("entry_user_id")?,
                        product_id: product.id.clone(),
                        created_at: parse_datetime(row.get::<_, String>("entry_created_at")?),
                    },
                    product,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.category, p.thc, p.cbd, p.price, \
     p.image, p.effects, p.usage_type, p.stock, p.created_by, \
     COALESCE(u.username, '') AS creator_username, p.created_at, p.updated_at";

const PRODUCT_FROM: &str = "FROM products p LEFT JOIN users u ON u.id = p.created_by";

fn fetch_product(conn: &Connection, id: &str) -> StoreResult<Product> {
    let sql = format!("SELECT {} {} WHERE p.id = ?1", PRODUCT_COLUMNS, PRODUCT_FROM);
    conn.query_row(&sql, params![id], row_to_product)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::NotFound("Product not found".to_string())
            }
            _ => StoreError::Database(e),
        })
}

fn product_exists(conn: &Connection, id: &str) -> StoreResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        role: row.get("role")?,
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn row_to_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
    let effects_str: String = row.get("effects")?;
    let effects: Vec<String> = serde_json::from_str(&effects_str).unwrap_or_default();

    Ok(Product {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        category: row.get("category")?,
        thc: row.get("thc")?,
        cbd: row.get("cbd")?,
        price: row.get("price")?,
        image: row.get("image")?,
        effects,
        usage_type: row.get("usage_type")?,
        stock: row.get("stock")?,
        created_by: Creator {
            id: row.get("created_by")?,
            username: row.get("creator_username")?,
        },
        created_at: parse_datetime(row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(row.get::<_, String>("updated_at")?),
    })
}

fn is_constraint(err: &rusqlite::Error, extended_code: c_int) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.extended_code == extended_code)
}

// Timestamps are stored with fixed microsecond precision so that text
// ordering matches time ordering.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ==================== Column conversions ====================

macro_rules! text_enum_sql {
    ($($ty:ty),*) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ValidationError| FromSqlError::Other(Box::new(e)))
            }
        }
    )*};
}

text_enum_sql!(Role, Category, UsageType);
