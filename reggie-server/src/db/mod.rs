//! SQLite persistence.
//!
//! One connection behind a mutex; every query runs on the blocking pool via
//! [`Database::call`]. Each table has its own file with an `impl Database`
//! block.
//!
//! # Schema Versioning
//!
//! The `schema_version` table records the applied version. To change the
//! schema, bump `CURRENT_SCHEMA_VERSION` and add a step to
//! `run_migrations()`.

mod address_book;
mod category;
mod dish;
mod employee;
mod orders;
mod setmeal;
mod shopping_cart;
mod user;


pub use orders::OrderSearch;

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use reggie_core::password::{hash_password, DEFAULT_PASSWORD};
use reggie_core::response::PageRequest;
use reggie_core::status::ENABLED;
use reggie_core::{Audit, Employee, IdGenerator, Page};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

pub const CURRENT_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// A unique constraint rejected the write.
    #[error("duplicate entry: {0}")]
    Duplicate(String),

    #[error("corrupt data in {0}")]
    Corruption(String),

    /// A business rule refused the write; the message is shown to the user.
    #[error("{0}")]
    Rejected(String),
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        RepositoryError::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        RepositoryError::Corruption(what.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        RepositoryError::Rejected(msg.into())
    }
}

/// Map a rusqlite error, recognising unique-constraint violations.
pub(crate) fn sql_err(operation: &'static str) -> impl Fn(rusqlite::Error) -> RepositoryError {
    move |e| match &e {
        rusqlite::Error::SqliteFailure(failure, msg)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            RepositoryError::Duplicate(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => RepositoryError::storage(operation, e.to_string()),
    }
}

pub struct Database {
    /// Exposed to tests that need to poke at rows directly.
    pub(crate) conn: Arc<Mutex<Connection>>,
    ids: Arc<IdGenerator>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and bring its schema
    /// up to date.
    ///
    /// File databases run in WAL mode with a 5 second busy timeout.
    pub fn open<P: AsRef<Path>>(path: P, ids: IdGenerator) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            warn!(
                "SQLite kept journal_mode '{}' for {}; continuing without WAL",
                journal_mode, path_str
            );
        }

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure database", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ids: Arc::new(ids),
        })
    }

    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::open(":memory:", IdGenerator::default())
    }

    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(SCHEMA_V1)
                .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        info!(
            "Migrated database schema from version {} to {}",
            from_version, CURRENT_SCHEMA_VERSION
        );
        Ok(())
    }

    pub fn next_id(&self) -> i64 {
        self.ids.next_id()
    }

    /// Run `f` against the connection on the blocking pool.
    pub(crate) async fn call<T, F>(
        &self,
        operation: &'static str,
        f: F,
    ) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| RepositoryError::storage(operation, "connection mutex poisoned"))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    }

    /// Create the default `admin` account if there are no employees yet.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self) -> Result<bool, RepositoryError> {
        if self.count_employees().await? > 0 {
            return Ok(false);
        }
        let audit = Audit::system();
        let admin = Employee {
            id: self.next_id(),
            username: "admin".to_string(),
            name: "Administrator".to_string(),
            password: hash_password(DEFAULT_PASSWORD),
            phone: "13812312312".to_string(),
            sex: "1".to_string(),
            id_number: "110101199001010047".to_string(),
            status: ENABLED,
            create_time: audit.at,
            update_time: audit.at,
            create_user: None,
            update_user: None,
        };
        self.insert_employee(admin).await?;
        info!("Created default admin account");
        Ok(true)
    }
}

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS employee (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    phone TEXT NOT NULL,
    sex TEXT NOT NULL,
    id_number TEXT NOT NULL,
    status INTEGER NOT NULL DEFAULT 1,
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    create_user INTEGER,
    update_user INTEGER
);

CREATE TABLE IF NOT EXISTS category (
    id INTEGER PRIMARY KEY,
    type INTEGER NOT NULL,
    name TEXT NOT NULL UNIQUE,
    sort INTEGER NOT NULL DEFAULT 0,
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    create_user INTEGER,
    update_user INTEGER
);

CREATE TABLE IF NOT EXISTS dish (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category_id INTEGER NOT NULL,
    price TEXT NOT NULL,
    code TEXT NOT NULL DEFAULT '',
    image TEXT NOT NULL DEFAULT '',
    description TEXT,
    status INTEGER NOT NULL DEFAULT 1,
    sort INTEGER NOT NULL DEFAULT 0,
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    create_user INTEGER,
    update_user INTEGER
);
CREATE INDEX IF NOT EXISTS idx_dish_category ON dish(category_id);

CREATE TABLE IF NOT EXISTS dish_flavor (
    id INTEGER PRIMARY KEY,
    dish_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    create_user INTEGER,
    update_user INTEGER
);
CREATE INDEX IF NOT EXISTS idx_dish_flavor_dish ON dish_flavor(dish_id);

CREATE TABLE IF NOT EXISTS setmeal (
    id INTEGER PRIMARY KEY,
    category_id INTEGER NOT NULL,
    name TEXT NOT NULL UNIQUE,
    price TEXT NOT NULL,
    status INTEGER NOT NULL DEFAULT 1,
    code TEXT NOT NULL DEFAULT '',
    description TEXT,
    image TEXT NOT NULL DEFAULT '',
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    create_user INTEGER,
    update_user INTEGER
);
CREATE INDEX IF NOT EXISTS idx_setmeal_category ON setmeal(category_id);

CREATE TABLE IF NOT EXISTS setmeal_dish (
    id INTEGER PRIMARY KEY,
    setmeal_id INTEGER NOT NULL,
    dish_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    price TEXT NOT NULL,
    copies INTEGER NOT NULL,
    sort INTEGER NOT NULL DEFAULT 0,
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    create_user INTEGER,
    update_user INTEGER
);
CREATE INDEX IF NOT EXISTS idx_setmeal_dish_setmeal ON setmeal_dish(setmeal_id);

CREATE TABLE IF NOT EXISTS user (
    id INTEGER PRIMARY KEY,
    name TEXT,
    phone TEXT NOT NULL UNIQUE,
    sex TEXT,
    id_number TEXT,
    avatar TEXT,
    status INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS address_book (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    consignee TEXT NOT NULL,
    sex TEXT NOT NULL,
    phone TEXT NOT NULL,
    province_code TEXT,
    province_name TEXT,
    city_code TEXT,
    city_name TEXT,
    district_code TEXT,
    district_name TEXT,
    detail TEXT,
    label TEXT,
    is_default INTEGER NOT NULL DEFAULT 0,
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    create_user INTEGER,
    update_user INTEGER
);
CREATE INDEX IF NOT EXISTS idx_address_book_user ON address_book(user_id);

CREATE TABLE IF NOT EXISTS shopping_cart (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    image TEXT,
    user_id INTEGER NOT NULL,
    dish_id INTEGER,
    setmeal_id INTEGER,
    dish_flavor TEXT,
    number INTEGER NOT NULL DEFAULT 1,
    amount TEXT NOT NULL,
    create_time TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_shopping_cart_user ON shopping_cart(user_id);

CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY,
    number TEXT NOT NULL,
    status INTEGER NOT NULL DEFAULT 1,
    user_id INTEGER NOT NULL,
    address_book_id INTEGER NOT NULL,
    order_time TEXT NOT NULL,
    checkout_time TEXT NOT NULL,
    pay_method INTEGER NOT NULL DEFAULT 1,
    amount TEXT NOT NULL,
    remark TEXT,
    phone TEXT NOT NULL,
    address TEXT NOT NULL,
    user_name TEXT,
    consignee TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id, order_time DESC);

CREATE TABLE IF NOT EXISTS order_detail (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    image TEXT,
    order_id INTEGER NOT NULL,
    dish_id INTEGER,
    setmeal_id INTEGER,
    dish_flavor TEXT,
    number INTEGER NOT NULL DEFAULT 1,
    amount TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_order_detail_order ON order_detail(order_id);
"#;

// =============================================================================
// Query helpers
// =============================================================================

/// Read a decimal stored as TEXT.
pub(crate) fn get_decimal(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn decimal_value(d: Decimal) -> String {
    d.normalize().to_string()
}

/// `?, ?, ?` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn id_values(ids: &[i64]) -> Vec<Value> {
    ids.iter().map(|id| Value::Integer(*id)).collect()
}

/// AND-joined WHERE conditions with their positional parameters.
#[derive(Debug, Default)]
pub(crate) struct Filter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, clause: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(clause.into());
        self.params.push(value.into());
        self
    }

    pub fn push_opt<V: Into<Value>>(self, clause: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.push(clause, value),
            None => self,
        }
    }

    /// Substring match on `column`, skipped for blank needles.
    pub fn contains(self, column: &str, needle: Option<&str>) -> Self {
        match needle.map(str::trim).filter(|n| !n.is_empty()) {
            Some(needle) => self.push(
                format!("{} LIKE '%' || ? || '%'", column),
                needle.to_string(),
            ),
            None => self,
        }
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Run `SELECT {columns} FROM {from}{where} ORDER BY {order_by}` and map
/// every row.
pub(crate) fn query_all<T>(
    conn: &Connection,
    operation: &'static str,
    columns: &str,
    from: &str,
    filter: &Filter,
    order_by: &str,
    map: impl Fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>, RepositoryError> {
    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}",
        columns,
        from,
        filter.where_sql(),
        order_by
    );
    let mut stmt = conn.prepare(&sql).map_err(sql_err(operation))?;
    let rows = stmt
        .query_map(params_from_iter(filter.params()), |row| map(row))
        .map_err(sql_err(operation))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(sql_err(operation))
}

/// Paged variant of [`query_all`] that also counts matching rows.
pub(crate) fn query_page<T>(
    conn: &Connection,
    operation: &'static str,
    columns: &str,
    from: &str,
    filter: &Filter,
    order_by: &str,
    request: PageRequest,
    map: impl Fn(&Row) -> rusqlite::Result<T>,
) -> Result<Page<T>, RepositoryError> {
    let where_sql = filter.where_sql();
    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {}{}", from, where_sql),
            params_from_iter(filter.params()),
            |row| row.get(0),
        )
        .map_err(sql_err(operation))?;

    let limit = i64::try_from(request.page_size)
        .map_err(|_| RepositoryError::storage(operation, "page size out of range"))?;
    let offset = i64::try_from(request.offset())
        .map_err(|_| RepositoryError::storage(operation, "page offset out of range"))?;

    let sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT ? OFFSET ?",
        columns, from, where_sql, order_by
    );
    let mut params = filter.params().to_vec();
    params.push(Value::Integer(limit));
    params.push(Value::Integer(offset));

    let mut stmt = conn.prepare(&sql).map_err(sql_err(operation))?;
    let records = stmt
        .query_map(params_from_iter(params.iter()), |row| map(row))
        .map_err(sql_err(operation))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(sql_err(operation))?;

    let total = u64::try_from(total)
        .map_err(|_| RepositoryError::corruption(format!("{} row count", operation)))?;
    Ok(Page::new(records, total, request))
}

/// Timestamp parameter in the same text form rusqlite writes.
pub(crate) fn datetime_value(t: chrono::NaiveDateTime) -> Value {
    Value::Text(t.format("%F %T%.f").to_string())
}
