//! Store access with cache-first execution.
//!
//! The [`Connector`] owns the lifecycle of one upstream connection and the
//! cache-first fetch path:
//!
//! ```text
//! execute(sql) → hash key → cache hit?  → deserialize, done (store untouched)
//!                           cache miss? → store reachable? → fetch, persist, done
//!                                         unreachable?     → configuration error
//! ```
//!
//! Cancellation is cooperative: an external [`CancelToken`] is checked
//! around the fetch, and an interrupted fetch discards any partially
//! written cache file before the interruption propagates.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::debug;
use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, Value};

use crate::config::DbConfig;
use crate::dataset::table::{Column, DataTable};
use crate::db::cache::QueryCache;

/// Marker error raised when an external stop signal interrupts a fetch.
/// The batch driver terminates the whole run on this; nothing is retried.
#[derive(Debug, Clone, Copy)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query execution interrupted by stop signal")
    }
}

impl std::error::Error for Interrupted {}

/// Shared cancellation flag, checked around blocking query execution.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from a signal handler thread.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Interrupted.into())
        } else {
            Ok(())
        }
    }
}

/// A relational store that answers fully-formed select statements with
/// rectangular row sets.
pub trait Store {
    fn fetch(&mut self, sql: &str) -> Result<DataTable>;

    /// Release the underlying connection. Idempotent.
    fn close(&mut self) {}
}

/// MySQL-backed store. The connection is opened once by the batch driver
/// and closed once at process exit.
pub struct MySqlStore {
    conn: Conn,
}

impl MySqlStore {
    /// Connect with the configured parameters. The read/write timeout is a
    /// hardening knob; without it a hung upstream blocks indefinitely.
    pub fn connect(cfg: &DbConfig) -> Result<Self> {
        let mut opts = OptsBuilder::new()
            .ip_or_hostname(Some(cfg.host.clone()))
            .tcp_port(cfg.port)
            .user(Some(cfg.user.clone()))
            .pass(Some(cfg.password.clone()))
            .db_name(Some(cfg.database.clone()));
        if let Some(secs) = cfg.read_timeout_secs {
            let timeout = Some(Duration::from_secs(secs));
            opts = opts.read_timeout(timeout).write_timeout(timeout);
        }
        let conn = Conn::new(Opts::from(opts)).with_context(|| {
            format!("failed to connect to {}:{}/{}", cfg.host, cfg.port, cfg.database)
        })?;
        Ok(Self { conn })
    }
}

impl Store for MySqlStore {
    fn fetch(&mut self, sql: &str) -> Result<DataTable> {
        let mut result = self
            .conn
            .query_iter(sql)
            .context("query execution failed")?;

        let names: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        let mut raw: Vec<Vec<RawCell>> = (0..names.len()).map(|_| Vec::new()).collect();
        for row in result.by_ref() {
            let row = row.context("failed to read result row")?;
            for (i, cells) in raw.iter_mut().enumerate() {
                let value = row.as_ref(i).unwrap_or(&Value::NULL);
                cells.push(RawCell::from_value(value));
            }
        }

        let mut table = DataTable::new();
        for (name, cells) in names.into_iter().zip(raw) {
            table.push_column(name, columnize(cells))?;
        }
        Ok(table)
    }
}

/// Intermediate cell before column typing is decided.
enum RawCell {
    Null,
    Num(f64),
    Text(String),
}

impl RawCell {
    fn from_value(value: &Value) -> RawCell {
        match value {
            Value::NULL => RawCell::Null,
            Value::Int(i) => RawCell::Num(*i as f64),
            Value::UInt(u) => RawCell::Num(*u as f64),
            Value::Float(f) => RawCell::Num(f64::from(*f)),
            Value::Double(d) => RawCell::Num(*d),
            // DECIMAL and text columns both arrive as bytes.
            Value::Bytes(b) => {
                let text = String::from_utf8_lossy(b).into_owned();
                match text.parse::<f64>() {
                    Ok(n) => RawCell::Num(n),
                    Err(_) => RawCell::Text(text),
                }
            }
            Value::Date(y, mo, d, h, mi, s, _) => RawCell::Text(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                y, mo, d, h, mi, s
            )),
            Value::Time(neg, d, h, mi, s, _) => RawCell::Text(format!(
                "{}{:02}:{:02}:{:02}",
                if *neg { "-" } else { "" },
                u32::from(*d) * 24 + u32::from(*h),
                mi,
                s
            )),
        }
    }
}

/// A column is numeric unless any non-null cell is textual.
fn columnize(cells: Vec<RawCell>) -> Column {
    let has_text = cells.iter().any(|c| matches!(c, RawCell::Text(_)));
    if has_text {
        Column::Str(
            cells
                .into_iter()
                .map(|c| match c {
                    RawCell::Null => None,
                    RawCell::Num(n) => Some(n.to_string()),
                    RawCell::Text(t) => Some(t),
                })
                .collect(),
        )
    } else {
        Column::Num(
            cells
                .into_iter()
                .map(|c| match c {
                    RawCell::Null => None,
                    RawCell::Num(n) => Some(n),
                    RawCell::Text(_) => unreachable!(),
                })
                .collect(),
        )
    }
}

/// Cache-first query executor over an optional upstream store.
pub struct Connector<S: Store> {
    store: Option<S>,
    cache: QueryCache,
    use_cache: bool,
    cancel: CancelToken,
    show_sql: bool,
    store_calls: usize,
}

impl<S: Store> Connector<S> {
    /// `store` is `None` when the upstream is configured unavailable; every
    /// query must then be answerable from cache.
    pub fn new(store: Option<S>, cache: QueryCache, use_cache: bool, cancel: CancelToken) -> Self {
        Self {
            store,
            cache,
            use_cache,
            cancel,
            show_sql: false,
            store_calls: 0,
        }
    }

    /// Log every executed query at debug level.
    pub fn show_sql(mut self, on: bool) -> Self {
        self.show_sql = on;
        self
    }

    /// Number of queries that actually reached the upstream store.
    pub fn store_calls(&self) -> usize {
        self.store_calls
    }

    /// Execute a query, preferring the cache.
    ///
    /// On a cache hit the store is never contacted. On a miss the result is
    /// fetched, persisted atomically under the query hash, and returned.
    pub fn execute(&mut self, sql: &str) -> Result<DataTable> {
        if self.show_sql {
            debug!("executing query:\n{}", sql);
        }

        let key = QueryCache::key(sql);
        if self.use_cache {
            if let Some(table) = self.cache.lookup(&key)? {
                debug!("cache hit for {}", key);
                return Ok(table);
            }
        }

        let Some(store) = self.store.as_mut() else {
            bail!(
                "store is unavailable and no cache entry exists for key {}",
                key
            );
        };

        self.cancel.check()?;
        self.store_calls += 1;
        let table = match store.fetch(sql) {
            Ok(table) => table,
            Err(e) => {
                self.cache.discard_partial(&key);
                return Err(e);
            }
        };
        if self.cancel.is_cancelled() {
            self.cache.discard_partial(&key);
            return Err(Interrupted.into());
        }

        if self.use_cache {
            debug!("saving cache entry {}", key);
            if let Err(e) = self.cache.store(&key, &table) {
                self.cache.discard_partial(&key);
                return Err(e);
            }
        }
        Ok(table)
    }

    /// Release the upstream connection. Safe to call repeatedly or when no
    /// connection was ever opened.
    pub fn close(&mut self) {
        if let Some(mut store) = self.store.take() {
            store.close();
        }
    }
}
