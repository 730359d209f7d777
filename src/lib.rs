//! Async, transactional access to synchronous database drivers.
//!
//! * A [`Cursor`] is the async handle an interaction uses to run statements and fetch rows.
//!   [`BlockingCursor`] adapts any synchronous driver cursor to it.
//! * A [`Runner`] runs an interaction against a fresh cursor inside a transaction, committing
//!   when it succeeds and rolling back when it fails. [`BlockingRunner`] does this over one
//!   synchronous connection.
//! * [`RunnerPool`](pool::RunnerPool) is itself a `Runner`, spreading interactions over many
//!   runners with fair, first-come-first-served checkout.
//!
//! ```
//! use dbrunner::pool::PoolOptions;
//! use dbrunner::{params, Runner, Value};
//!
//! # futures::executor::block_on(async {
//! let pool = PoolOptions::new().build("sqlite::memory:")?;
//!
//! pool.run_operation("create table foo (name text)", params![]).await?;
//! pool.run_operation("insert into foo (name) values (?)", params!["name1"]).await?;
//!
//! let rows = pool.run_query("select name from foo", params![]).await?;
//! assert_eq!(rows, vec![vec![Value::from("name1")]]);
//! # Ok::<(), dbrunner::Error>(())
//! # }).unwrap();
//! ```

#![warn(missing_debug_implementations)]

pub mod cursor;
pub mod error;
pub mod runner;
mod value;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "orm")]
pub mod orm;

pub use crate::cursor::{BlockingCursor, Cursor, SyncCursor};
pub use crate::error::{BoxDynError, Error, Result};
pub use crate::runner::{BlockingRunner, Runner, SyncConnection};
pub use crate::value::{Row, Value};
