//! SQLite, through [`rusqlite`], as a synchronous driver for [`BlockingRunner`](crate::BlockingRunner).
//!
//! Statements use SQLite's own placeholder syntax (`?`, `?NNN`, `:name` bound positionally).
//! Each interaction runs inside a transaction that the cursor opens with `BEGIN`.

pub use self::connection::SqliteConnection;
pub use self::cursor::SqliteCursor;
pub use self::options::SqliteConnectOptions;

mod connection;
mod cursor;
mod options;
mod value;
