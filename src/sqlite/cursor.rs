use crate::cursor::SyncCursor;
use crate::error::Result;
use crate::value::{Row, Value};
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection};
use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// A cursor over a [`SqliteConnection`](super::SqliteConnection).
///
/// `execute` runs the statement to completion and buffers its rows; the fetch methods then
/// hand them out in result order.
pub struct SqliteCursor {
    conn: Arc<Mutex<Connection>>,
    rows: VecDeque<Row>,
    last_row_id: Option<i64>,
}

impl SqliteCursor {
    pub(crate) fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn, rows: VecDeque::new(), last_row_id: None }
    }
}

impl SyncCursor for SqliteCursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;

        self.rows.clear();

        let width = stmt.column_count();
        if width == 0 {
            stmt.execute(params_from_iter(params))?;
        } else {
            let mut rows = stmt.query(params_from_iter(params))?;

            while let Some(row) = rows.next()? {
                let values = (0..width)
                    .map(|idx| row.get_ref(idx).map(Value::from))
                    .collect::<rusqlite::Result<Row>>()?;

                self.rows.push_back(values);
            }
        }

        self.last_row_id = Some(conn.last_insert_rowid());

        Ok(())
    }

    fn fetchone(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    fn fetchall(&mut self) -> Result<Vec<Row>> {
        Ok(self.rows.drain(..).collect())
    }

    fn last_row_id(&self) -> Result<Option<i64>> {
        Ok(self.last_row_id)
    }
}

impl Debug for SqliteCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCursor")
            .field("buffered_rows", &self.rows.len())
            .field("last_row_id", &self.last_row_id)
            .finish()
    }
}
