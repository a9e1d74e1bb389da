//! YACReader library database access and record write-back.

use crate::error::{Result, SyncError};
use crate::models::{CurrentValues, FieldMapping, FieldValue, Outcome, StagedField, TargetRecord};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

/// Read-write handle on a YACReader library database.
///
/// Owns the connection exclusively for the duration of a run.
pub struct TargetStore {
    conn: Connection,
    columns: Vec<&'static str>,
    select_current: String,
}

impl TargetStore {
    /// Open an existing database. The file is never created, and the tables
    /// and mapped columns are checked so a wrong file fails here.
    pub fn open(path: &Path, mappings: &[FieldMapping]) -> Result<Self> {
        let connect = || -> rusqlite::Result<Self> {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
            Self::from_connection(conn, mappings)
        };
        let store = connect().map_err(|source| SyncError::StoreConnect {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Connected to the YACReader database.");
        Ok(store)
    }

    /// Wrap an already open connection (in-memory databases in tests).
    pub fn from_connection(conn: Connection, mappings: &[FieldMapping]) -> rusqlite::Result<Self> {
        let columns: Vec<&'static str> = mappings.iter().map(|m| m.column).collect();
        let select_current = format!("SELECT {} FROM comic_info WHERE Id = ?1", columns.join(", "));

        conn.prepare("SELECT ComicInfoId, Path FROM comic LIMIT 0")?;
        conn.prepare(&select_current)?;

        Ok(Self { conn, columns, select_current })
    }

    /// Snapshot of every (ComicInfoId, Path) pair, in rowid order.
    pub fn list_targets(&self) -> Result<Vec<TargetRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ComicInfoId, Path FROM comic ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(TargetRecord {
                comic_info_id: row.get(0)?,
                path: row.get(1)?,
            })
        })?;
        let targets = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(targets)
    }

    /// Current values of the mapped columns; `None` if there is no `comic_info` row.
    pub fn current_values(&self, comic_info_id: i64) -> Result<Option<CurrentValues>> {
        let mut stmt = self.conn.prepare_cached(&self.select_current)?;
        let current = stmt
            .query_row(params![comic_info_id], |row| {
                let mut values = CurrentValues::new();
                for (idx, column) in self.columns.iter().enumerate() {
                    values.insert(column, FieldValue::from(row.get_ref(idx)?));
                }
                Ok(values)
            })
            .optional()?;
        Ok(current)
    }

    /// Write the staged columns of one record in a single transaction.
    ///
    /// Nothing staged -> `Unchanged` without touching the database. A
    /// statement that matches no row is rolled back as `NoRow`; only a store
    /// error yields `Failed`.
    pub fn apply(&mut self, comic_info_id: i64, staged: &[StagedField], verbose: bool) -> Outcome {
        if staged.is_empty() {
            return Outcome::Unchanged;
        }

        let (sql, values) = build_update(comic_info_id, staged);
        if verbose {
            info!("QUERY: {}", render_statement(&sql, &values));
        } else {
            debug!("UPDATE of DB: {} with {:?}", sql, values);
        }

        match self.execute_update(&sql, &values) {
            Ok(0) => Outcome::NoRow,
            Ok(_) => Outcome::Updated,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    fn execute_update(&mut self, sql: &str, values: &[FieldValue]) -> rusqlite::Result<usize> {
        let tx = self.conn.transaction()?;
        let changed = tx.execute(sql, params_from_iter(values.iter()))?;
        if changed == 0 {
            // Dropping the transaction rolls it back
            return Ok(0);
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Close the connection, surfacing any error from SQLite.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| SyncError::Store(e))
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Build `UPDATE comic_info SET c1 = ?1, .. WHERE Id = ?n` and its parameters.
pub fn build_update(comic_info_id: i64, staged: &[StagedField]) -> (String, Vec<FieldValue>) {
    let assignments: Vec<String> = staged
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{} = ?{}", f.column, i + 1))
        .collect();
    let sql = format!(
        "UPDATE comic_info SET {} WHERE Id = ?{}",
        assignments.join(", "),
        staged.len() + 1
    );

    let mut values: Vec<FieldValue> = staged.iter().map(|f| f.value.clone()).collect();
    values.push(FieldValue::Integer(comic_info_id));
    (sql, values)
}

/// Substitute literal values into a statement, for diagnostics only.
/// Strings are single-quoted, nulls become NULL.
///
/// One left-to-right pass: substituted text is never scanned again, so a
/// value containing `?1` stays as written. Placeholders without a value are
/// kept.
pub fn render_statement(sql: &str, values: &[FieldValue]) -> String {
    let mut rendered = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(pos) = rest.find('?') {
        rendered.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let value = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| values.get(i));
        match value {
            Some(value) => rendered.push_str(&value.to_sql_literal()),
            None => rendered.push_str(&rest[pos..pos + 1 + digits]),
        }
        rest = &after[digits..];
    }
    rendered.push_str(rest);
    rendered
}
