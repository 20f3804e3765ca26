//! SQLite-backed dataset store and the shadow-generation reload protocol.
//!
//! Reads go through `dataset_catalog`, a name→table mapping from logical
//! entity names to generation-qualified physical tables (`address__g4`).
//! A reload stages the next generation's tables, bulk-loads them, applies
//! cross-cutting deletes, builds indexes — all without touching any table
//! the catalog points at — and finally repoints the catalog for the whole
//! dataset group in one transaction, dropping the previous generation.
//! SQLite's transactional DDL makes that last step atomic: if it fails, the
//! rollback leaves the prior generation fully authoritative.
//!
//! Staging is idempotent (drop-and-recreate), so an aborted reload leaves
//! nothing to clean up; the next attempt recomputes the same generation
//! number and re-stages over the leftovers.

pub mod spec;

use crate::progress::Tick;
use crate::ReloadError;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use spec::{DatasetGroup, TableRow, TableSpec};
use std::path::Path;
use tracing::{debug, info};

/// Rows between bulk-load progress lines.
const PROGRESS_EVERY: u64 = 10_000;

/// Chunk size for `IN (...)` delete lists.
const DELETE_CHUNK: usize = 500;

pub struct Store {
    conn: Connection,
}

/// A staged-but-unpublished table set for one dataset group.
#[derive(Debug, Clone, Copy)]
pub struct Generation {
    pub group: DatasetGroup,
    pub number: i64,
}

impl Generation {
    /// Physical table name for a logical table in this generation.
    pub fn physical(&self, spec: &TableSpec) -> String {
        format!("{}__g{}", spec.logical, self.number)
    }
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, ReloadError> {
        let conn = Connection::open(path)?;
        // WAL keeps the published generation readable from other connections
        // for the whole duration of a staging pass.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, ReloadError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ReloadError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS dataset_catalog (
               logical_name TEXT PRIMARY KEY,
               physical_name TEXT NOT NULL,
               dataset_group TEXT NOT NULL,
               generation INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS geometry_columns (
               table_name TEXT NOT NULL,
               column_name TEXT NOT NULL,
               geometry_type TEXT NOT NULL,
               srid INTEGER NOT NULL,
               PRIMARY KEY (table_name, column_name)
             )",
        )?;
        Ok(Self { conn })
    }

    /// Allocates the generation a fresh reload of `group` will stage into:
    /// one past the highest generation the catalog has ever published for
    /// the group. Re-running after an aborted attempt yields the same
    /// number, which is what makes staging idempotent.
    pub fn begin_generation(&self, group: DatasetGroup) -> Result<Generation, ReloadError> {
        let number: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(generation), 0) + 1 FROM dataset_catalog
              WHERE dataset_group = ?1",
            params![group.name()],
            |row| row.get(0),
        )?;
        Ok(Generation { group, number })
    }

    /// Drops and recreates the staged table for `spec`, registering its
    /// geometry columns with the working SRID. Never touches the cataloged
    /// table of the same logical name.
    pub fn stage(&self, generation: &Generation, spec: &TableSpec) -> Result<(), ReloadError> {
        let physical = generation.physical(spec);
        debug!(table = %physical, "staging table");
        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS \"{physical}\""))?;
        self.conn.execute_batch(&spec.create_sql(&physical))?;

        self.conn.execute(
            "DELETE FROM geometry_columns WHERE table_name = ?1",
            params![physical],
        )?;
        for geometry in spec.geometry_columns {
            self.conn.execute(
                "INSERT INTO geometry_columns (table_name, column_name, geometry_type, srid)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    physical,
                    geometry.column,
                    geometry.geometry_type,
                    spec::WORKING_SRID
                ],
            )?;
        }
        Ok(())
    }

    /// Streams `rows` into the staged table through a prepared statement
    /// inside one transaction. The iterator is pulled one record at a time,
    /// only as fast as the insert path accepts rows, so memory stays O(1)
    /// in the dataset size. Returns the inserted row count.
    pub fn bulk_load<R: TableRow>(
        &mut self,
        generation: &Generation,
        rows: impl Iterator<Item = Result<R, ReloadError>>,
    ) -> Result<u64, ReloadError> {
        let physical = generation.physical(R::SPEC);
        let tx = self.conn.transaction()?;
        let mut count = 0u64;
        {
            let mut stmt = tx.prepare(&R::SPEC.insert_sql(&physical))?;
            let mut tick = Tick::new(PROGRESS_EVERY);
            for row in rows {
                let row = row?;
                stmt.execute(params_from_iter(row.values()))?;
                count += 1;
                tick.observe(R::SPEC.logical, count);
            }
        }
        tx.commit()?;
        info!(table = %physical, rows = count, "bulk load complete");
        Ok(count)
    }

    /// Cross-cutting delete against a staged table, chunked to keep the
    /// `IN` lists bounded. Returns the number of removed rows.
    pub fn delete_where_in(
        &self,
        generation: &Generation,
        spec: &TableSpec,
        column: &str,
        ids: &[i64],
    ) -> Result<u64, ReloadError> {
        let physical = generation.physical(spec);
        let mut removed = 0u64;
        for chunk in ids.chunks(DELETE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql =
                format!("DELETE FROM \"{physical}\" WHERE \"{column}\" IN ({placeholders})");
            removed += self
                .conn
                .execute(&sql, params_from_iter(chunk.iter()))? as u64;
        }
        if removed > 0 {
            info!(table = %physical, rows = removed, "cross-cutting delete");
        }
        Ok(removed)
    }

    /// Builds the declared indexes on the staged table, named
    /// `{physical_table}_{columns}`.
    pub fn build_indexes(
        &self,
        generation: &Generation,
        spec: &TableSpec,
    ) -> Result<(), ReloadError> {
        for sql in spec.index_sql(&generation.physical(spec)) {
            self.conn.execute_batch(&sql)?;
        }
        Ok(())
    }

    /// Atomically publishes the staged generation: one transaction repoints
    /// every catalog row of the group and drops the previous generation's
    /// tables (their indexes go with them). A failure anywhere rolls the
    /// whole swap back, leaving the prior generation authoritative.
    pub fn swap(&mut self, generation: &Generation) -> Result<(), ReloadError> {
        let tx = self.conn.transaction()?;
        for spec in generation.group.tables() {
            let physical = generation.physical(spec);
            let previous: Option<String> = tx
                .query_row(
                    "SELECT physical_name FROM dataset_catalog WHERE logical_name = ?1",
                    params![spec.logical],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                "INSERT INTO dataset_catalog
                   (logical_name, physical_name, dataset_group, generation)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(logical_name) DO UPDATE SET
                   physical_name = excluded.physical_name,
                   generation = excluded.generation",
                params![
                    spec.logical,
                    physical,
                    generation.group.name(),
                    generation.number
                ],
            )?;

            if let Some(previous) = previous {
                if previous != physical {
                    tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{previous}\""))?;
                    tx.execute(
                        "DELETE FROM geometry_columns WHERE table_name = ?1",
                        params![previous],
                    )?;
                }
            }
        }
        tx.commit()?;
        info!(
            group = generation.group.name(),
            generation = generation.number,
            "generation published"
        );
        Ok(())
    }

    /// Resolves a logical table name to the physical table readers should
    /// query, or `None` if the group was never published.
    pub fn resolve(&self, logical: &str) -> Result<Option<String>, ReloadError> {
        Ok(self
            .conn
            .query_row(
                "SELECT physical_name FROM dataset_catalog WHERE logical_name = ?1",
                params![logical],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Row count of the published table behind `logical`, or `None` if it
    /// was never published.
    pub fn count_rows(&self, logical: &str) -> Result<Option<u64>, ReloadError> {
        let Some(physical) = self.resolve(logical)? else {
            return Ok(None);
        };
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{physical}\""), [], |row| {
                row.get(0)
            })?;
        Ok(Some(count as u64))
    }

    /// Read access for the query layer and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
