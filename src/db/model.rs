// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Table models over SQLite.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params_from_iter, Connection};

use super::cache::ResultCache;
use super::query::{
    build_delete, build_insert, build_select, build_update, filter_conditions, Columns,
    SelectOptions, Statement, TableDef,
};
use super::row::Row;
use super::value::Value;
use crate::config::{ConfigError, ModuleConfig};
use crate::error::{FrameworkError, Result};

/// A type backed by a table.
pub trait Model {
    fn table() -> TableDef;

    /// Open a model for this table using the module's database.
    fn open(config: &ModuleConfig) -> DbModel {
        DbModel::new(Self::table(), config)
    }
}

/// Model of one table: statement assembly, execution and result caching.
///
/// The connection is opened on first use.
#[derive(Debug)]
pub struct DbModel {
    table: TableDef,
    database_path: Option<PathBuf>,
    conn: Option<Connection>,
    cache: Option<ResultCache>,
    caching: bool,
    affected_rows: usize,
}

impl DbModel {
    pub fn new(table: TableDef, config: &ModuleConfig) -> Self {
        let cache = ResultCache::new(&config.cache_dir, table.name(), config.cache_lifetime);
        Self {
            table,
            database_path: config.database_path.clone(),
            conn: None,
            cache: Some(cache),
            caching: false,
            affected_rows: 0,
        }
    }

    /// Model over an already open connection, without a result cache.
    pub fn with_connection(table: TableDef, conn: Connection) -> Self {
        Self {
            table,
            database_path: None,
            conn: Some(conn),
            cache: None,
            caching: false,
            affected_rows: 0,
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: &Path, lifetime: Option<Duration>) -> Self {
        self.cache = Some(ResultCache::new(cache_dir, self.table.name(), lifetime));
        self
    }

    pub fn table(&self) -> &TableDef {
        &self.table
    }

    fn connection(&mut self) -> Result<&Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let path = self
                    .database_path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Missing("DATABASE_PATH".to_string()))?;
                tracing::debug!(path = %path.display(), table = self.table.name(), "Opening database");
                Connection::open(path)?
            }
        };
        Ok(self.conn.insert(conn))
    }

    /// Rows matching every column of `filter` for equality.
    pub fn get(&mut self, columns: &[&str], filter: &Row, do_not_cache: bool) -> Result<Vec<Row>> {
        let mut options = SelectOptions::new();
        options.columns = column_list(columns);
        options.where_and = filter_conditions(&self.table, filter)?;
        self.select(&options, do_not_cache)
    }

    pub fn get_all(&mut self, columns: &[&str], do_not_cache: bool) -> Result<Vec<Row>> {
        self.get(columns, &Row::new(), do_not_cache)
    }

    /// Row with the given primary key value.
    pub fn get_row(
        &mut self,
        key: impl Into<Value>,
        columns: &[&str],
        do_not_cache: bool,
    ) -> Result<Option<Row>> {
        let primary = self
            .table
            .primary_key()
            .ok_or_else(|| FrameworkError::MissingPrimaryKey(self.table.name().to_string()))?
            .to_string();
        let mut filter = Row::new();
        filter.set(primary, key);
        Ok(self.get(columns, &filter, do_not_cache)?.into_iter().next())
    }

    /// Run a raw statement with positional values.
    pub fn query(&mut self, sql: &str, values: Vec<Value>, do_not_cache: bool) -> Result<Vec<Row>> {
        self.fetch(
            Statement {
                sql: sql.to_string(),
                params: values,
            },
            do_not_cache,
        )
    }

    pub fn select(&mut self, options: &SelectOptions, do_not_cache: bool) -> Result<Vec<Row>> {
        let statement = build_select(&self.table, options)?;
        self.fetch(statement, do_not_cache)
    }

    /// Insert a row and return its rowid.
    pub fn insert(&mut self, data: &Row) -> Result<i64> {
        let statement = build_insert(&self.table, data)?;
        self.execute(&statement)?;
        let id = self.connection()?.last_insert_rowid();
        self.clean_cache_after_write()?;
        Ok(id)
    }

    /// Update rows matching `filter`; returns the number of rows changed.
    pub fn update(&mut self, data: &Row, filter: &Row) -> Result<usize> {
        let statement = build_update(&self.table, data, filter)?;
        let changed = self.execute(&statement)?;
        self.clean_cache_after_write()?;
        Ok(changed)
    }

    /// Delete rows matching `filter`, or every row when it is empty.
    pub fn delete(&mut self, filter: &Row) -> Result<usize> {
        let statement = build_delete(&self.table, filter)?;
        let changed = self.execute(&statement)?;
        self.clean_cache_after_write()?;
        Ok(changed)
    }

    /// Rows changed by the last write.
    pub fn affected_rows(&self) -> usize {
        self.affected_rows
    }

    /// Switch to a different database file. The next statement reopens.
    pub fn set_db(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.close()?;
        self.database_path = Some(path.into());
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| e)?;
        }
        Ok(())
    }

    pub fn enable_caching(&mut self) -> Result<()> {
        if self.cache.is_none() {
            return Err(FrameworkError::Cache(format!(
                "No cache directory configured for table '{}'",
                self.table.name()
            )));
        }
        self.caching = true;
        Ok(())
    }

    pub fn disable_caching(&mut self) {
        self.caching = false;
    }

    pub fn is_caching(&self) -> bool {
        self.caching
    }

    pub fn clear_cache(&self) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.clean(),
            None => Ok(()),
        }
    }

    fn active_cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref().filter(|_| self.caching)
    }

    fn fetch(&mut self, statement: Statement, do_not_cache: bool) -> Result<Vec<Row>> {
        let cached = match self.active_cache() {
            Some(cache) => {
                let id = cache.cache_id(&statement)?;
                match cache.load(&id) {
                    Some(rows) => {
                        tracing::debug!(table = self.table.name(), id = %id, "Result cache hit");
                        return Ok(rows);
                    }
                    None => Some(id),
                }
            }
            None => None,
        };

        let rows = run_query(self.connection()?, &statement)?;

        if let (Some(id), Some(cache)) = (cached, self.active_cache()) {
            if !do_not_cache {
                tracing::debug!(table = self.table.name(), id = %id, rows = rows.len(), "Result cache miss");
                if let Err(e) = cache.save(&id, &rows) {
                    tracing::warn!(table = self.table.name(), error = %e, "Failed to store cached result");
                }
            }
        }
        Ok(rows)
    }

    fn execute(&mut self, statement: &Statement) -> Result<usize> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement");
        let changed = self
            .connection()?
            .execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        self.affected_rows = changed;
        Ok(changed)
    }

    fn clean_cache_after_write(&self) -> Result<()> {
        match self.active_cache() {
            Some(cache) => cache.clean(),
            None => Ok(()),
        }
    }
}

fn column_list(columns: &[&str]) -> Columns {
    if columns.is_empty() {
        Columns::All
    } else {
        Columns::List(columns.iter().map(|c| (c.to_string(), None)).collect())
    }
}

fn run_query(conn: &Connection, statement: &Statement) -> Result<Vec<Row>> {
    tracing::debug!(sql = %statement.sql, params = statement.params.len(), "Running query");
    let mut stmt = conn.prepare(&statement.sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (i, name) in names.iter().enumerate() {
            record.set(name.clone(), row.get::<_, Value>(i)?);
        }
        out.push(record);
    }
    Ok(out)
}
