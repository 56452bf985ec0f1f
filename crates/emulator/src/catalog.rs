//! Tables and database snapshots.
//!
//! A [`DatabaseState`] is an immutable snapshot once published. Writers
//! clone it, mutate the clone and swap it in; tables are shared between
//! snapshots through `Arc` and copied on first write.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use common::Row;
use driver::{DriverError, DriverResult};
use types::{SqlType, Value};

use crate::ast::ColumnDef;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: SqlType,
    pub not_null: bool,
}

impl From<ColumnDef> for Column {
    fn from(def: ColumnDef) -> Self {
        Self {
            name: def.name,
            ty: def.ty,
            not_null: def.not_null,
        }
    }
}

/// Rows keyed and ordered by primary key.
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<usize>,
    rows: BTreeMap<Vec<Value>, Row>,
}

impl Table {
    /// Validate a table definition. An empty key means the table holds at
    /// most one row.
    pub fn try_new(name: &str, columns: Vec<Column>, primary_key: &[String]) -> DriverResult<Self> {
        if columns.is_empty() {
            return Err(DriverError::invalid_argument(format!(
                "Table {name} has no columns"
            )));
        }
        for (idx, column) in columns.iter().enumerate() {
            let duplicate = columns[..idx]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name));
            if duplicate {
                return Err(DriverError::invalid_argument(format!(
                    "Duplicate column name {name}.{}",
                    column.name
                )));
            }
        }

        let mut table = Self {
            name: name.to_string(),
            columns,
            primary_key: Vec::with_capacity(primary_key.len()),
            rows: BTreeMap::new(),
        };
        for key in primary_key {
            let idx = table.column_index(key).ok_or_else(|| {
                DriverError::invalid_argument(format!(
                    "Table {name} references nonexistent key column {key}"
                ))
            })?;
            if table.primary_key.contains(&idx) {
                return Err(DriverError::invalid_argument(format!(
                    "Table {name} references key column {key} more than once"
                )));
            }
            table.primary_key.push(idx);
        }
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Insert a full-width row.
    pub fn insert(&mut self, values: Vec<Value>) -> DriverResult<()> {
        if values.len() != self.columns.len() {
            return Err(DriverError::invalid_argument(format!(
                "Table {} expects {} values, got {}",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }

        for (column, value) in self.columns.iter().zip(&values) {
            match value.sql_type() {
                None if column.not_null => {
                    return Err(DriverError::failed_precondition(format!(
                        "Cannot specify a null value for column: {}.{}",
                        self.name, column.name
                    )))
                }
                Some(ty) if ty != column.ty => {
                    return Err(DriverError::invalid_argument(format!(
                        "Value has type {ty} which cannot be inserted into column {}, which has type {}",
                        column.name, column.ty
                    )))
                }
                _ => {}
            }
        }

        let key: Vec<Value> = self.primary_key.iter().map(|&i| values[i].clone()).collect();
        if self.rows.contains_key(&key) {
            let rendered = key.iter().map(Value::to_string).collect::<Vec<_>>().join(",");
            return Err(DriverError::already_exists(format!(
                "Row [{rendered}] in table {} already exists",
                self.name
            )));
        }
        self.rows.insert(key, Row::new(values));
        Ok(())
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// First row strictly after `after` in key order, with its key.
    pub fn next_after(&self, after: Option<&[Value]>) -> Option<(&[Value], &Row)> {
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        self.rows
            .range::<[Value], _>((lower, Bound::Unbounded))
            .next()
            .map(|(key, row)| (key.as_slice(), row))
    }
}

/// One consistent view of every table in a database.
#[derive(Clone, Debug, Default)]
pub struct DatabaseState {
    tables: BTreeMap<String, Arc<Table>>,
}

fn table_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl DatabaseState {
    pub fn table(&self, name: &str) -> DriverResult<&Arc<Table>> {
        self.tables
            .get(&table_key(name))
            .ok_or_else(|| DriverError::not_found(format!("Table not found: {name}")))
    }

    pub fn table_mut(&mut self, name: &str) -> DriverResult<&mut Table> {
        self.tables
            .get_mut(&table_key(name))
            .map(Arc::make_mut)
            .ok_or_else(|| DriverError::not_found(format!("Table not found: {name}")))
    }

    pub fn create_table(&mut self, table: Table) -> DriverResult<()> {
        let key = table_key(table.name());
        if self.tables.contains_key(&key) {
            return Err(DriverError::already_exists(format!(
                "Duplicate name in schema: {}",
                table.name()
            )));
        }
        self.tables.insert(key, Arc::new(table));
        Ok(())
    }

    /// Returns false if the table did not exist and `if_exists` was set.
    pub fn drop_table(&mut self, name: &str, if_exists: bool) -> DriverResult<bool> {
        match self.tables.remove(&table_key(name)) {
            Some(_) => Ok(true),
            None if if_exists => Ok(false),
            None => Err(DriverError::not_found(format!("Table not found: {name}"))),
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.values().map(|t| t.name().to_string()).collect()
    }
}
