use crate::core::{DbError, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Row = Vec<Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    columns: Vec<String>,
    /// Column filled by the store on insert
    identity: Option<String>,
    unique: Vec<String>,
}

impl TableSchema {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            identity: None,
            unique: Vec::new(),
        }
    }

    pub fn identity(mut self, column: &str) -> Self {
        self.identity = Some(column.to_string());
        self
    }

    pub fn unique(mut self, column: &str) -> Self {
        self.unique.push(column.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn find_column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.find_column_index(column)
            .ok_or_else(|| DbError::ColumnNotFound(column.to_string(), self.name.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<usize, Row>,
    next_row_id: usize,
    next_identity: i64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            next_identity: 1,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Insert a row built from `(column, value)` pairs; missing columns are NULL.
    ///
    /// Returns the stored row, identity column included.
    pub fn insert(&mut self, values: &[(String, Value)]) -> Result<Row> {
        let mut row = vec![Value::Null; self.schema.columns.len()];
        for (column, value) in values {
            let idx = self.schema.column_index(column)?;
            if self.schema.identity.as_deref() == Some(column.as_str()) {
                return Err(DbError::ConstraintViolation(format!(
                    "Cannot insert explicit value for identity column '{}'",
                    column
                )));
            }
            row[idx] = value.clone();
        }

        if let Some(identity) = &self.schema.identity {
            let idx = self.schema.column_index(identity)?;
            row[idx] = Value::Integer(self.next_identity);
        }

        self.check_uniqueness(&row, &[])?;

        if self.schema.identity.is_some() {
            self.next_identity += 1;
        }
        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    /// Apply `values` to every row matching `keys`.
    ///
    /// All new rows are checked before any is written, so a constraint
    /// violation leaves the table untouched. Returns the updated rows.
    pub fn update(&mut self, keys: &[(String, Value)], values: &[(String, Value)]) -> Result<Vec<Row>> {
        let ids = self.matching_ids(keys)?;
        let assignments = values
            .iter()
            .map(|(column, value)| Ok((self.schema.column_index(column)?, value.clone())))
            .collect::<Result<Vec<_>>>()?;

        let mut updated = Vec::with_capacity(ids.len());
        for id in &ids {
            let mut new_row = self.rows[id].clone();
            for (idx, value) in &assignments {
                new_row[*idx] = value.clone();
            }
            self.check_uniqueness(&new_row, &ids)?;
            self.check_batch_uniqueness(&new_row, &updated)?;
            updated.push(new_row);
        }

        for (id, row) in ids.into_iter().zip(&updated) {
            self.rows.insert(id, row.clone());
        }
        Ok(updated)
    }

    /// Remove every row matching `keys`; returns the removed rows.
    pub fn delete(&mut self, keys: &[(String, Value)]) -> Result<Vec<Row>> {
        let ids = self.matching_ids(keys)?;
        Ok(ids.into_iter().filter_map(|id| self.rows.remove(&id)).collect())
    }

    pub fn scan(&self) -> Vec<Row> {
        self.rows.values().cloned().collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Read `column` from a stored row
    pub fn column_value(&self, row: &Row, column: &str) -> Result<Value> {
        let idx = self.schema.column_index(column)?;
        Ok(row[idx].clone())
    }

    fn matching_ids(&self, keys: &[(String, Value)]) -> Result<Vec<usize>> {
        if keys.is_empty() {
            return Err(DbError::ExecutionError(format!(
                "Update or delete on '{}' requires at least one key column",
                self.schema.name
            )));
        }

        let key_indexes = keys
            .iter()
            .map(|(column, value)| Ok((self.schema.column_index(column)?, value)))
            .collect::<Result<Vec<_>>>()?;

        Ok(self
            .rows
            .iter()
            .filter(|(_, row)| key_indexes.iter().all(|(idx, value)| &row[*idx] == *value))
            .map(|(id, _)| *id)
            .collect())
    }

    /// Check `row` against stored rows, skipping the rows in `ignore_ids`.
    fn check_uniqueness(&self, row: &Row, ignore_ids: &[usize]) -> Result<()> {
        for column in &self.schema.unique {
            let idx = self.schema.column_index(column)?;
            let value = &row[idx];
            if value.is_null() {
                continue;
            }
            let conflict = self
                .rows
                .iter()
                .any(|(id, existing)| !ignore_ids.contains(id) && &existing[idx] == value);
            if conflict {
                return Err(unique_violation(column, value));
            }
        }
        Ok(())
    }

    /// Check `row` against rows staged by the same statement.
    fn check_batch_uniqueness(&self, row: &Row, staged: &[Row]) -> Result<()> {
        for column in &self.schema.unique {
            let idx = self.schema.column_index(column)?;
            let value = &row[idx];
            if !value.is_null() && staged.iter().any(|other| &other[idx] == value) {
                return Err(unique_violation(column, value));
            }
        }
        Ok(())
    }
}

fn unique_violation(column: &str, value: &Value) -> DbError {
    DbError::ConstraintViolation(format!(
        "Unique constraint violation: Column '{}' already contains value {}",
        column, value
    ))
}
