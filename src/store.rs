use serde_json::Value;
use tracing::{debug, info};

use crate::command::{parse_command, CommandError};
use crate::csv_io;
use crate::executor;
use crate::record::Record;
use crate::schema::{default_columns, Column, ColumnType, Sticky};

/// Partial column update, unset fields keep their current value.
#[derive(Clone, Debug, Default)]
pub struct ColumnPatch {
    pub header: Option<String>,
    pub column_type: Option<ColumnType>,
    pub editable: Option<bool>,
    pub sticky: Option<Option<Sticky>>,
}

/// Single owner of the row collection and the column registry. All
/// mutation flows through these operations; each one is an atomic
/// whole-state replace, which keeps update semantics trivial for
/// reactive consumers.
#[derive(Clone, Debug, Default)]
pub struct TableStore {
    columns: Vec<Column>,
    records: Vec<Record>,
}

impl TableStore {
    pub fn new() -> Self {
        Self {
            columns: default_columns(),
            records: Vec::new(),
        }
    }

    /// Start from a previously persisted column registry.
    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Replace the whole dataset. Last writer wins; there is no merge.
    pub fn set_all(&mut self, records: Vec<Record>) {
        info!("Dataset replaced: {} records", records.len());
        self.records = records;
    }

    pub fn add_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Cell-edit write: the accessor path is decomposed and the nested
    /// chain rebuilt, unlike the executor's literal flat-key writes.
    pub fn update_one(&mut self, id: i64, path: &str, value: Value) {
        self.records = self
            .records
            .iter()
            .map(|record| {
                if record.id == id {
                    record.with_path_set(path, value.clone())
                } else {
                    record.clone()
                }
            })
            .collect();
    }

    pub fn delete_many(&mut self, ids: &[i64]) {
        self.records.retain(|record| !ids.contains(&record.id));
    }

    /// Append a column before the sentinel and backfill every record
    /// with the type default in the same step, so the field is never
    /// present on some rows and absent on others.
    pub fn add_column(&mut self, column: Column) {
        let default_value = column.column_type.default_value();
        for record in &mut self.records {
            record.set_flat(&column.accessor_key, default_value.clone());
        }
        let insert_at = if self.columns.last().is_some_and(Column::is_sentinel) {
            self.columns.len() - 1
        } else {
            self.columns.len()
        };
        debug!("Adding column '{}' at {}", column.id, insert_at);
        self.columns.insert(insert_at, column);
    }

    /// Drop a column and strip its key from every record.
    pub fn remove_column(&mut self, column_id: &str) {
        let Some(position) = self.columns.iter().position(|c| c.id == column_id) else {
            return;
        };
        let column = self.columns.remove(position);
        for record in &mut self.records {
            record.remove_flat(&column.accessor_key);
        }
    }

    pub fn update_column(&mut self, column_id: &str, patch: ColumnPatch) {
        if let Some(column) = self.columns.iter_mut().find(|c| c.id == column_id) {
            if let Some(header) = patch.header {
                column.header = header;
            }
            if let Some(column_type) = patch.column_type {
                column.column_type = column_type;
            }
            if let Some(editable) = patch.editable {
                column.editable = editable;
            }
            if let Some(sticky) = patch.sticky {
                column.sticky = sticky;
            }
        }
    }

    /// Back to the default registry and an empty dataset.
    pub fn reset(&mut self) {
        self.columns = default_columns();
        self.records.clear();
    }

    /// Parse and apply one natural-language command line. On success the
    /// dataset is replaced and the affected-count report returned; any
    /// failure leaves the state untouched.
    pub fn run_command(&mut self, text: &str) -> Result<String, CommandError> {
        let command = parse_command(text)?;
        let outcome = executor::execute(&command, &self.records)?;
        let report = outcome.report(command.kind);
        info!("{}", report);
        self.records = outcome.records;
        Ok(report)
    }

    /// Export every data column (the sentinel is not a data column).
    pub fn export_csv(&self) -> String {
        let keys: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !c.is_sentinel())
            .map(|c| c.accessor_key.clone())
            .collect();
        csv_io::export_to_csv(&self.records, &keys)
    }
}
