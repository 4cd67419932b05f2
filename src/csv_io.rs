use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;
use thiserror::Error;
use tracing::debug;

use crate::record::{NamedResource, Record, StatSlot, TypeSlot};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV input has no header row")]
    MissingHeader,
}

/// Parsed tabular data, header row split off.
#[derive(Clone, Debug, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

/// How one CSV column lands in a record field.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MappingType {
    Text,
    Number,
    Boolean,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ColumnMapping {
    pub csv_column: usize,
    pub target_field: String,
    pub data_type: MappingType,
}

impl ColumnMapping {
    pub fn new(csv_column: usize, target_field: &str, data_type: MappingType) -> Self {
        Self {
            csv_column,
            target_field: target_field.to_string(),
            data_type,
        }
    }
}

/// Read CSV into rows of cells. The first non-empty record is the
/// header; empty lines are skipped; ragged rows are accepted.
pub fn parse_csv<R: Read>(reader: R) -> Result<CsvTable, ImportError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if headers.is_empty() {
            headers = cells;
        } else {
            rows.push(cells);
        }
    }
    if headers.is_empty() {
        return Err(ImportError::MissingHeader);
    }
    debug!("Parsed CSV: {} columns, {} rows", headers.len(), rows.len());
    Ok(CsvTable {
        headers,
        total_rows: rows.len(),
        rows,
    })
}

/// Convert mapped CSV rows into records. Row ids are the 1-based row
/// index; `types` cells split on `/` into slots; `stats.<i>.<key>`
/// targets materialize the stat slot; everything else becomes a dynamic
/// field coerced per the mapping type.
pub fn map_rows(table: &CsvTable, mappings: &[ColumnMapping]) -> Vec<Record> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut record = Record {
                id: index as i64 + 1,
                ..Record::default()
            };
            for mapping in mappings {
                let value = row
                    .get(mapping.csv_column)
                    .map(String::as_str)
                    .unwrap_or("");
                apply_mapping(&mut record, mapping, value);
            }
            record
        })
        .collect()
}

fn apply_mapping(record: &mut Record, mapping: &ColumnMapping, value: &str) {
    if mapping.target_field == "name" {
        record.name = value.to_string();
    } else if mapping.target_field == "types" {
        record.types = value
            .split('/')
            .filter(|t| !t.trim().is_empty())
            .enumerate()
            .map(|(slot, type_name)| TypeSlot {
                slot: slot as i64,
                type_ref: NamedResource::named(type_name.trim()),
            })
            .collect();
    } else if let Some(rest) = mapping.target_field.strip_prefix("stats.") {
        let mut parts = rest.split('.');
        let Some(stat_index) = parts.next().and_then(|p| p.parse::<usize>().ok()) else {
            return;
        };
        let stat_name = parts.next().unwrap_or("");
        if record.stats.len() <= stat_index {
            record.stats.resize(stat_index + 1, StatSlot::default());
        }
        let slot = &mut record.stats[stat_index];
        if slot.stat.name.is_empty() {
            slot.stat = NamedResource::named(stat_name);
        }
        if mapping.data_type == MappingType::Number {
            slot.base_stat = parse_integer(value);
        }
    } else {
        let coerced = match mapping.data_type {
            MappingType::Number => Value::from(parse_integer(value)),
            // plain truthiness: any non-empty cell reads as true
            MappingType::Boolean => Value::from(!value.is_empty()),
            MappingType::Text => Value::from(value.to_string()),
        };
        record.set_flat(&mapping.target_field, coerced);
    }
}

// Failed parses become 0 rather than an error; a bad cell must not
// abort the whole import.
fn parse_integer(value: &str) -> i64 {
    value.trim().parse().unwrap_or(0)
}

/// Emit a header line plus one line per record, each column resolved by
/// dotted path. A value containing a comma is wrapped in double quotes;
/// embedded quotes are not escaped (known limitation). Missing values
/// render empty, structured values render as JSON.
pub fn export_to_csv(records: &[Record], accessor_keys: &[String]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(accessor_keys.join(","));
    for record in records {
        let cells: Vec<String> = accessor_keys
            .iter()
            .map(|key| render_cell(record.get_path(key)))
            .collect();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

fn render_cell(value: Option<Value>) -> String {
    let rendered = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    };
    if rendered.contains(',') {
        format!("\"{}\"", rendered)
    } else {
        rendered
    }
}
