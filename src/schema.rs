use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Fixed storage name for the persisted column registry. Rows are never
/// persisted, only the schema survives a reload.
pub const STORE_NAME: &str = "pokemon-store";

/// Id of the sentinel column hosting the add-column control. It is not a
/// data column and always iterates last.
pub const ADD_COLUMN_ID: &str = "addColumn";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Boolean,
    Image,
    Types,
}

impl ColumnType {
    /// Default value backfilled into every record when a column of this
    /// type is added.
    pub fn default_value(&self) -> serde_json::Value {
        match self {
            ColumnType::Number => serde_json::json!(0),
            ColumnType::Boolean => serde_json::json!(false),
            _ => serde_json::json!(""),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Sticky {
    Left,
    Right,
}

/// Schema entry describing how one field is displayed/edited and where
/// its value lives in a record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub header: String,
    pub accessor_key: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub editable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky: Option<Sticky>,
}

impl Column {
    pub fn new(id: &str, header: &str, accessor_key: &str, column_type: ColumnType) -> Self {
        Self {
            id: id.to_string(),
            header: header.to_string(),
            accessor_key: accessor_key.to_string(),
            column_type,
            editable: false,
            sticky: None,
        }
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn sticky(mut self, sticky: Sticky) -> Self {
        self.sticky = Some(sticky);
        self
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == ADD_COLUMN_ID
    }
}

/// The fixed column set present at init: identity, sprite, name, types,
/// the six stat slots, and the trailing add-column sentinel.
pub fn default_columns() -> Vec<Column> {
    vec![
        Column::new("id", "ID", "id", ColumnType::Number).sticky(Sticky::Left),
        Column::new("sprite", "Sprite", "sprites.front_default", ColumnType::Image)
            .sticky(Sticky::Left),
        Column::new("name", "Name", "name", ColumnType::Text).editable(),
        Column::new("types", "Type(s)", "types", ColumnType::Types),
        Column::new("hp", "HP", "stats.0.base_stat", ColumnType::Number).editable(),
        Column::new("attack", "Attack", "stats.1.base_stat", ColumnType::Number).editable(),
        Column::new("defense", "Defense", "stats.2.base_stat", ColumnType::Number).editable(),
        Column::new("specialAttack", "Sp. Atk", "stats.3.base_stat", ColumnType::Number)
            .editable(),
        Column::new("specialDefense", "Sp. Def", "stats.4.base_stat", ColumnType::Number)
            .editable(),
        Column::new("speed", "Speed", "stats.5.base_stat", ColumnType::Number).editable(),
        Column::new(ADD_COLUMN_ID, "Add Column", ADD_COLUMN_ID, ColumnType::Text)
            .sticky(Sticky::Right),
    ]
}

// The persisted blob mirrors the original store's partialized state:
// columns only.
#[derive(Serialize, Deserialize)]
struct PersistedState {
    columns: Vec<Column>,
}

pub fn registry_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}.json", STORE_NAME))
}

pub fn save_columns(dir: &Path, columns: &[Column]) -> std::io::Result<()> {
    let state = PersistedState {
        columns: columns.to_vec(),
    };
    let content = serde_json::to_string_pretty(&state)?;
    fs::write(registry_path(dir), content)?;
    debug!("Saved {} columns to {}", columns.len(), dir.display());
    Ok(())
}

/// Load the persisted registry, falling back to the defaults when the
/// blob is missing or unreadable. A corrupt registry must not take the
/// application down.
pub fn load_columns(dir: &Path) -> Vec<Column> {
    let path = registry_path(dir);
    match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<PersistedState>(&content) {
            Ok(state) => state.columns,
            Err(e) => {
                warn!("Ignoring corrupt column registry {}: {}", path.display(), e);
                default_columns()
            }
        },
        Err(_) => default_columns(),
    }
}
