use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name/url pair used by the remote API for every cross-reference
/// (types, stats, abilities, species).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NamedResource {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl NamedResource {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TypeSlot {
    pub slot: i64,
    #[serde(rename = "type")]
    pub type_ref: NamedResource,
}

/// Stat slot index is the semantic key: 0=HP, 1=Attack, 2=Defense,
/// 3=Sp.Atk, 4=Sp.Def, 5=Speed.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StatSlot {
    pub base_stat: i64,
    pub effort: i64,
    pub stat: NamedResource,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AbilitySlot {
    pub ability: NamedResource,
    pub is_hidden: bool,
    pub slot: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Sprites {
    pub front_default: Option<String>,
    pub front_shiny: Option<String>,
    pub front_female: Option<String>,
    pub front_shiny_female: Option<String>,
    pub back_default: Option<String>,
    pub back_shiny: Option<String>,
    pub back_female: Option<String>,
    pub back_shiny_female: Option<String>,
}

/// One dataset row. The typed fields mirror the remote API record;
/// `extra` holds the open-ended fields added at runtime (new columns,
/// flat command writes) and shadows the typed fields on reads.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Record {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_experience: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
    #[serde(default)]
    pub stats: Vec<StatSlot>,
    #[serde(default)]
    pub abilities: Vec<AbilitySlot>,
    #[serde(default)]
    pub sprites: Sprites,
    #[serde(default)]
    pub species: NamedResource,
    #[serde(default)]
    pub generation: Option<i64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Record {
    /// Resolve a dotted path (`stats.0.base_stat`) by successive lookup.
    /// Returns `None` the moment any intermediate is missing.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let head = parts.next()?;
        let mut current = self.get_flat(head)?;
        for part in parts {
            current = match current {
                Value::Object(ref map) => map.get(part)?.clone(),
                Value::Array(ref items) => {
                    let idx: usize = part.parse().ok()?;
                    items.get(idx)?.clone()
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Single-key lookup with no path decomposition. Dynamic fields win
    /// over typed fields so that a flat command write is observed by
    /// every later read, like a plain object overwrite.
    pub fn get_flat(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.extra.get(key) {
            return Some(v.clone());
        }
        match key {
            "id" => Some(Value::from(self.id)),
            "name" => Some(Value::from(self.name.clone())),
            "base_experience" => self.base_experience.map(Value::from),
            "height" => self.height.map(Value::from),
            "weight" => self.weight.map(Value::from),
            "types" => serde_json::to_value(&self.types).ok(),
            "stats" => serde_json::to_value(&self.stats).ok(),
            "abilities" => serde_json::to_value(&self.abilities).ok(),
            "sprites" => serde_json::to_value(&self.sprites).ok(),
            "species" => serde_json::to_value(&self.species).ok(),
            "generation" => self.generation.map(Value::from),
            _ => None,
        }
    }

    /// Write a dotted path into a copy of the record. Known typed chains
    /// land in the typed fields; anything else becomes a nested chain in
    /// the dynamic map. The original record is left untouched.
    pub fn with_path_set(&self, path: &str, value: Value) -> Record {
        let mut updated = self.clone();
        let parts: Vec<&str> = path.split('.').collect();
        match parts.as_slice() {
            ["name"] => updated.name = value_to_string(&value),
            ["generation"] => updated.generation = value.as_i64(),
            ["base_experience"] => updated.base_experience = value.as_i64(),
            ["height"] => updated.height = value.as_i64(),
            ["weight"] => updated.weight = value.as_i64(),
            ["stats", idx, rest @ ..] if !rest.is_empty() => {
                if let Ok(idx) = idx.parse::<usize>() {
                    if updated.stats.len() <= idx {
                        updated.stats.resize(idx + 1, StatSlot::default());
                    }
                    let slot = &mut updated.stats[idx];
                    match rest {
                        ["base_stat"] => slot.base_stat = value.as_i64().unwrap_or(0),
                        ["effort"] => slot.effort = value.as_i64().unwrap_or(0),
                        ["stat", "name"] => slot.stat.name = value_to_string(&value),
                        _ => {}
                    }
                }
            }
            ["sprites", slot] => {
                let url = Some(value_to_string(&value));
                match *slot {
                    "front_default" => updated.sprites.front_default = url,
                    "front_shiny" => updated.sprites.front_shiny = url,
                    "front_female" => updated.sprites.front_female = url,
                    "front_shiny_female" => updated.sprites.front_shiny_female = url,
                    "back_default" => updated.sprites.back_default = url,
                    "back_shiny" => updated.sprites.back_shiny = url,
                    "back_female" => updated.sprites.back_female = url,
                    "back_shiny_female" => updated.sprites.back_shiny_female = url,
                    _ => {}
                }
            }
            ["species", "name"] => updated.species.name = value_to_string(&value),
            ["species", "url"] => updated.species.url = value_to_string(&value),
            [head, rest @ ..] if !rest.is_empty() => {
                // Dynamic nested write: rebuild the chain implied by
                // the path, innermost first.
                let mut nested = value;
                for key in rest.iter().rev() {
                    let mut map = serde_json::Map::new();
                    map.insert((*key).to_string(), nested);
                    nested = Value::Object(map);
                }
                updated.extra.insert((*head).to_string(), nested);
            }
            [head] => {
                updated.extra.insert((*head).to_string(), value);
            }
            _ => {}
        }
        updated
    }

    /// Literal single-key write used by the command executor and the
    /// column backfill. The key is never decomposed.
    pub fn set_flat(&mut self, field: &str, value: Value) {
        self.extra.insert(field.to_string(), value);
    }

    pub fn remove_flat(&mut self, field: &str) {
        self.extra.shift_remove(field);
    }

    /// Base stat looked up by stat name, 0 when absent.
    pub fn stat_value(&self, stat_name: &str) -> i64 {
        self.stats
            .iter()
            .find(|s| s.stat.name == stat_name)
            .map(|s| s.base_stat)
            .unwrap_or(0)
    }

    pub fn type_names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.type_ref.name.clone()).collect()
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Record {
        Record {
            id: 1,
            name: "bulbasaur".to_string(),
            types: vec![TypeSlot {
                slot: 1,
                type_ref: NamedResource::named("grass"),
            }],
            stats: vec![
                StatSlot {
                    base_stat: 45,
                    effort: 0,
                    stat: NamedResource::named("hp"),
                },
                StatSlot {
                    base_stat: 49,
                    effort: 0,
                    stat: NamedResource::named("attack"),
                },
            ],
            generation: Some(1),
            ..Record::default()
        }
    }

    #[test]
    fn test_get_path_flat() {
        let record = sample_record();
        assert_eq!(record.get_path("name"), Some(json!("bulbasaur")));
        assert_eq!(record.get_path("id"), Some(json!(1)));
        assert_eq!(record.get_path("generation"), Some(json!(1)));
    }

    #[test]
    fn test_get_path_nested() {
        let record = sample_record();
        assert_eq!(record.get_path("stats.0.base_stat"), Some(json!(45)));
        assert_eq!(record.get_path("stats.1.stat.name"), Some(json!("attack")));
        assert_eq!(record.get_path("types.0.type.name"), Some(json!("grass")));
    }

    #[test]
    fn test_get_path_missing_intermediate() {
        let record = sample_record();
        assert_eq!(record.get_path("stats.9.base_stat"), None);
        assert_eq!(record.get_path("nothing.here"), None);
        assert_eq!(record.get_path("name.0"), None);
    }

    #[test]
    fn test_dynamic_field_shadows_typed_field() {
        let mut record = sample_record();
        record.set_flat("generation", json!("2"));
        assert_eq!(record.get_path("generation"), Some(json!("2")));
    }

    #[test]
    fn test_with_path_set_updates_nested_stat() {
        let record = sample_record();
        let updated = record.with_path_set("stats.0.base_stat", json!(100));
        assert_eq!(updated.get_path("stats.0.base_stat"), Some(json!(100)));
        // sibling slots untouched, original untouched
        assert_eq!(updated.get_path("stats.1.base_stat"), Some(json!(49)));
        assert_eq!(record.get_path("stats.0.base_stat"), Some(json!(45)));
    }

    #[test]
    fn test_with_path_set_builds_dynamic_chain() {
        let record = sample_record();
        let updated = record.with_path_set("custom.deep.key", json!("x"));
        assert_eq!(updated.get_path("custom.deep.key"), Some(json!("x")));
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_remove_flat() {
        let mut record = sample_record();
        record.set_flat("legendary", json!(false));
        assert_eq!(record.get_path("legendary"), Some(json!(false)));
        record.remove_flat("legendary");
        assert_eq!(record.get_path("legendary"), None);
    }

    #[test]
    fn test_stat_helpers() {
        let record = sample_record();
        assert_eq!(record.stat_value("hp"), 45);
        assert_eq!(record.stat_value("speed"), 0);
        assert_eq!(record.type_names(), vec!["grass".to_string()]);
    }

    #[test]
    fn test_deserializes_api_shape() {
        let record: Record = serde_json::from_value(json!({
            "id": 25,
            "name": "pikachu",
            "base_experience": 112,
            "height": 4,
            "weight": 60,
            "types": [{"slot": 1, "type": {"name": "electric", "url": ""}}],
            "stats": [{"base_stat": 35, "effort": 0, "stat": {"name": "hp", "url": ""}}],
            "abilities": [],
            "sprites": {"front_default": "https://example/pikachu.png"},
            "species": {"name": "pikachu", "url": ""},
            "held_items": []
        }))
        .unwrap();
        assert_eq!(record.id, 25);
        assert_eq!(record.get_path("types.0.type.name"), Some(json!("electric")));
        // unknown keys land in the dynamic map
        assert!(record.extra.contains_key("held_items"));
    }
}
