use serde_json::Value;
use tracing::debug;

use crate::command::{Command, CommandError, CommandKind, Condition, ConditionOp};
use crate::record::Record;

/// Result of applying one command: the replacement dataset and how many
/// records were touched. The input dataset is never mutated.
#[derive(Clone, Debug)]
pub struct ExecutionOutcome {
    pub affected: usize,
    pub records: Vec<Record>,
}

impl ExecutionOutcome {
    pub fn report(&self, kind: CommandKind) -> String {
        format!(
            "Successfully {} operation. {} Pokemon affected.",
            kind, self.affected
        )
    }
}

/// Evaluate a single predicate against a record. No condition is a
/// vacuous match.
pub fn evaluate_condition(record: &Record, condition: Option<&Condition>) -> bool {
    let Some(condition) = condition else {
        return true;
    };
    let resolved = record.get_path(&condition.field);
    match condition.operator {
        // Exact equality, no type coercion: a numeric field compared to
        // a string literal does not match.
        ConditionOp::Equals => {
            resolved.is_some_and(|v| v == Value::String(condition.value.clone()))
        }
        ConditionOp::Contains => match resolved {
            Some(Value::Array(items)) => items.iter().any(|item| match item {
                Value::Object(map) => {
                    // Structured elements match on their name-like
                    // sub-field; types entries carry it one level down.
                    let name = map
                        .get("name")
                        .or_else(|| map.get("type").and_then(|t| t.get("name")));
                    name.and_then(Value::as_str) == Some(condition.value.as_str())
                }
                other => *other == Value::String(condition.value.clone()),
            }),
            Some(other) => value_as_string(&other).contains(&condition.value),
            None => false,
        },
        ConditionOp::Greater => compare_numeric(resolved, &condition.value, |a, b| a > b),
        ConditionOp::Less => compare_numeric(resolved, &condition.value, |a, b| a < b),
    }
}

// Numeric comparison after coercing both sides; any non-numeric side
// means no match, never an error.
fn compare_numeric(resolved: Option<Value>, value: &str, cmp: fn(f64, f64) -> bool) -> bool {
    match (resolved.as_ref().and_then(coerce_number), parse_number(value)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse().ok()
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply a command across the full dataset. Pure: takes the rows,
/// returns a new collection. Set/Update write the target field as a
/// literal flat key (a dotted field name is not decomposed here; that is
/// the cell editor's concern). Delete without a condition falls back to
/// strict flat-field equality.
pub fn execute(command: &Command, records: &[Record]) -> Result<ExecutionOutcome, CommandError> {
    debug!("Executing {:?}", command);
    let mut affected = 0;
    let new_records: Vec<Record> = match command.kind {
        CommandKind::Set => records
            .iter()
            .map(|record| {
                if evaluate_condition(record, command.condition.as_ref()) {
                    affected += 1;
                    overwritten(record, command)
                } else {
                    record.clone()
                }
            })
            .collect(),
        // Update only ever applies through its condition; without one it
        // touches nothing.
        CommandKind::Update => records
            .iter()
            .map(|record| {
                if command.condition.is_some()
                    && evaluate_condition(record, command.condition.as_ref())
                {
                    affected += 1;
                    overwritten(record, command)
                } else {
                    record.clone()
                }
            })
            .collect(),
        CommandKind::Delete => {
            let before = records.len();
            let retained: Vec<Record> = records
                .iter()
                .filter(|record| match &command.condition {
                    Some(condition) => !evaluate_condition(record, Some(condition)),
                    None => {
                        record.get_flat(&command.field)
                            != Some(Value::String(command.value.clone()))
                    }
                })
                .cloned()
                .collect();
            affected = before - retained.len();
            retained
        }
    };
    Ok(ExecutionOutcome {
        affected,
        records: new_records,
    })
}

fn overwritten(record: &Record, command: &Command) -> Record {
    let mut updated = record.clone();
    updated.set_flat(&command.field, Value::String(command.value.clone()));
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NamedResource, StatSlot, TypeSlot};
    use serde_json::json;

    fn record(id: i64, name: &str, type_name: &str, hp: i64) -> Record {
        Record {
            id,
            name: name.to_string(),
            types: vec![TypeSlot {
                slot: 1,
                type_ref: NamedResource::named(type_name),
            }],
            stats: vec![StatSlot {
                base_stat: hp,
                effort: 0,
                stat: NamedResource::named("hp"),
            }],
            generation: Some(1),
            ..Record::default()
        }
    }

    fn condition(field: &str, operator: ConditionOp, value: &str) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_no_condition_is_vacuous_match() {
        assert!(evaluate_condition(&record(1, "bulbasaur", "grass", 45), None));
    }

    #[test]
    fn test_equals_is_strict() {
        let r = record(1, "bulbasaur", "grass", 45);
        assert!(evaluate_condition(
            &r,
            Some(&condition("name", ConditionOp::Equals, "bulbasaur"))
        ));
        // numeric field never equals a string literal
        assert!(!evaluate_condition(
            &r,
            Some(&condition("generation", ConditionOp::Equals, "1"))
        ));
        assert!(!evaluate_condition(
            &r,
            Some(&condition("missing", ConditionOp::Equals, "x"))
        ));
    }

    #[test]
    fn test_contains_matches_type_entries() {
        let r = record(1, "bulbasaur", "grass", 45);
        assert!(evaluate_condition(
            &r,
            Some(&condition("types", ConditionOp::Contains, "grass"))
        ));
        assert!(!evaluate_condition(
            &r,
            Some(&condition("types", ConditionOp::Contains, "fire"))
        ));
    }

    #[test]
    fn test_contains_on_scalar_is_substring() {
        let r = record(1, "charizard", "fire", 78);
        assert!(evaluate_condition(
            &r,
            Some(&condition("name", ConditionOp::Contains, "char"))
        ));
        assert!(!evaluate_condition(
            &r,
            Some(&condition("name", ConditionOp::Contains, "saur"))
        ));
    }

    #[test]
    fn test_contains_matches_plain_string_elements() {
        let mut r = record(1, "mew", "psychic", 100);
        r.set_flat("tags", json!(["legendary", "pink"]));
        assert!(evaluate_condition(
            &r,
            Some(&condition("tags", ConditionOp::Contains, "pink"))
        ));
    }

    #[test]
    fn test_greater_less_with_numeric_coercion() {
        let r = record(1, "bulbasaur", "grass", 45);
        assert!(evaluate_condition(
            &r,
            Some(&condition("stats.0.base_stat", ConditionOp::Greater, "40"))
        ));
        assert!(evaluate_condition(
            &r,
            Some(&condition("stats.0.base_stat", ConditionOp::Less, "50"))
        ));
        assert!(!evaluate_condition(
            &r,
            Some(&condition("stats.0.base_stat", ConditionOp::Greater, "45"))
        ));
    }

    #[test]
    fn test_non_numeric_comparison_never_matches() {
        let r = record(1, "bulbasaur", "grass", 45);
        assert!(!evaluate_condition(
            &r,
            Some(&condition("name", ConditionOp::Greater, "10"))
        ));
        assert!(!evaluate_condition(
            &r,
            Some(&condition("stats.0.base_stat", ConditionOp::Greater, "lots"))
        ));
        assert!(!evaluate_condition(
            &r,
            Some(&condition("missing", ConditionOp::Less, "10"))
        ));
    }

    #[test]
    fn test_conditional_set_touches_only_matches() {
        let dataset = vec![
            record(1, "bulbasaur", "grass", 45),
            record(2, "charmander", "fire", 39),
        ];
        let command = Command {
            kind: CommandKind::Set,
            field: "hp".to_string(),
            value: "100".to_string(),
            condition: Some(condition("types", ConditionOp::Contains, "grass")),
        };
        let outcome = execute(&command, &dataset).unwrap();
        assert_eq!(outcome.affected, 1);
        assert_eq!(outcome.records[0].get_path("hp"), Some(json!("100")));
        // the fire record is untouched, clone for clone
        assert_eq!(outcome.records[1], dataset[1]);
    }

    #[test]
    fn test_unconditional_set_is_idempotent() {
        let dataset = vec![
            record(1, "bulbasaur", "grass", 45),
            record(2, "charmander", "fire", 39),
        ];
        let command = Command {
            kind: CommandKind::Set,
            field: "checked".to_string(),
            value: "yes".to_string(),
            condition: None,
        };
        let once = execute(&command, &dataset).unwrap();
        assert_eq!(once.affected, 2);
        let twice = execute(&command, &once.records).unwrap();
        assert_eq!(twice.records, once.records);
    }

    #[test]
    fn test_set_writes_dotted_field_as_flat_key() {
        let dataset = vec![record(1, "bulbasaur", "grass", 45)];
        let command = Command {
            kind: CommandKind::Set,
            field: "stats.0.base_stat".to_string(),
            value: "200".to_string(),
            condition: None,
        };
        let outcome = execute(&command, &dataset).unwrap();
        // nested stat untouched; the dotted name became a new flat key
        assert_eq!(outcome.records[0].stats[0].base_stat, 45);
        assert_eq!(
            outcome.records[0].extra.get("stats.0.base_stat"),
            Some(&json!("200"))
        );
    }

    #[test]
    fn test_update_without_condition_touches_nothing() {
        let dataset = vec![record(1, "bulbasaur", "grass", 45)];
        let command = Command {
            kind: CommandKind::Update,
            field: "name".to_string(),
            value: "x".to_string(),
            condition: None,
        };
        let outcome = execute(&command, &dataset).unwrap();
        assert_eq!(outcome.affected, 0);
        assert_eq!(outcome.records, dataset);
    }

    #[test]
    fn test_update_overwrites_matching_record() {
        let dataset = vec![
            record(1, "gengar", "ghost", 60),
            record(2, "onix", "rock", 35),
        ];
        let command = Command {
            kind: CommandKind::Update,
            field: "ability".to_string(),
            value: "levitate".to_string(),
            condition: Some(condition("name", ConditionOp::Equals, "gengar")),
        };
        let outcome = execute(&command, &dataset).unwrap();
        assert_eq!(outcome.affected, 1);
        assert_eq!(outcome.records[0].get_path("ability"), Some(json!("levitate")));
        assert_eq!(outcome.records[1].get_path("ability"), None);
    }

    #[test]
    fn test_delete_fallback_uses_strict_flat_equality() {
        // generation is numeric; the string "1" must not delete it
        let dataset = vec![
            record(1, "bulbasaur", "grass", 45),
            record(2, "charmander", "fire", 39),
        ];
        let command = Command {
            kind: CommandKind::Delete,
            field: "generation".to_string(),
            value: "1".to_string(),
            condition: None,
        };
        let outcome = execute(&command, &dataset).unwrap();
        assert_eq!(outcome.affected, 0);
        assert_eq!(outcome.records.len(), 2);

        // after a flat string write, the same command matches
        let mut shadowed = dataset.clone();
        shadowed[0].set_flat("generation", json!("1"));
        let outcome = execute(&command, &shadowed).unwrap();
        assert_eq!(outcome.affected, 1);
        assert_eq!(outcome.records[0].id, 2);
    }

    #[test]
    fn test_delete_with_condition_retains_non_matches() {
        let dataset = vec![
            record(1, "bulbasaur", "grass", 45),
            record(2, "charmander", "fire", 39),
            record(3, "squirtle", "water", 44),
        ];
        let command = Command {
            kind: CommandKind::Delete,
            field: String::new(),
            value: String::new(),
            condition: Some(condition("types", ConditionOp::Contains, "fire")),
        };
        let outcome = execute(&command, &dataset).unwrap();
        assert_eq!(outcome.affected, 1);
        let names: Vec<&str> = outcome.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["bulbasaur", "squirtle"]);
    }

    #[test]
    fn test_missing_field_is_a_no_op_not_an_error() {
        let dataset = vec![record(1, "bulbasaur", "grass", 45)];
        let command = Command {
            kind: CommandKind::Delete,
            field: "unknown_field".to_string(),
            value: "x".to_string(),
            condition: None,
        };
        let outcome = execute(&command, &dataset).unwrap();
        assert_eq!(outcome.affected, 0);
        assert_eq!(outcome.records, dataset);
    }

    #[test]
    fn test_report_format() {
        let outcome = ExecutionOutcome {
            affected: 3,
            records: vec![],
        };
        assert_eq!(
            outcome.report(CommandKind::Set),
            "Successfully set operation. 3 Pokemon affected."
        );
    }
}
