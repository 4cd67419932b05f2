use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Usage hint surfaced whenever an input line matches no template.
pub const USAGE_HINT: &str = "Try using patterns like:\n\
    - \"set hp to 100 for all pokemon of type 'grass'\"\n\
    - \"delete rows where generation is 1\"\n\
    - \"update ability to 'levitate' where name is 'gengar'\"";

#[derive(Error, Debug)]
pub enum CommandError {
    /// Input text matched no template. Not an internal fault, the caller
    /// shows the usage hint.
    #[error("I couldn't understand that command. {USAGE_HINT}")]
    ParseFailure,

    /// Unexpected fault during command application. The dataset is left
    /// untouched.
    #[error("Error executing command: {0}")]
    ExecutionFailure(String),
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Set,
    Update,
    Delete,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Set => write!(f, "set"),
            CommandKind::Update => write!(f, "update"),
            CommandKind::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Equals,
    Contains,
    Greater,
    Less,
}

/// Single predicate filtering which records a command affects.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOp,
    pub value: String,
}

/// Structured form of one accepted input line.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub field: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

struct Matcher {
    pattern: Regex,
    build: fn(&Captures) -> Command,
}

// Templates in fixed priority order; the first hit wins. Order is the
// tie-break, not specificity.
fn matchers() -> Vec<Matcher> {
    vec![
        // set <field> to <value> for all pokemon of type '<type>'
        Matcher {
            pattern: Regex::new(
                r"set\s+(\w+)\s+to\s+(.+?)\s+for\s+all\s+pokemon\s+of\s+type\s+'([^']+)'",
            )
            .unwrap(),
            build: |caps| Command {
                kind: CommandKind::Set,
                field: caps[1].to_string(),
                value: caps[2].trim().to_string(),
                condition: Some(Condition {
                    field: "types".to_string(),
                    operator: ConditionOp::Contains,
                    value: caps[3].to_string(),
                }),
            },
        },
        // delete rows where <field> is <value> — no condition is built;
        // the executor falls back to flat field equality.
        Matcher {
            pattern: Regex::new(r"delete\s+rows?\s+where\s+(\w+)\s+is\s+(.+)").unwrap(),
            build: |caps| Command {
                kind: CommandKind::Delete,
                field: caps[1].to_string(),
                value: caps[2].trim().to_string(),
                condition: None,
            },
        },
        // update <field> to '<value>' where <cond_field> is <cond_value>
        Matcher {
            pattern: Regex::new(r"update\s+(\w+)\s+to\s+'([^']+)'\s+where\s+(\w+)\s+is\s+(.+)")
                .unwrap(),
            build: |caps| Command {
                kind: CommandKind::Update,
                field: caps[1].to_string(),
                value: caps[2].to_string(),
                condition: Some(Condition {
                    field: caps[3].to_string(),
                    operator: ConditionOp::Equals,
                    value: caps[4].trim().to_string(),
                }),
            },
        },
        // set <field> to <value> for pokemon with <cond_field> greater|less|equals <cond_value>
        Matcher {
            pattern: Regex::new(
                r"set\s+(\w+)\s+to\s+(.+?)\s+for\s+pokemon\s+with\s+(\w+)\s+(greater|less|equals)\s+(.+)",
            )
            .unwrap(),
            build: |caps| Command {
                kind: CommandKind::Set,
                field: caps[1].to_string(),
                value: caps[2].trim().to_string(),
                condition: Some(Condition {
                    field: caps[3].to_string(),
                    operator: match &caps[4] {
                        "greater" => ConditionOp::Greater,
                        "less" => ConditionOp::Less,
                        _ => ConditionOp::Equals,
                    },
                    value: caps[5].trim().to_string(),
                }),
            },
        },
    ]
}

/// Map one free-text line to exactly one command. Matching is
/// case-insensitive: the input is trimmed and lowercased before the
/// templates are tried, so captured fields and values come out
/// lowercased as well.
pub fn parse_command(text: &str) -> Result<Command, CommandError> {
    let input = text.trim().to_lowercase();
    for matcher in matchers() {
        if let Some(caps) = matcher.pattern.captures(&input) {
            return Ok((matcher.build)(&caps));
        }
    }
    Err(CommandError::ParseFailure)
}
