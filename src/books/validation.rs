//! Declarative field validation for incoming books.
//!
//! Each field carries a [`FieldRule`]: whether it is trimmed first and the
//! ordered list of [`Rule`]s it must satisfy. Every rule of every field is
//! checked, so a single request reports all of its problems at once.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::books::model::NewBook;

/// Fields as they arrived in the request body, before any checks.
pub type RawFields = Map<String, Value>;

/// A constraint on a single field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Value must contain at least one character.
    NotEmpty,
    /// Character count must fall within `min..=max`.
    Length { min: usize, max: usize },
}

impl Rule {
    fn check(&self, value: &str) -> bool {
        match *self {
            Rule::NotEmpty => !value.is_empty(),
            Rule::Length { min, max } => {
                let len = value.chars().count();
                len >= min && len <= max
            }
        }
    }

    fn message(&self, field: &str) -> String {
        match *self {
            Rule::NotEmpty => format!("{field} must not be empty"),
            Rule::Length { min, max } => {
                format!("{field} must be between {min} and {max} characters")
            }
        }
    }
}

/// The rule set for one named field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub trim: bool,
    pub rules: &'static [Rule],
}

const BOOK_FIELD_RULES: &[Rule] = &[Rule::NotEmpty, Rule::Length { min: 5, max: 255 }];

/// Rules applied to `POST /books`.
pub const BOOK_RULES: &[FieldRule] = &[
    FieldRule {
        field: "author",
        trim: true,
        rules: BOOK_FIELD_RULES,
    },
    FieldRule {
        field: "title",
        trim: true,
        rules: BOOK_FIELD_RULES,
    },
];

/// One failed rule, in the shape returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub msg: String,
    pub path: String,
    pub location: String,
}

impl FieldError {
    fn new(field: &str, value: &str, msg: String) -> Self {
        Self {
            kind: "field".to_string(),
            value: value.to_string(),
            msg,
            path: field.to_string(),
            location: "body".to_string(),
        }
    }
}

/// Missing and `null` fields read as empty; scalars are stringified.
fn field_text(fields: &RawFields, name: &str) -> String {
    match fields.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Apply `rules` to `fields`, returning the sanitized values keyed by field
/// name, or every failure in rule declaration order.
pub fn apply_rules(
    rules: &[FieldRule],
    fields: &RawFields,
) -> Result<Vec<(&'static str, String)>, Vec<FieldError>> {
    let mut values = Vec::with_capacity(rules.len());
    let mut errors = Vec::new();

    for rule in rules {
        let raw = field_text(fields, rule.field);
        let value = if rule.trim { raw.trim().to_string() } else { raw.clone() };

        for check in rule.rules {
            if !check.check(&value) {
                errors.push(FieldError::new(rule.field, &raw, check.message(rule.field)));
            }
        }
        values.push((rule.field, value));
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

/// Validate a request body against [`BOOK_RULES`].
pub fn validate_book(fields: &RawFields) -> Result<NewBook, Vec<FieldError>> {
    let values = apply_rules(BOOK_RULES, fields)?;

    let mut author = String::new();
    let mut title = String::new();
    for (field, value) in values {
        match field {
            "author" => author = value,
            "title" => title = value,
            _ => {}
        }
    }

    Ok(NewBook { author, title })
}
