use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{NewTodo, TodoUpdate};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// A form handed back to the client together with what was wrong with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormView<F> {
    pub form: F,
    pub errors: Vec<FieldError>,
}

impl<F> FormView<F> {
    pub fn new(form: F) -> Self {
        Self { form, errors: Vec::new() }
    }

    pub fn invalid(form: F, errors: Vec<FieldError>) -> Self {
        Self { form, errors }
    }
}

/// Fields bindable on create. The image travels next to the form as a file part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoCreateForm {
    pub description: Option<String>,
    pub created_date: Option<String>,
}

impl TodoCreateForm {
    pub fn validate(&self) -> Result<NewTodo, Vec<FieldError>> {
        let mut errors = Vec::new();
        let description = required_description(self.description.as_deref(), &mut errors);
        let created_date = created_date(self.created_date.as_deref(), &mut errors);
        match (description, created_date) {
            (Some(description), Some(created_date)) if errors.is_empty() => Ok(NewTodo {
                description,
                created_date,
            }),
            _ => Err(errors),
        }
    }
}

/// Fields bindable on edit. Anything else a client posts, an image reference
/// included, is dropped during deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoEditForm {
    pub id: Option<String>,
    pub description: Option<String>,
    pub created_date: Option<String>,
}

impl TodoEditForm {
    pub fn submitted_id(&self) -> Option<i64> {
        self.id.as_deref().and_then(parse_id)
    }

    pub fn validate(&self) -> Result<TodoUpdate, Vec<FieldError>> {
        let mut errors = Vec::new();
        let id = self.submitted_id();
        if id.is_none() {
            errors.push(FieldError::new("id", "The id field is required."));
        }
        let description = required_description(self.description.as_deref(), &mut errors);
        let created_date = created_date(self.created_date.as_deref(), &mut errors);
        match (id, description, created_date) {
            (Some(id), Some(description), Some(created_date)) if errors.is_empty() => {
                Ok(TodoUpdate {
                    id,
                    description,
                    created_date,
                })
            }
            _ => Err(errors),
        }
    }
}

impl From<&crate::core::Todo> for TodoEditForm {
    fn from(todo: &crate::core::Todo) -> Self {
        Self {
            id: Some(todo.id.to_string()),
            description: Some(todo.description.clone()),
            created_date: Some(todo.created_date.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn required_description(raw: Option<&str>, errors: &mut Vec<FieldError>) -> Option<String> {
    match raw.map(str::trim) {
        Some(description) if !description.is_empty() => Some(description.to_string()),
        _ => {
            errors.push(FieldError::new("description", "The description field is required."));
            None
        }
    }
}

fn created_date(raw: Option<&str>, errors: &mut Vec<FieldError>) -> Option<NaiveDateTime> {
    match raw.map(str::trim) {
        None | Some("") => Some(Utc::now().naive_utc()),
        Some(raw) => match parse_created_date(raw) {
            Some(date) => Some(date),
            None => {
                errors.push(FieldError::new(
                    "created_date",
                    format!("The value '{raw}' is not a valid date."),
                ));
                None
            }
        },
    }
}

/// Accepts a plain date (midnight) or a date-time as sent by date and
/// datetime-local inputs.
pub fn parse_created_date(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
