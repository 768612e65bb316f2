use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const TITLE_LEN: RangeInclusive<usize> = 3..=100;
pub const DESCRIPTION_MAX_LEN: usize = 255;
pub const PRIORITY_NAME_LEN: RangeInclusive<usize> = 1..=20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_len(
    field: &'static str, value: &str, range: RangeInclusive<usize>,
) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if range.contains(&len) {
        Ok(())
    }
    else {
        Err(ValidationError::new(
            field,
            format!(
                "must be between {} and {} characters",
                range.start(),
                range.end()
            ),
        ))
    }
}

fn check_description(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(d) if d.chars().count() > DESCRIPTION_MAX_LEN => {
            Err(ValidationError::new(
                "description",
                format!("must be at most {DESCRIPTION_MAX_LEN} characters"),
            ))
        }
        _ => Ok(()),
    }
}

fn check_id(field: &'static str, id: Option<i64>) -> Result<(), ValidationError> {
    match id {
        Some(id) if id < 1 => {
            Err(ValidationError::new(field, "must be a positive id"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListCommand {
    pub title: String,
    pub description: Option<String>,
}

impl CreateListCommand {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_len("title", &self.title, TITLE_LEN)?;
        check_description(self.description.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateListCommand {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UpdateListCommand {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            check_len("title", title, TITLE_LEN)?;
        }
        check_description(self.description.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskCommand {
    pub list_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

impl CreateTaskCommand {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_id("list_id", Some(self.list_id))?;
        check_len("title", &self.title, TITLE_LEN)?;
        check_description(self.description.as_deref())?;
        check_id("priority_id", self.priority_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskCommand {
    pub list_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub is_completed: Option<bool>,
}

impl UpdateTaskCommand {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_id("list_id", self.list_id)?;
        if let Some(title) = &self.title {
            check_len("title", title, TITLE_LEN)?;
        }
        check_description(self.description.as_deref())?;
        check_id("priority_id", self.priority_id)
    }

    /// Only the completion flag changes.
    pub fn is_status_change(&self) -> bool {
        self.is_completed.is_some()
            && self.list_id.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.priority_id.is_none()
            && self.due_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePriorityCommand {
    pub name: String,
    pub level: i32,
}

impl CreatePriorityCommand {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_len("name", &self.name, PRIORITY_NAME_LEN)?;
        check_level(self.level)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePriorityCommand {
    pub name: Option<String>,
    pub level: Option<i32>,
}

impl UpdatePriorityCommand {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            check_len("name", name, PRIORITY_NAME_LEN)?;
        }
        match self.level {
            Some(level) => check_level(level),
            None => Ok(()),
        }
    }
}

fn check_level(level: i32) -> Result<(), ValidationError> {
    if level >= 1 {
        Ok(())
    }
    else {
        Err(ValidationError::new("level", "must be at least 1"))
    }
}
