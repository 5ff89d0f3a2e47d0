use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub points: i64,
    pub completed: bool,
    #[serde(default)]
    pub created_at: String,
}

/// One of the two ordered sequences a task can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Active,
    Completed,
}

impl Section {
    pub fn index(self) -> usize {
        match self {
            Self::Active => 0,
            Self::Completed => 1,
        }
    }

    pub fn from_index(index: i64) -> Result<Self, AppError> {
        match index {
            0 => Ok(Self::Active),
            1 => Ok(Self::Completed),
            other => Err(AppError::out_of_range(format!(
                "section {other} does not exist"
            ))),
        }
    }

    /// Accepts `active`/`completed` (any case) or the numeric section index.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "active" | "a" => Ok(Self::Active),
            "completed" | "done" | "c" => Ok(Self::Completed),
            other => {
                let index = other
                    .parse::<i64>()
                    .map_err(|_| AppError::invalid_argument(format!("unknown section '{trimmed}'")))?;
                Self::from_index(index)
            }
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Active => Self::Completed,
            Self::Completed => Self::Active,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A (section, row) address into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub section: Section,
    pub row: usize,
}

impl Location {
    pub fn new(section: Section, row: usize) -> Self {
        Self { section, row }
    }

    pub fn active(row: usize) -> Self {
        Self::new(Section::Active, row)
    }

    pub fn completed(row: usize) -> Self {
        Self::new(Section::Completed, row)
    }

    /// Builds a location from raw index-path values, rejecting negatives.
    pub fn from_index_path(section: i64, row: i64) -> Result<Self, AppError> {
        let section = Section::from_index(section)?;
        let row = usize::try_from(row)
            .map_err(|_| AppError::out_of_range(format!("row {row} is negative")))?;
        Ok(Self { section, row })
    }
}

pub fn points_label(points: i64) -> String {
    if points == 1 || points == -1 {
        format!("{points} point")
    } else {
        format!("{points} points")
    }
}

pub fn balance_label(balance: i64) -> String {
    format!("Points: {balance}")
}
