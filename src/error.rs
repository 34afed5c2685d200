use thiserror::Error;

use crate::field::Field;

/// Which ledger an error or layout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Primary,
    Reference,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Primary => f.write_str("primary"),
            Side::Reference => f.write_str("reference"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReconError {
    #[error(
        "Could not find column headers for {} in the {side} ledger; pass explicit column hints",
        format_fields(.missing)
    )]
    UnresolvableLayout { side: Side, missing: Vec<Field> },

    #[error("Invalid {side} column hints: {reason}")]
    InvalidColumnHints { side: Side, reason: String },

    #[error("Column {column} is mapped to more than one field")]
    DuplicateColumn { column: usize },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Workbook {0} contains no sheets")]
    EmptyWorkbook(String),
}

fn format_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|field| field.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type ReconResult<T> = Result<T, ReconError>;
