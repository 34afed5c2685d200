//! Column mappings, detection scores and the projection of grid rows onto the
//! seven logical fields.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    error::{ReconError, ReconResult, Side},
    field::{FIELD_COUNT, Field, FieldMap},
    grid::Grid,
};

/// A projected row: one trimmed cell per field, in canonical field order.
pub type Row = FieldMap<String>;

/// Field → column index. No column is ever assigned to two fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnMapping([usize; FIELD_COUNT]);

impl ColumnMapping {
    pub fn new(columns: [usize; FIELD_COUNT]) -> ReconResult<Self> {
        let mut seen = HashSet::with_capacity(FIELD_COUNT);
        for column in columns {
            if !seen.insert(column) {
                return Err(ReconError::DuplicateColumn { column });
            }
        }
        Ok(Self(columns))
    }

    /// For assignments that skip claimed columns by construction.
    pub(crate) fn from_assigned(columns: [usize; FIELD_COUNT]) -> Self {
        debug_assert!(Self::new(columns).is_ok(), "column assigned twice: {columns:?}");
        Self(columns)
    }

    /// Builds a mapping from user-supplied column hints.
    pub fn from_hints(side: Side, columns: &[usize]) -> ReconResult<Self> {
        let columns: [usize; FIELD_COUNT] =
            columns
                .try_into()
                .map_err(|_| ReconError::InvalidColumnHints {
                    side,
                    reason: format!(
                        "expected {FIELD_COUNT} column indexes, got {}",
                        columns.len()
                    ),
                })?;
        Self::new(columns).map_err(|err| ReconError::InvalidColumnHints {
            side,
            reason: err.to_string(),
        })
    }

    pub fn column(&self, field: Field) -> usize {
        self.0[field.index()]
    }

    pub fn columns(&self) -> &[usize; FIELD_COUNT] {
        &self.0
    }
}

/// Per-field detection confidence. Zero means the column came from the positional fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DetectionScores(FieldMap<u32>);

impl DetectionScores {
    pub fn new(scores: FieldMap<u32>) -> Self {
        Self(scores)
    }

    pub fn get(&self, field: Field) -> u32 {
        self.0[field]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, u32)> + '_ {
        self.0.iter().map(|(field, score)| (field, *score))
    }

    /// Required fields that were only placed by fallback.
    pub fn missing(&self, required: &[Field]) -> Vec<Field> {
        required
            .iter()
            .copied()
            .filter(|field| self.get(*field) == 0)
            .collect()
    }
}

/// A projected row together with the 1-based grid row it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub source_row: usize,
    pub values: Row,
}

/// Projects every grid row from `start_row` onwards through `mapping`, dropping rows with no values.
pub fn project(grid: &Grid, mapping: &ColumnMapping, start_row: usize) -> Vec<LedgerRow> {
    (start_row..grid.height())
        .filter_map(|row_idx| {
            let values = FieldMap::from_fn(|field| {
                grid.cell(row_idx, mapping.column(field)).trim().to_string()
            });
            if values.iter().all(|(_, value)| value.is_empty()) {
                return None;
            }
            Some(LedgerRow {
                source_row: row_idx + 1,
                values,
            })
        })
        .collect()
}

/// Keeps rows that describe an actual transaction: a customer, a real identifier and a join key.
pub fn is_transaction_row(row: &Row, key_field: Field) -> bool {
    let identifier = row[Field::Identifier].trim();
    !row[Field::Customer].trim().is_empty()
        && !identifier.is_empty()
        && identifier != "-"
        && !row[key_field].trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: [&str; FIELD_COUNT]) -> Row {
        FieldMap(values.map(String::from))
    }

    #[test]
    fn mapping_rejects_reused_columns() {
        assert!(ColumnMapping::new([0, 1, 2, 3, 4, 5, 6]).is_ok());
        assert_eq!(
            ColumnMapping::new([0, 1, 2, 3, 4, 5, 1]),
            Err(ReconError::DuplicateColumn { column: 1 })
        );
    }

    #[test]
    fn hints_must_name_seven_columns() {
        let err = ColumnMapping::from_hints(Side::Reference, &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            ReconError::InvalidColumnHints {
                side: Side::Reference,
                ..
            }
        ));
        let mapping = ColumnMapping::from_hints(Side::Primary, &[6, 5, 4, 3, 2, 1, 0]).unwrap();
        assert_eq!(mapping.column(Field::Customer), 6);
        assert_eq!(mapping.column(Field::CrossRefFlag), 0);
    }

    #[test]
    fn missing_lists_zero_scored_required_fields() {
        let mut scores = FieldMap::default();
        scores[Field::Identifier] = 19;
        scores[Field::Price] = 20;
        let scores = DetectionScores::new(scores);
        assert_eq!(
            scores.missing(&[Field::Identifier, Field::Price, Field::CrossRefFlag]),
            vec![Field::CrossRefFlag]
        );
    }

    #[test]
    fn projection_trims_pads_and_skips_blank_rows() {
        let grid = Grid::from_strs(&[
            &["header", "x"],
            &[" Ann ", "Bank", "M1", "VIN0000001A", "100", "F1", "Y"],
            &["", "", "", "", "", "", ""],
            &["Bob", "Bank"],
        ]);
        let mapping = ColumnMapping::new([0, 1, 2, 3, 4, 5, 6]).unwrap();
        let rows = project(&grid, &mapping, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source_row, 2);
        assert_eq!(rows[0].values[Field::Customer], "Ann");
        assert_eq!(rows[1].source_row, 4);
        assert_eq!(rows[1].values[Field::Price], "");
    }

    #[test]
    fn transaction_rows_need_customer_identifier_and_key() {
        let full = row(["Ann", "Bank", "M1", "VIN01", "1", "F", "Y"]);
        assert!(is_transaction_row(&full, Field::Identifier));
        let dash = row(["Ann", "Bank", "M1", "-", "1", "F", "Y"]);
        assert!(!is_transaction_row(&dash, Field::Identifier));
        let no_customer = row(["", "Bank", "M1", "VIN01", "1", "F", "Y"]);
        assert!(!is_transaction_row(&no_customer, Field::Identifier));
        let no_finance = row(["Ann", "", "M1", "VIN01", "1", "F", "Y"]);
        assert!(!is_transaction_row(&no_finance, Field::Finance));
    }
}
