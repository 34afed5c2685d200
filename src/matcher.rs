//! Record matching between a primary and a reference row set.
//!
//! The reference rows are kept in an arena ([`ReferenceIndex`]) with one
//! inverted index per field: normalized value → arena positions, in insertion
//! order. Rows sharing a key are all kept as candidates.
//!
//! For each primary row, candidates are gathered from the key field and, when
//! the key is not the identifier, from the fallback keys. The candidate that
//! agrees on the most compared fields wins; earlier candidates win ties.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde::Serialize;

use crate::{
    field::{CompareRule, FIELD_COUNT, Field, FieldMap},
    layout::Row,
    normalize::{normalize_id, normalize_text, numeric_equal},
    profile::MatchSettings,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOptions {
    pub key_field: Field,
    pub case_sensitive: bool,
    /// Fields that count towards a verdict.
    pub compare_fields: Vec<Field>,
    /// Consulted in order after the key field, unless the key is the identifier.
    pub fallback_keys: Vec<Field>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self::from(&MatchSettings::default())
    }
}

impl From<&MatchSettings> for MatchOptions {
    fn from(settings: &MatchSettings) -> Self {
        Self {
            key_field: settings.key_field,
            case_sensitive: settings.case_sensitive,
            compare_fields: settings.compare_fields.clone(),
            fallback_keys: settings.fallback_keys.clone(),
        }
    }
}

impl MatchOptions {
    fn lookup_fields(&self) -> Vec<Field> {
        let mut fields = vec![self.key_field];
        if self.key_field != Field::Identifier {
            fields.extend(
                self.fallback_keys
                    .iter()
                    .copied()
                    .filter(|field| *field != self.key_field),
            );
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellOutcome {
    pub matched: bool,
    pub compared: bool,
}

impl CellOutcome {
    const SKIPPED: CellOutcome = CellOutcome {
        matched: true,
        compared: false,
    };
}

/// Compares one primary cell with one reference cell under `field`'s rule.
///
/// An empty primary value is never compared.
pub fn compare_cell(primary: &str, reference: &str, field: Field, case_sensitive: bool) -> CellOutcome {
    let primary = primary.trim();
    let reference = reference.trim();
    if primary.is_empty() {
        return CellOutcome::SKIPPED;
    }
    let matched = match field.compare_rule() {
        CompareRule::StrictText => normalize_text(primary) == normalize_text(reference),
        CompareRule::Identifier => normalize_id(primary) == normalize_id(reference),
        CompareRule::NumericOrText => match numeric_equal(primary, reference) {
            Some(equal) => equal,
            None if case_sensitive => primary == reference,
            None => primary.to_lowercase() == reference.to_lowercase(),
        },
    };
    CellOutcome {
        matched,
        compared: true,
    }
}

/// Lookup key for `value` in `field`'s index. Empty means "not indexable".
pub fn index_key(field: Field, value: &str, case_sensitive: bool) -> String {
    if field == Field::Identifier {
        return normalize_id(value);
    }
    let trimmed = value.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// Owns the reference rows and the per-field inverted indexes over them.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    rows: Vec<Row>,
    by_field: FieldMap<HashMap<String, Vec<usize>>>,
    case_sensitive: bool,
}

impl ReferenceIndex {
    pub fn build(rows: Vec<Row>, case_sensitive: bool) -> Self {
        let mut by_field: FieldMap<HashMap<String, Vec<usize>>> = FieldMap::default();
        for (position, row) in rows.iter().enumerate() {
            for (field, value) in row.iter() {
                let key = index_key(field, value, case_sensitive);
                if key.is_empty() {
                    continue;
                }
                by_field[field].entry(key).or_default().push(position);
            }
        }
        Self {
            rows,
            by_field,
            case_sensitive,
        }
    }

    /// Arena positions of reference rows whose `field` normalizes like `value`.
    pub fn lookup(&self, field: Field, value: &str) -> &[usize] {
        let key = index_key(field, value, self.case_sensitive);
        if key.is_empty() {
            return &[];
        }
        self.by_field[field]
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn row(&self, position: usize) -> Option<&Row> {
        self.rows.get(position)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchVerdict {
    /// 1-based position in the primary row set.
    pub row: usize,
    pub primary: Row,
    /// Chosen reference values, all empty when nothing was found.
    pub reference: Row,
    /// Arena position of the chosen reference row.
    pub reference_row: Option<usize>,
    pub matched: FieldMap<bool>,
    pub compared: FieldMap<bool>,
    pub all_match: bool,
    pub found: bool,
}

impl MatchVerdict {
    pub fn mismatched_fields(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL
            .into_iter()
            .filter(|field| self.compared[*field] && !self.matched[*field])
    }

    pub fn compared_count(&self) -> usize {
        self.compared.iter().filter(|(_, compared)| **compared).count()
    }
}

pub struct Matcher {
    index: ReferenceIndex,
    options: MatchOptions,
}

impl Matcher {
    pub fn new(reference: Vec<Row>, options: MatchOptions) -> Self {
        let index = ReferenceIndex::build(reference, options.case_sensitive);
        Self { index, options }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// Candidate arena positions for `primary`, deduplicated, first-seen order.
    pub fn candidates(&self, primary: &Row) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for field in self.options.lookup_fields() {
            for &position in self.index.lookup(field, &primary[field]) {
                if seen.insert(position) {
                    candidates.push(position);
                }
            }
        }
        candidates
    }

    fn compare_row(&self, primary: &Row, reference: &Row) -> (FieldMap<bool>, FieldMap<bool>) {
        let mut matched = FieldMap([true; FIELD_COUNT]);
        let mut compared = FieldMap::default();
        for &field in &self.options.compare_fields {
            let outcome = compare_cell(
                &primary[field],
                &reference[field],
                field,
                self.options.case_sensitive,
            );
            matched[field] = outcome.matched;
            compared[field] = outcome.compared;
        }
        (matched, compared)
    }

    /// `(matching fields, compared fields)` of `candidate` against `primary`.
    fn agreement(&self, primary: &Row, candidate: &Row) -> (usize, usize) {
        let (matched, compared) = self.compare_row(primary, candidate);
        Field::ALL
            .into_iter()
            .filter(|field| compared[*field])
            .fold((0, 0), |(hits, total), field| {
                (hits + usize::from(matched[field]), total + 1)
            })
    }

    fn best_candidate(&self, primary: &Row, candidates: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, (usize, usize))> = None;
        for &position in candidates {
            let Some(candidate) = self.index.row(position) else {
                continue;
            };
            let score = self.agreement(primary, candidate);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((position, score));
            }
        }
        best.map(|(position, _)| position)
    }

    /// Verdict for the primary row at 1-based position `row`.
    pub fn verdict(&self, row: usize, primary: &Row) -> MatchVerdict {
        let candidates = self.candidates(primary);
        let chosen = self.best_candidate(primary, &candidates);

        let Some(position) = chosen else {
            let mut compared = FieldMap::default();
            for &field in &self.options.compare_fields {
                compared[field] = !primary[field].trim().is_empty();
            }
            let matched = FieldMap::from_fn(|field| !compared[field]);
            return MatchVerdict {
                row,
                primary: primary.clone(),
                reference: Row::default(),
                reference_row: None,
                matched,
                compared,
                all_match: false,
                found: false,
            };
        };

        let reference = self.index.row(position).cloned().unwrap_or_default();
        let (matched, compared) = self.compare_row(primary, &reference);
        let any_compared = compared.iter().any(|(_, c)| *c);
        let all_match = any_compared
            && Field::ALL
                .into_iter()
                .filter(|field| compared[*field])
                .all(|field| matched[field]);
        MatchVerdict {
            row,
            primary: primary.clone(),
            reference,
            reference_row: Some(position),
            matched,
            compared,
            all_match,
            found: true,
        }
    }

    pub fn match_all(&self, primary: &[Row]) -> Vec<MatchVerdict> {
        let verdicts: Vec<MatchVerdict> = primary
            .iter()
            .enumerate()
            .map(|(idx, row)| self.verdict(idx + 1, row))
            .collect();
        debug!(
            "Matched {} primary row(s) against {} reference row(s); {} found",
            verdicts.len(),
            self.index.len(),
            verdicts.iter().filter(|v| v.found).count()
        );
        verdicts
    }
}

/// One-shot convenience over [`Matcher`].
pub fn match_rows(primary: &[Row], reference: &[Row], options: &MatchOptions) -> Vec<MatchVerdict> {
    Matcher::new(reference.to_vec(), options.clone()).match_all(primary)
}
