//! Reconciliation profile: field aliases, detection window, per-ledger
//! fallbacks and matching options.
//!
//! Profiles are YAML documents. Every section is optional; anything left out
//! falls back to the built-in defaults returned by [`Profile::default`].

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ReconError, ReconResult, Side},
    field::{FIELD_COUNT, Field},
    normalize::{DEFAULT_MIN_IDENTIFIER_LEN, normalize_text},
};

const PRIMARY_FALLBACK_COLUMNS: [usize; FIELD_COUNT] = [2, 3, 5, 6, 8, 14, 15];
const REFERENCE_FALLBACK_COLUMNS: [usize; FIELD_COUNT] = [1, 2, 4, 5, 7, 13, 14];
const PRIMARY_START_ROW: usize = 6;
const REFERENCE_START_ROW: usize = 0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    #[serde(default)]
    pub label: Option<String>,
    pub aliases: Vec<String>,
}

/// `field` loses `penalty` points on any column whose text also contains an alias of `by`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Suppression {
    pub field: Field,
    pub by: Field,
    pub penalty: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SheetMarker {
    pub text: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionSettings {
    pub sample_rows: usize,
    pub sample_columns: usize,
    pub blob_rows: usize,
    pub sheet_scan_rows: usize,
    pub default_start_row: usize,
    pub header_markers: Vec<String>,
    pub min_identifier_len: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            sample_rows: 40,
            sample_columns: 60,
            blob_rows: 12,
            sheet_scan_rows: 10,
            default_start_row: 6,
            header_markers: ["customer", "no.", "order", "seq"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_identifier_len: DEFAULT_MIN_IDENTIFIER_LEN,
        }
    }
}

/// Per-ledger overrides. Unset values resolve to the ledger's built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SideSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_columns: Option<[usize; FIELD_COUNT]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_fields: Option<Vec<Field>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSide {
    pub fallback_columns: [usize; FIELD_COUNT],
    pub start_row: usize,
    pub required_fields: Vec<Field>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MatchSettings {
    pub key_field: Field,
    pub compare_fields: Vec<Field>,
    pub fallback_keys: Vec<Field>,
    pub case_sensitive: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            key_field: Field::Identifier,
            compare_fields: vec![
                Field::Identifier,
                Field::Price,
                Field::CrossRefCode,
                Field::CrossRefFlag,
            ],
            fallback_keys: vec![Field::Identifier, Field::Customer, Field::Finance],
            case_sensitive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub fields: BTreeMap<Field, FieldSpec>,
    pub priority: Vec<Field>,
    pub suppressions: Vec<Suppression>,
    pub sheet_markers: Vec<SheetMarker>,
    pub detection: DetectionSettings,
    pub primary: SideSettings,
    pub reference: SideSettings,
    pub matching: MatchSettings,
}

impl Default for Profile {
    fn default() -> Self {
        let fields = Field::ALL
            .into_iter()
            .map(|field| (field, builtin_field_spec(field)))
            .collect();
        let marker = |text: &str, weight| SheetMarker {
            text: text.to_string(),
            weight,
        };
        Self {
            fields,
            priority: Field::ALL.to_vec(),
            suppressions: vec![Suppression {
                field: Field::CrossRefFlag,
                by: Field::CrossRefCode,
                penalty: 8,
            }],
            sheet_markers: vec![
                marker("model code", 5),
                marker("moder code", 5),
                marker("com f/n", 5),
                marker("vin", 3),
                marker("chassis", 3),
            ],
            detection: DetectionSettings::default(),
            primary: SideSettings::default(),
            reference: SideSettings::default(),
            matching: MatchSettings::default(),
        }
    }
}

fn builtin_field_spec(field: Field) -> FieldSpec {
    let aliases: &[&str] = match field {
        Field::Customer => &["customer name", "customer", "client", "name"],
        Field::Finance => &["finance company", "financier", "finance", "lender"],
        Field::Model => &["model code", "moder code", "model", "variant"],
        Field::Identifier => &["chassis no", "vin no", "chassis", "vin"],
        Field::Price => &["selling price", "sale price", "sales price"],
        Field::CrossRefCode => &["com f/n", "com fn", "comf/n"],
        Field::CrossRefFlag => &["commission", "com"],
    };
    FieldSpec {
        label: None,
        aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
    }
}

impl Profile {
    /// Reads a YAML profile, fills in omitted fields and validates the result.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Opening profile {path:?}"))?;
        Self::from_yaml(&raw).with_context(|| format!("Parsing profile {path:?}"))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut profile: Profile = serde_yaml::from_str(raw)?;
        profile.fill_missing_fields();
        profile.normalize_aliases();
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn fill_missing_fields(&mut self) {
        for field in Field::ALL {
            self.fields
                .entry(field)
                .or_insert_with(|| builtin_field_spec(field));
        }
    }

    fn normalize_aliases(&mut self) {
        for spec in self.fields.values_mut() {
            spec.aliases = spec
                .aliases
                .iter()
                .map(|alias| normalize_text(alias))
                .filter(|alias| !alias.is_empty())
                .collect();
        }
        for marker in &mut self.sheet_markers {
            marker.text = normalize_text(&marker.text);
        }
        for header in &mut self.detection.header_markers {
            *header = normalize_text(header);
        }
    }

    pub fn validate(&self) -> ReconResult<()> {
        for field in Field::ALL {
            match self.fields.get(&field) {
                Some(spec) if spec.aliases.iter().any(|a| !a.trim().is_empty()) => {}
                _ => {
                    return Err(ReconError::InvalidProfile(format!(
                        "field '{field}' needs at least one alias"
                    )));
                }
            }
        }

        let unique: HashSet<Field> = self.priority.iter().copied().collect();
        if self.priority.len() != FIELD_COUNT || unique.len() != FIELD_COUNT {
            return Err(ReconError::InvalidProfile(
                "priority must list each of the seven fields exactly once".to_string(),
            ));
        }

        for suppression in &self.suppressions {
            if suppression.field == suppression.by {
                return Err(ReconError::InvalidProfile(format!(
                    "field '{}' cannot suppress itself",
                    suppression.field
                )));
            }
        }

        for (side, settings) in [(Side::Primary, &self.primary), (Side::Reference, &self.reference)] {
            if let Some(columns) = &settings.fallback_columns {
                let distinct: HashSet<usize> = columns.iter().copied().collect();
                if distinct.len() != FIELD_COUNT {
                    return Err(ReconError::InvalidProfile(format!(
                        "{side} fallback columns must be distinct"
                    )));
                }
            }
        }

        if self.matching.compare_fields.is_empty() {
            return Err(ReconError::InvalidProfile(
                "matching.compare_fields cannot be empty".to_string(),
            ));
        }
        if self.detection.sample_rows == 0 || self.detection.sample_columns == 0 {
            return Err(ReconError::InvalidProfile(
                "detection window must be at least one row and one column".to_string(),
            ));
        }
        Ok(())
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.fields
            .get(&field)
            .map(|spec| spec.aliases.as_slice())
            .unwrap_or(&[])
    }

    pub fn label(&self, field: Field) -> &str {
        self.fields
            .get(&field)
            .and_then(|spec| spec.label.as_deref())
            .unwrap_or_else(|| field.default_label())
    }

    pub fn labels(&self) -> Vec<String> {
        Field::ALL
            .into_iter()
            .map(|field| self.label(field).to_string())
            .collect()
    }

    pub fn side(&self, side: Side) -> ResolvedSide {
        let (settings, fallback_columns, start_row, required_fields) = match side {
            Side::Primary => (
                &self.primary,
                PRIMARY_FALLBACK_COLUMNS,
                PRIMARY_START_ROW,
                Vec::new(),
            ),
            Side::Reference => (
                &self.reference,
                REFERENCE_FALLBACK_COLUMNS,
                REFERENCE_START_ROW,
                vec![
                    Field::Identifier,
                    Field::Price,
                    Field::CrossRefCode,
                    Field::CrossRefFlag,
                ],
            ),
        };
        ResolvedSide {
            fallback_columns: settings.fallback_columns.unwrap_or(fallback_columns),
            start_row: settings.start_row.unwrap_or(start_row),
            required_fields: settings
                .required_fields
                .clone()
                .unwrap_or(required_fields),
        }
    }
}
