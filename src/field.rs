//! The seven logical fields every ledger row is projected onto.
//!
//! Fields have a fixed canonical order; projected rows, column mappings and
//! per-field flags are all laid out in that order, which is what lets
//! [`FieldMap`] index by [`Field::index`].

use std::{
    fmt,
    ops::{Index, IndexMut},
    str::FromStr,
};

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::error::ReconError;

pub const FIELD_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Customer,
    Finance,
    Model,
    Identifier,
    Price,
    CrossRefCode,
    CrossRefFlag,
}

/// How two values of a field are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareRule {
    /// Punctuation-insensitive, upper-cased equality.
    Identifier,
    /// Whitespace-collapsed, lower-cased equality.
    StrictText,
    /// Numeric tolerance when both sides parse, text equality otherwise.
    NumericOrText,
}

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Customer,
        Field::Finance,
        Field::Model,
        Field::Identifier,
        Field::Price,
        Field::CrossRefCode,
        Field::CrossRefFlag,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Field> {
        Field::ALL.get(index).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Field::Customer => "customer",
            Field::Finance => "finance",
            Field::Model => "model",
            Field::Identifier => "identifier",
            Field::Price => "price",
            Field::CrossRefCode => "cross_ref_code",
            Field::CrossRefFlag => "cross_ref_flag",
        }
    }

    pub const fn default_label(self) -> &'static str {
        match self {
            Field::Customer => "Customer",
            Field::Finance => "Finance",
            Field::Model => "Model Code",
            Field::Identifier => "Identifier",
            Field::Price => "Sale Price",
            Field::CrossRefCode => "Cross-Ref Code",
            Field::CrossRefFlag => "Cross-Ref Flag",
        }
    }

    pub const fn compare_rule(self) -> CompareRule {
        match self {
            Field::Identifier => CompareRule::Identifier,
            Field::Model => CompareRule::StrictText,
            _ => CompareRule::NumericOrText,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = ReconError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        if let Ok(index) = wanted.parse::<usize>() {
            return Field::from_index(index).ok_or_else(|| ReconError::UnknownField(value.into()));
        }
        Field::ALL
            .into_iter()
            .find(|field| field.name() == wanted)
            .ok_or_else(|| ReconError::UnknownField(value.to_string()))
    }
}

/// Parses a comma-separated list of field names or indexes.
pub fn parse_field_list(value: &str) -> Result<Vec<Field>, ReconError> {
    let mut fields = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let field = part.parse::<Field>()?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    Ok(fields)
}

/// One value per field, stored in canonical field order. Serializes as a map keyed by field name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMap<T>(pub [T; FIELD_COUNT]);

impl<T> FieldMap<T> {
    pub fn from_fn(mut f: impl FnMut(Field) -> T) -> Self {
        FieldMap(std::array::from_fn(|idx| f(Field::ALL[idx])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &T)> {
        Field::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> &[T; FIELD_COUNT] {
        &self.0
    }
}

impl<T: Serialize> Serialize for FieldMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FIELD_COUNT))?;
        for (field, value) in self.iter() {
            map.serialize_entry(&field, value)?;
        }
        map.end()
    }
}

impl<T> Index<Field> for FieldMap<T> {
    type Output = T;

    fn index(&self, field: Field) -> &T {
        &self.0[field.index()]
    }
}

impl<T> IndexMut<Field> for FieldMap<T> {
    fn index_mut(&mut self, field: Field) -> &mut T {
        &mut self.0[field.index()]
    }
}
