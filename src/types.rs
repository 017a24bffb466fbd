use serde::{Deserialize, Serialize};

/// A single input row, already trimmed of surrounding whitespace by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub name: String,
    #[serde(default)]
    pub sku: String,
    pub qty: f64,
}

impl Row {
    pub fn new(name: impl Into<String>, sku: impl Into<String>, qty: f64) -> Self {
        Row {
            name: name.into(),
            sku: sku.into(),
            qty,
        }
    }
}

/// `Row` plus its normalized name and extracted numeric-unit atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub name: String,
    pub sku: String,
    pub qty: f64,
    pub name_norm: String,
    /// Sorted multiset of "number+unit" atoms, used as the fuzzy-tier guard.
    pub num_units: Vec<String>,
}

impl NormalizedRow {
    pub fn as_row(&self) -> Row {
        Row {
            name: self.name.clone(),
            sku: self.sku.clone(),
            qty: self.qty,
        }
    }
}

/// Toggles for the normalization and matching pipeline. Every stage
/// defaults on; the fuzzy-tier acceptance threshold defaults to 0.83.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub normalization: bool,
    pub token_sort: bool,
    pub strip_units: bool,
    pub unify: bool,
    pub lowercase: bool,
    pub enable_fuzzy: bool,
    pub strict_after_norm: bool,
    pub threshold: f64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            normalization: true,
            token_sort: true,
            strip_units: false,
            unify: true,
            lowercase: true,
            enable_fuzzy: true,
            strict_after_norm: false,
            threshold: 0.83,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<(), crate::error::ReconcileError> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(crate::error::ReconcileError::InvalidOptions {
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

/// How a source table's columns project onto `(name, sku, qty)`. This is the
/// external collaborator's contract — the core never resolves column names
/// itself, it only echoes the mapping it was told was used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub name_key: String,
    pub qty_key: String,
    pub sku_key: String,
    pub use_sku: bool,
    pub header_row: i64,
}

/// Which tier produced a `MatchRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Sku,
    Exact,
    Fuzzy,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Sku => "sku",
            Method::Exact => "exact",
            Method::Fuzzy => "fuzzy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub name: String,
    pub sku: String,
    pub qty_a: f64,
    pub qty_b: f64,
    pub delta: f64,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unmatched {
    pub name: String,
    pub sku: String,
    pub qty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub rows: Vec<MatchRecord>,
    pub only_a: Vec<Unmatched>,
    pub only_b: Vec<Unmatched>,
    pub opts: Options,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_a: Option<Mapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_b: Option<Mapping>,
}
