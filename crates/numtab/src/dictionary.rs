//! Per-column feature descriptors.
//!
//! Every table owns a [`DataDictionary`] with one [`FeatureDescriptor`] per
//! column. Descriptors are passive records: tables read them, and only a
//! table's own column setup (`set_feature`) changes them. Composite tables
//! hold their own copy and never share descriptors with the tables they
//! compose.

use serde::{Deserialize, Serialize};

use crate::dtype::NumericKind;
use crate::error::{check_index, Result};

/// Measurement level of a feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeatureType {
    #[default]
    Continuous,
    /// Ordered categories.
    Ordinal,
    /// Unordered categories.
    Categorical,
}

impl FeatureType {
    #[inline]
    pub fn is_categorical(&self) -> bool {
        matches!(self, FeatureType::Categorical)
    }
}

/// Data type tag of the feature in external (PMML-style) model formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PmmlType {
    #[default]
    Unknown,
    Float,
    Double,
    Integer,
    Boolean,
    String,
}

/// Metadata for a single column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    /// Storage kind of the column.
    pub kind: NumericKind,
    pub feature_type: FeatureType,
    /// Number of categories; 0 for continuous features.
    pub categories: usize,
    pub pmml_type: PmmlType,
}

impl FeatureDescriptor {
    /// Continuous feature of the given kind.
    pub fn continuous(kind: NumericKind) -> Self {
        Self {
            kind,
            feature_type: FeatureType::Continuous,
            categories: 0,
            pmml_type: default_pmml_type(kind),
        }
    }

    pub fn ordinal(kind: NumericKind, categories: usize) -> Self {
        Self {
            kind,
            feature_type: FeatureType::Ordinal,
            categories,
            pmml_type: default_pmml_type(kind),
        }
    }

    pub fn categorical(kind: NumericKind, categories: usize) -> Self {
        Self {
            kind,
            feature_type: FeatureType::Categorical,
            categories,
            pmml_type: default_pmml_type(kind),
        }
    }

    pub fn with_pmml_type(mut self, pmml_type: PmmlType) -> Self {
        self.pmml_type = pmml_type;
        self
    }

    /// Same descriptor with a different storage kind.
    pub fn with_kind(mut self, kind: NumericKind) -> Self {
        self.kind = kind;
        self
    }
}

fn default_pmml_type(kind: NumericKind) -> PmmlType {
    match kind {
        NumericKind::Float32 => PmmlType::Float,
        NumericKind::Float64 => PmmlType::Double,
        NumericKind::Int32 | NumericKind::Int64 => PmmlType::Integer,
    }
}

/// Ordered per-column descriptors of a table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDictionary {
    features: Vec<FeatureDescriptor>,
}

impl DataDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_features(features: Vec<FeatureDescriptor>) -> Self {
        Self { features }
    }

    /// `n_features` continuous features of one kind.
    pub fn uniform(kind: NumericKind, n_features: usize) -> Self {
        Self::from_features(vec![FeatureDescriptor::continuous(kind); n_features])
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FeatureDescriptor> {
        self.features.get(index)
    }

    /// Replace the descriptor of feature `index`.
    pub fn set(&mut self, index: usize, feature: FeatureDescriptor) -> Result<()> {
        check_index("feature", index, self.features.len())?;
        self.features[index] = feature;
        Ok(())
    }

    pub fn push(&mut self, feature: FeatureDescriptor) {
        self.features.push(feature);
    }

    /// Append every descriptor of `other`.
    pub fn extend_from(&mut self, other: &DataDictionary) {
        self.features.extend_from_slice(&other.features);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureDescriptor> {
        self.features.iter()
    }

    /// Storage kinds in column order.
    pub fn kinds(&self) -> impl Iterator<Item = NumericKind> + '_ {
        self.features.iter().map(|f| f.kind)
    }

    /// The shared kind when every feature uses the same one.
    pub fn common_kind(&self) -> Option<NumericKind> {
        let mut kinds = self.kinds();
        let first = kinds.next()?;
        kinds.all(|k| k == first).then_some(first)
    }

    pub fn has_categorical(&self) -> bool {
        self.features.iter().any(|f| f.feature_type.is_categorical())
    }

    /// True when no feature is categorical.
    pub fn all_numeric(&self) -> bool {
        !self.has_categorical()
    }
}
