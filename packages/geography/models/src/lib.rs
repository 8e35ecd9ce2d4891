#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region polygon fragments and region code mapping types.
//!
//! Geometry sources identify regions by a numeric id; the case feed uses
//! short region codes. [`CodeMapping`] bridges the two. Polygons travel
//! through the pipeline inside [`GeoRecord`], whose geometry cannot be
//! dropped by attribute transforms.

use std::collections::{BTreeMap, BTreeSet};

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// A polygon geometry with typed attributes.
///
/// Attribute transforms ([`GeoRecord::map`], [`GeoRecord::try_map`]) always
/// carry the geometry over unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRecord<A> {
    /// Polygon payload. A single-polygon source geometry is stored as a
    /// one-element multipolygon.
    pub geometry: MultiPolygon<f64>,
    /// Attribute columns.
    pub attributes: A,
}

impl<A> GeoRecord<A> {
    /// Creates a record from a geometry and its attributes.
    #[must_use]
    pub const fn new(geometry: MultiPolygon<f64>, attributes: A) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    /// Replaces the attributes, keeping the geometry.
    #[must_use]
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> GeoRecord<B> {
        GeoRecord {
            geometry: self.geometry,
            attributes: f(self.attributes),
        }
    }

    /// Replaces the attributes with a fallible transform, keeping the
    /// geometry.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns.
    pub fn try_map<B, E>(self, f: impl FnOnce(A) -> Result<B, E>) -> Result<GeoRecord<B>, E> {
        Ok(GeoRecord {
            geometry: self.geometry,
            attributes: f(self.attributes)?,
        })
    }
}

/// Attributes of a freshly loaded polygon fragment.
///
/// A region split into enclaves has several fragments with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionFragment {
    /// Numeric region identifier used by the geometry source.
    pub region_id: i64,
}

/// A fragment after the code-mapping join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodedFragment {
    /// Numeric region identifier.
    pub region_id: i64,
    /// Short region code, `None` when the id has no mapping.
    pub region_code: Option<String>,
}

/// A fragment after the incidence join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionIncidence {
    /// Numeric region identifier.
    pub region_id: i64,
    /// Short region code, `None` when the id has no mapping.
    pub region_code: Option<String>,
    /// Confirmed cases per 100,000 residents, `None` when the region has no
    /// case data or its incidence is undefined.
    pub incidence: Option<f64>,
}

/// One row of the code-mapping reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMappingEntry {
    /// Short region code (e.g. `"ZH"`).
    pub code: String,
    /// Numeric region identifier (e.g. `1`).
    pub code_num: i64,
}

/// Which side of a [`CodeMapping`] was repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateMappingError {
    /// The same numeric id maps to two codes.
    Id {
        /// The repeated numeric id.
        code_num: i64,
    },
    /// The same code maps to two numeric ids.
    Code {
        /// The repeated code.
        code: String,
    },
}

impl std::fmt::Display for DuplicateMappingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id { code_num } => write!(f, "code_num {code_num} is mapped more than once"),
            Self::Code { code } => write!(f, "code '{code}' is mapped more than once"),
        }
    }
}

impl std::error::Error for DuplicateMappingError {}

/// One-to-one mapping between numeric region ids and region codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeMapping {
    by_id: BTreeMap<i64, String>,
    codes: BTreeSet<String>,
}

impl CodeMapping {
    /// Builds a mapping, rejecting any id or code that appears twice.
    ///
    /// An exact repeat of the same pair is rejected as well, since the
    /// reference file is expected to list each region once.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateMappingError`] for the first repeated id or code.
    pub fn from_entries(
        entries: impl IntoIterator<Item = CodeMappingEntry>,
    ) -> Result<Self, DuplicateMappingError> {
        let mut mapping = Self::default();
        for CodeMappingEntry { code, code_num } in entries {
            if mapping.by_id.contains_key(&code_num) {
                return Err(DuplicateMappingError::Id { code_num });
            }
            if !mapping.codes.insert(code.clone()) {
                return Err(DuplicateMappingError::Code { code });
            }
            mapping.by_id.insert(code_num, code);
        }
        Ok(mapping)
    }

    /// Region code for a numeric id.
    #[must_use]
    pub fn code(&self, code_num: i64) -> Option<&str> {
        self.by_id.get(&code_num).map(String::as_str)
    }

    /// Number of mapped regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
