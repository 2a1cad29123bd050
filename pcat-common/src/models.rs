//! Catalog models
//!
//! Items, tags, relations and audit entries as exchanged with the store and
//! over the HTTP API.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Error;
use crate::text::fold;

/// Open key-value mapping with JSON-compatible values (`context`, `attributes`)
pub type JsonMap = Map<String, Value>;

/// Relation kind used when none is given
pub const DEFAULT_RELATION: &str = "contains";

/// Taxonomy rank an item occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "Equipamento")]
    Equipamento,
    #[serde(rename = "Conjunto")]
    Conjunto,
    #[serde(rename = "Parte")]
    Parte,
    #[serde(rename = "Peça")]
    Peca,
    #[serde(rename = "Kit")]
    Kit,
}

impl Level {
    /// All levels, in declaration order
    pub const ALL: [Level; 5] = [
        Level::Equipamento,
        Level::Conjunto,
        Level::Parte,
        Level::Peca,
        Level::Kit,
    ];

    /// Canonical name as stored and exported
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Equipamento => "Equipamento",
            Level::Conjunto => "Conjunto",
            Level::Parte => "Parte",
            Level::Peca => "Peça",
            Level::Kit => "Kit",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    /// Accepts canonical names regardless of case and accents ("peca", "PEÇA")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = fold(s.trim());
        Level::ALL
            .into_iter()
            .find(|level| fold(level.as_str()) == key)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "invalid level '{}' (expected one of Equipamento, Conjunto, Parte, Peça, Kit)",
                    s.trim()
                ))
            })
    }
}

/// A node of the catalog hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    pub level: Level,
    #[serde(default)]
    pub context: JsonMap,
    #[serde(default)]
    pub attributes: JsonMap,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Classification dimension of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// User vocabulary with no classification meaning
    Free,
    /// Tag that participates in level inference
    Structural,
    /// Cross-cutting filter that never changes the level
    Facet,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Free => "free",
            TagKind::Structural => "structural",
            TagKind::Facet => "facet",
        }
    }

    /// Parse a stored kind; unknown values read as free-form
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "structural" => TagKind::Structural,
            "facet" => TagKind::Facet,
            _ => TagKind::Free,
        }
    }
}

/// Shared tag vocabulary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTag {
    pub id: Uuid,
    pub name: String,
    pub kind: TagKind,
}

/// Parents and children of one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRelations {
    pub parents: Vec<CatalogItem>,
    pub children: Vec<CatalogItem>,
}

/// Outcome recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Error => "error",
        }
    }
}

/// Append-only audit trail entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_code: Option<String>,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
    pub status: AuditStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Item with a sale price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellableItem {
    pub item: CatalogItem,
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

/// Create-or-update input with a resolved level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub name: String,
    pub level: Level,
    #[serde(default)]
    pub context: JsonMap,
    #[serde(default)]
    pub attributes: JsonMap,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Item as supplied by a caller, before the level is settled
///
/// `level: None` asks for inference from name, tags and `is_kit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub is_kit: bool,
    #[serde(default)]
    pub context: JsonMap,
    #[serde(default)]
    pub attributes: JsonMap,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Successful store result with the message and warnings the store attached
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub data: T,
    pub message: String,
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            data: f(self.data),
            message: self.message,
            warnings: self.warnings,
        }
    }
}

/// Wire status of a [`CatalogResponse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// `{status, message, data, warnings}` envelope used by the RPC backend and
/// the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogResponse<T> {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> CatalogResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            data: Some(data),
            warnings: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            data: None,
            warnings: Vec::new(),
        }
    }

    /// Convert into an [`Outcome`], mapping an error status to `Error::Rejected`
    pub fn into_outcome(self) -> crate::Result<Outcome<Option<T>>> {
        match self.status {
            ResponseStatus::Success => Ok(Outcome {
                data: self.data,
                message: self.message,
                warnings: self.warnings,
            }),
            ResponseStatus::Error => Err(Error::Rejected(self.message)),
        }
    }
}

impl<T> From<Outcome<T>> for CatalogResponse<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: outcome.message,
            data: Some(outcome.data),
            warnings: outcome.warnings,
        }
    }
}
