//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for BatchSession documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SessionId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid SessionId: {e}")))
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Backend record identifiers
// ============================================================================

/// Identifier of a base database record (the record files are attached to)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Create a RecordId from an i64 value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid RecordId: {e}")))
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of an attachment sub-record linked to a base record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(i64);

impl AttachmentId {
    /// Create an AttachmentId from an i64 value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for AttachmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttachmentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid AttachmentId: {e}")))
    }
}

impl From<i64> for AttachmentId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Asset store types
// ============================================================================

/// Stable location of an uploaded asset inside the asset store
///
/// Used as the second half of the identity key when recovering the id of a
/// freshly created attachment sub-record, and as the lookup key when
/// reconciling an interrupted upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetLocation(String);

impl AssetLocation {
    /// Create a new AssetLocation
    ///
    /// # Errors
    /// Returns error if the location is empty or contains whitespace
    pub fn new(location: String) -> Result<Self, DomainError> {
        if location.is_empty() {
            return Err(DomainError::InvalidLocation(
                "Asset location cannot be empty".to_string(),
            ));
        }

        if location.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidLocation(format!(
                "Asset location contains whitespace: {location:?}"
            )));
        }

        Ok(Self(location))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AssetLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssetLocation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for AssetLocation {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<AssetLocation> for String {
    fn from(location: AssetLocation) -> Self {
        location.0
    }
}

/// Opaque asset-store upload credential
///
/// Reserved once per work item by the token service. Besides the opaque
/// token it names the asset location the upload will occupy, which the
/// token service allocates up front.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadToken {
    token: String,
    location: AssetLocation,
}

impl UploadToken {
    /// Create a new UploadToken
    ///
    /// # Errors
    /// Returns error if the token string is empty
    pub fn new(token: impl Into<String>, location: AssetLocation) -> Result<Self, DomainError> {
        let token = token.into();
        if token.is_empty() {
            return Err(DomainError::InvalidToken(
                "Upload token cannot be empty".to_string(),
            ));
        }
        Ok(Self { token, location })
    }

    /// Returns the opaque credential string
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the asset location allocated for this upload
    #[must_use]
    pub fn location(&self) -> &AssetLocation {
        &self.location
    }
}

// Credentials never end up in logs.
impl fmt::Debug for UploadToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadToken")
            .field("token", &"<redacted>")
            .field("location", &self.location)
            .finish()
    }
}
