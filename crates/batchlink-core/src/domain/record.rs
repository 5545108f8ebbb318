//! Base records and their attachment links
//!
//! The engine sees a base record only through the parts it touches: the
//! optimistic-concurrency version and the ordered attachment collection.
//! Every other field is carried through fetch and save untouched.

use serde::{Deserialize, Serialize};

use super::newtypes::{AssetLocation, AttachmentId, RecordId};

/// One attachment sub-record of a base record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentLink {
    /// Assigned by the backend on save; `None` for a pending link
    pub id: Option<AttachmentId>,
    /// Position within the record's attachment collection
    pub ordinal: u32,
    /// Asset store location of the file
    pub location: AssetLocation,
    /// Original file name
    pub file_name: String,
}

/// A base database record as seen by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseRecord {
    id: RecordId,
    version: i64,
    #[serde(default)]
    attachments: Vec<AttachmentLink>,
    /// All other fields, preserved verbatim
    #[serde(flatten)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl BaseRecord {
    /// Creates a record with no other fields
    pub fn new(id: RecordId, version: i64, attachments: Vec<AttachmentLink>) -> Self {
        Self {
            id,
            version,
            attachments,
            fields: serde_json::Map::new(),
        }
    }

    /// Returns the record id
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the optimistic-concurrency version
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the attachment links in order
    pub fn attachments(&self) -> &[AttachmentLink] {
        &self.attachments
    }

    /// Returns the other fields
    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.fields
    }

    /// Sets one of the other fields
    pub fn set_field(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.fields.insert(key.into(), value);
    }

    /// Appends a pending link at the end of the collection
    ///
    /// Returns the ordinal assigned to the new link, which is the number of
    /// attachments present before the append.
    pub fn append_attachment(&mut self, location: AssetLocation, file_name: impl Into<String>) -> u32 {
        let ordinal = u32::try_from(self.attachments.len()).unwrap_or(u32::MAX);
        self.attachments.push(AttachmentLink {
            id: None,
            ordinal,
            location,
            file_name: file_name.into(),
        });
        ordinal
    }

    /// Returns the link with the given id
    pub fn find_attachment(&self, id: AttachmentId) -> Option<&AttachmentLink> {
        self.attachments.iter().find(|link| link.id == Some(id))
    }

    /// Removes the link with the given id
    ///
    /// Returns false if no such link exists.
    pub fn remove_attachment(&mut self, id: AttachmentId) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|link| link.id != Some(id));
        self.attachments.len() != before
    }

    /// Returns the links stored at `location`
    pub fn attachments_at(&self, location: &AssetLocation) -> Vec<&AttachmentLink> {
        self.attachments
            .iter()
            .filter(|link| &link.location == location)
            .collect()
    }
}
