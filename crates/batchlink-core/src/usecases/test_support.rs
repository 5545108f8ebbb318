//! In-memory collaborators shared by the use case tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{
    AssetLocation, AttachmentId, AttachmentLink, BaseRecord, IdentifierFormat, RecordId,
    ServiceError, SourceFile, TransferKind, UploadToken, WorkItem,
};
use crate::ports::{
    IAssetStore, ILocalFiles, IMatchQueryService, IRecordService, ITokenService, MatchQuery,
    MatchRow,
};

pub const BASE_TABLE: &str = "collectionobject";
pub const MATCH_FIELD: &str = "catalogNumber";
pub const ATTACHMENT_TABLE: &str = "attachment";

/// A backend holding base records keyed by their identifying value
pub struct FakeBackend {
    pub state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub records: HashMap<RecordId, (String, BaseRecord)>,
    pub next_attachment_id: i64,
    pub next_token: u32,
    pub queries: Vec<MatchQuery>,
    pub token_requests: Vec<Vec<String>>,
    /// Overrides the number of tokens returned
    pub token_count_override: Option<usize>,
    pub upload_failures: VecDeque<ServiceError>,
    pub fetch_failures: VecDeque<ServiceError>,
    pub save_failures: VecDeque<ServiceError>,
    pub uploads: Vec<String>,
    pub saves: usize,
    /// Appends an extra link with this location and ordinal on every save
    pub inject_on_save: Option<(u32, AssetLocation)>,
    pub missing_files: Vec<String>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_attachment_id: 100,
                ..FakeState::default()
            }),
        }
    }

    /// Adds a base record whose identifying field is `key`
    pub fn add_record(&self, id: i64, key: &str) {
        let record = BaseRecord::new(RecordId::new(id), 1, Vec::new());
        self.state
            .lock()
            .unwrap()
            .records
            .insert(RecordId::new(id), (key.to_string(), record));
    }

    pub fn record(&self, id: i64) -> BaseRecord {
        self.state.lock().unwrap().records[&RecordId::new(id)].1.clone()
    }

    pub fn fail_upload(&self, error: ServiceError) {
        self.state.lock().unwrap().upload_failures.push_back(error);
    }

    pub fn fail_save(&self, error: ServiceError) {
        self.state.lock().unwrap().save_failures.push_back(error);
    }

    pub fn fail_fetch(&self, error: ServiceError) {
        self.state.lock().unwrap().fetch_failures.push_back(error);
    }
}

#[async_trait]
impl IMatchQueryService for FakeBackend {
    async fn query(&self, query: &MatchQuery) -> Result<Vec<MatchRow>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.clone());

        let mut ids: Vec<&RecordId> = state.records.keys().collect();
        ids.sort();

        let mut rows = Vec::new();
        if query.table == BASE_TABLE {
            for id in ids {
                let (key, _) = &state.records[id];
                if query.values.contains(key) {
                    rows.push(MatchRow {
                        record_id: *id,
                        key_value: key.clone(),
                        display_values: query
                            .display_paths
                            .iter()
                            .map(|_| Some(format!("display-{id}")))
                            .collect(),
                    });
                }
            }
        } else if query.table == ATTACHMENT_TABLE {
            for id in ids {
                let (_, record) = &state.records[id];
                for link in record.attachments() {
                    let Some(link_id) = link.id else { continue };
                    let key = match query.field_path.as_str() {
                        "location" => link.location.to_string(),
                        _ => link_id.to_string(),
                    };
                    if query.values.contains(&key) {
                        rows.push(MatchRow {
                            record_id: RecordId::new(link_id.as_i64()),
                            key_value: key,
                            display_values: vec![Some(id.to_string())],
                        });
                    }
                }
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl ITokenService for FakeBackend {
    async fn reserve_tokens(&self, file_names: &[String]) -> Result<Vec<UploadToken>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.token_requests.push(file_names.to_vec());
        let count = state.token_count_override.unwrap_or(file_names.len());
        let mut tokens = Vec::with_capacity(count);
        for _ in 0..count {
            state.next_token += 1;
            let n = state.next_token;
            let location = AssetLocation::new(format!("asset-{n}.bin"))
                .map_err(|e| ServiceError::Protocol(e.to_string()))?;
            tokens.push(
                UploadToken::new(format!("tok-{n}"), location)
                    .map_err(|e| ServiceError::Protocol(e.to_string()))?,
            );
        }
        Ok(tokens)
    }
}

#[async_trait]
impl IAssetStore for FakeBackend {
    async fn upload(
        &self,
        _bytes: Vec<u8>,
        file_name: &str,
        token: &UploadToken,
    ) -> Result<AssetLocation, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.upload_failures.pop_front() {
            return Err(err);
        }
        state.uploads.push(file_name.to_string());
        Ok(token.location().clone())
    }
}

#[async_trait]
impl IRecordService for FakeBackend {
    async fn fetch(&self, _table: &str, id: RecordId) -> Result<BaseRecord, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fetch_failures.pop_front() {
            return Err(err);
        }
        state
            .records
            .get(&id)
            .map(|(_, record)| record.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("record {id}")))
    }

    async fn save(&self, _table: &str, record: &BaseRecord) -> Result<BaseRecord, ServiceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.save_failures.pop_front() {
            return Err(err);
        }
        let stored_version = state
            .records
            .get(&record.id())
            .map(|(_, r)| r.version())
            .ok_or_else(|| ServiceError::NotFound(format!("record {}", record.id())))?;
        if stored_version != record.version() {
            return Err(ServiceError::Conflict(format!("record {}", record.id())));
        }

        let mut links: Vec<AttachmentLink> = record.attachments().to_vec();
        if let Some((ordinal, location)) = state.inject_on_save.clone() {
            links.push(AttachmentLink {
                id: None,
                ordinal,
                location,
                file_name: "injected".to_string(),
            });
        }
        for link in &mut links {
            if link.id.is_none() {
                state.next_attachment_id += 1;
                link.id = Some(AttachmentId::new(state.next_attachment_id));
            }
        }

        let mut saved = BaseRecord::new(record.id(), record.version() + 1, links);
        for (key, value) in record.fields() {
            saved.set_field(key.clone(), value.clone());
        }
        state.saves += 1;
        if let Some(entry) = state.records.get_mut(&record.id()) {
            entry.1 = saved.clone();
        }
        Ok(saved)
    }
}

#[async_trait]
impl ILocalFiles for FakeBackend {
    async fn read(&self, file: &SourceFile) -> Result<Vec<u8>, ServiceError> {
        let state = self.state.lock().unwrap();
        let name = file.file_name().unwrap_or_default().to_string();
        if state.missing_files.contains(&name) {
            return Err(ServiceError::NotFound(name));
        }
        Ok(name.into_bytes())
    }
}

/// An item named `name` with a local file
pub fn file_item(name: &str) -> WorkItem {
    WorkItem::new(
        name,
        Some(SourceFile::new(format!("/data/{name}"), 16)),
        &IdentifierFormat::Text,
    )
}

/// An upload-eligible item already matched to `target`
pub fn matched_item(name: &str, target: i64) -> WorkItem {
    let mut item = file_item(name);
    item.set_match_candidates(vec![RecordId::new(target)]);
    item.refresh_status(TransferKind::Upload);
    item
}
