use serde::{Deserialize, Serialize};

use crate::repository::{Snapshot, StorageError};

pub const SCHEMA_TAG: &str = "quiz-snapshot";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema: &'static str,
    version: u32,
    #[serde(flatten)]
    snapshot: &'a Snapshot,
}

#[derive(Deserialize)]
struct Header {
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    version: Option<u32>,
}

/// Encode a snapshot as a pretty-printed, tagged JSON document.
///
/// # Errors
///
/// Returns `StorageError::DataCorruption` if the snapshot cannot be serialized.
pub fn encode(snapshot: &Snapshot) -> Result<String, StorageError> {
    let envelope = EnvelopeRef {
        schema: SCHEMA_TAG,
        version: SCHEMA_VERSION,
        snapshot,
    };
    serde_json::to_string_pretty(&envelope)
        .map_err(|e| StorageError::DataCorruption(e.to_string()))
}

/// Decode a tagged snapshot document.
///
/// # Errors
///
/// Returns `StorageError::DataCorruption` for malformed JSON, a missing or
/// foreign schema tag, or an unsupported version.
pub fn decode(text: &str) -> Result<Snapshot, StorageError> {
    let header: Header =
        serde_json::from_str(text).map_err(|e| StorageError::DataCorruption(e.to_string()))?;
    match header.schema.as_deref() {
        Some(SCHEMA_TAG) => {}
        Some(other) => {
            return Err(StorageError::DataCorruption(format!(
                "unexpected schema tag {other:?}"
            )));
        }
        None => return Err(StorageError::DataCorruption("missing schema tag".into())),
    }
    match header.version {
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(StorageError::DataCorruption(format!(
                "unsupported snapshot version {other}"
            )));
        }
        None => return Err(StorageError::DataCorruption("missing version".into())),
    }
    serde_json::from_str(text).map_err(|e| StorageError::DataCorruption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::ProgressState;
    use quiz_core::store::StoreSnapshot;
    use quiz_core::time::fixed_now;

    fn empty() -> Snapshot {
        Snapshot::new(fixed_now(), StoreSnapshot::default(), ProgressState::default())
    }

    #[test]
    fn encoded_document_carries_schema_and_version() {
        let text = encode(&empty()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["schema"], SCHEMA_TAG);
        assert_eq!(value["version"], SCHEMA_VERSION);
        assert!(value["store"]["records"].is_array());
        assert_eq!(value["progress"]["level"], 1);
    }

    #[test]
    fn decode_rejects_foreign_or_missing_tags() {
        let text = encode(&empty()).unwrap();

        let foreign = text.replace(SCHEMA_TAG, "deck-export");
        assert!(matches!(decode(&foreign), Err(StorageError::DataCorruption(_))));

        let future = text.replace("\"version\": 1", "\"version\": 2");
        assert!(matches!(decode(&future), Err(StorageError::DataCorruption(_))));

        let bare = r#"{"saved_at":"2023-11-14T22:13:20Z","store":{"records":[]},"progress":{}}"#;
        assert!(matches!(decode(bare), Err(StorageError::DataCorruption(_))));
    }

    #[test]
    fn decode_tolerates_missing_progress_fields() {
        let text = r#"{
            "schema": "quiz-snapshot",
            "version": 1,
            "saved_at": "2023-11-14T22:13:20Z",
            "store": { "records": [] },
            "progress": { "xp": 250 }
        }"#;
        let snapshot = decode(text).unwrap();
        assert_eq!(snapshot.progress.xp(), 250);
        assert!(snapshot.store.weak_topics.is_empty());
    }
}
