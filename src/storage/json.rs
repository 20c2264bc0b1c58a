use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{KeyValueStore, StorageError};

/// Reads and decodes the document stored under `key`.
///
/// Never fails: a missing key, a backend error or malformed JSON all yield
/// `fallback`.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    fallback: T,
) -> T {
    let raw = match store.get_item(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "nothing stored yet, using fallback");
            return fallback;
        }
        Err(e) => {
            warn!(key, error = %e, "storage read failed, using fallback");
            return fallback;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "stored value is malformed, using fallback");
            fallback
        }
    }
}

/// Encodes `value` and stores it under `key`. Backend failures propagate.
pub async fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set_item(key, raw).await
}
