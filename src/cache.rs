use sha2::{Digest, Sha256};
use std::{collections::HashMap, future::Future, sync::Arc};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_ref().as_bytes());
            hasher.update([0u8]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Prepared results keyed by fingerprint. Entries live for the whole
/// process; failed preparations are not stored, so the next request retries.
pub struct Memo<T> {
    slots: Mutex<HashMap<Fingerprint, Arc<T>>>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Memo<T> {
    pub async fn get_or_try_init<F, Fut, E>(&self, key: &Fingerprint, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        // held across `init` so concurrent requests wait for one preparation
        let mut slots = self.slots.lock().await;
        if let Some(hit) = slots.get(key) {
            debug!("memo hit {}", &key.as_str()[..12]);
            return Ok(Arc::clone(hit));
        }

        let value = Arc::new(init().await?);
        slots.insert(key.clone(), Arc::clone(&value));
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}
