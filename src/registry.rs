//! Object address registry
//!
//! Binds in-memory buffers to short-lived addresses (download links, preview
//! sources). Every address created must be revoked exactly once; the registry
//! keeps per-session bookkeeping so the controller can sweep whatever a
//! session left behind.

use crate::utils::{AppError, AppResult, RegistryError};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const ADDRESS_SCHEME: &str = "blob:clip-recorder";

/// Identifier of one capture-through-download session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A live address for a buffer.
///
/// Not `Clone`: revoking consumes the handle, so one handle value can be
/// revoked at most once.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct AddressHandle {
    id: Uuid,
    session: SessionId,
    mime: String,
}

impl AddressHandle {
    pub fn url(&self) -> String {
        format!("{}/{}", ADDRESS_SCHEME, self.id)
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }
}

/// Counters for leak checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub created: u64,
    pub revoked: u64,
    pub outstanding: usize,
}

struct Entry {
    session: SessionId,
    bytes: Arc<[u8]>,
}

#[derive(Default)]
struct RegistryInner {
    live: HashMap<Uuid, Entry>,
    created: u64,
    revoked: u64,
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            tracing::error!(
                "Resource leak: registry dropped with {} live address(es)",
                self.live.len()
            );
        }
    }
}

/// Shared registry of live addresses
#[derive(Clone, Default)]
pub struct ObjectUrlRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an address for `bytes`
    pub fn create(&self, session: SessionId, bytes: Arc<[u8]>, mime: &str) -> AddressHandle {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write();
        inner.live.insert(id, Entry { session, bytes });
        inner.created += 1;

        let handle = AddressHandle {
            id,
            session,
            mime: mime.to_string(),
        };
        tracing::debug!("Created {} ({}) for {}", handle.url(), mime, session);
        handle
    }

    /// Release an address
    pub fn revoke(&self, handle: AddressHandle) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        if inner.live.remove(&handle.id).is_none() {
            tracing::warn!("Revoke of {} ignored: not live", handle.url());
            return Err(RegistryError::NotLive(handle.url()));
        }
        inner.revoked += 1;
        tracing::debug!("Revoked {}", handle.url());
        Ok(())
    }

    /// Bytes behind a live address
    pub fn resolve(&self, handle: &AddressHandle) -> Result<Arc<[u8]>, RegistryError> {
        self.inner
            .read()
            .live
            .get(&handle.id)
            .map(|entry| entry.bytes.clone())
            .ok_or_else(|| RegistryError::NotLive(handle.url()))
    }

    pub fn is_live(&self, handle: &AddressHandle) -> bool {
        self.inner.read().live.contains_key(&handle.id)
    }

    /// Revoke everything `session` still holds. Returns how many were swept.
    pub fn sweep(&self, session: SessionId) -> usize {
        let mut inner = self.inner.write();
        let before = inner.live.len();
        inner.live.retain(|_, entry| entry.session != session);
        let swept = before - inner.live.len();
        inner.revoked += swept as u64;

        if swept > 0 {
            tracing::info!("Swept {} address(es) left by {}", swept, session);
        }
        swept
    }

    /// Live addresses owned by `session`
    pub fn outstanding(&self, session: SessionId) -> usize {
        self.inner
            .read()
            .live
            .values()
            .filter(|entry| entry.session == session)
            .count()
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read();
        RegistryStats {
            created: inner.created,
            revoked: inner.revoked,
            outstanding: inner.live.len(),
        }
    }

    /// Fail with `ResourceLeak` if `session` still holds any address
    pub fn ensure_released(&self, session: SessionId) -> AppResult<()> {
        match self.outstanding(session) {
            0 => Ok(()),
            n => {
                tracing::error!("{} still holds {} address(es)", session, n);
                Err(AppError::ResourceLeak(format!(
                    "{} still holds {} address(es)",
                    session, n
                )))
            }
        }
    }
}
