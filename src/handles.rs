//! Display handles: revocable in-process references to binary content.
//!
//! A [`DisplayHandle`] stands in for a browser object URL. It is created from
//! bytes through a [`HandleRegistry`] and released exactly once: when it is
//! dropped, or when the [`HandleSlot`] holding it is given a new handle.
//! Releasing an id the registry no longer knows about is a no-op.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};
use uuid::Uuid;

const URL_PREFIX: &str = "blob:docintelli/";

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<HashMap<Uuid, Entry>>,
    created: AtomicUsize,
    released: AtomicUsize,
}

#[derive(Debug, Clone)]
struct Entry {
    bytes: Bytes,
    mime: String,
}

/// Owner of all live display handles.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<Inner>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return the guard that keeps them reachable.
    pub fn create(&self, bytes: Bytes, mime: impl Into<String>) -> DisplayHandle {
        let id = Uuid::new_v4();
        let mime = mime.into();
        debug!("Creating display handle {} ({} bytes, {})", id, bytes.len(), mime);
        self.lock().insert(id, Entry { bytes, mime });
        self.inner.created.fetch_add(1, Ordering::SeqCst);
        DisplayHandle {
            id,
            registry: self.clone(),
        }
    }

    /// Look up the content behind a handle URL.
    pub fn resolve(&self, url: &str) -> Option<(Bytes, String)> {
        let id = parse_url(url)?;
        self.lock()
            .get(&id)
            .map(|e| (e.bytes.clone(), e.mime.clone()))
    }

    /// Number of handles currently alive.
    pub fn live(&self) -> usize {
        self.lock().len()
    }

    /// Total handles ever created.
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::SeqCst)
    }

    /// Total handles ever released.
    pub fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    fn revoke(&self, id: Uuid) {
        if self.lock().remove(&id).is_some() {
            self.inner.released.fetch_add(1, Ordering::SeqCst);
            debug!("Released display handle {}", id);
        } else {
            trace!("Display handle {} was already released", id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Entry>> {
        // Entries stay consistent even if a holder panicked mid-operation.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parse_url(url: &str) -> Option<Uuid> {
    url.strip_prefix(URL_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
}

/// A live handle. Dropping it releases the content.
#[derive(Debug)]
pub struct DisplayHandle {
    id: Uuid,
    registry: HandleRegistry,
}

impl DisplayHandle {
    /// URL-like reference, unique per handle.
    pub fn url(&self) -> String {
        format!("{URL_PREFIX}{}", self.id)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bytes(&self) -> Option<Bytes> {
        self.registry.resolve(&self.url()).map(|(b, _)| b)
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        self.registry.revoke(self.id);
    }
}

/// One logical display position, holding at most one handle.
#[derive(Debug, Default)]
pub struct HandleSlot {
    current: Option<DisplayHandle>,
}

impl HandleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle`, releasing whatever the slot held before.
    pub fn replace(&mut self, handle: DisplayHandle) {
        self.current = Some(handle);
    }

    /// Release the held handle, if any. Calling this on an empty slot is a no-op.
    pub fn release(&mut self) {
        self.current = None;
    }

    /// Move the handle out of the slot without releasing it.
    pub fn take(&mut self) -> Option<DisplayHandle> {
        self.current.take()
    }

    pub fn get(&self) -> Option<&DisplayHandle> {
        self.current.as_ref()
    }

    pub fn url(&self) -> Option<String> {
        self.current.as_ref().map(DisplayHandle::url)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf() -> Bytes {
        Bytes::from_static(b"%PDF-1.7")
    }

    #[test]
    fn handle_resolves_until_dropped() {
        let reg = HandleRegistry::new();
        let handle = reg.create(pdf(), "application/pdf");
        let url = handle.url();
        assert!(url.starts_with("blob:docintelli/"));
        let (bytes, mime) = reg.resolve(&url).unwrap();
        assert_eq!(bytes, pdf());
        assert_eq!(mime, "application/pdf");

        drop(handle);
        assert!(reg.resolve(&url).is_none());
        assert_eq!((reg.created(), reg.released(), reg.live()), (1, 1, 0));
    }

    #[test]
    fn urls_are_distinct() {
        let reg = HandleRegistry::new();
        let a = reg.create(pdf(), "application/pdf");
        let b = reg.create(pdf(), "application/pdf");
        assert_ne!(a.url(), b.url());
    }

    #[test]
    fn slot_replacement_releases_previous() {
        let reg = HandleRegistry::new();
        let mut slot = HandleSlot::new();
        slot.replace(reg.create(pdf(), "application/pdf"));
        let first = slot.url().unwrap();
        slot.replace(reg.create(pdf(), "application/pdf"));

        assert!(reg.resolve(&first).is_none());
        assert_eq!(reg.live(), 1);
        assert_eq!(reg.created() - reg.released(), 1);
    }

    #[test]
    fn double_release_is_noop() {
        let reg = HandleRegistry::new();
        let mut slot = HandleSlot::new();
        slot.release();
        slot.replace(reg.create(pdf(), "application/pdf"));
        slot.release();
        slot.release();
        assert_eq!((reg.created(), reg.released()), (1, 1));
        assert!(slot.is_empty());
    }

    #[test]
    fn unknown_urls_do_not_resolve() {
        let reg = HandleRegistry::new();
        assert!(reg.resolve("blob:docintelli/not-a-uuid").is_none());
        assert!(reg
            .resolve(&format!("blob:docintelli/{}", Uuid::new_v4()))
            .is_none());
        assert!(reg.resolve("https://example.org").is_none());
    }

    #[test]
    fn take_transfers_ownership() {
        let reg = HandleRegistry::new();
        let mut a = HandleSlot::new();
        let mut b = HandleSlot::new();
        a.replace(reg.create(pdf(), "application/pdf"));
        let url = a.url().unwrap();
        if let Some(h) = a.take() {
            b.replace(h);
        }
        assert!(a.is_empty());
        assert_eq!(b.url().as_deref(), Some(url.as_str()));
        assert_eq!(reg.released(), 0);
    }
}
