//! Last known volume listing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::backend::Backend;
use crate::error::FetchError;
use crate::volume::Volume;

struct Listing {
    volumes: Vec<Volume>,
    /// Request number of the listing currently held.
    applied: u64,
    /// Outstanding size loads per volume name.
    loads: HashMap<String, usize>,
}

/// Holds the ordered volume list and replaces it wholesale on refresh.
///
/// The list is behind a single mutex that is never held across an await.
/// Concurrent refreshes resolve latest-initiated-wins, the same rule the
/// coordinator applies to progress polls.
pub struct VolumeDirectory {
    backend: Arc<dyn Backend>,
    listing: Mutex<Listing>,
    next_request: AtomicU64,
    changes: watch::Sender<u64>,
}

impl VolumeDirectory {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            backend,
            listing: Mutex::new(Listing {
                volumes: Vec::new(),
                applied: 0,
                loads: HashMap::new(),
            }),
            next_request: AtomicU64::new(0),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Listing> {
        // Writers replace or patch in one step; poison carries no torn state.
        self.listing.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Volumes in backend order.
    pub fn list(&self) -> Vec<Volume> {
        self.lock().volumes.clone()
    }

    pub fn get(&self, name: &str) -> Option<Volume> {
        self.lock().volumes.iter().find(|v| v.name == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().volumes.iter().any(|v| v.name == name)
    }

    /// Change counter, bumped whenever the list or any entry changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Replace the whole list with a fresh backend listing.
    ///
    /// On failure the current list is left untouched. A listing whose
    /// request was overtaken by a later, already applied one is dropped.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let request = self.next_request.fetch_add(1, Ordering::SeqCst) + 1;
        let fresh = self.backend.list_volumes().await?;

        let mut listing = self.lock();
        if request < listing.applied {
            tracing::debug!(request, applied = listing.applied, "Dropping stale volume listing");
            return Ok(());
        }

        let Listing { volumes, loads, .. } = &mut *listing;
        *volumes = fresh
            .into_iter()
            .map(|mut v| {
                v.size_loading = loads.contains_key(&v.name);
                v
            })
            .collect();
        listing.applied = request;
        tracing::debug!(count = listing.volumes.len(), request, "Volume listing replaced");
        self.changes.send_modify(|n| *n += 1);
        Ok(())
    }

    /// Mark a size load for `name` as started.
    ///
    /// The volume shows as loading until every load begun for it has
    /// finished, including loads begun before it was (re)listed. Dropping
    /// the returned guard without [`SizeLoad::complete`] ends the load and
    /// keeps the old size.
    pub fn begin_size_load(&self, name: &str) -> SizeLoad<'_> {
        let mut listing = self.lock();
        *listing.loads.entry(name.to_string()).or_insert(0) += 1;
        if let Some(volume) = listing.volumes.iter_mut().find(|v| v.name == name) {
            if !volume.size_loading {
                volume.size_loading = true;
                self.changes.send_modify(|n| *n += 1);
            }
        }
        SizeLoad {
            directory: self,
            name: name.to_string(),
            size: None,
        }
    }

    fn end_size_load(&self, name: &str, size: Option<&str>) {
        let mut listing = self.lock();
        let remaining = match listing.loads.get_mut(name) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining == 0 {
            listing.loads.remove(name);
        }

        let Some(volume) = listing.volumes.iter_mut().find(|v| v.name == name) else {
            tracing::debug!(volume = %name, "Size load for unlisted volume ignored");
            return;
        };
        let mut changed = false;
        if let Some(size) = size {
            volume.size = Some(size.to_string());
            changed = true;
        }
        let loading = remaining > 0;
        if volume.size_loading != loading {
            volume.size_loading = loading;
            changed = true;
        }
        if changed {
            self.changes.send_modify(|n| *n += 1);
        }
    }
}

/// One in-flight size load, ended when dropped.
#[must_use = "dropping the guard ends the size load immediately"]
pub struct SizeLoad<'a> {
    directory: &'a VolumeDirectory,
    name: String,
    size: Option<String>,
}

impl SizeLoad<'_> {
    /// End the load, storing `size` if the volume is still listed.
    pub fn complete(mut self, size: &str) {
        self.size = Some(size.to_string());
    }
}

impl Drop for SizeLoad<'_> {
    fn drop(&mut self) {
        self.directory.end_size_load(&self.name, self.size.as_deref());
    }
}
