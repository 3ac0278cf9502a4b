//! Request batching.
//!
//! [`BatchRouter`] decides whether a request joins a batch or runs
//! immediately. A nil batch id means "no batching". Routing never validates
//! the batch id; an unknown id surfaces when the batch is taken for
//! execution.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dataverse_core::{DataverseError, OrganizationRequest, Result};
use uuid::Uuid;

use crate::config::DEFAULT_MAX_REQUESTS_PER_BATCH;

/// Outcome of routing one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTicket {
    batch_id: Uuid,
    queued: bool,
}

impl BatchTicket {
    /// Returns the batch id the request was routed with.
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Returns true if the request was queued and must not run now.
    pub fn is_queued(&self) -> bool {
        self.queued
    }
}

/// A request held by a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedRequest {
    request: OrganizationRequest,
    bypass_plugin_execution: bool,
}

impl BatchedRequest {
    /// Returns the request.
    pub fn request(&self) -> &OrganizationRequest {
        &self.request
    }

    /// Returns true if custom plugins should be bypassed.
    pub fn bypass_plugin_execution(&self) -> bool {
        self.bypass_plugin_execution
    }

    /// Returns the request with the bypass flag applied as a parameter.
    pub fn into_request(self) -> OrganizationRequest {
        self.request
            .with_bypass_plugin_execution(self.bypass_plugin_execution)
    }
}

/// A named batch of deferred requests.
#[derive(Debug, Clone)]
pub struct RequestBatch {
    id: Uuid,
    name: String,
    return_results: bool,
    continue_on_error: bool,
    requests: Vec<BatchedRequest>,
    registered: bool,
}

impl RequestBatch {
    fn new(id: Uuid, name: String, return_results: bool, continue_on_error: bool) -> Self {
        Self {
            id,
            name,
            return_results,
            continue_on_error,
            requests: Vec::new(),
            registered: true,
        }
    }

    fn orphan(id: Uuid) -> Self {
        Self {
            registered: false,
            ..Self::new(id, String::new(), false, false)
        }
    }

    /// Returns the batch id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the batch name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if responses should be collected.
    pub fn return_results(&self) -> bool {
        self.return_results
    }

    /// Returns true if execution continues past a failed request.
    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    /// Returns the queued requests, in append order.
    pub fn requests(&self) -> &[BatchedRequest] {
        &self.requests
    }

    /// Returns the number of queued requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns true if no request is queued.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Consumes the batch, returning its requests.
    pub fn into_requests(self) -> Vec<BatchedRequest> {
        self.requests
    }
}

/// Storage for queued requests.
pub trait BatchStore: Send + Sync {
    /// Appends `request` to the batch `batch_id`.
    fn append(&self, batch_id: Uuid, request: OrganizationRequest, bypass_plugin_execution: bool);
}

impl<T: BatchStore + ?Sized> BatchStore for Arc<T> {
    fn append(&self, batch_id: Uuid, request: OrganizationRequest, bypass_plugin_execution: bool) {
        (**self).append(batch_id, request, bypass_plugin_execution)
    }
}

/// Routes requests to a batch store or back to the caller for immediate execution.
#[derive(Debug, Clone)]
pub struct BatchRouter<S> {
    store: S,
}

impl<S: BatchStore> BatchRouter<S> {
    /// Creates a router appending to `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Queues `request` when `batch_id` is not nil.
    ///
    /// Returns `true` if the request was queued; the caller must then not
    /// execute it. Returns `false` for a nil id, leaving the store untouched.
    pub fn route(&self, batch_id: Uuid, request: OrganizationRequest, bypass_plugin_execution: bool) -> bool {
        if batch_id.is_nil() {
            return false;
        }
        tracing::trace!(
            batch_id = %batch_id,
            request = %request.request_name(),
            "queued request into batch"
        );
        self.store.append(batch_id, request, bypass_plugin_execution);
        true
    }

    /// Like [`route`](Self::route), returning a [`BatchTicket`].
    pub fn route_ticket(
        &self,
        batch_id: Uuid,
        request: OrganizationRequest,
        bypass_plugin_execution: bool,
    ) -> BatchTicket {
        BatchTicket {
            batch_id,
            queued: self.route(batch_id, request, bypass_plugin_execution),
        }
    }
}

/// Number of orphan batches an [`InMemoryBatchStore`] keeps by default.
pub const DEFAULT_MAX_ORPHAN_BATCHES: usize = 256;

#[derive(Debug, Default)]
struct Slots {
    batches: HashMap<Uuid, Arc<Mutex<RequestBatch>>>,
    // Unregistered ids in arrival order, oldest first.
    orphans: VecDeque<Uuid>,
}

/// An in-memory [`BatchStore`].
///
/// Appends for one batch serialize on that batch's mutex and hold the map's
/// read lock until the request is pushed, so [`take_batch`](Self::take_batch)
/// never detaches a batch with an append in flight.
///
/// Requests routed to an id that was never registered, or that was already
/// taken, are parked in an orphan batch until that id is taken. At most
/// [`max_orphan_batches`](Self::max_orphan_batches) orphans are kept; beyond
/// that the oldest is discarded with a warning.
#[derive(Debug)]
pub struct InMemoryBatchStore {
    slots: RwLock<Slots>,
    max_requests_per_batch: usize,
    max_orphan_batches: usize,
}

impl InMemoryBatchStore {
    /// Creates a store with the default per-batch limit.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_REQUESTS_PER_BATCH)
    }

    /// Creates a store allowing at most `max_requests_per_batch` per batch.
    pub fn with_limit(max_requests_per_batch: usize) -> Self {
        Self {
            slots: RwLock::new(Slots::default()),
            max_requests_per_batch,
            max_orphan_batches: DEFAULT_MAX_ORPHAN_BATCHES,
        }
    }

    /// Sets how many orphan batches are kept. At least one is always kept.
    pub fn with_orphan_limit(mut self, max_orphan_batches: usize) -> Self {
        self.max_orphan_batches = max_orphan_batches.max(1);
        self
    }

    /// Returns the per-batch request limit.
    pub fn max_requests_per_batch(&self) -> usize {
        self.max_requests_per_batch
    }

    /// Returns the number of orphan batches kept before eviction.
    pub fn max_orphan_batches(&self) -> usize {
        self.max_orphan_batches
    }

    /// Registers a new, empty batch and returns its id.
    pub fn create_batch(&self, name: impl Into<String>, return_results: bool, continue_on_error: bool) -> Uuid {
        let id = Uuid::new_v4();
        let batch = RequestBatch::new(id, name.into(), return_results, continue_on_error);
        tracing::debug!(batch_id = %id, name = %batch.name, "created request batch");
        self.write_slots()
            .batches
            .insert(id, Arc::new(Mutex::new(batch)));
        id
    }

    /// Returns a snapshot of the batch, if registered.
    pub fn batch(&self, batch_id: Uuid) -> Option<RequestBatch> {
        let slots = self.read_slots();
        let batch = lock_batch(slots.batches.get(&batch_id)?);
        batch.registered.then(|| batch.clone())
    }

    /// Returns the number of requests queued for `batch_id`, orphan or not.
    pub fn request_count(&self, batch_id: Uuid) -> usize {
        self.read_slots()
            .batches
            .get(&batch_id)
            .map(|slot| lock_batch(slot).len())
            .unwrap_or(0)
    }

    /// Returns the number of orphan batches currently parked.
    pub fn orphan_count(&self) -> usize {
        self.read_slots().orphans.len()
    }

    /// Removes and returns the batch for execution.
    ///
    /// # Errors
    ///
    /// - [`DataverseError::InvalidBatchReference`] if the id was never
    ///   registered with [`create_batch`](Self::create_batch); requests
    ///   routed to it are discarded.
    /// - [`DataverseError::BatchLimitExceeded`] if more requests were queued
    ///   than the limit allows; the batch is discarded.
    pub fn take_batch(&self, batch_id: Uuid) -> Result<RequestBatch> {
        let slot = {
            let mut slots = self.write_slots();
            let slot = slots
                .batches
                .remove(&batch_id)
                .ok_or(DataverseError::InvalidBatchReference(batch_id))?;
            slots.orphans.retain(|id| *id != batch_id);
            slot
        };

        // Every other holder of the slot releases it before the map lock.
        let batch = match Arc::try_unwrap(slot) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => lock_batch(&shared).clone(),
        };

        if !batch.registered {
            tracing::warn!(
                batch_id = %batch_id,
                discarded = batch.len(),
                "requests were routed to an unknown batch"
            );
            return Err(DataverseError::InvalidBatchReference(batch_id));
        }
        if batch.len() > self.max_requests_per_batch {
            return Err(DataverseError::BatchLimitExceeded {
                batch_id,
                count: batch.len(),
                limit: self.max_requests_per_batch,
            });
        }
        Ok(batch)
    }

    /// Discards a batch and its queued requests.
    pub fn remove_batch(&self, batch_id: Uuid) -> bool {
        let mut slots = self.write_slots();
        slots.orphans.retain(|id| *id != batch_id);
        slots.batches.remove(&batch_id).is_some()
    }

    /// Returns the ids of registered batches.
    pub fn batch_ids(&self) -> Vec<Uuid> {
        self.read_slots()
            .batches
            .iter()
            .filter(|(_, slot)| lock_batch(slot).registered)
            .map(|(id, _)| *id)
            .collect()
    }

    fn read_slots(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryBatchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStore for InMemoryBatchStore {
    fn append(&self, batch_id: Uuid, request: OrganizationRequest, bypass_plugin_execution: bool) {
        let queued = BatchedRequest {
            request,
            bypass_plugin_execution,
        };

        {
            let slots = self.read_slots();
            if let Some(slot) = slots.batches.get(&batch_id) {
                lock_batch(slot).requests.push(queued);
                return;
            }
        }

        let mut guard = self.write_slots();
        let slots = &mut *guard;
        let slot = match slots.batches.entry(batch_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                slots.orphans.push_back(batch_id);
                entry.insert(Arc::new(Mutex::new(RequestBatch::orphan(batch_id))))
            }
        };
        lock_batch(slot).requests.push(queued);

        while slots.orphans.len() > self.max_orphan_batches {
            let Some(evicted) = slots.orphans.pop_front() else {
                break;
            };
            if let Some(slot) = slots.batches.remove(&evicted) {
                tracing::warn!(
                    batch_id = %evicted,
                    discarded = lock_batch(&slot).len(),
                    "evicted requests routed to an unknown batch"
                );
            }
        }
    }
}

fn lock_batch(slot: &Mutex<RequestBatch>) -> MutexGuard<'_, RequestBatch> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataverse_core::Entity;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingStore {
        appended: StdMutex<Vec<(Uuid, String, bool)>>,
    }

    impl BatchStore for RecordingStore {
        fn append(&self, batch_id: Uuid, request: OrganizationRequest, bypass: bool) {
            self.appended
                .lock()
                .unwrap()
                .push((batch_id, request.request_name().to_string(), bypass));
        }
    }

    fn create_request() -> OrganizationRequest {
        OrganizationRequest::create(Entity::new("account"))
    }

    #[test]
    fn test_nil_batch_id_is_not_queued() {
        let router = BatchRouter::new(RecordingStore::default());
        assert!(!router.route(Uuid::nil(), create_request(), false));
        assert!(router.store().appended.lock().unwrap().is_empty());
    }

    #[test]
    fn test_non_nil_batch_id_appends_once() {
        let router = BatchRouter::new(RecordingStore::default());
        let id = Uuid::new_v4();
        assert!(router.route(id, create_request(), true));
        let appended = router.store().appended.lock().unwrap();
        assert_eq!(appended.as_slice(), &[(id, "Create".to_string(), true)]);
    }

    #[test]
    fn test_route_ticket() {
        let router = BatchRouter::new(RecordingStore::default());
        let ticket = router.route_ticket(Uuid::nil(), create_request(), false);
        assert!(!ticket.is_queued());
        assert!(ticket.batch_id().is_nil());
    }

    #[test]
    fn test_take_registered_batch() {
        let store = InMemoryBatchStore::new();
        let id = store.create_batch("nightly", true, false);
        store.append(id, create_request(), false);
        store.append(id, OrganizationRequest::new("WhoAmI"), true);
        assert_eq!(store.request_count(id), 2);

        let batch = store.take_batch(id).unwrap();
        assert_eq!(batch.name(), "nightly");
        assert!(batch.return_results());
        assert_eq!(batch.requests()[1].request().request_name(), "WhoAmI");
        assert!(batch.requests()[1].bypass_plugin_execution());
        assert!(store.batch(id).is_none());
    }

    #[test]
    fn test_unknown_batch_fails_on_take() {
        let store = InMemoryBatchStore::new();
        let id = Uuid::new_v4();
        store.append(id, create_request(), false);
        assert!(store.batch(id).is_none());
        assert!(store.batch_ids().is_empty());

        let err = store.take_batch(id).unwrap_err();
        assert!(matches!(err, DataverseError::InvalidBatchReference(b) if b == id));
        assert!(matches!(
            store.take_batch(id).unwrap_err(),
            DataverseError::InvalidBatchReference(_)
        ));
    }

    #[test]
    fn test_limit_enforced_on_take() {
        let store = InMemoryBatchStore::with_limit(1);
        let id = store.create_batch("small", false, true);
        store.append(id, create_request(), false);
        store.append(id, create_request(), false);

        let err = store.take_batch(id).unwrap_err();
        assert!(matches!(
            err,
            DataverseError::BatchLimitExceeded { count: 2, limit: 1, .. }
        ));
    }

    #[test]
    fn test_batched_request_applies_bypass() {
        let store = InMemoryBatchStore::new();
        let id = store.create_batch("b", false, false);
        store.append(id, create_request(), true);
        let request = store.take_batch(id).unwrap().into_requests().remove(0).into_request();
        assert!(request.bypasses_plugin_execution());
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let store = Arc::new(InMemoryBatchStore::new());
        let id = store.create_batch("parallel", false, true);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.append(id, create_request(), false);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.take_batch(id).unwrap().len(), 400);
    }

    #[test]
    fn test_take_during_concurrent_appends_keeps_every_request() {
        for _ in 0..50 {
            let store = Arc::new(InMemoryBatchStore::with_limit(usize::MAX));
            let id = store.create_batch("racing", false, true);

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = Arc::clone(&store);
                    std::thread::spawn(move || {
                        for _ in 0..200 {
                            store.append(id, create_request(), false);
                        }
                    })
                })
                .collect();
            let taken = store.take_batch(id).unwrap().len();
            for handle in handles {
                handle.join().unwrap();
            }

            // Appends after the take land in an orphan under the same id.
            assert_eq!(taken + store.request_count(id), 800);
        }
    }

    #[test]
    fn test_append_after_take_is_reported_on_next_take() {
        let store = InMemoryBatchStore::new();
        let id = store.create_batch("once", false, false);
        store.append(id, create_request(), false);
        assert_eq!(store.take_batch(id).unwrap().len(), 1);

        store.append(id, create_request(), false);
        assert_eq!(store.orphan_count(), 1);
        assert!(matches!(
            store.take_batch(id).unwrap_err(),
            DataverseError::InvalidBatchReference(b) if b == id
        ));
        assert_eq!(store.orphan_count(), 0);
    }

    #[test]
    fn test_oldest_orphans_are_evicted() {
        let store = InMemoryBatchStore::new().with_orphan_limit(2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            store.append(*id, create_request(), false);
        }

        assert_eq!(store.orphan_count(), 2);
        assert_eq!(store.request_count(ids[0]), 0);
        assert_eq!(store.request_count(ids[2]), 1);
        assert!(matches!(
            store.take_batch(ids[0]).unwrap_err(),
            DataverseError::InvalidBatchReference(_)
        ));

        let registered = store.create_batch("kept", false, false);
        store.append(registered, create_request(), false);
        store.append(Uuid::new_v4(), create_request(), false);
        assert_eq!(store.request_count(registered), 1);
        assert!(store.remove_batch(ids[2]));
        assert_eq!(store.orphan_count(), 1);
    }

    #[test]
    fn test_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InMemoryBatchStore>();
        assert_send_sync::<BatchRouter<Arc<InMemoryBatchStore>>>();
    }
}
