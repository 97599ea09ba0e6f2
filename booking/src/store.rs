//! In-memory record store and dead-letter sink.
//!
//! Arena-style storage: one map from booking id to the booking and its line
//! items (no back-pointers), plus the idempotency-key index maintained in
//! the same critical section as the records, so dedup-and-insert is atomic
//! the way the store contract demands. Suitable for tests and single-node
//! deployments; the durable implementations live in `marquee-postgres`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::RwLock;

use marquee_core::dead_letter::{CompensationDeadLetters, DeadLetter};
use marquee_core::store::{BookingRecord, BookingStore, CreatePending, StoreError};
use marquee_core::types::{BookingId, BookingStatus, IdempotencyKey, UserId};

struct StoredRecord {
    record: BookingRecord,
    idempotency_key: Option<String>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<BookingId, StoredRecord>,
    keys: HashMap<String, BookingId>,
}

/// In-memory booking + line-item store
#[derive(Default)]
pub struct MemoryBookingStore {
    inner: RwLock<Inner>,
}

impl MemoryBookingStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of bookings currently stored
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Whether the store holds no bookings
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

impl BookingStore for MemoryBookingStore {
    fn create_pending(
        &self,
        record: BookingRecord,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Pin<Box<dyn Future<Output = Result<CreatePending, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            if let Some(key) = &idempotency_key
                && let Some(existing) = inner.keys.get(key.as_str())
            {
                return Ok(CreatePending::Duplicate { existing: *existing });
            }

            let booking_id = record.booking.id;
            let key = idempotency_key.map(|k| k.as_str().to_owned());
            if let Some(key) = &key {
                inner.keys.insert(key.clone(), booking_id);
            }
            inner.records.insert(
                booking_id,
                StoredRecord {
                    record,
                    idempotency_key: key,
                },
            );
            Ok(CreatePending::Created)
        })
    }

    fn confirm(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let stored = inner
                .records
                .get_mut(&booking_id)
                .ok_or(StoreError::NotFound(booking_id))?;
            stored.record.booking.status = BookingStatus::Confirmed;
            Ok(())
        })
    }

    fn delete(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            // Idempotent: deleting an absent booking is a no-op. The key
            // cascades with the record, freeing it for a fresh attempt.
            if let Some(stored) = inner.records.remove(&booking_id)
                && let Some(key) = stored.idempotency_key
            {
                inner.keys.remove(&key);
            }
            Ok(())
        })
    }

    fn get(
        &self,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<BookingRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner
                .records
                .get(&booking_id)
                .map(|stored| stored.record.clone()))
        })
    }

    fn list_by_user(
        &self,
        user_id: UserId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<BookingRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let mut records: Vec<BookingRecord> = inner
                .records
                .values()
                .filter(|stored| stored.record.booking.user_id == user_id)
                .map(|stored| stored.record.clone())
                .collect();
            records.sort_by(|a, b| b.booking.created_at.cmp(&a.booking.created_at));
            Ok(records)
        })
    }
}

/// In-memory dead-letter sink, for tests and single-node deployments
#[derive(Default)]
pub struct MemoryDeadLetters {
    letters: RwLock<Vec<DeadLetter>>,
}

impl MemoryDeadLetters {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// All recorded dead letters, oldest first
    pub async fn letters(&self) -> Vec<DeadLetter> {
        self.letters.read().await.clone()
    }
}

impl CompensationDeadLetters for MemoryDeadLetters {
    fn record(
        &self,
        letter: DeadLetter,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.letters.write().await.push(letter);
            Ok(())
        })
    }
}
