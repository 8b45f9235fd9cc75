//! Engine traits and the Book Store for Discovera.
//!
//! The store owns the current catalog snapshot and coordinates storage, streaming,
//! and the clock. Books are immutable; every accepted mutation swaps in a fresh
//! snapshot, publishes it to subscribers, and then serializes it to the storage
//! backend best-effort.

use discovera_core::{Book, BookId, Rating, ReadingStatus, Review, Timestamp, ANONYMOUS_REVIEWER};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, DiscoveraError>;

/// Storage key the serialized catalog snapshot lives under.
pub const BOOKS_KEY: &str = "discovera_books";

/// Errors surfaced by the Discovera engine layer.
#[derive(Debug, Error)]
pub enum DiscoveraError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Payload for a caller-submitted review.
///
/// The store stamps the timestamp and fills the anonymous reviewer default;
/// text non-emptiness is the caller's concern.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub text: String,
    pub reviewer_name: Option<String>,
    pub reviewer_avatar: Option<String>,
}

/// Key-value text store interface.
///
/// `load` reporting `None` and `save`/`remove` failures are all valid outcomes;
/// the Book Store treats the backend as best-effort durability, never as a
/// source of errors for its callers.
pub trait StorageBackend {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Source of the current time, injected so review stamps are testable.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation of [`Clock`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(
            OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| "1970-01-01T00:00:00Z".into()),
        )
    }
}

/// Push stream of catalog snapshots.
///
/// `subscribe` must replay the last published snapshot to the new subscriber
/// immediately, so observers never need to wait for a mutation to see state.
pub trait SnapshotStream {
    type Handle;

    fn publish(&self, books: &[Book]) -> Result<()>;
    fn subscribe(&self) -> Result<Self::Handle>;
    fn poll(&self, handle: &Self::Handle) -> Result<Option<Vec<Book>>>;
    fn stop(&self, handle: Self::Handle) -> Result<()>;
}

/// Shared in-memory [`StorageBackend`]. Clones observe the same entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// [`StorageBackend`] for contexts without durable storage.
///
/// Reads report absence and writes are discarded, so the store falls through to
/// its seed catalog and keeps working purely in memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl StorageBackend for NullBackend {
    fn load(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn save(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// Fixed fallback catalog adopted when no persisted state exists.
pub fn seed_catalog() -> Vec<Book> {
    vec![
        Book::builder(
            BookId::new(0),
            "The Midnight Library",
            "Matt Haig",
            Rating::clamped(4.2),
        )
        .image("https://covers.openlibrary.org/b/isbn/9780525559474-M.jpg")
        .build(),
        Book::builder(
            BookId::new(1),
            "Atomic Habits",
            "James Clear",
            Rating::clamped(4.5),
        )
        .image("https://covers.openlibrary.org/b/isbn/9780735211292-M.jpg")
        .status(ReadingStatus::Reading)
        .build(),
        Book::builder(
            BookId::new(2),
            "Norwegian Wood",
            "Haruki Murakami",
            Rating::clamped(4.0),
        )
        .image("https://covers.openlibrary.org/b/isbn/9780375704024-M.jpg")
        .build(),
        Book::builder(
            BookId::new(3),
            "Project Hail Mary",
            "Andy Weir",
            Rating::clamped(4.6),
        )
        .image("https://covers.openlibrary.org/b/isbn/9780593135204-M.jpg")
        .status(ReadingStatus::WantToRead)
        .build(),
        Book::builder(
            BookId::new(4),
            "Educated",
            "Tara Westover",
            Rating::clamped(4.4),
        )
        .image("https://covers.openlibrary.org/b/isbn/9780399590504-M.jpg")
        .status(ReadingStatus::Read)
        .build(),
        Book::builder(
            BookId::new(5),
            "The Name of the Wind",
            "Patrick Rothfuss",
            Rating::clamped(4.5),
        )
        .build(),
    ]
}

/// Read-time normalization: every review carries a reviewer name and each
/// book's reviews are ordered newest first. Order is derived here, never
/// assumed from the storage format.
fn normalize_books(books: Vec<Book>) -> Vec<Book> {
    books
        .into_iter()
        .map(|book| {
            let mut reviews: Vec<Review> = book
                .reviews()
                .iter()
                .cloned()
                .map(Review::normalized)
                .collect();
            reviews.sort_by(|a, b| b.created_at().0.cmp(&a.created_at().0));
            book.with_reviews(reviews)
        })
        .collect()
}

/// Load the catalog from storage, falling back to the seed list on absence,
/// read failure, or unparseable text. Never raises.
fn load_books<S: StorageBackend>(storage: &S) -> Vec<Book> {
    let raw = match storage.load(BOOKS_KEY) {
        Ok(Some(text)) => text,
        Ok(None) => return seed_catalog(),
        Err(err) => {
            warn!(%err, "catalog read failed; adopting seed catalog");
            return seed_catalog();
        }
    };
    match serde_json::from_str::<Vec<Book>>(&raw) {
        Ok(books) => normalize_books(books),
        Err(err) => {
            warn!(%err, "persisted catalog unreadable; adopting seed catalog");
            seed_catalog()
        }
    }
}

/// Reactive book catalog store.
///
/// Owns exactly one snapshot cell for the process lifetime. Mutations run
/// synchronously to completion: read snapshot, compute replacement, swap,
/// publish, persist. Persistence is best-effort; the in-memory snapshot is the
/// source of truth for the running session.
pub struct BookStore<S, T, C> {
    storage: S,
    stream: T,
    clock: C,
    books: RwLock<Vec<Book>>,
}

impl<S, T, C> BookStore<S, T, C>
where
    S: StorageBackend,
    T: SnapshotStream,
    C: Clock,
{
    /// Construct the store, loading persisted state or the seed catalog, and
    /// publish the initial snapshot so early subscribers see it.
    pub fn new(storage: S, stream: T, clock: C) -> Self {
        let books = load_books(&storage);
        let store = Self {
            storage,
            stream,
            clock,
            books: RwLock::new(books),
        };
        store.publish_current();
        store
    }

    /// Synchronous point-in-time snapshot.
    pub fn books(&self) -> Vec<Book> {
        self.books.read().clone()
    }

    /// The book with the matching id, if any.
    pub fn book_by_id(&self, id: BookId) -> Option<Book> {
        self.books.read().iter().find(|b| b.id() == id).cloned()
    }

    /// Subscribe to the live snapshot stream; the current snapshot is replayed
    /// immediately.
    pub fn subscribe(&self) -> Result<T::Handle> {
        self.stream.subscribe()
    }

    pub fn poll(&self, handle: &T::Handle) -> Result<Option<Vec<Book>>> {
        self.stream.poll(handle)
    }

    pub fn unsubscribe(&self, handle: T::Handle) -> Result<()> {
        self.stream.stop(handle)
    }

    /// Replace the matching book with a copy carrying the new status.
    /// Unknown ids are a silent no-op.
    pub fn update_status(&self, id: BookId, status: ReadingStatus) {
        self.mutate(id, |book| Some(book.with_status(status)));
    }

    /// Prepend a review stamped with the current time. Unknown ids are a
    /// silent no-op.
    pub fn add_review(&self, book_id: BookId, new_review: NewReview) {
        let reviewer_name = match new_review.reviewer_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => ANONYMOUS_REVIEWER.to_string(),
        };
        let review = Review::new(
            new_review.text,
            reviewer_name,
            new_review.reviewer_avatar,
            self.clock.now(),
        );
        self.mutate(book_id, |book| {
            let mut reviews = Vec::with_capacity(book.reviews().len() + 1);
            reviews.push(review);
            reviews.extend(book.reviews().iter().cloned());
            Some(book.with_reviews(reviews))
        });
    }

    /// Remove the review at the given position. Unknown ids and out-of-range
    /// indexes are silent no-ops.
    pub fn delete_review(&self, book_id: BookId, index: usize) {
        self.mutate(book_id, |book| {
            if index >= book.reviews().len() {
                debug!(%book_id, index, "review index out of range; ignoring");
                return None;
            }
            let mut reviews = book.reviews().to_vec();
            reviews.remove(index);
            Some(book.with_reviews(reviews))
        });
    }

    /// Core mutation sequence. `apply` returning `None` means no change; the
    /// snapshot is neither swapped, published, nor persisted in that case.
    fn mutate(&self, id: BookId, apply: impl FnOnce(&Book) -> Option<Book>) {
        let next = {
            let current = self.books.read();
            let pos = match current.iter().position(|b| b.id() == id) {
                Some(pos) => pos,
                None => {
                    debug!(%id, "mutation targeted unknown book id; ignoring");
                    return;
                }
            };
            let replacement = match apply(&current[pos]) {
                Some(book) => book,
                None => return,
            };
            let mut next = current.clone();
            next[pos] = replacement;
            next
        };
        *self.books.write() = next.clone();
        if let Err(err) = self.stream.publish(&next) {
            warn!(%err, "snapshot publish failed");
        }
        self.persist(&next);
    }

    fn publish_current(&self) {
        let snapshot = self.books.read().clone();
        if let Err(err) = self.stream.publish(&snapshot) {
            warn!(%err, "initial snapshot publish failed");
        }
    }

    /// Serialize the snapshot and save it under the fixed key. Failures are
    /// swallowed; the in-memory state is never rolled back.
    fn persist(&self, books: &[Book]) {
        let payload = match serde_json::to_string(books) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "catalog serialization failed; skipping save");
                return;
            }
        };
        if let Err(err) = self.storage.save(BOOKS_KEY, &payload) {
            warn!(%err, "catalog save failed; keeping in-memory state");
        }
    }
}
