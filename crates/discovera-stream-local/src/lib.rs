//! Local in-memory snapshot stream using per-subscriber channels.
//!
//! Synchronous with poll semantics. The last published snapshot is retained and
//! replayed to every new subscriber, so observers see the current catalog state
//! without waiting for a mutation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use discovera_core::Book;
use discovera_engine::{DiscoveraError, Result, SnapshotStream};

#[derive(Debug)]
struct Subscriber {
    sender: Sender<Vec<Book>>,
    receiver: Receiver<Vec<Book>>,
}

/// Local implementation of [`SnapshotStream`] with last-value replay.
pub struct LocalSnapshotStream {
    next_id: AtomicUsize,
    last: Mutex<Option<Vec<Book>>>,
    subscribers: Mutex<HashMap<usize, Subscriber>>,
}

impl LocalSnapshotStream {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            last: Mutex::new(None),
            subscribers: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LocalSnapshotStream {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStream for LocalSnapshotStream {
    type Handle = usize;

    fn publish(&self, books: &[Book]) -> Result<()> {
        let snapshot = books.to_vec();
        *self.last.lock().expect("last snapshot lock poisoned") = Some(snapshot.clone());

        let mut to_remove = Vec::new();
        let subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        for (id, sub) in subscribers.iter() {
            if sub.sender.send(snapshot.clone()).is_err() {
                to_remove.push(*id);
            }
        }
        drop(subscribers);

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.lock().expect("subscribers lock poisoned");
            for id in to_remove {
                subs.remove(&id);
            }
        }

        Ok(())
    }

    fn subscribe(&self) -> Result<Self::Handle> {
        let (tx, rx) = mpsc::channel();
        // Replay the retained snapshot before the subscriber becomes visible.
        if let Some(last) = self
            .last
            .lock()
            .expect("last snapshot lock poisoned")
            .clone()
        {
            let _ = tx.send(last);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Subscriber {
            sender: tx,
            receiver: rx,
        };
        let mut subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        subscribers.insert(id, subscriber);
        Ok(id)
    }

    fn poll(&self, handle: &Self::Handle) -> Result<Option<Vec<Book>>> {
        let mut subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        if let Some(sub) = subscribers.get_mut(handle) {
            match sub.receiver.try_recv() {
                Ok(snapshot) => Ok(Some(snapshot)),
                Err(mpsc::TryRecvError::Empty) => Ok(None),
                Err(mpsc::TryRecvError::Disconnected) => {
                    subscribers.remove(handle);
                    Ok(None)
                }
            }
        } else {
            Err(DiscoveraError::Stream(format!("unknown handle {}", handle)))
        }
    }

    fn stop(&self, handle: Self::Handle) -> Result<()> {
        let mut subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        subscribers.remove(&handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovera_core::{BookId, Rating};

    fn snapshot(titles: &[&str]) -> Vec<Book> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| {
                Book::builder(BookId::new(i as u32), *title, "author", Rating::clamped(3.0)).build()
            })
            .collect()
    }

    #[test]
    fn publish_then_poll_delivers_snapshot() {
        let stream = LocalSnapshotStream::new();
        let handle = stream.subscribe().expect("subscribe");
        stream.publish(&snapshot(&["a"])).unwrap();

        let polled = stream.poll(&handle).unwrap().expect("snapshot");
        assert_eq!(polled[0].title(), "a");
        assert!(stream.poll(&handle).unwrap().is_none());
    }

    #[test]
    fn new_subscriber_replays_last_snapshot() {
        let stream = LocalSnapshotStream::new();
        stream.publish(&snapshot(&["a", "b"])).unwrap();

        let handle = stream.subscribe().expect("subscribe");
        let replayed = stream.poll(&handle).unwrap().expect("replayed snapshot");
        assert_eq!(replayed.len(), 2);
        // Replay happens once; no further items until the next publish.
        assert!(stream.poll(&handle).unwrap().is_none());
    }

    #[test]
    fn subscriber_before_any_publish_sees_nothing_until_first_publish() {
        let stream = LocalSnapshotStream::new();
        let handle = stream.subscribe().expect("subscribe");
        assert!(stream.poll(&handle).unwrap().is_none());

        stream.publish(&snapshot(&["a"])).unwrap();
        assert!(stream.poll(&handle).unwrap().is_some());
    }

    #[test]
    fn stopped_subscriber_does_not_block_others() {
        let stream = LocalSnapshotStream::new();
        let dead = stream.subscribe().unwrap();
        let alive = stream.subscribe().unwrap();
        stream.stop(dead).unwrap();

        stream.publish(&snapshot(&["a"])).unwrap();
        assert!(stream.poll(&alive).unwrap().is_some());
        assert!(stream.poll(&dead).is_err(), "stopped handle is unknown");
    }

    #[test]
    fn each_subscriber_gets_its_own_queue() {
        let stream = LocalSnapshotStream::new();
        let first = stream.subscribe().unwrap();
        let second = stream.subscribe().unwrap();

        stream.publish(&snapshot(&["a"])).unwrap();
        assert!(stream.poll(&first).unwrap().is_some());
        // Draining one queue leaves the other untouched.
        assert!(stream.poll(&second).unwrap().is_some());
        assert!(stream.poll(&first).unwrap().is_none());
    }
}
