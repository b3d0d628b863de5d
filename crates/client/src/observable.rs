//! Observable state container with typed snapshots.
//!
//! An [`Observable`] owns one piece of shared state. Every mutation produces a
//! new immutable `Arc<T>` snapshot and notifies subscribers synchronously, in
//! registration order.
//!
//! Mutations are serialized through a queue. A mutation requested while
//! subscribers are being notified (for example from inside a subscriber) is
//! applied only after the current notification round has finished, so
//! subscribers never observe an interleaved update.
//!
//! A mutation requested from another thread while a drain is running blocks
//! until the draining thread has applied it and notified subscribers, so the
//! caller always sees its own write on return. Subscribers must not mutate an
//! observable whose drain is itself waiting on them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};

/// Handle returned by [`Observable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;
type Mutation<T> = Box<dyn FnOnce(&T) -> Option<T> + Send>;

struct Dispatch<T> {
    pending: VecDeque<Mutation<T>>,
    /// Thread currently draining, if any.
    drainer: Option<ThreadId>,
    /// Mutations ever queued.
    queued: u64,
    /// Mutations finished, including rejected and discarded ones.
    finished: u64,
}

/// A shared value with publish/subscribe change notification.
pub struct Observable<T> {
    current: RwLock<Arc<T>>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber<T>)>>,
    dispatch: Mutex<Dispatch<T>>,
    progress: Condvar,
    next_id: AtomicU64,
}

impl<T> Observable<T>
where
    T: Send + Sync + 'static,
{
    /// Create a container holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            subscribers: Mutex::new(Vec::new()),
            dispatch: Mutex::new(Dispatch {
                pending: VecDeque::new(),
                drainer: None,
                queued: 0,
                finished: 0,
            }),
            progress: Condvar::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Replace the value.
    ///
    /// Returns `true` once the value is in place. Returns `false` if the call
    /// was made from a subscriber on the draining thread: the value is then
    /// queued and applied after the current round.
    pub fn set(&self, value: T) -> bool {
        self.enqueue(Box::new(move |_| Some(value)))
    }

    /// Derive the next value from the current one.
    ///
    /// Returns as [`Observable::set`] does.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        self.enqueue(Box::new(move |current| Some(f(current))))
    }

    /// Derive the next value, or return `None` to leave the state untouched.
    ///
    /// No notification is sent when the closure returns `None`. The closure
    /// runs while the state is locked, so it must not read this observable.
    /// Returns whether the closure produced a new value; a call queued from
    /// inside a subscriber returns `false`.
    pub fn update_if<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> Option<T> + Send + 'static,
    {
        self.enqueue(Box::new(f))
    }

    /// Register a subscriber.
    ///
    /// The subscriber is called with every snapshot produced after it was
    /// registered.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(f)));
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn enqueue(&self, mutation: Mutation<T>) -> bool {
        let applied = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&applied);
        let tracked: Mutation<T> = Box::new(move |current| {
            let next = mutation(current);
            flag.store(next.is_some(), Ordering::SeqCst);
            next
        });

        {
            let mut dispatch = self.dispatch.lock();
            dispatch.pending.push_back(tracked);
            dispatch.queued += 1;
            let ticket = dispatch.queued;

            match dispatch.drainer {
                Some(drainer) if drainer == thread::current().id() => return false,
                Some(_) => {
                    while dispatch.finished < ticket {
                        self.progress.wait(&mut dispatch);
                    }
                    return applied.load(Ordering::SeqCst);
                }
                None => dispatch.drainer = Some(thread::current().id()),
            }
        }

        self.drain();
        applied.load(Ordering::SeqCst)
    }

    fn drain(&self) {
        let _reset = DrainGuard {
            dispatch: &self.dispatch,
            progress: &self.progress,
        };

        loop {
            let mutation = {
                let mut dispatch = self.dispatch.lock();
                match dispatch.pending.pop_front() {
                    Some(mutation) => mutation,
                    None => {
                        dispatch.drainer = None;
                        return;
                    }
                }
            };

            let snapshot = {
                let mut current = self.current.write();
                mutation(&**current).map(|next| {
                    let next = Arc::new(next);
                    *current = Arc::clone(&next);
                    next
                })
            };

            // Subscribers run without any lock held so they may read the
            // state, subscribe, or queue further mutations.
            if let Some(snapshot) = snapshot {
                let subscribers: Vec<Subscriber<T>> = self
                    .subscribers
                    .lock()
                    .iter()
                    .map(|(_, subscriber)| Arc::clone(subscriber))
                    .collect();
                for subscriber in subscribers {
                    subscriber(&snapshot);
                }
            }

            self.dispatch.lock().finished += 1;
            self.progress.notify_all();
        }
    }
}

/// Resets the dispatch queue if a mutation or subscriber panics mid-drain,
/// releasing any thread waiting on a dropped mutation.
struct DrainGuard<'a, T> {
    dispatch: &'a Mutex<Dispatch<T>>,
    progress: &'a Condvar,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut dispatch = self.dispatch.lock();
            dispatch.drainer = None;
            dispatch.pending.clear();
            dispatch.finished = dispatch.queued;
            drop(dispatch);
            self.progress.notify_all();
        }
    }
}

impl<T> std::fmt::Debug for Observable<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("current", &*self.current.read())
            .field("subscribers", &self.subscribers.lock().len())
            .finish_non_exhaustive()
    }
}
