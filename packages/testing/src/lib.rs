#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and benchmarking the ring pool.
//!
//! The pool only talks to the outside world through its factory and cleanup hooks, so most of
//! what lives here instruments those hooks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs a test with a timeout so that a scan that fails to terminate fails the test instead
/// of hanging the test run.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under Miri, where thread
/// synchronization primitives are significantly slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled and
/// the test function is executed directly. This allows mutation testing to properly detect
/// hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode).
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     // Your test code here
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already timed out.
        drop(tx.send(result));
    });

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("Test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("Test exceeded {timeout:?} timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("Test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// A pool factory that produces `0, 1, 2, ...` and counts how many items it has produced.
///
/// Because every item is its own creation sequence number, tests can tell exactly which factory
/// call produced the item they got back.
///
/// # Example
///
/// ```rust
/// use testing::CountingFactory;
///
/// let factory = CountingFactory::new();
/// let mut hook = factory.hook();
///
/// assert_eq!(hook(), 0);
/// assert_eq!(hook(), 1);
/// assert_eq!(factory.created(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CountingFactory {
    created: Rc<Cell<usize>>,
}

impl CountingFactory {
    /// Creates a factory that has not produced anything yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a hook to hand to the pool. All hooks of the same factory share one counter.
    pub fn hook(&self) -> impl FnMut() -> usize + 'static {
        let created = Rc::clone(&self.created);

        move || {
            let item = created.get();
            created.set(item.checked_add(1).expect("test factory counter overflow"));
            item
        }
    }

    /// How many items the hooks of this factory have produced.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.get()
    }
}

/// A pool cleanup routine that records every item it receives, in order.
///
/// # Example
///
/// ```rust
/// use testing::CleanupLog;
///
/// let log = CleanupLog::new();
/// let mut hook = log.hook();
///
/// hook("first");
/// hook("second");
///
/// assert_eq!(log.items(), vec!["first", "second"]);
/// ```
#[derive(Debug)]
pub struct CleanupLog<T> {
    items: Rc<RefCell<Vec<T>>>,
}

impl<T> Default for CleanupLog<T> {
    fn default() -> Self {
        Self {
            items: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T> Clone for CleanupLog<T> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
        }
    }
}

impl<T: 'static> CleanupLog<T> {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a hook to hand to the pool. All hooks of the same log append to one list.
    pub fn hook(&self) -> impl FnMut(T) + 'static {
        let items = Rc::clone(&self.items);

        move |item| items.borrow_mut().push(item)
    }

    /// The number of items received so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether no item has been received yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl<T: Clone + 'static> CleanupLog<T> {
    /// A copy of every item received so far, in the order received.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }
}
