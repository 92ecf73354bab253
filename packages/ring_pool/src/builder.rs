use std::any::type_name;
use std::fmt;

use crate::{DropPolicy, Error, ReservationTarget, Result, RingPool, buffer_exceeds_capacity};

/// Builder for creating an instance of [`RingPool`].
///
/// The factory is supplied up front and the capacity must be set before building. Everything
/// else is optional. [`RingPool::new()`][1] is a shortcut for the common case of only setting
/// the capacity and the buffer.
///
/// # Examples
///
/// ```
/// use ring_pool::{DropPolicy, ReservationTarget, RingPool};
///
/// let pool = RingPool::builder(|| Vec::<u8>::with_capacity(1024))
///     .capacity(8)
///     .buffer(2)
///     .cleanup(|buffer| println!("discarding buffer of {} bytes", buffer.capacity()))
///     .reservation_target(ReservationTarget::ReturnedSlot)
///     .drop_policy(DropPolicy::MayDropReserved)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.capacity().unwrap(), 8);
/// assert_eq!(pool.len().unwrap(), 2);
/// ```
///
/// [1]: RingPool::new
#[must_use]
pub struct RingPoolBuilder<T> {
    factory: Box<dyn FnMut() -> T>,
    cleanup: Option<Box<dyn FnMut(T)>>,
    capacity: Option<usize>,
    buffer: usize,
    reservation_target: ReservationTarget,
    drop_policy: DropPolicy,
}

impl<T> fmt::Debug for RingPoolBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingPoolBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("custom_cleanup", &self.cleanup.is_some())
            .field("capacity", &self.capacity)
            .field("buffer", &self.buffer)
            .field("reservation_target", &self.reservation_target)
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

impl<T> RingPoolBuilder<T> {
    pub(crate) fn new(factory: impl FnMut() -> T + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            cleanup: None,
            capacity: None,
            buffer: 0,
            reservation_target: ReservationTarget::default(),
            drop_policy: DropPolicy::default(),
        }
    }

    /// Sets the number of slots in the ring. Must be at least 1.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Sets how many slots are populated eagerly when the pool is created and when it grows.
    /// Must not exceed the capacity. Defaults to 0, meaning every item is created lazily.
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Sets the routine that receives every item the pool discards, whether through
    /// [`clear()`][1], shrinking via [`resize()`][2], [`destroy()`][3] or dropping the pool.
    ///
    /// By default, discarded items are simply dropped.
    ///
    /// [1]: RingPool::clear
    /// [2]: RingPool::resize
    /// [3]: RingPool::destroy
    pub fn cleanup(mut self, cleanup: impl FnMut(T) + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// Sets which slot [`RingPool::reserve_next()`] reserves when the scan is redirected.
    pub fn reservation_target(mut self, target: ReservationTarget) -> Self {
        self.reservation_target = target;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how to treat outstanding
    /// reservations when the pool is dropped without having been destroyed.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool and populates the first `buffer` slots through the factory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the capacity was not set, is zero or is
    /// smaller than the buffer.
    pub fn build(self) -> Result<RingPool<T>> {
        let Some(capacity) = self.capacity else {
            return Err(Error::InvalidConfiguration {
                problem: "the capacity of the pool was not set".to_string(),
            });
        };

        if capacity == 0 {
            return Err(Error::InvalidConfiguration {
                problem: "the capacity of the pool must be at least 1".to_string(),
            });
        }

        if self.buffer > capacity {
            return Err(buffer_exceeds_capacity(self.buffer, capacity));
        }

        Ok(RingPool::new_inner(
            self.factory,
            self.cleanup,
            capacity,
            self.buffer,
            self.reservation_target,
            self.drop_policy,
        ))
    }
}
