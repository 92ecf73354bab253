use std::any::type_name;
use std::{fmt, thread};

use tracing::debug;

use crate::{
    DropPolicy, Error, Reservation, ReservationTarget, ReserveOptions, Result, Ring,
    RingPoolBuilder,
};

/// A fixed-capacity object pool that hands out its items in ring order.
///
/// The pool has a fixed number of slots, each holding at most one item. Items are created by a
/// caller-supplied factory the first time their slot is visited (or eagerly, for the first
/// `buffer` slots) and are then reused for the lifetime of the pool instead of being recreated on
/// every request.
///
/// There are multiple ways to obtain an item:
///
/// * [`next()`][1] - returns the next item that is not reserved, walking the ring from the
///   pointer. The item stays available to later callers.
/// * [`reserve_next()`][2] - like `next()` but also reserves the slot, excluding it from every
///   scan until the returned [`Reservation`] is passed to [`release()`][3].
/// * [`unique()`][4] - calls the factory directly. The item is never stored in the pool.
///
/// # Scanning
///
/// The pool keeps a pointer to the next slot to inspect. A scan starts at the pointer, skips
/// reserved slots and stops at the first slot that is not reserved, advancing the pointer past
/// every slot it inspects. A scan never inspects more than `capacity` slots, so a pool where
/// every slot is reserved returns `None` after one lap of the ring. A fast scan inspects exactly
/// one slot.
///
/// Reservations released with [`ReserveOptions::optimize()`] leave a hint so the following scan
/// starts at the released slot instead of at the pointer. Hinted scans restore the pointer
/// afterwards, so they do not change the steady-state progression of the ring.
///
/// # Teardown
///
/// Items leave the pool through the cleanup routine, which by default simply drops them. This
/// happens on [`clear()`][5], when shrinking via [`resize()`][6], on [`destroy()`][7] and when
/// the pool is dropped without having been destroyed. After `destroy()`, every operation returns
/// [`Error::AlreadyDestroyed`].
///
/// # Hook failures
///
/// The factory and the cleanup routine are expected not to panic. If one does, the panic
/// propagates to the caller of the pool operation that invoked it. Operations that invoke a hook
/// once per slot (`clear()`, `resize()`, `destroy()`) may then leave the pool partially
/// transitioned, though still consistent with its own invariants.
///
/// # Thread safety
///
/// The pool is single-threaded. It can be neither sent nor shared between threads because the
/// hooks are not required to be thread-safe.
///
/// # Example
///
/// ```rust
/// use ring_pool::{ReserveOptions, RingPool};
///
/// let mut pool = RingPool::new(|| String::with_capacity(64), 2, 0).unwrap();
///
/// // Reserve the first slot, then keep using the rest of the ring.
/// let (item, reservation) = pool.reserve_next(ReserveOptions::new()).unwrap();
/// item.unwrap().push_str("in use");
///
/// let other = pool.next().unwrap().unwrap();
/// assert!(other.is_empty());
///
/// pool.release(reservation).unwrap();
/// ```
///
/// [1]: Self::next
/// [2]: Self::reserve_next
/// [3]: Self::release
/// [4]: Self::unique
/// [5]: Self::clear
/// [6]: Self::resize
/// [7]: Self::destroy
pub struct RingPool<T> {
    /// `None` once the pool has been destroyed.
    ring: Option<Ring<T>>,

    factory: Box<dyn FnMut() -> T>,

    cleanup: Cleanup<T>,

    reservation_target: ReservationTarget,

    drop_policy: DropPolicy,
}

/// The routine that receives discarded items. Without a custom routine, items are dropped.
struct Cleanup<T>(Option<Box<dyn FnMut(T)>>);

impl<T> Cleanup<T> {
    fn call(&mut self, item: T) {
        match &mut self.0 {
            Some(cleanup) => cleanup(item),
            None => drop(item),
        }
    }
}

impl<T> RingPool<T> {
    pub(crate) fn new_inner(
        mut factory: Box<dyn FnMut() -> T>,
        cleanup: Option<Box<dyn FnMut(T)>>,
        capacity: usize,
        buffer: usize,
        reservation_target: ReservationTarget,
        drop_policy: DropPolicy,
    ) -> Self {
        let mut ring = Ring::new(capacity, buffer);
        ring.prewarm(&mut *factory);

        debug!(
            item_type = type_name::<T>(),
            capacity, buffer, "ring pool created"
        );

        Self {
            ring: Some(ring),
            factory,
            cleanup: Cleanup(cleanup),
            reservation_target,
            drop_policy,
        }
    }

    /// Creates a pool with `capacity` slots, eagerly populating the first `buffer` of them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `capacity` is zero or `buffer` exceeds it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::RingPool;
    ///
    /// let pool = RingPool::new(|| vec![0_u8; 16], 4, 2).unwrap();
    ///
    /// assert_eq!(pool.capacity().unwrap(), 4);
    /// assert_eq!(pool.len().unwrap(), 2);
    /// assert_eq!(pool.pointer().unwrap(), 0);
    ///
    /// assert!(RingPool::new(|| 0_u8, 2, 3).is_err());
    /// ```
    pub fn new(
        factory: impl FnMut() -> T + 'static,
        capacity: usize,
        buffer: usize,
    ) -> Result<Self> {
        Self::builder(factory).capacity(capacity).buffer(buffer).build()
    }

    /// Starts building a new [`RingPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the capacity and buffer.
    pub fn builder(factory: impl FnMut() -> T + 'static) -> RingPoolBuilder<T> {
        RingPoolBuilder::new(factory)
    }

    /// Replaces the routine that receives discarded items. Takes effect immediately.
    ///
    /// Returns the pool to allow chaining.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// use ring_pool::RingPool;
    ///
    /// let discarded = Rc::new(RefCell::new(Vec::new()));
    /// let sink = Rc::clone(&discarded);
    ///
    /// let mut pool = RingPool::new(|| 42_u32, 2, 2).unwrap();
    /// pool.use_cleanup(move |item| sink.borrow_mut().push(item))
    ///     .unwrap()
    ///     .clear()
    ///     .unwrap();
    ///
    /// assert_eq!(*discarded.borrow(), vec![42, 42]);
    /// ```
    pub fn use_cleanup(&mut self, cleanup: impl FnMut(T) + 'static) -> Result<&mut Self> {
        self.ring()?;

        self.cleanup = Cleanup(Some(Box::new(cleanup)));
        Ok(self)
    }

    /// Returns the next item whose slot is not reserved, creating it if its slot is still empty.
    ///
    /// The item is not reserved, so later calls may return it again once the ring wraps around.
    /// Returns `None` if every slot is reserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::RingPool;
    ///
    /// let mut created = 0;
    /// let mut pool = RingPool::new(
    ///     move || {
    ///         created += 1;
    ///         created
    ///     },
    ///     3,
    ///     0,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(*pool.next().unwrap().unwrap(), 1);
    /// assert_eq!(*pool.next().unwrap().unwrap(), 2);
    /// assert_eq!(*pool.next().unwrap().unwrap(), 3);
    ///
    /// // The ring wraps around and reuses the first item.
    /// assert_eq!(*pool.next().unwrap().unwrap(), 1);
    /// ```
    pub fn next(&mut self) -> Result<Option<&mut T>> {
        self.next_core(false)
    }

    /// Like [`next()`][Self::next] but only inspects the slot under the pointer.
    ///
    /// Returns `None` if that slot is reserved, even if other slots are available. The pointer
    /// advances either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn next_fast(&mut self) -> Result<Option<&mut T>> {
        self.next_core(true)
    }

    fn next_core(&mut self, fast: bool) -> Result<Option<&mut T>> {
        let ring = self.ring.as_mut().ok_or(Error::AlreadyDestroyed)?;

        let Some(index) = ring.next(fast, &mut *self.factory) else {
            return Ok(None);
        };

        Ok(ring.item_mut(index))
    }

    /// Returns the next available item and reserves a slot until the returned [`Reservation`] is
    /// passed to [`release()`][Self::release].
    ///
    /// Which slot is reserved depends on the [`ReservationTarget`] of the pool. With the default
    /// [`ReservationTarget::ReturnedSlot`], it is the slot of the returned item.
    ///
    /// If no item is available, returns `None` together with a no-op reservation. With
    /// [`ReservationTarget::ScanOrigin`], the reservation is also a no-op when the slot it targets
    /// is already reserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::{ReserveOptions, RingPool};
    ///
    /// let mut pool = RingPool::new(|| 0_u64, 1, 0).unwrap();
    ///
    /// let (item, reservation) = pool.reserve_next(ReserveOptions::new()).unwrap();
    /// assert!(item.is_some());
    ///
    /// // The only slot is reserved, so there is nothing else to hand out.
    /// assert!(pool.next().unwrap().is_none());
    ///
    /// pool.release(reservation).unwrap();
    /// assert!(pool.next().unwrap().is_some());
    /// ```
    pub fn reserve_next(
        &mut self,
        options: ReserveOptions,
    ) -> Result<(Option<&mut T>, Reservation)> {
        let ring = self.ring.as_mut().ok_or(Error::AlreadyDestroyed)?;

        let Some(reserved) = ring.reserve(options, self.reservation_target, &mut *self.factory)
        else {
            return Ok((None, Reservation::noop()));
        };

        let reservation = match reserved.reserved {
            Some(slot) => Reservation::new(slot, reserved.generation, options.is_optimize()),
            None => Reservation::noop(),
        };

        Ok((ring.item_mut(reserved.returned), reservation))
    }

    /// Ends a reservation, making its slot available to scans again.
    ///
    /// If the reservation was made with [`ReserveOptions::optimize()`], the slot is also
    /// remembered as a free-index hint so the next scan starts from it.
    ///
    /// Releasing does nothing if the reservation is a no-op or has already ended by other means:
    /// through [`release_all()`][Self::release_all], [`clear()`][Self::clear] or a shrinking
    /// [`resize()`][Self::resize]. A later reservation of the same slot is never affected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn release(&mut self, reservation: Reservation) -> Result<()> {
        let ring = self.ring_mut()?;

        if let (Some(slot), generation, optimize) = reservation.into_parts() {
            ring.release(slot, generation, optimize);
        }

        Ok(())
    }

    /// Ends every outstanding reservation and forgets all free-index hints.
    ///
    /// Tokens of the released reservations may still be passed to [`release()`][Self::release]
    /// afterwards. That does nothing, even if their slots have been reserved again since.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn release_all(&mut self) -> Result<()> {
        let ring = self.ring_mut()?;

        debug!(reserved = ring.reserved_len(), "releasing all reservations");
        ring.release_all();

        Ok(())
    }

    /// Creates a new item through the factory without involving the pool in any way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn unique(&mut self) -> Result<T> {
        self.ring()?;

        Ok((self.factory)())
    }

    /// Inspects the slot under the pointer, returning its item (if already created) and whether
    /// the slot is reserved. Never creates an item and never moves the pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn peek(&self) -> Result<(Option<&T>, bool)> {
        let ring = self.ring()?;

        Ok(ring.peek(ring.pointer()))
    }

    /// Like [`peek()`][Self::peek] but inspects the slot at `index`, reduced modulo the capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::RingPool;
    ///
    /// let pool = RingPool::new(|| 'x', 3, 1).unwrap();
    ///
    /// assert_eq!(pool.peek_at(0).unwrap(), (Some(&'x'), false));
    /// assert_eq!(pool.peek_at(1).unwrap(), (None, false));
    /// assert_eq!(pool.peek_at(3).unwrap(), (Some(&'x'), false));
    /// ```
    pub fn peek_at(&self, index: usize) -> Result<(Option<&T>, bool)> {
        Ok(self.ring()?.peek(index))
    }

    /// Discards every item through the cleanup routine, reserved or not, and forgets all
    /// reservations and free-index hints. The capacity, buffer and pointer stay as they are, and
    /// later scans recreate items through the factory.
    ///
    /// If the cleanup routine panics, the items after the one being cleaned up stay in the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn clear(&mut self) -> Result<()> {
        let ring = self.ring.as_mut().ok_or(Error::AlreadyDestroyed)?;

        debug!(items = ring.len(), "clearing ring pool");
        ring.clear(&mut |item| self.cleanup.call(item));

        Ok(())
    }

    /// Changes the capacity of the pool and, if `buffer` is given, its buffer.
    ///
    /// A capacity of zero is raised to one. When shrinking, every slot at or past the new
    /// capacity is discarded through the cleanup routine along with its reservation. When
    /// growing, new slots below the buffer are populated eagerly and the rest are left empty
    /// until first visited. Without a new buffer, the buffer is lowered to the new capacity if
    /// necessary. Finally, the pointer is clamped to the last slot.
    ///
    /// If a hook panics partway through, the pool is left partially resized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if `buffer` exceeds the new capacity, in which
    /// case the pool is unchanged. Returns [`Error::AlreadyDestroyed`] if the pool has been
    /// destroyed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::RingPool;
    ///
    /// let mut pool = RingPool::new(|| 0_i32, 2, 0).unwrap();
    ///
    /// pool.resize(5, Some(4)).unwrap();
    /// assert_eq!(pool.capacity().unwrap(), 5);
    /// // Slots 2 and 3 are new and below the buffer, so they were populated eagerly.
    /// assert_eq!(pool.len().unwrap(), 2);
    ///
    /// assert!(pool.resize(3, Some(4)).is_err());
    /// assert_eq!(pool.capacity().unwrap(), 5);
    /// ```
    pub fn resize(&mut self, capacity: usize, buffer: Option<usize>) -> Result<()> {
        let ring = self.ring.as_mut().ok_or(Error::AlreadyDestroyed)?;

        let old_capacity = ring.capacity();

        ring.resize(
            capacity,
            buffer,
            &mut *self.factory,
            &mut |item| self.cleanup.call(item),
        )?;

        debug!(
            old_capacity,
            capacity = ring.capacity(),
            buffer = ring.buffer(),
            "resized ring pool"
        );

        Ok(())
    }

    /// Moves the pointer by `distance` slots, wrapping around in either direction, and returns
    /// the new pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::RingPool;
    ///
    /// let mut pool = RingPool::new(|| (), 4, 0).unwrap();
    ///
    /// assert_eq!(pool.jump_pointer(3).unwrap(), 3);
    /// assert_eq!(pool.jump_pointer(2).unwrap(), 1);
    /// assert_eq!(pool.jump_pointer(-2).unwrap(), 3);
    /// ```
    pub fn jump_pointer(&mut self, distance: isize) -> Result<usize> {
        Ok(self.ring_mut()?.jump_pointer(distance))
    }

    /// Moves the pointer to `location`, reduced modulo the capacity, and returns the new pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn set_pointer(&mut self, location: usize) -> Result<usize> {
        Ok(self.ring_mut()?.set_pointer(location))
    }

    /// The number of slots in the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn capacity(&self) -> Result<usize> {
        Ok(self.ring()?.capacity())
    }

    /// The slot the next scan starts from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn pointer(&self) -> Result<usize> {
        Ok(self.ring()?.pointer())
    }

    /// How many slots are populated eagerly at creation and when the pool grows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn buffer(&self) -> Result<usize> {
        Ok(self.ring()?.buffer())
    }

    /// The number of items that have been created and are held by the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn len(&self) -> Result<usize> {
        Ok(self.ring()?.len())
    }

    /// Whether the pool holds no items at all.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The number of slots that are currently reserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn reserved_len(&self) -> Result<usize> {
        Ok(self.ring()?.reserved_len())
    }

    /// Whether the slot at `index` is reserved. The index is reduced modulo the capacity, as in
    /// [`peek_at()`][Self::peek_at].
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has been destroyed.
    pub fn is_reserved(&self, index: usize) -> Result<bool> {
        Ok(self.ring()?.is_reserved(index))
    }

    /// Whether [`destroy()`][Self::destroy] has completed on this pool.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.ring.is_none()
    }

    /// Discards every item through the cleanup routine and renders the pool unusable. Every
    /// later operation returns [`Error::AlreadyDestroyed`].
    ///
    /// If the cleanup routine panics, the pool is not destroyed and the remaining items are
    /// cleaned up again by a later `destroy()` or when the pool is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDestroyed`] if the pool has already been destroyed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ring_pool::{Error, RingPool};
    ///
    /// let mut pool = RingPool::new(|| 1_u8, 2, 2).unwrap();
    ///
    /// pool.destroy().unwrap();
    ///
    /// assert!(pool.is_destroyed());
    /// assert!(matches!(pool.next(), Err(Error::AlreadyDestroyed)));
    /// ```
    pub fn destroy(&mut self) -> Result<()> {
        self.clear()?;

        self.ring = None;

        debug!(item_type = type_name::<T>(), "ring pool destroyed");

        Ok(())
    }

    fn ring(&self) -> Result<&Ring<T>> {
        self.ring.as_ref().ok_or(Error::AlreadyDestroyed)
    }

    fn ring_mut(&mut self) -> Result<&mut Ring<T>> {
        self.ring.as_mut().ok_or(Error::AlreadyDestroyed)
    }
}

impl<T> fmt::Debug for RingPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("RingPool");

        debug.field("item_type", &format_args!("{}", type_name::<T>()));

        if let Some(ring) = &self.ring {
            debug
                .field("capacity", &ring.capacity())
                .field("buffer", &ring.buffer())
                .field("pointer", &ring.pointer())
                .field("len", &ring.len())
                .field("reserved_len", &ring.reserved_len());
        } else {
            debug.field("destroyed", &true);
        }

        debug
            .field("reservation_target", &self.reservation_target)
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for RingPool<T> {
    fn drop(&mut self) {
        let Some(mut ring) = self.ring.take() else {
            return;
        };

        let reserved = ring.reserved_len();

        // If we are already panicking, a panicking cleanup routine would abort the process, so
        // the remaining items are simply dropped along with the ring.
        if thread::panicking() {
            return;
        }

        debug!(
            items = ring.len(),
            reserved, "tearing down ring pool on drop"
        );
        ring.clear(&mut |item| self.cleanup.call(item));

        if self.drop_policy == DropPolicy::MustNotDropReserved {
            assert!(
                reserved == 0,
                "dropped a ring pool of {} with {reserved} reserved slots and a policy that says none may be reserved when dropped",
                type_name::<T>()
            );
        }
    }
}
