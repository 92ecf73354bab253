/// A single-use token for a slot reserved via [`RingPool::reserve_next()`][1].
///
/// While the reservation is outstanding, the reserved slot is skipped by every scan of the ring.
/// Pass the token to [`RingPool::release()`][2] to make the slot available again. The token
/// cannot be copied or cloned, so each reservation can be released at most once.
///
/// If the pool had no available item when the reservation was attempted, or the targeted slot
/// was already held by another reservation, the token is a no-op and releasing it does nothing.
///
/// A token only ever ends its own reservation. If the slot was released by other means since
/// (for example by [`RingPool::release_all()`][3] or [`RingPool::clear()`][4]), releasing the
/// token does nothing, even if the slot has been reserved again by another caller.
///
/// The token does not remember which pool issued it. Releasing it into a different pool is a
/// logic error.
///
/// [1]: crate::RingPool::reserve_next
/// [2]: crate::RingPool::release
/// [3]: crate::RingPool::release_all
/// [4]: crate::RingPool::clear
#[derive(Debug, Eq, PartialEq)]
#[must_use = "a reserved slot stays unavailable until the reservation is released"]
pub struct Reservation {
    slot: Option<usize>,
    generation: u64,
    optimize: bool,
}

impl Reservation {
    pub(crate) fn new(slot: usize, generation: u64, optimize: bool) -> Self {
        Self {
            slot: Some(slot),
            generation,
            optimize,
        }
    }

    pub(crate) fn noop() -> Self {
        Self {
            slot: None,
            generation: 0,
            optimize: false,
        }
    }

    /// The index of the reserved slot, or `None` if this is a no-op reservation.
    #[must_use]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    /// Whether releasing this reservation does nothing because no slot was reserved.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.slot.is_none()
    }

    /// Whether releasing this reservation records the slot as a free-index hint.
    #[must_use]
    pub fn is_optimized(&self) -> bool {
        self.optimize
    }

    pub(crate) fn into_parts(self) -> (Option<usize>, u64, bool) {
        (self.slot, self.generation, self.optimize)
    }
}

/// Options for [`RingPool::reserve_next()`][crate::RingPool::reserve_next].
///
/// The default options perform a full scan of the ring and release without leaving a hint.
///
/// # Examples
///
/// ```
/// use ring_pool::ReserveOptions;
///
/// let options = ReserveOptions::new().optimize().fast();
///
/// assert!(options.is_optimize());
/// assert!(options.is_fast());
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReserveOptions {
    optimize: bool,
    fast: bool,
}

impl ReserveOptions {
    /// Creates the default options: full scan, no hint on release.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            optimize: false,
            fast: false,
        }
    }

    /// On release, pushes the reserved slot onto the free-index hints so that the next
    /// scan starts from it instead of from the pointer.
    #[must_use]
    pub const fn optimize(mut self) -> Self {
        self.optimize = true;
        self
    }

    /// Inspects only the slot under the pointer. If that slot is reserved, no item is
    /// returned even if other slots are available.
    #[must_use]
    pub const fn fast(mut self) -> Self {
        self.fast = true;
        self
    }

    /// Whether releasing the reservation leaves a free-index hint.
    #[must_use]
    pub const fn is_optimize(self) -> bool {
        self.optimize
    }

    /// Whether the reservation inspects only a single slot.
    #[must_use]
    pub const fn is_fast(self) -> bool {
        self.fast
    }
}

/// Selects which slot [`RingPool::reserve_next()`][crate::RingPool::reserve_next] reserves.
///
/// The two differ only when the scan does not return the item under the pointer, either because
/// that slot was already reserved and the scan moved on, or because a free-index hint redirected
/// the scan to a different slot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum ReservationTarget {
    /// Reserves the slot whose item was returned to the caller. This is the default.
    #[default]
    ReturnedSlot,

    /// Reserves the slot the pointer designated before the scan started.
    ///
    /// When the scan is redirected, the returned item stays available to other callers while an
    /// unrelated slot becomes reserved. If that slot is already reserved, nothing is reserved and
    /// the returned token is a no-op. Only use this when reproducing that exact ring behavior
    /// is required.
    ScanOrigin,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(Reservation: Send, Sync);
    assert_not_impl_any!(Reservation: Clone, Copy);

    #[test]
    fn noop_reservation_has_no_slot() {
        let reservation = Reservation::noop();

        assert!(reservation.is_noop());
        assert_eq!(reservation.slot(), None);
        assert!(!reservation.is_optimized());
    }

    #[test]
    fn reservation_remembers_slot_and_optimize() {
        let reservation = Reservation::new(3, 7, true);

        assert!(!reservation.is_noop());
        assert_eq!(reservation.slot(), Some(3));
        assert!(reservation.is_optimized());
        assert_eq!(reservation.into_parts(), (Some(3), 7, true));
    }

    #[test]
    fn default_options_are_plain() {
        let options = ReserveOptions::default();

        assert_eq!(options, ReserveOptions::new());
        assert!(!options.is_optimize());
        assert!(!options.is_fast());
    }

    #[test]
    fn options_compose() {
        assert!(ReserveOptions::new().optimize().is_optimize());
        assert!(!ReserveOptions::new().optimize().is_fast());
        assert!(ReserveOptions::new().fast().is_fast());
    }

    #[test]
    fn returned_slot_is_default_target() {
        assert_eq!(ReservationTarget::default(), ReservationTarget::ReturnedSlot);
    }
}
