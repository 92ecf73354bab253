use std::iter;

use tracing::trace;

use crate::{ReservationTarget, ReserveOptions, Result, buffer_exceeds_capacity};

/// The state machine behind a `RingPool`: slot storage, the scanning pointer, the per-slot
/// reservation flags and the free-index hints.
///
/// The ring does not own the factory or cleanup hooks. Every operation that may create or discard
/// items borrows them from the caller for the duration of the call.
///
/// The ring never holds an index at or past its capacity: not in the pointer, not in the slot
/// storage and not in the free-index hints.
#[derive(Debug)]
pub(crate) struct Ring<T> {
    /// One entry per slot. The length of this Vec is the capacity of the ring.
    slots: Vec<Slot<T>>,

    /// The next slot to be inspected by a scan. Always less than the capacity.
    pointer: usize,

    /// How many slots to populate eagerly at creation and when the ring grows.
    buffer: usize,

    /// Slots recently released with the optimize option, most recent last. This is a hint,
    /// not the ground truth - a hinted slot may have been reserved again since it was pushed.
    free_hints: Vec<usize>,

    /// Stamped into the next reservation and then advanced, so every reservation made by this
    /// ring carries a distinct generation.
    next_generation: u64,
}

#[derive(Debug)]
struct Slot<T> {
    /// `None` until first handed out or eagerly populated.
    item: Option<T>,

    reserved: bool,

    /// The generation of the reservation that currently holds the slot. Only meaningful while
    /// `reserved` is set.
    generation: u64,
}

impl<T> Slot<T> {
    const fn vacant() -> Self {
        Self {
            item: None,
            reserved: false,
            generation: 0,
        }
    }
}

/// The outcome of a successful reservation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Reserved {
    /// The slot whose item the scan returned.
    pub(crate) returned: usize,

    /// The slot that was marked reserved. `None` if the targeted slot was already held by
    /// another reservation, in which case nothing was marked.
    pub(crate) reserved: Option<usize>,

    /// Identifies this reservation to [`Ring::release()`].
    pub(crate) generation: u64,
}

impl<T> Ring<T> {
    /// Creates an unpopulated ring. The caller has validated that `capacity` is non-zero and that
    /// `buffer` does not exceed it.
    pub(crate) fn new(capacity: usize, buffer: usize) -> Self {
        debug_assert!(capacity > 0);
        debug_assert!(buffer <= capacity);

        Self {
            slots: iter::repeat_with(Slot::vacant).take(capacity).collect(),
            pointer: 0,
            buffer,
            free_hints: Vec::new(),
            next_generation: 0,
        }
    }

    /// Populates the first `buffer` slots by scanning the ring, then rewinds the pointer so the
    /// warm-up is invisible to the first real caller.
    pub(crate) fn prewarm(&mut self, factory: &mut dyn FnMut() -> T) {
        for _ in 0..self.buffer {
            _ = self.scan(false, factory);
        }

        self.pointer = 0;
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn pointer(&self) -> usize {
        self.pointer
    }

    pub(crate) fn buffer(&self) -> usize {
        self.buffer
    }

    /// The number of slots that currently hold an item.
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.item.is_some()).count()
    }

    pub(crate) fn reserved_len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.reserved).count()
    }

    /// Whether the slot is reserved. The index is reduced modulo the capacity, as in
    /// [`peek()`][Self::peek].
    pub(crate) fn is_reserved(&self, index: usize) -> bool {
        self.slot(wrap(index, 0, self.capacity())).reserved
    }

    #[cfg(test)]
    pub(crate) fn free_hints(&self) -> &[usize] {
        &self.free_hints
    }

    pub(crate) fn item_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.item.as_mut()
    }

    /// Returns the item in the slot (if created) and whether the slot is reserved.
    ///
    /// The index is reduced modulo the capacity. Never creates an item, never moves the pointer.
    pub(crate) fn peek(&self, index: usize) -> (Option<&T>, bool) {
        let slot = self.slot(wrap(index, 0, self.capacity()));

        (slot.item.as_ref(), slot.reserved)
    }

    /// Finds the next unreserved slot, creating its item if necessary, and returns its index.
    ///
    /// If a free-index hint is available, the scan starts from the hinted slot instead and the
    /// pointer is restored afterwards, so hinted lookups do not move the ring forward.
    pub(crate) fn next(&mut self, fast: bool, factory: &mut dyn FnMut() -> T) -> Option<usize> {
        match self.free_hints.pop() {
            Some(hint) => self.scan_from_hint(hint, fast, factory),
            None => self.scan(fast, factory),
        }
    }

    /// Scans starting at `hint` without committing the pointer movement caused by the scan.
    fn scan_from_hint(
        &mut self,
        hint: usize,
        fast: bool,
        factory: &mut dyn FnMut() -> T,
    ) -> Option<usize> {
        debug_assert!(hint < self.capacity());

        trace!(hint, pointer = self.pointer, "scanning from free-index hint");

        let saved_pointer = self.pointer;
        self.pointer = hint;

        let found = self.scan(fast, factory);

        self.pointer = saved_pointer;
        found
    }

    /// Walks the ring from the pointer, inspecting at most `capacity` slots (or one slot if
    /// `fast`). The pointer advances past every inspected slot, including the one returned.
    fn scan(&mut self, fast: bool, factory: &mut dyn FnMut() -> T) -> Option<usize> {
        let capacity = self.capacity();
        let mut found = None;

        for _ in 0..capacity {
            let index = self.pointer;
            let slot = self.slot_mut(index);

            if !slot.reserved {
                if slot.item.is_none() {
                    trace!(index, "creating item for slot");
                    slot.item = Some(factory());
                }

                found = Some(index);
            }

            self.pointer = wrap(index, 1, capacity);

            if found.is_some() || fast {
                break;
            }
        }

        found
    }

    /// Runs [`next()`][Self::next] and marks a slot reserved if an item was found.
    ///
    /// With [`ReservationTarget::ScanOrigin`], the origin slot may already be reserved. It is then
    /// left to its current holder and no slot is marked.
    pub(crate) fn reserve(
        &mut self,
        options: ReserveOptions,
        target: ReservationTarget,
        factory: &mut dyn FnMut() -> T,
    ) -> Option<Reserved> {
        let origin = self.pointer;

        let returned = self.next(options.is_fast(), factory)?;

        let reserved = match target {
            ReservationTarget::ReturnedSlot => returned,
            ReservationTarget::ScanOrigin => origin,
        };

        let generation = self.next_generation;
        let slot = self.slot_mut(reserved);

        if slot.reserved {
            trace!(returned, reserved, "scan origin is already reserved, reserving nothing");

            return Some(Reserved {
                returned,
                reserved: None,
                generation,
            });
        }

        slot.reserved = true;
        slot.generation = generation;
        self.next_generation = generation.wrapping_add(1);

        trace!(returned, reserved, generation, "reserved slot");

        Some(Reserved {
            returned,
            reserved: Some(reserved),
            generation,
        })
    }

    /// Makes a reserved slot available again, optionally leaving a free-index hint for it.
    ///
    /// The release only takes effect if the slot is still held by the reservation of the given
    /// `generation`. Slots released since (by `release_all()`, `clear()` or a shrink) and
    /// possibly reserved again by someone else are left alone.
    pub(crate) fn release(&mut self, index: usize, generation: u64, optimize: bool) {
        let Some(slot) = self.slots.get_mut(index) else {
            trace!(index, "ignoring release of slot beyond capacity");
            return;
        };

        if !slot.reserved || slot.generation != generation {
            trace!(index, generation, "ignoring release of stale reservation");
            return;
        }

        slot.reserved = false;

        if optimize {
            self.free_hints.push(index);
        }

        trace!(index, optimize, "released slot");
    }

    /// Releases every reservation and forgets every free-index hint.
    pub(crate) fn release_all(&mut self) {
        for slot in &mut self.slots {
            slot.reserved = false;
        }

        self.free_hints.clear();
    }

    /// Discards every item (reserved or not) through `cleanup` and forgets all reservations and
    /// hints. Capacity, buffer and pointer are unchanged.
    ///
    /// If `cleanup` panics, the items after the one being cleaned up remain in the ring.
    pub(crate) fn clear(&mut self, cleanup: &mut dyn FnMut(T)) {
        self.free_hints.clear();

        for slot in &mut self.slots {
            slot.reserved = false;

            if let Some(item) = slot.item.take() {
                cleanup(item);
            }
        }
    }

    /// Changes the capacity (floored to 1) and optionally the buffer of the ring.
    ///
    /// Validation happens before any state is touched. If a hook panics partway through a shrink
    /// or growth, the ring is left partially resized but still internally consistent.
    pub(crate) fn resize(
        &mut self,
        capacity: usize,
        buffer: Option<usize>,
        factory: &mut dyn FnMut() -> T,
        cleanup: &mut dyn FnMut(T),
    ) -> Result<()> {
        let new_capacity = capacity.max(1);

        if let Some(buffer) = buffer {
            if buffer > new_capacity {
                return Err(buffer_exceeds_capacity(buffer, new_capacity));
            }

            self.buffer = buffer;
        } else {
            self.buffer = self.buffer.min(new_capacity);
        }

        let old_capacity = self.capacity();

        if new_capacity < old_capacity {
            self.shrink(new_capacity, cleanup);
        } else if new_capacity > old_capacity {
            self.grow(new_capacity, factory);
        }

        self.pointer = self.pointer.min(new_capacity.saturating_sub(1));

        Ok(())
    }

    fn shrink(&mut self, new_capacity: usize, cleanup: &mut dyn FnMut(T)) {
        self.free_hints.retain(|&hint| hint < new_capacity);

        // Each slot is removed before its item is cleaned up, so a panicking cleanup cannot
        // leave a slot with a taken item past the new capacity.
        while self.slots.len() > new_capacity {
            let Some(slot) = self.slots.pop() else {
                break;
            };

            if let Some(item) = slot.item {
                cleanup(item);
            }
        }
    }

    fn grow(&mut self, new_capacity: usize, factory: &mut dyn FnMut() -> T) {
        let old_capacity = self.capacity();

        self.slots.resize_with(new_capacity, Slot::vacant);

        // Only the new slots below the buffer are populated eagerly, the rest stay lazy.
        for index in old_capacity..new_capacity.min(self.buffer) {
            trace!(index, "creating buffered item for new slot");
            self.slot_mut(index).item = Some(factory());
        }
    }

    /// Moves the pointer by `distance` slots, wrapping in either direction.
    pub(crate) fn jump_pointer(&mut self, distance: isize) -> usize {
        let capacity = self.capacity();
        let capacity_signed =
            isize::try_from(capacity).expect("a Vec never holds more than isize::MAX items");

        let forward = usize::try_from(distance.rem_euclid(capacity_signed))
            .expect("rem_euclid with a positive modulus is never negative");

        self.pointer = wrap(self.pointer, forward, capacity);
        self.pointer
    }

    pub(crate) fn set_pointer(&mut self, location: usize) -> usize {
        self.pointer = wrap(location, 0, self.capacity());
        self.pointer
    }

    fn slot(&self, index: usize) -> &Slot<T> {
        self.slots
            .get(index)
            .expect("slot indexes are always kept below the capacity")
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot<T> {
        self.slots
            .get_mut(index)
            .expect("slot indexes are always kept below the capacity")
    }
}

/// `(index + offset) mod capacity` without overflow for any `index` and `offset < capacity`.
fn wrap(index: usize, offset: usize, capacity: usize) -> usize {
    let index = index
        .checked_rem(capacity)
        .expect("ring capacity is never zero");

    // index + offset may overflow for huge capacities, so we wrap before adding.
    let remaining = capacity.wrapping_sub(index);
    if offset >= remaining {
        offset.wrapping_sub(remaining)
    } else {
        index.wrapping_add(offset)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(
        clippy::indexing_slicing,
        reason = "we do not need to worry about these things when writing test code"
    )]

    use super::*;

    /// A factory that produces 0, 1, 2, ... so items identify the order they were created in.
    fn counter() -> impl FnMut() -> usize {
        let mut next = 0;
        move || {
            let value = next;
            next += 1;
            value
        }
    }

    fn discard(_: usize) {}

    fn prewarmed(capacity: usize, buffer: usize, factory: &mut dyn FnMut() -> usize) -> Ring<usize> {
        let mut ring = Ring::new(capacity, buffer);
        ring.prewarm(factory);
        ring
    }

    #[test]
    fn wrap_handles_extremes() {
        assert_eq!(wrap(0, 0, 1), 0);
        assert_eq!(wrap(2, 1, 3), 0);
        assert_eq!(wrap(7, 0, 3), 1);
        assert_eq!(wrap(usize::MAX - 1, 1, usize::MAX), 0);
        assert_eq!(wrap(usize::MAX - 1, usize::MAX - 1, usize::MAX), usize::MAX - 2);
    }

    #[test]
    fn prewarm_populates_buffer_and_rewinds() {
        let mut factory = counter();
        let ring = prewarmed(5, 3, &mut factory);

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pointer(), 0);
        assert_eq!(ring.peek(0), (Some(&0), false));
        assert_eq!(ring.peek(2), (Some(&2), false));
        assert_eq!(ring.peek(3), (None, false));
    }

    #[test]
    fn scan_skips_reserved_and_advances_past_result() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.slots[0].reserved = true;

        assert_eq!(ring.next(false, &mut factory), Some(1));
        assert_eq!(ring.pointer(), 2);
    }

    #[test]
    fn fully_reserved_scan_visits_every_slot_once() {
        let mut factory = counter();
        let mut ring = prewarmed(4, 0, &mut factory);

        for slot in &mut ring.slots {
            slot.reserved = true;
        }
        ring.pointer = 2;

        assert_eq!(ring.next(false, &mut factory), None);
        // A full lap brings the pointer back to where it started.
        assert_eq!(ring.pointer(), 2);
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn fast_scan_inspects_one_slot() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.slots[0].reserved = true;

        assert_eq!(ring.next(true, &mut factory), None);
        assert_eq!(ring.pointer(), 1);
        assert_eq!(ring.next(true, &mut factory), Some(1));
    }

    #[test]
    fn hinted_scan_restores_pointer() {
        let mut factory = counter();
        let mut ring = prewarmed(4, 4, &mut factory);

        ring.free_hints.push(3);

        assert_eq!(ring.next(false, &mut factory), Some(3));
        assert_eq!(ring.pointer(), 0);
        assert!(ring.free_hints().is_empty());
    }

    #[test]
    fn stale_hint_scans_onward() {
        let mut factory = counter();
        let mut ring = prewarmed(4, 0, &mut factory);

        // The hinted slot has been reserved again since the hint was pushed.
        ring.free_hints.push(1);
        ring.slots[1].reserved = true;

        assert_eq!(ring.next(false, &mut factory), Some(2));
        assert_eq!(ring.pointer(), 0);
    }

    #[test]
    fn reserve_targets_returned_slot() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.slots[0].reserved = true;

        let reserved = ring
            .reserve(
                ReserveOptions::new(),
                ReservationTarget::ReturnedSlot,
                &mut factory,
            )
            .unwrap();

        assert_eq!(
            reserved,
            Reserved {
                returned: 1,
                reserved: Some(1),
                generation: 0,
            }
        );
        assert!(ring.is_reserved(1));
        assert_eq!(ring.reserved_len(), 2);
    }

    #[test]
    fn reserve_targets_scan_origin() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.slots[0].reserved = true;

        let reserved = ring
            .reserve(
                ReserveOptions::new(),
                ReservationTarget::ScanOrigin,
                &mut factory,
            )
            .unwrap();

        // The origin was already reserved, so nothing new is reserved at all.
        assert_eq!(reserved.returned, 1);
        assert_eq!(reserved.reserved, None);
        assert!(ring.is_reserved(0));
        assert!(!ring.is_reserved(1));
        assert_eq!(ring.reserved_len(), 1);
    }

    #[test]
    fn reserve_targets_unreserved_scan_origin() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.free_hints.push(2);

        let reserved = ring
            .reserve(
                ReserveOptions::new(),
                ReservationTarget::ScanOrigin,
                &mut factory,
            )
            .unwrap();

        assert_eq!(reserved.returned, 2);
        assert_eq!(reserved.reserved, Some(0));
        assert!(ring.is_reserved(0));
        assert!(!ring.is_reserved(2));
    }

    #[test]
    fn each_reservation_gets_a_new_generation() {
        let mut factory = counter();
        let mut ring = prewarmed(2, 0, &mut factory);

        let first = ring
            .reserve(ReserveOptions::new(), ReservationTarget::ReturnedSlot, &mut factory)
            .unwrap();
        ring.release(0, first.generation, false);

        let second = ring
            .reserve(ReserveOptions::new(), ReservationTarget::ReturnedSlot, &mut factory)
            .unwrap();

        assert_ne!(first.generation, second.generation);
    }

    #[test]
    fn reserve_with_nothing_available_reserves_nothing() {
        let mut factory = counter();
        let mut ring = prewarmed(2, 0, &mut factory);

        for slot in &mut ring.slots {
            slot.reserved = true;
        }

        assert!(
            ring.reserve(
                ReserveOptions::new(),
                ReservationTarget::ReturnedSlot,
                &mut factory,
            )
            .is_none()
        );
    }

    #[test]
    fn release_with_optimize_pushes_hint() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.slots[1].reserved = true;
        ring.slots[2].reserved = true;

        ring.release(1, 0, false);
        assert!(ring.free_hints().is_empty());

        ring.release(2, 0, true);
        assert_eq!(ring.free_hints(), &[2]);
        assert_eq!(ring.reserved_len(), 0);
    }

    #[test]
    fn release_beyond_capacity_is_ignored() {
        let mut factory = counter();
        let mut ring = prewarmed(2, 0, &mut factory);

        ring.release(5, 0, true);

        assert!(ring.free_hints().is_empty());
    }

    #[test]
    fn release_of_stale_generation_is_ignored() {
        let mut factory = counter();
        let mut ring = prewarmed(1, 0, &mut factory);

        let stale = ring
            .reserve(ReserveOptions::new(), ReservationTarget::ReturnedSlot, &mut factory)
            .unwrap();
        ring.release_all();

        let current = ring
            .reserve(ReserveOptions::new(), ReservationTarget::ReturnedSlot, &mut factory)
            .unwrap();

        ring.release(0, stale.generation, true);

        assert!(ring.is_reserved(0));
        assert!(ring.free_hints().is_empty());
        assert_eq!(ring.next(false, &mut factory), None);

        ring.release(0, current.generation, false);
        assert!(!ring.is_reserved(0));
    }

    #[test]
    fn release_of_unreserved_slot_leaves_no_hint() {
        let mut factory = counter();
        let mut ring = prewarmed(2, 0, &mut factory);

        ring.release(1, 0, true);

        assert!(ring.free_hints().is_empty());
    }

    #[test]
    fn release_all_forgets_hints() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.slots[0].reserved = true;
        ring.slots[1].reserved = true;
        ring.free_hints.push(2);

        ring.release_all();

        assert_eq!(ring.reserved_len(), 0);
        assert!(ring.free_hints().is_empty());
    }

    #[test]
    fn clear_cleans_every_item_once() {
        let mut factory = counter();
        let mut ring = prewarmed(4, 3, &mut factory);
        ring.slots[1].reserved = true;
        ring.free_hints.push(2);
        ring.pointer = 2;

        let mut cleaned = Vec::new();
        ring.clear(&mut |item: usize| cleaned.push(item));

        assert_eq!(cleaned, vec![0, 1, 2]);
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.reserved_len(), 0);
        assert!(ring.free_hints().is_empty());
        assert_eq!(ring.pointer(), 2);
        assert_eq!(ring.capacity(), 4);
        assert_eq!(ring.buffer(), 3);
    }

    #[test]
    fn shrink_discards_tail_and_clamps_pointer() {
        let mut factory = counter();
        let mut ring = prewarmed(5, 5, &mut factory);
        ring.slots[4].reserved = true;
        ring.free_hints.extend([1, 4]);
        ring.pointer = 4;

        let mut cleaned = Vec::new();
        ring.resize(2, None, &mut factory, &mut |item: usize| cleaned.push(item))
            .unwrap();

        cleaned.sort_unstable();
        assert_eq!(cleaned, vec![2, 3, 4]);
        assert_eq!(ring.capacity(), 2);
        assert_eq!(ring.pointer(), 1);
        assert_eq!(ring.buffer(), 2);
        assert_eq!(ring.reserved_len(), 0);
        assert_eq!(ring.free_hints(), &[1]);
    }

    #[test]
    fn grow_populates_up_to_buffer() {
        let mut factory = counter();
        let mut ring = prewarmed(2, 0, &mut factory);

        ring.resize(6, Some(4), &mut factory, &mut discard).unwrap();

        assert_eq!(ring.capacity(), 6);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.peek(2), (Some(&0), false));
        assert_eq!(ring.peek(3), (Some(&1), false));
        assert_eq!(ring.peek(4), (None, false));
        assert_eq!(ring.pointer(), 0);
    }

    #[test]
    fn resize_rejects_buffer_above_capacity_untouched() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 1, &mut factory);

        assert!(ring.resize(2, Some(3), &mut factory, &mut discard).is_err());

        assert_eq!(ring.capacity(), 3);
        assert_eq!(ring.buffer(), 1);
    }

    #[test]
    fn resize_to_zero_floors_to_one() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.resize(0, None, &mut factory, &mut discard).unwrap();

        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.buffer(), 0);
    }

    #[test]
    fn resize_to_same_capacity_updates_buffer_only() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.resize(3, Some(2), &mut factory, &mut discard).unwrap();

        assert_eq!(ring.buffer(), 2);
        assert_eq!(ring.len(), 0);
    }

    #[test]
    fn jump_pointer_wraps_both_ways() {
        let mut factory = counter();
        let mut ring = prewarmed(5, 0, &mut factory);

        assert_eq!(ring.jump_pointer(3), 3);
        assert_eq!(ring.jump_pointer(4), 2);
        assert_eq!(ring.jump_pointer(-3), 4);
        assert_eq!(ring.jump_pointer(-12), 2);
    }

    #[test]
    fn set_pointer_wraps() {
        let mut factory = counter();
        let mut ring = prewarmed(4, 0, &mut factory);

        assert_eq!(ring.set_pointer(3), 3);
        assert_eq!(ring.set_pointer(9), 1);
    }

    #[test]
    fn peek_wraps_index() {
        let mut factory = counter();
        let ring = prewarmed(3, 1, &mut factory);

        assert_eq!(ring.peek(3), (Some(&0), false));
    }

    #[test]
    fn is_reserved_wraps_index_like_peek() {
        let mut factory = counter();
        let mut ring = prewarmed(3, 0, &mut factory);

        ring.slots[1].reserved = true;

        assert!(ring.is_reserved(4));
        assert_eq!(ring.peek(4).1, ring.is_reserved(4));
        assert!(!ring.is_reserved(3));
    }
}
