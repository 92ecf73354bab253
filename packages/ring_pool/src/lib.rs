#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-capacity object pool that hands out reusable items in ring order.
//!
//! This crate provides [`RingPool`], a pool with a fixed number of slots that are populated
//! lazily by a caller-supplied factory. Instead of creating a new item for every request, the
//! pool walks its slots in a circle and hands out the item of the next slot that is not
//! reserved, creating it only on the first visit.
//!
//! # Key Features
//!
//! - **Lazy population**: items are created on first use, with an optional eagerly populated
//!   buffer of slots at creation and when the pool grows.
//! - **Round-robin reuse**: successive requests cycle through every slot before revisiting one.
//! - **Reservations**: [`RingPool::reserve_next()`] checks an item out exclusively until the
//!   returned [`Reservation`] is released, and every scan skips reserved slots.
//! - **Free-index hints**: reservations released with [`ReserveOptions::optimize()`] make the
//!   released slot the first candidate of the next scan.
//! - **Bounded scans**: a scan inspects at most one lap of the ring, so a fully reserved pool
//!   answers with `None` instead of spinning.
//! - **Custom cleanup**: a pluggable routine receives every item the pool discards on
//!   [`clear()`][RingPool::clear], shrinking [`resize()`][RingPool::resize],
//!   [`destroy()`][RingPool::destroy] and drop.
//!
//! # Example
//!
//! ```rust
//! use ring_pool::{ReserveOptions, RingPool};
//!
//! // A pool of four scratch buffers, two of which are allocated up front.
//! let mut pool = RingPool::new(|| Vec::<u8>::with_capacity(4096), 4, 2).unwrap();
//!
//! // Borrow a buffer for a moment. It goes back into rotation immediately.
//! let buffer = pool.next().unwrap().unwrap();
//! buffer.clear();
//! buffer.extend_from_slice(b"hello");
//!
//! // Check a buffer out until we are done with it.
//! let (buffer, reservation) = pool.reserve_next(ReserveOptions::new().optimize()).unwrap();
//! buffer.unwrap().push(42);
//! assert_eq!(pool.reserved_len().unwrap(), 1);
//!
//! // Releasing it makes its slot the first candidate of the next scan.
//! pool.release(reservation).unwrap();
//! assert_eq!(pool.reserved_len().unwrap(), 0);
//!
//! pool.destroy().unwrap();
//! ```
//!
//! # Logging
//!
//! The pool emits [`tracing`] events: `debug` for lifecycle transitions such as creation,
//! resizing and teardown, `trace` for individual item creation, reservations and releases.

mod builder;
mod drop_policy;
mod error;
mod pool;
mod reservation;
mod ring;

pub use builder::*;
pub use drop_policy::*;
pub(crate) use error::buffer_exceeds_capacity;
pub use error::{Error, Result};
pub use pool::RingPool;
pub use reservation::*;
pub(crate) use ring::*;
