/// Determines what happens when a [`RingPool`][crate::RingPool] is dropped without having
/// been explicitly destroyed.
///
/// In either case, the pool runs its cleanup routine on every item it still holds.
///
/// # Examples
///
/// ```
/// use ring_pool::{DropPolicy, RingPool};
///
/// // The drop policy is set at pool creation time.
/// let pool = RingPool::builder(String::new)
///     .capacity(4)
///     .drop_policy(DropPolicy::MustNotDropReserved)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The pool may be dropped while some of its items are still reserved. This is the default.
    #[default]
    MayDropReserved,

    /// The pool will panic if any of its items are still reserved when it is dropped.
    ///
    /// This may be valuable if reservations represent work that must be completed and
    /// released before the pool goes away, so a forgotten release is surfaced loudly.
    MustNotDropReserved,
}
