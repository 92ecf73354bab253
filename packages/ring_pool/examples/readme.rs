//! Example that demonstrates the usage shown in the crate documentation.
//!
//! This shows how to use `RingPool` to recycle scratch buffers.

use ring_pool::{ReserveOptions, RingPool};

fn main() {
    println!("=== Ring Pool README Example ===");

    // A pool of four scratch buffers, two of which are allocated up front.
    let mut pool = RingPool::new(|| Vec::<u8>::with_capacity(4096), 4, 2).unwrap();

    // Borrow a buffer for a moment. It goes back into rotation immediately.
    let buffer = pool.next().unwrap().unwrap();
    buffer.clear();
    buffer.extend_from_slice(b"hello");
    println!("Wrote {} bytes into a pooled buffer", buffer.len());

    // Check a buffer out until we are done with it.
    let (buffer, reservation) = pool.reserve_next(ReserveOptions::new().optimize()).unwrap();
    buffer.unwrap().push(42);
    println!("Reserved slots: {}", pool.reserved_len().unwrap());

    // Releasing it makes its slot the first candidate of the next scan.
    pool.release(reservation).unwrap();
    println!("Reserved slots after release: {}", pool.reserved_len().unwrap());

    pool.destroy().unwrap();

    println!("README example completed successfully!");
}
