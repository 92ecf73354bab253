//! Basic usage of the `ring_pool` crate:
//!
//! * Creating a pool with a partially pre-populated buffer.
//! * Cycling through items in ring order.
//! * Reserving an item and releasing it again.
//! * Resizing and tearing down the pool.

use ring_pool::{ReserveOptions, RingPool};

fn main() {
    let mut next_id = 0;
    let mut pool = RingPool::builder(move || {
        next_id += 1;
        format!("connection-{next_id}")
    })
    .capacity(3)
    .buffer(1)
    .cleanup(|item| println!("Closing {item}"))
    .build()
    .unwrap();

    println!(
        "Pool has {} slots, {} of which are populated",
        pool.capacity().unwrap(),
        pool.len().unwrap()
    );

    // Items are handed out in ring order and created the first time their slot is visited.
    for _ in 0..4 {
        let item = pool.next().unwrap().unwrap();
        println!("Got {item}");
    }

    // A reserved item is skipped by every scan until it is released.
    let (item, reservation) = pool.reserve_next(ReserveOptions::new()).unwrap();
    println!("Reserved {}", item.unwrap());

    for _ in 0..3 {
        let item = pool.next().unwrap().unwrap();
        println!("Got {item} while one slot is reserved");
    }

    pool.release(reservation).unwrap();

    // Shrinking discards the items in the removed slots through the cleanup routine.
    pool.resize(1, None).unwrap();

    // Destroying discards the rest. The pool cannot be used afterwards.
    pool.destroy().unwrap();
    assert!(pool.next().is_err());
}
