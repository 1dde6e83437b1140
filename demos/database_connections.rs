//! Pools mock database connections across worker threads.
//!
//! Run with: `cargo run --example database_connections`

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use slotpool::{AllocError, Allocator, LockPool, PoolConfig, Poolable, SlotHandle};

struct Connection {
    slot: SlotHandle<Connection>,
    id: u64,
}

impl Connection {
    fn query(&self, sql: &str) -> String {
        // stand-in for real I/O
        thread::sleep(Duration::from_millis(2));
        format!("conn#{} -> {sql}", self.id)
    }
}

impl Poolable for Connection {
    fn slot(&self) -> &SlotHandle<Self> {
        &self.slot
    }
}

#[derive(Default)]
struct Connector {
    next_id: AtomicU64,
}

impl Allocator<Connection> for Connector {
    fn allocate(&self, slot: SlotHandle<Connection>) -> Result<Connection, AllocError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        println!("opening connection #{id}");
        Ok(Connection { slot, id })
    }

    fn deallocate(&self, connection: Connection) -> Result<(), AllocError> {
        println!("closing connection #{}", connection.id);
        Ok(())
    }
}

fn main() {
    let config = PoolConfig::builder()
        .size(3)
        .ttl(Duration::from_secs(30))
        .allocator(Connector::default())
        .build()
        .expect("configuration is valid");
    let pool = LockPool::new(config);

    let mut workers = Vec::new();
    for worker in 0..8 {
        let pool = pool.clone();
        workers.push(thread::spawn(move || {
            for query in 0..5 {
                let conn = pool.claim().expect("pool is running");
                let row = conn.query(&format!("SELECT {worker}, {query}"));
                println!("{row}");
                conn.release();
            }
        }));
    }
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    // at most three connections were ever opened
    pool.shutdown().wait();
    println!("pool drained");
}
