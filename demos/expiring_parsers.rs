//! Demonstrates TTL expiry with the queue variant: parsers older than the
//! TTL are rebuilt by the background allocator actor.
//!
//! Run with: `cargo run --example expiring_parsers`

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use slotpool::{AllocError, Allocator, PoolConfig, Poolable, QueuePool, SlotHandle};

struct Parser {
    slot: SlotHandle<Parser>,
    generation: u64,
}

impl Parser {
    fn parse(&self, input: &str) -> usize {
        input.split_whitespace().count()
    }
}

impl Poolable for Parser {
    fn slot(&self) -> &SlotHandle<Self> {
        &self.slot
    }
}

#[derive(Default)]
struct ParserFactory {
    generation: AtomicU64,
}

impl Allocator<Parser> for ParserFactory {
    fn allocate(&self, slot: SlotHandle<Parser>) -> Result<Parser, AllocError> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        println!("building parser generation {generation}");
        Ok(Parser { slot, generation })
    }
}

fn main() {
    let config = PoolConfig::builder()
        .size(2)
        .ttl(Duration::from_millis(100))
        .allocator(ParserFactory::default())
        .build()
        .expect("configuration is valid");
    let pool = QueuePool::new(config);

    for round in 0..4 {
        let parser = pool.claim().expect("pool is running");
        let words = parser.parse("the quick brown fox");
        println!(
            "round {round}: generation {} counted {words} words",
            parser.generation
        );
        parser.release();

        // outlive the TTL so the next round gets a rebuilt parser
        thread::sleep(Duration::from_millis(150));
    }

    pool.shutdown().wait();
    println!("pool drained");
}
