//! # tick-ring
//!
//! A fixed-capacity single-producer/single-consumer ring buffer of tick
//! events living in a shared memory segment, for low-latency delivery to
//! independent consumer processes.
//!
//! Backpressure policy: the producer never waits for the consumer. On
//! saturation the newest event is dropped and counted; unread slots are
//! never overwritten. Fan-out to N consumers is N independent rings fed in
//! lockstep by one producer, never N consumers on one ring.
//!
//! All cross-process fields are atomics with acquire/release publication:
//! slot contents are written before `head` is released, and the consumer
//! acquires `head` before reading the slot. Single-writer discipline is
//! `head`/counters/flags for the producer, `tail`/`drain_acked` for the
//! consumer.

mod date_config;
mod error;
mod ring;
mod segment;

pub use date_config::DateConfig;
pub use error::RingError;
pub use ring::{DrainSummary, RingConsumer, RingProducer, TickEvent};
pub use segment::shm_path;
