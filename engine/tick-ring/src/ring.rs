//! The SPSC ring protocol over a mapped segment.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use crossbeam_utils::CachePadded;
use memmap2::MmapMut;

use jiffy_clock::ShutdownFlag;

use crate::segment;
use crate::RingError;

/// The unit transported on the ring. Carries no record payload; records
/// travel over the datagram feed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    pub tick_number: u64,
    pub timestamp_ns: u64,
}

/// Control block at the start of every ring segment.
///
/// Single-writer discipline: the producer mutates `head`, the counters and
/// `producer_*` flags; the consumer mutates `tail` and `drain_acked`.
/// `capacity` is written once at creation and read-only thereafter.
#[repr(C)]
struct RingHeader {
    capacity: u64,
    producer_running: AtomicBool,
    producer_finished: AtomicBool,
    drain_acked: AtomicBool,
    total_generated: AtomicU64,
    dropped_count: AtomicU64,
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
}

const HEADER_SIZE: usize = mem::size_of::<RingHeader>();
const SLOT_SIZE: usize = mem::size_of::<TickEvent>();

fn segment_size(capacity: u64) -> usize {
    HEADER_SIZE + capacity as usize * SLOT_SIZE
}

fn validate_capacity(capacity: u64) -> Result<(), RingError> {
    if capacity < 2 || !capacity.is_power_of_two() {
        return Err(RingError::InvalidCapacity(capacity));
    }
    Ok(())
}

/// Producer half. Owns segment creation and teardown; the segment file is
/// removed when the producer is dropped.
pub struct RingProducer {
    mmap: MmapMut,
    capacity: u64,
    path: PathBuf,
}

impl RingProducer {
    /// Create the segment under `/dev/shm` by well-known name.
    pub fn create(name: &str, capacity: u64) -> Result<Self, RingError> {
        Self::create_at(&segment::shm_path(name), capacity)
    }

    /// Create the segment at an explicit path.
    pub fn create_at(path: &Path, capacity: u64) -> Result<Self, RingError> {
        validate_capacity(capacity)?;
        let mut mmap = segment::create(path, segment_size(capacity))?;
        // Publish capacity before any consumer can observe a running ring.
        // SAFETY: the mapping is zero initialized and at least HEADER_SIZE.
        unsafe {
            (*(mmap.as_mut_ptr() as *mut RingHeader)).capacity = capacity;
        }
        let producer = Self { mmap, capacity, path: path.to_path_buf() };
        tracing::info!(
            path = %path.display(),
            capacity,
            bytes = segment_size(capacity),
            "ring segment created"
        );
        Ok(producer)
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        // SAFETY: the mapping is at least HEADER_SIZE bytes and zero
        // initialized; RingHeader is repr(C) with only atomics and a u64.
        unsafe { &*(self.mmap.as_ptr() as *const RingHeader) }
    }

    /// Offer one event. Never blocks: returns `false` (and counts the drop)
    /// when the buffer is full, leaving unread slots untouched.
    #[inline]
    pub fn try_push(&mut self, event: TickEvent) -> bool {
        let base = self.mmap.as_mut_ptr();
        // SAFETY: the mapping is at least HEADER_SIZE bytes; see `header`.
        let header = unsafe { &*(base as *const RingHeader) };
        let head = header.head.load(Ordering::Relaxed);
        let tail = header.tail.load(Ordering::Acquire);
        let next = (head + 1) % self.capacity;

        header.total_generated.fetch_add(1, Ordering::Relaxed);
        if next == tail {
            header.dropped_count.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // SAFETY: `head` is producer-owned and `head != tail`, so this slot
        // is not concurrently read. The Release store below publishes it.
        unsafe {
            let slots = base.add(HEADER_SIZE) as *mut TickEvent;
            slots.add(head as usize).write(event);
        }
        header.head.store(next, Ordering::Release);
        true
    }

    /// Mark the producer as live, so consumers can distinguish "not started
    /// yet" from "between days".
    pub fn mark_running(&self) {
        self.header().producer_running.store(true, Ordering::Release);
    }

    /// Signal that no more events will be pushed this day.
    pub fn finish(&self) {
        self.header().producer_finished.store(true, Ordering::Release);
    }

    /// Poll until the consumer acknowledges its final drain, yielding
    /// between polls. Returns `false` if abandoned on shutdown.
    pub fn wait_drained(&self, shutdown: &ShutdownFlag) -> bool {
        loop {
            if self.header().drain_acked.load(Ordering::Acquire) {
                return true;
            }
            if shutdown.is_set() {
                return false;
            }
            thread::yield_now();
        }
    }

    /// Re-arm the ring for the next session day. Both sides must be idle:
    /// call only after [`RingProducer::wait_drained`] succeeds.
    pub fn reset(&mut self) {
        let header = self.header();
        header.head.store(0, Ordering::Relaxed);
        header.tail.store(0, Ordering::Relaxed);
        header.total_generated.store(0, Ordering::Relaxed);
        header.dropped_count.store(0, Ordering::Relaxed);
        header.drain_acked.store(false, Ordering::Relaxed);
        // Cleared last: consumers poll this to re-enter their drain loop.
        header.producer_finished.store(false, Ordering::Release);
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn total_generated(&self) -> u64 {
        self.header().total_generated.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.header().dropped_count.load(Ordering::Relaxed)
    }

    /// Events actually accepted into the ring this day.
    pub fn accepted(&self) -> u64 {
        self.total_generated() - self.dropped_count()
    }
}

impl Drop for RingProducer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "ring segment unlink failed");
        }
    }
}

/// Consumer half. Attaches to a segment created by a [`RingProducer`];
/// exactly one consumer per ring.
pub struct RingConsumer {
    mmap: MmapMut,
    capacity: u64,
}

impl RingConsumer {
    /// Attach to a segment under `/dev/shm` by well-known name.
    pub fn open(name: &str) -> Result<Self, RingError> {
        Self::open_at(&segment::shm_path(name))
    }

    /// Attach to a segment at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, RingError> {
        let mmap = segment::open(path, HEADER_SIZE)?;
        // SAFETY: at least HEADER_SIZE bytes are mapped.
        let capacity = unsafe { (*(mmap.as_ptr() as *const RingHeader)).capacity };
        validate_capacity(capacity)?;
        if mmap.len() < segment_size(capacity) {
            return Err(RingError::SegmentTruncated {
                expected: segment_size(capacity),
                got: mmap.len(),
            });
        }
        Ok(Self { mmap, capacity })
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        // SAFETY: validated at open.
        unsafe { &*(self.mmap.as_ptr() as *const RingHeader) }
    }

    /// Lazy, finite drain: yields the events visible at each step, in the
    /// exact order the producer accepted them, advancing `tail` per event.
    /// Restartable; each call picks up where the previous one stopped.
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { consumer: self }
    }

    /// Drain until the producer finishes its day: process everything
    /// available, yield-and-retry when empty, perform one final drain once
    /// `producer_finished` is observed, then acknowledge. Counters are
    /// snapshotted into the summary before the ack, because the producer is
    /// free to reset them the moment it observes the ack. Interruptible via
    /// `shutdown`.
    pub fn run<F>(&mut self, shutdown: &ShutdownFlag, mut on_event: F) -> DrainSummary
    where
        F: FnMut(TickEvent),
    {
        let mut processed = 0u64;
        loop {
            if shutdown.is_set() {
                return self.summary(processed);
            }
            let mut drained_any = false;
            for event in self.drain() {
                on_event(event);
                processed += 1;
                drained_any = true;
            }
            if drained_any {
                continue;
            }
            if self.header().producer_finished.load(Ordering::Acquire) {
                // Final pass: events published between the empty drain and
                // the finished flag.
                for event in self.drain() {
                    on_event(event);
                    processed += 1;
                }
                let summary = self.summary(processed);
                self.ack_drained();
                return summary;
            }
            thread::yield_now();
        }
    }

    fn summary(&self, processed: u64) -> DrainSummary {
        DrainSummary {
            processed,
            total_generated: self.total_generated(),
            dropped_count: self.dropped_count(),
        }
    }

    /// Tell the producer the final drain is complete, unblocking its
    /// day-boundary reset.
    pub fn ack_drained(&self) {
        self.header().drain_acked.store(true, Ordering::Release);
    }

    /// Poll until the producer marks the ring live. `false` on shutdown.
    pub fn wait_until_running(&self, shutdown: &ShutdownFlag) -> bool {
        loop {
            if self.header().producer_running.load(Ordering::Acquire) {
                return true;
            }
            if shutdown.is_set() {
                return false;
            }
            thread::yield_now();
        }
    }

    /// Poll until the producer resets the ring for the next day (observed
    /// as `producer_finished` dropping back to false). `false` on shutdown.
    pub fn wait_for_reset(&self, shutdown: &ShutdownFlag) -> bool {
        loop {
            if !self.header().producer_finished.load(Ordering::Acquire) {
                return true;
            }
            if shutdown.is_set() {
                return false;
            }
            thread::yield_now();
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn total_generated(&self) -> u64 {
        self.header().total_generated.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.header().dropped_count.load(Ordering::Relaxed)
    }
}

/// Outcome of one day's [`RingConsumer::run`], with the producer-side
/// counters as they stood at the end of the drain.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainSummary {
    /// Events delivered to the callback.
    pub processed: u64,
    /// Events the producer attempted to push this day.
    pub total_generated: u64,
    /// Events the producer dropped on a full buffer.
    pub dropped_count: u64,
}

impl DrainSummary {
    /// Fraction of generated events that reached the consumer.
    pub fn success_rate(&self) -> f64 {
        if self.total_generated > 0 {
            self.processed as f64 / self.total_generated as f64
        } else {
            1.0
        }
    }
}

/// Iterator returned by [`RingConsumer::drain`].
pub struct Drain<'a> {
    consumer: &'a mut RingConsumer,
}

impl Iterator for Drain<'_> {
    type Item = TickEvent;

    fn next(&mut self) -> Option<TickEvent> {
        let header = self.consumer.header();
        let tail = header.tail.load(Ordering::Relaxed);
        let head = header.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        // SAFETY: tail != head, so the slot at `tail` was published by the
        // producer's Release store of `head` and is not being written.
        let event = unsafe {
            let slots = self.consumer.mmap.as_ptr().add(HEADER_SIZE) as *const TickEvent;
            slots.add(tail as usize).read()
        };
        header.tail.store((tail + 1) % self.consumer.capacity, Ordering::Release);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(n: u64) -> TickEvent {
        TickEvent { tick_number: n, timestamp_ns: n * 10 }
    }

    fn ring_pair(dir: &TempDir, capacity: u64) -> (RingProducer, RingConsumer) {
        let path = dir.path().join("ring");
        let producer = RingProducer::create_at(&path, capacity).unwrap();
        let consumer = RingConsumer::open_at(&path).unwrap();
        (producer, consumer)
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        let dir = TempDir::new().unwrap();
        for capacity in [0, 1, 3, 100] {
            let res = RingProducer::create_at(&dir.path().join("bad"), capacity);
            assert!(matches!(res, Err(RingError::InvalidCapacity(_))), "capacity {capacity}");
        }
    }

    #[test]
    fn consumer_validates_segment_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, [0u8; 8]).unwrap();
        assert!(matches!(
            RingConsumer::open_at(&path),
            Err(RingError::SegmentTruncated { .. })
        ));
    }

    #[test]
    fn full_drain_yields_fifo_order() {
        let dir = TempDir::new().unwrap();
        let (mut producer, mut consumer) = ring_pair(&dir, 16);

        for n in 0..10 {
            assert!(producer.try_push(event(n)));
        }
        let drained: Vec<u64> = consumer.drain().map(|e| e.tick_number).collect();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
        assert!(consumer.drain().next().is_none());
    }

    #[test]
    fn single_slot_ring_preserves_oldest_and_drops_newest() {
        // Capacity 2 leaves exactly one usable slot.
        let dir = TempDir::new().unwrap();
        let (mut producer, mut consumer) = ring_pair(&dir, 2);

        assert!(producer.try_push(event(1)));
        assert!(!producer.try_push(event(2)));
        assert_eq!(producer.total_generated(), 2);
        assert_eq!(producer.dropped_count(), 1);

        let drained: Vec<u64> = consumer.drain().map(|e| e.tick_number).collect();
        assert_eq!(drained, [1], "oldest event must survive, newest must be dropped");
    }

    #[test]
    fn counters_balance_after_finish() {
        let dir = TempDir::new().unwrap();
        let (mut producer, mut consumer) = ring_pair(&dir, 4);

        for n in 0..10 {
            producer.try_push(event(n));
        }
        producer.finish();

        let shutdown = ShutdownFlag::new();
        let summary = consumer.run(&shutdown, |_| {});
        assert_eq!(summary.processed, producer.accepted());
        assert_eq!(summary.total_generated, 10);
        assert_eq!(summary.processed + summary.dropped_count, summary.total_generated);
    }

    #[test]
    fn drain_ack_handshake_and_reset() {
        let dir = TempDir::new().unwrap();
        let (mut producer, mut consumer) = ring_pair(&dir, 8);
        let shutdown = ShutdownFlag::new();

        producer.mark_running();
        for n in 0..3 {
            producer.try_push(event(n));
        }
        producer.finish();
        consumer.run(&shutdown, |_| {});
        assert!(producer.wait_drained(&shutdown));

        producer.reset();
        assert!(consumer.wait_for_reset(&shutdown));
        assert_eq!(producer.total_generated(), 0);
        assert_eq!(producer.dropped_count(), 0);
        assert!(consumer.drain().next().is_none());

        // Next day reuses the segment cleanly.
        assert!(producer.try_push(event(99)));
        assert_eq!(consumer.drain().next().map(|e| e.tick_number), Some(99));
    }

    #[test]
    fn wait_drained_abandons_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let (producer, _consumer) = ring_pair(&dir, 8);
        let shutdown = ShutdownFlag::new();
        shutdown.request();
        assert!(!producer.wait_drained(&shutdown));
    }

    #[test]
    fn cross_thread_delivery_is_ordered_and_accounted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ring");
        let mut producer = RingProducer::create_at(&path, 1024).unwrap();
        let mut consumer = RingConsumer::open_at(&path).unwrap();
        let shutdown = ShutdownFlag::new();

        let handle = thread::spawn(move || {
            let mut last = None;
            consumer.run(&ShutdownFlag::new(), |e| {
                if let Some(prev) = last {
                    assert!(e.tick_number > prev, "events must arrive in accepted order");
                }
                last = Some(e.tick_number);
            })
        });

        for n in 0..100_000u64 {
            producer.try_push(event(n));
        }
        producer.finish();
        assert!(producer.wait_drained(&shutdown));

        let summary = handle.join().unwrap();
        assert_eq!(summary.processed, producer.accepted());
        assert_eq!(summary.total_generated, 100_000);
        assert_eq!(summary.processed + summary.dropped_count, 100_000);
    }
}
