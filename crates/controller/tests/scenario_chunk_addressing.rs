// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]

//! Page offsets resolve through the chunk table and drain to completion
//! through a live scheduler thread, while offsets outside the table or
//! inside an unmapped chunk are rejected at submit time instead of being
//! silently enqueued.

use clap::Parser;
use rswap_config::RswapConfig;
use rswap_reclaim::{MemoryAccounting, Reclaimer};
use rswap_scheduler::Dispatcher;
use rswap_tenant::TrafficClass;
use rswap_transport::{Error as TransportError, TransportRequest};
use rswap_controller::{Error, RswapHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// One remote region is 8 GiB of 4 KiB pages.
const PAGES_PER_CHUNK: u64 = (8 * (1u64 << 30)) / 4096;

struct NoopDispatcher;
impl Dispatcher for NoopDispatcher {
    fn dispatch(&self, _request: TransportRequest) -> bool {
        true
    }
}

struct FakeAccounting {
    max: AtomicU64,
    current: AtomicU64,
    charged: AtomicU64,
}
impl MemoryAccounting for FakeAccounting {
    fn memory_max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }
    fn memory_current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }
    fn total_pg_charge(&self) -> u64 {
        self.charged.load(Ordering::Relaxed)
    }
}

struct NoopReclaimer;
impl Reclaimer for NoopReclaimer {
    fn reclaim(&self, _target_pages: u64) -> u64 {
        0
    }
}

fn test_config(admin_port: u16) -> RswapConfig {
    let mut cfg = RswapConfig::parse_from(["rswapd"]);
    cfg.admin_bind_address = format!("127.0.0.1:{admin_port}");
    cfg
}

fn start_handle(admin_port: u16) -> RswapHandle {
    RswapHandle::start(
        test_config(admin_port),
        Arc::new(NoopDispatcher),
        Arc::new(FakeAccounting {
            max: AtomicU64::new(1_000_000),
            current: AtomicU64::new(0),
            charged: AtomicU64::new(0),
        }),
        Arc::new(NoopReclaimer),
    )
    .unwrap()
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
fn submit_rejects_unmapped_and_out_of_range_chunks() {
    let handle = start_handle(17_610);
    let _id = handle.register_tenant("probe", 1, vec![0]).unwrap();

    // Chunk 0 has never been mapped.
    let err = handle.submit(0, TrafficClass::Store, 0).unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::ChunkNotMapped { idx: 0 })
    ));

    // Default config caps the table at 16 chunks; this offset lands past it.
    let out_of_range_offset = PAGES_PER_CHUNK * 32;
    let err = handle
        .submit(0, TrafficClass::Store, out_of_range_offset)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::ChunkIndexOutOfRange { .. })
    ));

    handle.shutdown().unwrap();
}

#[test]
fn submit_resolves_across_chunk_boundaries_and_drains() {
    let handle = start_handle(17_611);
    let id = handle.register_tenant("memcached", 1, vec![0]).unwrap();

    handle.map_chunk(0, 0xBEEF_0000, 11, 8 * (1 << 30)).unwrap();
    handle.map_chunk(1, 0xBEEF_1000, 12, 8 * (1 << 30)).unwrap();

    // One page at the very start of chunk 0, one at the very start of
    // chunk 1: the same addressing arithmetic `ChunkTable::resolve` uses.
    handle.submit(0, TrafficClass::Store, 0).unwrap();
    handle.submit(0, TrafficClass::Store, PAGES_PER_CHUNK).unwrap();

    let drained = wait_until(Duration::from_secs(10), || {
        handle
            .tenants()
            .with_tenant(id, |t| t.sent_pkts(TrafficClass::Store) == 0)
            .unwrap_or(false)
    });
    assert!(drained, "both chunk-resolved requests should drain");

    handle
        .tenants()
        .with_tenant(id, |t| assert_eq!(t.total_pkts(TrafficClass::Store), 2))
        .unwrap();

    handle.shutdown().unwrap();
}
