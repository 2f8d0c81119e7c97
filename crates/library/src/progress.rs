//! Shared scan progress counters.
//!
//! The scanner bumps these as it goes; anything holding the same handle can
//! read a consistent-enough snapshot while the scan is still running.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Cleanup,
    Indexing,
    Enriching,
    Done,
}

#[derive(Debug, Default)]
pub struct ScanProgress {
    phase: AtomicU8,
    discovered: AtomicU64,
    indexed: AtomicU64,
    enrich_total: AtomicU64,
    enriched: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub discovered: u64,
    pub indexed: u64,
    pub enrich_total: u64,
    pub enriched: u64,
}

impl ScanProgress {
    /// Zero everything out at the start of a run; the handle is shared
    /// across runs and must not accumulate.
    pub(crate) fn reset(&self) {
        self.phase.store(Phase::Idle as u8, Ordering::Relaxed);
        self.discovered.store(0, Ordering::Relaxed);
        self.indexed.store(0, Ordering::Relaxed);
        self.enrich_total.store(0, Ordering::Relaxed);
        self.enriched.store(0, Ordering::Relaxed);
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Relaxed);
    }

    pub(crate) fn set_discovered(&self, count: u64) {
        self.discovered.store(count, Ordering::Relaxed);
    }

    pub(crate) fn bump_indexed(&self) {
        self.indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_enrich_total(&self, count: u64) {
        self.enrich_total.store(count, Ordering::Relaxed);
    }

    pub(crate) fn bump_enriched(&self) {
        self.enriched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: match self.phase.load(Ordering::Relaxed) {
                1 => Phase::Cleanup,
                2 => Phase::Indexing,
                3 => Phase::Enriching,
                4 => Phase::Done,
                _ => Phase::Idle,
            },
            discovered: self.discovered.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            enrich_total: self.enrich_total.load(Ordering::Relaxed),
            enriched: self.enriched.load(Ordering::Relaxed),
        }
    }
}
