// SPDX-License-Identifier: Apache-2.0

//! The ten boolean fast-path flags and two integer control variables that
//! gate the reclamation controller's hot-path behavior, exposed read/write
//! to the admin surface.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// One of the ten boolean control flags, all of which default to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ControlFlag {
    /// Skip the local swap cache on the swap-out fast path.
    BypassSwapcache,
    /// Batch page unmapping across a reclaim work item instead of per-page.
    BatchSwapout,
    /// Batch TLB flushes across a reclaim work item.
    BatchTlb,
    /// Batch transport submissions across a reclaim work item.
    BatchIo,
    /// Batch cgroup accounting updates across a reclaim work item.
    BatchAccount,
    /// Address victim pages by virtual address rather than page frame.
    VaddrSwapout,
    /// Enable speculative (pre-fault) load admission.
    SpeculativeIo,
    /// Use a speculative (optimistic) locking discipline on the fault path.
    SpeculativeLock,
    /// Defer unlocking a synchronous load's page until an explicit drain.
    LazyPoll,
    /// Enable the adaptive (mode 0) reclamation policy.
    AptReclaim,
}

const FLAG_KINDS: [ControlFlag; 10] = [
    ControlFlag::BypassSwapcache,
    ControlFlag::BatchSwapout,
    ControlFlag::BatchTlb,
    ControlFlag::BatchIo,
    ControlFlag::BatchAccount,
    ControlFlag::VaddrSwapout,
    ControlFlag::SpeculativeIo,
    ControlFlag::SpeculativeLock,
    ControlFlag::LazyPoll,
    ControlFlag::AptReclaim,
];

impl ControlFlag {
    /// The stable wire name used by the admin surface's `/swap/flags/:name`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BypassSwapcache => "bypass_swapcache",
            Self::BatchSwapout => "batch_swapout",
            Self::BatchTlb => "batch_tlb",
            Self::BatchIo => "batch_io",
            Self::BatchAccount => "batch_account",
            Self::VaddrSwapout => "vaddr_swapout",
            Self::SpeculativeIo => "speculative_io",
            Self::SpeculativeLock => "speculative_lock",
            Self::LazyPoll => "lazy_poll",
            Self::AptReclaim => "apt_reclaim",
        }
    }

    /// Looks up a flag by its wire name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        FLAG_KINDS.iter().copied().find(|f| f.name() == name)
    }

    /// All flags, in their canonical registration order.
    #[must_use]
    pub fn all() -> &'static [ControlFlag] {
        &FLAG_KINDS
    }

    fn index(self) -> usize {
        FLAG_KINDS
            .iter()
            .position(|f| *f == self)
            .expect("ControlFlag must be listed in FLAG_KINDS")
    }
}

/// One of the two integer control variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlVar {
    /// Target worker-thread ceiling, valid range `[1, 32]`, default `16`.
    SthdCnt,
    /// Reclamation policy mode, valid range `{0, 1, 2}`, default `0`.
    ReclaimMode,
}

const VAR_KINDS: [ControlVar; 2] = [ControlVar::SthdCnt, ControlVar::ReclaimMode];

impl ControlVar {
    /// The stable wire name used by the admin surface's `/swap/vars/:name`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SthdCnt => "sthd_cnt",
            Self::ReclaimMode => "reclaim_mode",
        }
    }

    /// Looks up a variable by its wire name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        VAR_KINDS.iter().copied().find(|v| v.name() == name)
    }

    /// All variables, in their canonical registration order.
    #[must_use]
    pub fn all() -> &'static [ControlVar] {
        &VAR_KINDS
    }

    fn default_value(self) -> u32 {
        match self {
            Self::SthdCnt => 16,
            Self::ReclaimMode => 0,
        }
    }

    /// Clamps a requested value into this variable's valid range.
    #[must_use]
    pub fn clamp(self, value: u32) -> u32 {
        match self {
            Self::SthdCnt => value.clamp(1, 32),
            Self::ReclaimMode => value.min(2),
        }
    }

    fn index(self) -> usize {
        VAR_KINDS
            .iter()
            .position(|v| *v == self)
            .expect("ControlVar must be listed in VAR_KINDS")
    }
}

/// Relaxed-atomic registry backing [`ControlFlag`] and [`ControlVar`] reads
/// on the hot path and read/write access from the admin surface.
///
/// All ten flags default to `false`; `sthd_cnt` defaults to `16` and
/// `reclaim_mode` defaults to `0`, matching the original module's defaults.
#[derive(Debug)]
pub struct ControlRegistry {
    flags: [AtomicBool; FLAG_KINDS.len()],
    vars: [AtomicU32; VAR_KINDS.len()],
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self {
            flags: Default::default(),
            vars: VAR_KINDS.map(|v| AtomicU32::new(v.default_value())),
        }
    }
}

impl ControlRegistry {
    /// Creates a registry at its documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a flag with relaxed ordering, suitable for the hot path.
    #[must_use]
    pub fn flag(&self, flag: ControlFlag) -> bool {
        self.flags[flag.index()].load(Ordering::Relaxed)
    }

    /// Sets a flag from the admin surface.
    pub fn set_flag(&self, flag: ControlFlag, value: bool) {
        self.flags[flag.index()].store(value, Ordering::Relaxed);
    }

    /// Reads a control variable with relaxed ordering.
    #[must_use]
    pub fn var(&self, var: ControlVar) -> u32 {
        self.vars[var.index()].load(Ordering::Relaxed)
    }

    /// Sets a control variable from the admin surface, clamped to its valid
    /// range.
    pub fn set_var(&self, var: ControlVar, value: u32) {
        self.vars[var.index()].store(var.clamp(value), Ordering::Relaxed);
    }
}
