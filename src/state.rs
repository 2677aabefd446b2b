//! Module lifecycle state machine.
//!
//! The node tracks exactly one [`ModuleState`] value for the whole process.
//! The `IDLE -> BUSY` transition is the sole admission-control point for
//! actions: it is a single compare-and-swap on an atomic cell, so two
//! concurrent requests can never both observe `IDLE` and proceed.
//!
//! State transitions:
//!
//! ```text
//! Init ──startup ok──> Idle ⇄ Busy
//!   │
//!   └──startup fault──> Error   (terminal; requires process restart)
//! ```
//!
//! A failed action returns the module to `Idle`, never `Error`; only
//! startup faults are sticky.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// The operational state of the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleState {
    /// Startup in progress; the driver is not ready yet.
    Init,
    /// Ready to accept a new action.
    Idle,
    /// An action is in flight; further actions are rejected.
    Busy,
    /// Startup failed. Terminal: actions are rejected until restart.
    Error,
}

impl ModuleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ModuleState::Init,
            1 => ModuleState::Idle,
            2 => ModuleState::Busy,
            _ => ModuleState::Error,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ModuleState::Init => 0,
            ModuleState::Idle => 1,
            ModuleState::Busy => 2,
            ModuleState::Error => 3,
        }
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModuleState::Init => "INIT",
            ModuleState::Idle => "IDLE",
            ModuleState::Busy => "BUSY",
            ModuleState::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Shared state cell for the module.
///
/// This is the only mutable state shared across request-handling tasks.
/// Reads never block; writes go through the lifecycle methods below.
#[derive(Debug)]
pub struct StateCell {
    raw: AtomicU8,
}

impl StateCell {
    /// Creates a cell in the `Init` state.
    pub fn new() -> Self {
        Self {
            raw: AtomicU8::new(ModuleState::Init.as_u8()),
        }
    }

    /// Current state. Safe to call at any time, including mid-action.
    pub fn current(&self) -> ModuleState {
        ModuleState::from_u8(self.raw.load(Ordering::SeqCst))
    }

    /// Marks startup as complete (`Init -> Idle`).
    pub fn startup_complete(&self) {
        self.raw.store(ModuleState::Idle.as_u8(), Ordering::SeqCst);
    }

    /// Marks startup as failed (`-> Error`, sticky).
    pub fn startup_failed(&self) {
        self.raw.store(ModuleState::Error.as_u8(), Ordering::SeqCst);
    }

    /// Attempts the `Idle -> Busy` transition.
    ///
    /// On success returns a [`BusyGuard`] whose drop restores `Idle`, so the
    /// busy window is released on every exit path, including cancellation of
    /// the handling task. On failure returns the state that was observed
    /// instead of `Idle`.
    pub fn begin_action(&self) -> Result<BusyGuard<'_>, ModuleState> {
        match self.raw.compare_exchange(
            ModuleState::Idle.as_u8(),
            ModuleState::Busy.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(BusyGuard { cell: self }),
            Err(observed) => Err(ModuleState::from_u8(observed)),
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for the busy window.
///
/// Held for the entire lifetime of an in-flight action; dropping it
/// performs the unconditional `Busy -> Idle` release.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    cell: &'a StateCell,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        // Only Busy -> Idle; never clobber a concurrently-set Error.
        let _ = self.cell.raw.compare_exchange(
            ModuleState::Busy.as_u8(),
            ModuleState::Idle.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}
