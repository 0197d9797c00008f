//! Preset activation
//!
//! One activation applies a boosted, enabled override to the preset's
//! package, disables whatever conflicts with it, asks the main thread to
//! show the result, and then rolls back every override the previous preset
//! needed but this one does not. All of it goes through the
//! [`OverrideLedger`], so a reset or a crash recovery can undo it.

mod engine;
mod ledger;
mod plan;

pub use engine::{
    ActivationEngine, ActivationError, ActivationPhase, ActivationReport, RollbackSummary,
};
pub use ledger::{
    ActiveMarker, LEDGER_VERSION, LedgerEntry, LedgerError, LedgerState, OverrideLedger,
    OverrideRole,
};
pub use plan::SurfacePlan;
