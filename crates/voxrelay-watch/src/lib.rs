#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Core watch loop: file identity, duplicate suppression, write-completion
//! probing, and event dispatch.
//!
//! Layout: `identity.rs` (`FileIdentity`), `ledger.rs` (`DedupLedger` +
//! `ClaimGuard`), `prober.rs` (size-stability state machine), `dispatcher.rs`
//! (`WatchService` and the `VideoProcessor` seam).

pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod prober;

pub use dispatcher::{VideoProcessor, WatchOptions, WatchService};
pub use error::{WatchError, WatchResult};
pub use identity::FileIdentity;
pub use ledger::{ClaimGuard, ClaimOutcome, DedupLedger, LedgerCounts};
pub use prober::{ProbeOutcome, ProbeSettings, ProbeState, ProbeVerdict, wait_for_stable};
