//! Launching external programs with streamed output, timeouts, and
//! cancellation.
//!
//! [`Runner::run`] spawns one process, forwards every output line to an
//! [`OutputObserver`] as it arrives, and resolves to a [`ProcessOutcome`]
//! once the process exits. Whether a non-zero exit means failure is left to
//! the caller. Cancellation and timeouts terminate the process gracefully
//! first and forcibly after a grace period.

#![warn(missing_docs)]

pub mod cancel;
pub mod error;
pub mod outcome;
pub mod runner;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::RunError;
pub use outcome::{OutputLine, OutputObserver, ProcessOutcome, Stream};
pub use runner::{ProcessSpec, Runner, DEFAULT_GRACE};
