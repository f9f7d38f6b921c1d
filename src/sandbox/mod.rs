//! Process-level sandbox for generated code
//!
//! Two pieces touch the host:
//! - `pty` - runs the generated artifact under a pseudo-terminal and captures
//!   its combined output, with a hard deadline
//! - `install` - runs model-suggested dependency commands through `sh -c`
//!
//! Isolation stops at the process boundary. Nothing here limits what the
//! generated program can do to the filesystem or the network.

pub mod install;
pub mod pty;

pub use install::{InstallOutcome, InstallReport, InstallRunner};
pub use pty::{
    has_error_signature, ExecutionResult, ExecutorConfig, PtyExecutor, Verdict,
    DEFAULT_ARTIFACT_PATH,
};
