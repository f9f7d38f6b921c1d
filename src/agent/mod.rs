//! Agent module for supervised code generation
//!
//! This module provides the loop that turns a request into a working program:
//! - `pipeline` asks the completion service for a plan, install commands and code
//! - `controller` installs, executes, evaluates and repairs until the operator
//!   accepts the result
//! - `operator` is the human in the loop (yes/no and free-text prompts)
//!
//! # Architecture
//!
//! ```text
//! User Request → RepairLoop → Pipeline (plan / install / code)
//!                    ↓
//!             InstallRunner (sh -c, per-command confirm)
//!                    ↓
//!             PtyExecutor → temp_code_to_execute.py → captured output
//!                    ↓
//!             Operator: accept? ── yes → Done
//!                    ↓ no
//!             Revision request → new code → execute again
//! ```

pub mod controller;
pub mod operator;
pub mod pipeline;
pub mod prompts;

pub use controller::{LoopConfig, LoopError, Outcome, RepairLoop, SessionReport};
pub use operator::{ConsoleOperator, Operator};
pub use pipeline::{Generation, Pipeline, PipelineConfig, NO_CODE_PLACEHOLDER};
