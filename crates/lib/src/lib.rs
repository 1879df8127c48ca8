//! nodebuild-lib: build worker for deployment lifecycle events
//!
//! This crate provides everything a single invocation needs:
//! - `event`: the lifecycle event and its validated build properties
//! - `build`: fetch, unpack, prepare, build, package, and publish
//! - `protocol`: the terminal status and its one-time delivery
//! - `handler`: one event in, one callback out, workspace removed

pub mod actions;
pub mod build;
pub mod config;
pub mod consts;
pub mod event;
pub mod handler;
pub mod protocol;
pub mod store;
pub mod workspace;

pub use build::{BuildError, BuildRunner};
pub use config::{StoreConfig, WorkerConfig};
pub use event::{BuildProperties, InvocationRequest, RequestKind};
pub use handler::{InvocationOutcome, Worker};
pub use protocol::{Outcome, TerminalStatus};
