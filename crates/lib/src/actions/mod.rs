//! Workspace actions.
//!
//! The building blocks a build is made of: unpacking and packaging archives,
//! and running shell command sequences.

pub mod archive;
pub mod cmd;

pub use archive::{ArchiveError, extract, pack_directory};
pub use cmd::{CommandError, ExitInfo, run_commands};
