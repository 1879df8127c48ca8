//! End-to-end invocation tests against the filesystem store and a mock callback.

mod common;
mod invoke_tests;
