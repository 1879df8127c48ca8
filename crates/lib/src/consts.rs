//! Shared constants.

pub const APP_NAME: &str = "nodebuild";

/// Build command used when the properties do not name any.
pub const DEFAULT_BUILD_COMMAND: &str = "npm run build";

/// Prefix of every per-invocation workspace directory.
pub const WORKSPACE_PREFIX: &str = "extract";

/// Directory inside the workspace that holds downloaded archives until they are unpacked.
pub const FETCH_DIR: &str = ".fetch";

pub const ENV_SCRATCH_DIR: &str = "NODEBUILD_SCRATCH_DIR";
pub const ENV_LOCAL_STORE: &str = "NODEBUILD_LOCAL_STORE";
pub const ENV_SHELL: &str = "NODEBUILD_SHELL";
pub const ENV_LOG_STREAM: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

/// Length of the hash suffix in derived physical resource ids.
pub const PHYSICAL_ID_HASH_LEN: usize = 16;
