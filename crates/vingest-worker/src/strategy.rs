//! Environment strategy selection.
//!
//! Decides once per process whether acquisitions are mocked or real, and for
//! real acquisitions whether bytes are fetched in-process or by the remote
//! executor. Rules are evaluated in order and the first match wins:
//!
//! 1. explicit mock override on -> mock
//! 2. explicit override off on a host without `yt-dlp` -> real, remote executor
//! 3. serverless platform -> mock
//! 4. capable platform (or local development) -> real, in-process
//! 5. otherwise -> mock

use std::fmt;

use crate::config::EnvironmentConfig;

/// Where real acquisitions run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    InProcess,
    Remote,
}

/// Acquisition strategy for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    Mock,
    Real(ExecutorKind),
}

impl AcquisitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMode::Mock => "mock",
            AcquisitionMode::Real(ExecutorKind::InProcess) => "real_in_process",
            AcquisitionMode::Real(ExecutorKind::Remote) => "real_remote",
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the acquisition mode for `env`.
pub fn select_strategy(env: &EnvironmentConfig) -> AcquisitionMode {
    select_with_reason(env).0
}

/// Same as [`select_strategy`], plus the rule that decided it.
pub fn select_with_reason(env: &EnvironmentConfig) -> (AcquisitionMode, &'static str) {
    match env.mock_override {
        Some(true) => return (AcquisitionMode::Mock, "mock override enabled"),
        Some(false) if !env.heavy_binary_available => {
            return (
                AcquisitionMode::Real(ExecutorKind::Remote),
                "mock override disabled without local yt-dlp",
            )
        }
        _ => {}
    }

    if env.serverless {
        (AcquisitionMode::Mock, "serverless platform")
    } else if env.is_capable() {
        (AcquisitionMode::Real(ExecutorKind::InProcess), "capable platform")
    } else {
        (AcquisitionMode::Mock, "no platform matched")
    }
}
