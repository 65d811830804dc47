// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::core::config::LoggingSettings;
use crate::core::error::{PipelineError, Result};

/// Build the filter: `RUST_LOG` when set, otherwise the configured directive.
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.filter).map_err(|e| {
        PipelineError::Configuration(format!("Invalid log filter '{}': {}", settings.filter, e))
    })
}

/// Install a stdout subscriber. Returns `Ok(false)` if one was already set.
pub fn init_logging(settings: &LoggingSettings) -> Result<bool> {
    let filter = env_filter(settings)?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(settings.with_target);

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok())
}
