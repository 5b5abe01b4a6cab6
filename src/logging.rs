//! Log output setup.
//!
//! The library only emits `tracing` events. Applications that want them on
//! stderr call [`init`] once at startup.

use tracing::Level;

use crate::config::Settings;
use crate::error::{VectorError, VectorResult};

/// Level selected by `settings`: `debug = true` forces `DEBUG`, otherwise
/// `log_level` is parsed.
pub fn level_from_settings(settings: &Settings) -> VectorResult<Level> {
    if settings.debug {
        return Ok(Level::DEBUG);
    }
    settings.log_level.parse::<Level>().map_err(|_| {
        VectorError::Config(format!(
            "Unknown log level '{}'. Use error, warn, info, debug or trace",
            settings.log_level
        ))
    })
}

/// Installs a formatting subscriber on stderr.
///
/// Returns `Ok(false)` when a global subscriber was already installed, so
/// calling it more than once is harmless.
pub fn init(settings: &Settings) -> VectorResult<bool> {
    let level = level_from_settings(settings)?;

    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok();

    Ok(installed)
}
