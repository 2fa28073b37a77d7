//! Harness configuration
//!
//! Controls where postmortem dumps go, the default debug format handed to the front end,
//! and whether verifier messages are compared at all. Messages are only comparable when
//! the verifier runs under an English or neutral locale, since it localizes its output.

use std::{env, path::PathBuf};

use tracing::warn;

use crate::compilation::DebugFormat;

/// Environment variable overriding the dump root
pub const ENV_DUMP_DIR: &str = "EMITSCOPE_DUMP_DIR";
/// Environment variable overriding the per-process dump limit
pub const ENV_DUMP_LIMIT: &str = "EMITSCOPE_DUMP_LIMIT";
/// Environment variable overriding the default debug format
pub const ENV_DEBUG_FORMAT: &str = "EMITSCOPE_DEBUG_FORMAT";

/// Maximum number of postmortem dumps written per process by default
pub const DEFAULT_DUMP_LIMIT: usize = 10;

/// Configuration shared by every pipeline stage of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Directory receiving numbered postmortem dumps. `None` disables dumps.
    pub dump_root: Option<PathBuf>,

    /// Maximum number of dumps written through one dump service
    pub dump_limit: usize,

    /// Debug format requested from the front end unless an emission overrides it
    pub debug_format: DebugFormat,

    /// Compare literal verifier messages (requires a message-comparable locale)
    pub compare_messages: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            dump_root: Some(default_dump_root()),
            dump_limit: DEFAULT_DUMP_LIMIT,
            debug_format: DebugFormat::Embedded,
            compare_messages: true,
        }
    }
}

impl HarnessConfig {
    /// Configuration with postmortem dumps turned off
    #[must_use]
    pub fn disabled_dumps() -> Self {
        Self {
            dump_root: None,
            ..Self::default()
        }
    }

    /// Configuration writing dumps below `root`, for tests that inspect them
    #[must_use]
    pub fn isolated(root: impl Into<PathBuf>) -> Self {
        Self {
            dump_root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Configuration read from the process environment.
    ///
    /// Reads the following variables:
    /// - [`ENV_DUMP_DIR`], [`ENV_DUMP_LIMIT`] and [`ENV_DEBUG_FORMAT`];
    /// - the locale variables.
    ///
    /// Unparsable values are logged and replaced by their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = env::var_os(ENV_DUMP_DIR).filter(|dir| !dir.is_empty()) {
            config.dump_root = Some(PathBuf::from(dir));
        }

        if let Ok(limit) = env::var(ENV_DUMP_LIMIT) {
            match limit.trim().parse::<usize>() {
                Ok(limit) => config.dump_limit = limit,
                Err(_) => warn!(value = %limit, "ignoring invalid {}", ENV_DUMP_LIMIT),
            }
        }

        if let Ok(format) = env::var(ENV_DEBUG_FORMAT) {
            match format.trim().parse::<DebugFormat>() {
                Ok(format) => config.debug_format = format,
                Err(_) => warn!(value = %format, "ignoring invalid {}", ENV_DEBUG_FORMAT),
            }
        }

        config.compare_messages = is_message_comparable_locale(current_locale().as_deref());
        config
    }
}

/// The per-process default dump root below the system temp directory
#[must_use]
pub fn default_dump_root() -> PathBuf {
    env::temp_dir()
        .join("emitscope-dumps")
        .join(std::process::id().to_string())
}

/// The effective messages locale, following POSIX precedence
fn current_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.is_empty())
}

/// True if verifier messages produced under `locale` can be compared to English literals.
#[must_use]
pub fn is_message_comparable_locale(locale: Option<&str>) -> bool {
    match locale {
        None => true,
        Some(locale) => {
            let language = locale
                .split(['_', '.', '@', '-'])
                .next()
                .unwrap_or_default();
            language.eq_ignore_ascii_case("en") || language == "C" || language == "POSIX"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_enables_dumps_and_embedded_debug_info() {
        let config = HarnessConfig::default();
        assert!(config.dump_root.is_some());
        assert_eq!(config.dump_limit, DEFAULT_DUMP_LIMIT);
        assert_eq!(config.debug_format, DebugFormat::Embedded);
        assert!(config.compare_messages);
    }

    #[test]
    fn presets() {
        assert!(HarnessConfig::disabled_dumps().dump_root.is_none());

        let isolated = HarnessConfig::isolated("/tmp/dumps");
        assert_eq!(isolated.dump_root, Some(PathBuf::from("/tmp/dumps")));
        assert_eq!(isolated.dump_limit, DEFAULT_DUMP_LIMIT);
    }

    #[test]
    fn locale_detection() {
        assert!(is_message_comparable_locale(None));
        assert!(is_message_comparable_locale(Some("en_US.UTF-8")));
        assert!(is_message_comparable_locale(Some("C")));
        assert!(is_message_comparable_locale(Some("C.UTF-8")));
        assert!(is_message_comparable_locale(Some("POSIX")));
        assert!(!is_message_comparable_locale(Some("de_DE.UTF-8")));
        assert!(!is_message_comparable_locale(Some("ja_JP")));
    }
}
