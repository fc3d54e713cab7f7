use std::path::PathBuf;

use academy_core::playground::SandboxLimits;
use services::SessionSettings;

pub const DEFAULT_DB_URL: &str = "sqlite://academy.sqlite3";

/// Settings resolved from the environment; flags override them afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_url: String,
    pub catalog_path: Option<PathBuf>,
    pub limits: SandboxLimits,
    pub session: SessionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_url: normalize_sqlite_url(DEFAULT_DB_URL),
            catalog_path: None,
            limits: SandboxLimits::default(),
            session: SessionSettings::default(),
        }
    }
}

impl Config {
    /// Read `ACADEMY_*` variables, ignoring values that do not parse.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("ACADEMY_DB_URL").filter(|v| !v.trim().is_empty()) {
            config.db_url = normalize_sqlite_url(&url);
        }
        if let Some(path) = lookup("ACADEMY_CATALOG").filter(|v| !v.trim().is_empty()) {
            config.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("ACADEMY_MAX_STEPS") {
            match raw.trim().parse::<u64>() {
                Ok(steps) if steps > 0 => config.limits.max_steps = steps,
                _ => tracing::warn!(value = %raw, "ignoring invalid ACADEMY_MAX_STEPS"),
            }
        }
        if let Some(raw) = lookup("ACADEMY_CELEBRATION_MS") {
            match raw.trim().parse::<i64>() {
                Ok(millis) if millis >= 0 => {
                    config.session = SessionSettings::with_celebration_ms(millis);
                }
                _ => tracing::warn!(value = %raw, "ignoring invalid ACADEMY_CELEBRATION_MS"),
            }
        }

        config
    }
}

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL that
/// creates the file on first use.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.contains("mode=") {
        return trimmed.to_owned();
    }

    let path_str = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}?mode=rwc", absolute.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::from_lookup(lookup(&[]));
        assert!(config.db_url.starts_with("sqlite:///"));
        assert!(config.db_url.ends_with("academy.sqlite3?mode=rwc"));
        assert_eq!(config.catalog_path, None);
        assert_eq!(config.limits, SandboxLimits::default());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ACADEMY_DB_URL", "sqlite:///tmp/progress.db"),
            ("ACADEMY_CATALOG", "lessons.json"),
            ("ACADEMY_MAX_STEPS", "500"),
            ("ACADEMY_CELEBRATION_MS", "0"),
        ]));
        assert_eq!(config.db_url, "sqlite:///tmp/progress.db?mode=rwc");
        assert_eq!(config.catalog_path, Some(PathBuf::from("lessons.json")));
        assert_eq!(config.limits.max_steps, 500);
        assert_eq!(config.session, SessionSettings::with_celebration_ms(0));
    }

    #[test]
    fn invalid_numbers_keep_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("ACADEMY_MAX_STEPS", "lots"),
            ("ACADEMY_CELEBRATION_MS", "-1"),
        ]));
        assert_eq!(config.limits.max_steps, SandboxLimits::DEFAULT_MAX_STEPS);
        assert_eq!(config.session, SessionSettings::default());
    }

    #[test]
    fn memory_and_explicit_mode_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:file:x?mode=memory&cache=shared"),
            "sqlite:file:x?mode=memory&cache=shared"
        );
    }
}
