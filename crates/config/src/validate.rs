//! Configuration validation.
//!
//! Checks a loaded [`RelayConfig`] for settings the relay cannot start
//! without, and for combinations that work but are probably mistakes.

use crate::{error::Error, schema::RelayConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "relay.source_channel"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Turn error diagnostics into a startup failure.
    pub fn into_result(self) -> crate::Result<Vec<Diagnostic>> {
        if self.has_errors() {
            Err(Error::invalid(self.diagnostics))
        } else {
            Ok(self.diagnostics)
        }
    }

    fn error(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            path,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            path,
            message: message.into(),
        });
    }
}

/// Below this, Telegram starts answering status edits with flood waits.
const MIN_SAFE_EDIT_INTERVAL_MS: u64 = 1000;

/// Validate a loaded configuration.
#[must_use]
pub fn validate(config: &RelayConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.telegram.has_token() {
        result.error(
            "telegram.token",
            "bot token is required (set it in the config file or MEDIARELAY_BOT_TOKEN)",
        );
    }
    if let Some(api_url) = &config.telegram.api_url
        && let Err(e) = url::Url::parse(api_url)
    {
        result.error("telegram.api_url", format!("not a valid URL: {e}"));
    }

    let source = config.relay.source_channel.as_ref();
    let destination = config.relay.destination_channel.as_ref();
    if source.is_none() {
        result.error("relay.source_channel", "source channel is required");
    }
    if destination.is_none() {
        result.error(
            "relay.destination_channel",
            "destination channel is required",
        );
    }
    if source.is_some() && source == destination {
        result.warning(
            "relay.destination_channel",
            "destination equals source; relayed files will be picked up again",
        );
    }

    if config.relay.prefix.is_empty() {
        result.warning(
            "relay.prefix",
            "empty prefix; destination names will be bare timestamps",
        );
    }

    match &config.thumbnail.url {
        Some(url) => {
            if let Err(e) = url::Url::parse(url) {
                result.error("thumbnail.url", format!("not a valid URL: {e}"));
            }
        },
        None if config.thumbnail.required => result.error(
            "thumbnail.url",
            "thumbnail URL is required while thumbnail.required = true",
        ),
        None => result.warning(
            "thumbnail.url",
            "no thumbnail URL; documents are uploaded without one",
        ),
    }
    if config.thumbnail.max_dimension == 0 {
        result.error("thumbnail.max_dimension", "must be greater than zero");
    }

    if config.progress.edit_interval_ms < MIN_SAFE_EDIT_INTERVAL_MS {
        result.warning(
            "progress.edit_interval_ms",
            format!(
                "intervals below {MIN_SAFE_EDIT_INTERVAL_MS} ms tend to hit Telegram rate limits"
            ),
        );
    }

    if config.notify.target().is_none() {
        result.warning(
            "notify.log_channel",
            "no log channel or owner id; outcomes are only written to the log",
        );
    }

    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mediarelay_common::ChannelId, secrecy::Secret};

    fn valid_config() -> RelayConfig {
        let mut cfg = RelayConfig::default();
        cfg.telegram.token = Secret::new("1:ABC".into());
        cfg.relay.source_channel = Some(ChannelId::Id(-100));
        cfg.relay.destination_channel = Some(ChannelId::Id(-200));
        cfg.relay.prefix = "MyBot_".into();
        cfg.thumbnail.url = Some("https://example.com/thumb.jpg".into());
        cfg.notify.owner_id = Some(1);
        cfg
    }

    fn paths(result: &ValidationResult, severity: Severity) -> Vec<&'static str> {
        result
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.path)
            .collect()
    }

    #[test]
    fn valid_config_is_clean() {
        let result = validate(&valid_config());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        assert!(result.into_result().is_ok());
    }

    #[test]
    fn default_config_reports_required_settings() {
        let result = validate(&RelayConfig::default());
        let errors = paths(&result, Severity::Error);
        assert!(errors.contains(&"telegram.token"));
        assert!(errors.contains(&"relay.source_channel"));
        assert!(errors.contains(&"thumbnail.url"));
        assert!(result.has_errors());
    }

    #[test]
    fn missing_destination_is_an_error() {
        let mut cfg = valid_config();
        cfg.relay.destination_channel = None;
        let result = validate(&cfg);
        assert_eq!(paths(&result, Severity::Error), vec![
            "relay.destination_channel"
        ]);
    }

    #[test]
    fn optional_thumbnail_without_url_is_a_warning() {
        let mut cfg = valid_config();
        cfg.thumbnail.url = None;
        cfg.thumbnail.required = false;
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(paths(&result, Severity::Warning), vec!["thumbnail.url"]);
    }

    #[test]
    fn malformed_urls_are_errors() {
        let mut cfg = valid_config();
        cfg.thumbnail.url = Some("not a url".into());
        cfg.telegram.api_url = Some("::".into());
        let result = validate(&cfg);
        let errors = paths(&result, Severity::Error);
        assert!(errors.contains(&"thumbnail.url"));
        assert!(errors.contains(&"telegram.api_url"));
    }

    #[test]
    fn suspicious_settings_are_warnings() {
        let mut cfg = valid_config();
        cfg.relay.destination_channel = cfg.relay.source_channel.clone();
        cfg.relay.prefix.clear();
        cfg.progress.edit_interval_ms = 200;
        cfg.notify.owner_id = None;
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 4);
    }

    #[test]
    fn into_result_summarizes_errors() {
        let err = validate(&RelayConfig::default())
            .into_result()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("telegram.token"), "{message}");
        assert!(matches!(err, Error::Invalid { .. }));
    }
}
