//! Destination file names.

use mediarelay_common::MediaEvent;

/// Source of the timestamp embedded in derived names.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn unix_timestamp(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// `{prefix}{timestamp}{extension}`.
///
/// The extension is the last `.suffix` of the original name's final path
/// component, dot included. Leading dots belong to the stem, so names without
/// a suffix, dot-files such as `.bashrc` and all-dot names yield no extension.
#[must_use]
pub fn derive_file_name(original: Option<&str>, timestamp: i64, prefix: &str) -> String {
    let ext = original.map(extension).unwrap_or_default();
    format!("{prefix}{timestamp}{ext}")
}

fn extension(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = base.trim_start_matches('.');
    match stem.rfind('.') {
        Some(idx) => &stem[idx..],
        None => "",
    }
}

/// Binds a prefix and a clock so the pipeline can name events directly.
pub struct NameDeriver {
    prefix: String,
    clock: Box<dyn Clock>,
}

impl NameDeriver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_clock(prefix, SystemClock)
    }

    pub fn with_clock(prefix: impl Into<String>, clock: impl Clock + 'static) -> Self {
        Self {
            prefix: prefix.into(),
            clock: Box::new(clock),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn derive(&self, event: &MediaEvent) -> String {
        derive_file_name(
            event.file_name.as_deref(),
            self.clock.unix_timestamp(),
            &self.prefix,
        )
    }
}

impl std::fmt::Debug for NameDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameDeriver")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{FixedClock, sample_event},
        rstest::rstest,
    };

    #[rstest]
    #[case(Some("movie.mkv"), "MyBot_1700000000.mkv")]
    #[case(Some("archive.tar.gz"), "MyBot_1700000000.gz")]
    #[case(Some("README"), "MyBot_1700000000")]
    #[case(Some(".bashrc"), "MyBot_1700000000")]
    #[case(Some("..."), "MyBot_1700000000")]
    #[case(Some("..hidden.mp4"), "MyBot_1700000000.mp4")]
    #[case(Some("trailing."), "MyBot_1700000000.")]
    #[case(Some("dir.d/clip"), "MyBot_1700000000")]
    #[case(Some("C:\\videos\\clip.MP4"), "MyBot_1700000000.MP4")]
    #[case(None, "MyBot_1700000000")]
    fn derives_names(#[case] original: Option<&str>, #[case] expected: &str) {
        assert_eq!(derive_file_name(original, 1_700_000_000, "MyBot_"), expected);
    }

    #[test]
    fn deterministic() {
        let a = derive_file_name(Some("a.mp4"), 42, "P");
        let b = derive_file_name(Some("a.mp4"), 42, "P");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_prefix() {
        assert_eq!(derive_file_name(Some("x.webm"), 7, ""), "7.webm");
    }

    #[test]
    fn deriver_uses_its_clock() {
        let deriver = NameDeriver::with_clock("MyBot_", FixedClock(1_700_000_000));
        let event = sample_event(Some("movie.mkv"));
        assert_eq!(deriver.derive(&event), "MyBot_1700000000.mkv");
        assert_eq!(deriver.prefix(), "MyBot_");
    }

    #[test]
    fn system_clock_is_recent() {
        // 2023-11-14
        assert!(SystemClock.unix_timestamp() > 1_700_000_000);
    }
}
