//! `mediarelay check-config`: load the config, validate it, and test that the
//! work directory is writable, without connecting to Telegram.
//!
//! Prints one section per area with `[ok]`, `[warn]`, or `[fail]` per item.

use std::path::Path;

use {
    anyhow::Result,
    mediarelay_config::{RelayConfig, Severity},
};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
        }
    }
}

impl From<Severity> for Status {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => Self::Fail,
            Severity::Warning => Self::Warn,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }

    fn has_failures(&self) -> bool {
        self.items.iter().any(|item| item.status == Status::Fail)
    }
}

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
            match item.status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                Status::Ok => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

pub fn handle_check(config_path: Option<&Path>) -> Result<()> {
    let mut sections = Vec::new();

    let label = config_path
        .map(|p| p.display().to_string())
        .or_else(|| mediarelay_config::find_config_file().map(|p| p.display().to_string()))
        .unwrap_or_else(|| "environment only".into());
    let mut config_section = Section::new(format!("Config ({label})"));

    match mediarelay_config::load(config_path) {
        Ok(config) => {
            check_config(&mut config_section, &config);
            sections.push(config_section);
            sections.push(check_work_dir(&config.relay.work_dir()));
        },
        Err(e) => {
            config_section.push(Status::Fail, e.to_string());
            sections.push(config_section);
        },
    }

    let (errors, warnings) = print_report(&sections);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn check_config(section: &mut Section, config: &RelayConfig) {
    let result = mediarelay_config::validate(config);
    for d in &result.diagnostics {
        section.push(d.severity.into(), format!("{}: {}", d.path, d.message));
    }
    if !section.has_failures()
        && let Ok((source, destination)) = config.route()
    {
        section.push(
            Status::Ok,
            format!(
                "relaying {source} -> {destination} with prefix {:?}",
                config.relay.prefix
            ),
        );
    }
}

fn check_work_dir(dir: &Path) -> Section {
    let mut section = Section::new(format!("Work directory ({})", dir.display()));

    if let Err(e) = std::fs::create_dir_all(dir) {
        section.push(Status::Fail, format!("cannot create: {e}"));
        return section;
    }

    let marker = dir.join(".mediarelay-write-check");
    match std::fs::write(&marker, b"ok") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
            section.push(Status::Ok, "writable");
        },
        Err(e) => section.push(Status::Fail, format!("not writable: {e}")),
    }

    section
}
