//! Parsers for the output of `wsl -l -v` and the legacy `wsl -l`.
//!
//! Both parsers are total: malformed lines are skipped, never reported.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use strum::EnumString;

/// Tokens that mark the header of the verbose listing.
const HEADER_MARKERS: &[&str] = &["NAME", "---"];

static VERBOSE_LINE: OnceLock<Regex> = OnceLock::new();
static LEGACY_LINE: OnceLock<Regex> = OnceLock::new();

/// `[*] <name> <state> <version>`, e.g. `* Ubuntu-22.04    Running    2`.
fn verbose_line() -> &'static Regex {
    VERBOSE_LINE.get_or_init(|| {
        Regex::new(r"^\s*(\*?)\s*(\S+)\s+(\w+)\s+(\d+)\s*$").expect("verbose listing pattern")
    })
}

/// `[*] <name> [(Default)]`, e.g. `Ubuntu-22.04 (Default)`.
fn legacy_line() -> &'static Regex {
    LEGACY_LINE.get_or_init(|| {
        Regex::new(r"^(\*)?\s*([^\s*]\S*)\s*(\(Default\))?$").expect("legacy listing pattern")
    })
}

/// Run state of a distribution as reported by the verbose listing.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum GuestState {
    Running,
    Stopped,
    Installing,
    Uninstalling,
    Converting,
    /// The legacy listing carries no state column.
    #[strum(disabled)]
    Unknown,
    /// Any state word not known to this version of the tool.
    #[strum(default)]
    Other(String),
}

impl fmt::Display for GuestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("Running"),
            Self::Stopped => f.write_str("Stopped"),
            Self::Installing => f.write_str("Installing"),
            Self::Uninstalling => f.write_str("Uninstalling"),
            Self::Converting => f.write_str("Converting"),
            Self::Unknown => f.write_str("Unknown"),
            Self::Other(word) => f.write_str(word),
        }
    }
}

/// One installed distribution, as parsed from a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestRecord {
    pub name: String,
    pub state: GuestState,
    /// WSL version digits (`"1"`/`"2"`); empty for the legacy listing.
    pub version: String,
    pub is_default: bool,
}

/// Removes byte-order marks and NUL bytes.
///
/// `wsl.exe` writes UTF-16LE; when that is read as bytes every other byte is
/// NUL, and a BOM may lead the output.
pub fn strip_noise(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '\0' | '\u{feff}')).collect()
}

/// Parses the verbose listing (`wsl -l -v`).
///
/// Everything up to and including the first line containing `NAME` or a
/// dash rule is discarded. Without such a line the whole output is data.
pub fn parse_verbose(raw: &str) -> Vec<GuestRecord> {
    let cleaned = strip_noise(raw);
    let lines: Vec<&str> = cleaned.lines().collect();

    let start = lines
        .iter()
        .position(|line| HEADER_MARKERS.iter().any(|marker| line.contains(marker)))
        .map_or(0, |index| index + 1);

    lines[start..]
        .iter()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let caps = verbose_line().captures(line)?;
            Some(GuestRecord {
                name: caps[2].to_string(),
                state: GuestState::from_str(&caps[3])
                    .unwrap_or(GuestState::Other(caps[3].to_string())),
                version: caps[4].to_string(),
                is_default: &caps[1] == "*",
            })
        })
        .collect()
}

/// Parses the legacy listing (`wsl -l`).
///
/// Header sentences contain spaces and therefore never match the
/// single-token line shape; they are skipped like any other malformed line.
/// So are URLs, which the "no distributions installed" text ends with.
pub fn parse_legacy(raw: &str) -> Vec<GuestRecord> {
    strip_noise(raw)
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let caps = legacy_line().captures(line)?;
            if caps[2].contains("://") {
                return None;
            }
            let is_default = caps.get(1).is_some() || caps.get(3).is_some();
            Some(GuestRecord {
                name: caps[2].to_string(),
                state: GuestState::Unknown,
                version: String::new(),
                is_default,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbose_scenario() {
        let raw = "  NAME   STATE   VERSION\n* Ubuntu-22.04   Running   2\n  Debian   Stopped   2\n";
        let records = parse_verbose(raw);
        assert_eq!(
            records,
            vec![
                GuestRecord {
                    name: "Ubuntu-22.04".to_string(),
                    state: GuestState::Running,
                    version: "2".to_string(),
                    is_default: true,
                },
                GuestRecord {
                    name: "Debian".to_string(),
                    state: GuestState::Stopped,
                    version: "2".to_string(),
                    is_default: false,
                },
            ]
        );
    }

    #[test]
    fn test_parse_verbose_unknown_state_is_preserved() {
        let records = parse_verbose("NAME STATE VERSION\n  Arch   Hibernating   2\n");
        assert_eq!(records[0].state, GuestState::Other("Hibernating".to_string()));
        assert_eq!(records[0].state.to_string(), "Hibernating");
    }

    #[test]
    fn test_parse_legacy_with_default_suffix() {
        let raw = "Windows Subsystem for Linux Distributions:\nUbuntu-22.04 (Default)\nDebian\n";
        let records = parse_legacy(raw);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Ubuntu-22.04");
        assert!(records[0].is_default);
        assert_eq!(records[0].state, GuestState::Unknown);
        assert_eq!(records[1].name, "Debian");
        assert!(!records[1].is_default);
        assert!(records[1].version.is_empty());
    }

    #[test]
    fn test_parse_legacy_with_star_prefix() {
        let records = parse_legacy("* Ubuntu\n  kali-linux\n");
        assert_eq!(records.len(), 2);
        assert!(records[0].is_default);
        assert_eq!(records[0].name, "Ubuntu");
        assert!(!records[1].is_default);
    }

    #[test]
    fn test_strip_noise_removes_bom_and_nuls() {
        assert_eq!(strip_noise("\u{feff}N\0A\0M\0E\0"), "NAME");
    }

    #[test]
    fn test_parse_legacy_skips_store_link_of_empty_listing() {
        let raw = "Windows Subsystem for Linux has no installed distributions.\n\
                   Distributions can be installed by visiting the Microsoft Store:\n\
                   https://aka.ms/wslstore\n";
        assert!(parse_legacy(raw).is_empty());
    }

    #[test]
    fn test_parse_legacy_skips_dry_run_output() {
        assert!(parse_legacy("[dry-run] wsl.exe -l").is_empty());
    }
}
