//! Builds the `ansible-playbook` invocation run inside the guest.

use std::collections::BTreeMap;

use crate::error::WslstrapError;
use crate::guest::shell_join;
use crate::package::CONFIG_TOOL_COMMAND;

const LOCAL_CONNECTION: &str = "--connection=local";
/// Inline inventory holding only `localhost`; the trailing comma marks it as a host list.
const LOCAL_INVENTORY: &str = "localhost,";

/// Parses `key=value` pairs into a map.
///
/// Splits on the first `=` and trims both sides. Later keys override earlier
/// ones.
pub fn parse_extra_vars<I, S>(pairs: I) -> Result<BTreeMap<String, String>, WslstrapError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut vars = BTreeMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let Some((key, value)) = pair.split_once('=') else {
            return Err(WslstrapError::Validation(format!(
                "invalid extra variable '{}': expected key=value",
                pair
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(WslstrapError::Validation(format!(
                "invalid extra variable '{}': key cannot be empty",
                pair
            )));
        }
        vars.insert(key.to_string(), value.trim().to_string());
    }
    Ok(vars)
}

/// Options for one playbook run inside a guest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybookInvocation {
    /// Path of the staged playbook inside the guest.
    pub guest_path: String,
    pub tags: Vec<String>,
    pub extra_vars: BTreeMap<String, String>,
    pub verbose: bool,
}

impl PlaybookInvocation {
    pub fn new(guest_path: impl Into<String>) -> Self {
        Self {
            guest_path: guest_path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_extra_vars(mut self, extra_vars: BTreeMap<String, String>) -> Self {
        self.extra_vars = extra_vars;
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Trimmed, non-empty tags joined with commas, if any.
    fn tag_list(&self) -> Option<String> {
        let tags: Vec<&str> = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        (!tags.is_empty()).then(|| tags.join(","))
    }

    /// Extra variables as one space-separated `k=v` string, if any.
    fn extra_vars_value(&self) -> Option<String> {
        if self.extra_vars.is_empty() {
            return None;
        }
        let vars: Vec<String> = self
            .extra_vars
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        Some(vars.join(" "))
    }

    /// Returns the argument vector, starting with the tool name.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            CONFIG_TOOL_COMMAND.to_string(),
            self.guest_path.clone(),
            LOCAL_CONNECTION.to_string(),
            "-i".to_string(),
            LOCAL_INVENTORY.to_string(),
        ];
        if let Some(tags) = self.tag_list() {
            args.push("--tags".to_string());
            args.push(tags);
        }
        if self.verbose {
            args.push("-vvv".to_string());
        }
        if let Some(vars) = self.extra_vars_value() {
            args.push("--extra-vars".to_string());
            args.push(vars);
        }
        args
    }

    /// Returns the shell command line for the guest.
    ///
    /// Fixed flags are written literally; only the playbook path, the tag
    /// list and the extra-vars value are quoted.
    pub fn to_command_line(&self) -> Result<String, WslstrapError> {
        let mut line = format!(
            "{} {} {} -i {}",
            CONFIG_TOOL_COMMAND,
            shell_join([self.guest_path.as_str()])?,
            LOCAL_CONNECTION,
            LOCAL_INVENTORY
        );
        if let Some(tags) = self.tag_list() {
            line.push_str(" --tags ");
            line.push_str(&shell_join([tags.as_str()])?);
        }
        if self.verbose {
            line.push_str(" -vvv");
        }
        if let Some(vars) = self.extra_vars_value() {
            line.push_str(" --extra-vars ");
            line.push_str(&shell_join([vars.as_str()])?);
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation() {
        let args = PlaybookInvocation::new("/tmp/p.yml").args();
        assert_eq!(
            args,
            ["ansible-playbook", "/tmp/p.yml", "--connection=local", "-i", "localhost,"]
        );
    }

    #[test]
    fn test_tags_verbose_and_vars() {
        let vars = parse_extra_vars(["user=john", "env=dev"]).unwrap();
        let args = PlaybookInvocation::new("/tmp/p.yml")
            .with_tags(vec!["base".to_string(), " docker ".to_string(), String::new()])
            .with_verbose(true)
            .with_extra_vars(vars)
            .args();
        assert_eq!(
            &args[5..],
            ["--tags", "base,docker", "-vvv", "--extra-vars", "env=dev user=john"]
        );
    }

    #[test]
    fn test_extra_vars_are_single_quoted() {
        let vars = parse_extra_vars(["user=john", "env=dev"]).unwrap();
        let line = PlaybookInvocation::new("/tmp/p.yml")
            .with_extra_vars(vars)
            .to_command_line()
            .unwrap();
        assert!(line.contains("--extra-vars 'env=dev user=john'"), "unexpected line: {}", line);
    }

    #[test]
    fn test_command_line_keeps_fixed_flags_literal() {
        let line = PlaybookInvocation::new("/tmp/p.yml").to_command_line().unwrap();
        assert_eq!(line, "ansible-playbook /tmp/p.yml --connection=local -i localhost,");

        let vars = parse_extra_vars(["user=john"]).unwrap();
        let line = PlaybookInvocation::new("/tmp/p.yml")
            .with_tags(vec!["base".to_string(), "docker".to_string()])
            .with_verbose(true)
            .with_extra_vars(vars)
            .to_command_line()
            .unwrap();
        assert!(
            line.starts_with("ansible-playbook /tmp/p.yml --connection=local -i localhost, --tags "),
            "unexpected line: {}",
            line
        );
        assert!(line.contains("base,docker"));
        assert!(line.contains(" -vvv --extra-vars "));
        assert!(line.ends_with("user=john'") || line.ends_with("user=john"), "unexpected line: {}", line);
    }

    #[test]
    fn test_command_line_quotes_guest_path_with_spaces() {
        let line = PlaybookInvocation::new("/tmp/my playbook.yml").to_command_line().unwrap();
        assert!(line.starts_with("ansible-playbook '/tmp/my playbook.yml' --connection=local"));
    }

    #[test]
    fn test_parse_extra_vars_splits_on_first_equals() {
        let vars = parse_extra_vars(["url = http://x/?a=b", "k=1", "k=2"]).unwrap();
        assert_eq!(vars["url"], "http://x/?a=b");
        assert_eq!(vars["k"], "2");
    }

    #[test]
    fn test_parse_extra_vars_rejects_malformed() {
        assert!(matches!(parse_extra_vars(["novalue"]), Err(WslstrapError::Validation(_))));
        assert!(matches!(parse_extra_vars([" =x"]), Err(WslstrapError::Validation(_))));
    }
}
