//! Command parsing for prefixed text messages.
//!
//! A command message is any message whose text starts with the configured
//! prefix (`!` by default). The first whitespace-separated token after the
//! prefix is the command name (lower-cased); the remaining tokens are the
//! arguments, kept in their original case and order.

/// A parsed command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The command token, lower-cased. May be empty for prefix-only input;
    /// callers must treat an empty command as unmatched, since no plugin
    /// can register an empty alias.
    pub command: String,
    /// Arguments in original case and order.
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Joins the arguments back into a single string.
    pub fn arg_text(&self) -> String {
        self.args.join(" ")
    }
}

/// Parses a command from `text` given the active `prefix`.
///
/// Returns `None` when the text does not start with the prefix (exact,
/// case-sensitive match). Splitting is on runs of whitespace.
///
/// ```
/// use weaver_core::command::parse;
///
/// let cmd = parse("!help me", "!").unwrap();
/// assert_eq!(cmd.command, "help");
/// assert_eq!(cmd.args, vec!["me"]);
/// assert!(parse("hello", "!").is_none());
/// ```
pub fn parse(text: &str, prefix: &str) -> Option<ParsedCommand> {
    let rest = text.strip_prefix(prefix)?;

    let mut tokens = rest.trim().split_whitespace();
    let command = tokens.next().unwrap_or("").to_lowercase();
    let args = tokens.map(str::to_string).collect();

    Some(ParsedCommand { command, args })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_and_args() {
        let cmd = parse("!help me", "!").unwrap();
        assert_eq!(cmd.command, "help");
        assert_eq!(cmd.args, vec!["me".to_string()]);
    }

    #[test]
    fn no_prefix_is_no_command() {
        assert!(parse("help me", "!").is_none());
        assert!(parse("?help", "!").is_none());
    }

    #[test]
    fn prefix_match_is_case_sensitive_and_literal() {
        assert!(parse("#cmd", "#").is_some());
        assert!(parse("!cmd", "#").is_none());
    }

    #[test]
    fn command_is_lowercased_but_args_keep_case() {
        let cmd = parse("!PING FooBar", "!").unwrap();
        assert_eq!(cmd.command, "ping");
        assert_eq!(cmd.args, vec!["FooBar".to_string()]);
    }

    #[test]
    fn prefix_only_yields_empty_command() {
        let cmd = parse("!", "!").unwrap();
        assert_eq!(cmd.command, "");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn whitespace_runs_collapse() {
        let cmd = parse("!tag   everyone   now", "!").unwrap();
        assert_eq!(cmd.command, "tag");
        assert_eq!(cmd.args, vec!["everyone".to_string(), "now".to_string()]);
    }

    #[test]
    fn multi_char_prefix() {
        let cmd = parse(">>echo hi", ">>").unwrap();
        assert_eq!(cmd.command, "echo");
        assert_eq!(cmd.arg_text(), "hi");
    }
}
