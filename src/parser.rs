use regex::Regex;
use std::sync::OnceLock;

/// One command line split into a command name and its arguments.
///
/// `cmd` is always non-empty and never carries leading or trailing whitespace.
/// `raw` is the line exactly as it was read, before tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The unmodified input line.
    pub raw: String,
    /// Command name (first token).
    pub cmd: String,
    /// Remaining tokens in their original order.
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Re-derive a command whose name is the former first argument.
    ///
    /// Used for prefix abbreviations such as `set proxy ...` where the first word only
    /// selects a family of commands. Returns `None` when there are no arguments left.
    pub fn shift(&self) -> Option<ParsedCommand> {
        let (cmd, args) = split_head(self.args.clone())?;
        Some(ParsedCommand {
            raw: self.raw.clone(),
            cmd,
            args,
        })
    }

    /// First argument, or an empty string when none was given.
    pub fn first_arg(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

// A token is either a run of characters that are neither whitespace nor a double quote,
// or a double-quoted span whose content is taken verbatim.
fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r#"[^\s"]+|"([^"]*)""#).expect("token pattern is valid"))
}

/// Split a line into tokens.
///
/// An unmatched `"` is never an error: the stray quote is skipped and whatever follows
/// it is tokenized as ordinary text.
fn tokenize(line: &str) -> Vec<String> {
    token_regex()
        .captures_iter(line.trim())
        .filter_map(|caps| {
            let token = match caps.get(1) {
                Some(quoted) => quoted.as_str(),
                None => caps.get(0)?.as_str(),
            };
            (!token.is_empty()).then(|| token.to_string())
        })
        .collect()
}

fn split_head(tokens: Vec<String>) -> Option<(String, Vec<String>)> {
    let mut rest = tokens.into_iter().skip_while(|t| t.trim().is_empty());
    let head = rest.next()?.trim().to_string();
    Some((head, rest.collect()))
}

/// Parse a raw line into a [`ParsedCommand`].
///
/// Returns `None` for lines without any non-empty token; callers treat this as
/// "nothing to do" rather than as an error.
pub fn parse(line: &str) -> Option<ParsedCommand> {
    let (cmd, args) = split_head(tokenize(line))?;
    Some(ParsedCommand {
        raw: line.to_string(),
        cmd,
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_only_lines_yield_no_command() {
        for line in ["", " ", "\t", "   \t  ", "\"\"", " \"  \" "] {
            assert_eq!(parse(line), None, "line {:?} should not parse", line);
        }
    }

    #[test]
    fn test_quoted_argument_keeps_inner_whitespace() {
        let parsed = parse(r#"cmd "a b" c"#).unwrap();
        assert_eq!(parsed.cmd, "cmd");
        assert_eq!(parsed.args, vec!["a b".to_string(), "c".to_string()]);
        assert_eq!(parsed.raw, r#"cmd "a b" c"#);
    }

    #[test]
    fn test_cmd_is_trimmed_and_non_empty() {
        for line in ["  help  ", "\thelp", "\" help \"", "help\t\t"] {
            let parsed = parse(line).unwrap();
            assert_eq!(parsed.cmd, "help");
            assert!(parsed.args.is_empty());
        }
    }

    #[test]
    fn test_args_preserve_order() {
        let parsed = parse("set proxy 8080 on").unwrap();
        assert_eq!(parsed.cmd, "set");
        assert_eq!(parsed.args, vec!["proxy", "8080", "on"]);
    }

    #[test]
    fn test_unterminated_quote_degrades_to_plain_tokens() {
        let parsed = parse(r#"source "my script.txt"#).unwrap();
        assert_eq!(parsed.cmd, "source");
        assert_eq!(parsed.args, vec!["my", "script.txt"]);
    }

    #[test]
    fn test_shift_promotes_first_argument() {
        let parsed = parse("list server verbose").unwrap();
        let shifted = parsed.shift().unwrap();
        assert_eq!(shifted.cmd, "server");
        assert_eq!(shifted.args, vec!["verbose"]);
        assert_eq!(shifted.raw, parsed.raw);

        let last = shifted.shift().unwrap();
        assert_eq!(last.cmd, "verbose");
        assert!(last.args.is_empty());
        assert_eq!(last.shift(), None);
    }

    #[test]
    fn test_first_arg_defaults_to_empty() {
        assert_eq!(parse("source").unwrap().first_arg(), "");
        assert_eq!(parse(". a.txt").unwrap().first_arg(), "a.txt");
    }
}
