//! The line parser (§10): turns one trace line into a `repcrec::command::Command`.
//!
//! This is the only place that knows about the textual grammar of §6; the
//! core crate never sees anything but a typed `Command`. Record/site range
//! validation (1..=20, 1..=10) happens here, since it is purely syntactic
//! and needs no simulator state.

use std::fmt;

use repcrec::command::Command;

/// A fatal grammar violation (§7): the offending line plus a human reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: String,
    pub reason: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse {:?}: {}", self.line, self.reason)
    }
}

impl std::error::Error for ParseError {}

fn fail(line: &str, reason: impl Into<String>) -> ParseError {
    ParseError { line: line.to_string(), reason: reason.into() }
}

/// Strips a trailing `//...` comment, then trims whitespace. Returns `None`
/// for a line that is empty or all-comment — the caller should skip it
/// without advancing logical time.
fn strip_comment(raw: &str) -> Option<&str> {
    let stripped = match raw.find("//") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Splits `name(args)` into the form name and the raw (unsplit) argument
/// text, tolerating whitespace around the parens.
fn split_call(line: &str) -> Result<(&str, &str), ParseError> {
    let open = line.find('(').ok_or_else(|| fail(line, "expected '(' after command name"))?;
    if !line.ends_with(')') {
        return Err(fail(line, "expected line to end with ')'"));
    }
    let name = line[..open].trim();
    let args = &line[open + 1..line.len() - 1];
    Ok((name, args))
}

/// Splits comma-separated arguments, trimming whitespace around each.
/// Empty args text yields zero arguments (for `dump()`), never one blank
/// argument.
fn split_args(args: &str) -> Vec<&str> {
    let trimmed = args.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split(',').map(str::trim).collect()
}

fn require_arity<'a>(line: &str, args: &'a [&'a str], n: usize) -> Result<(), ParseError> {
    if args.len() != n {
        return Err(fail(line, format!("expected {n} argument(s), got {}", args.len())));
    }
    Ok(())
}

fn parse_tx_name(line: &str, raw: &str) -> Result<String, ParseError> {
    if raw.is_empty() {
        return Err(fail(line, "transaction name must not be empty"));
    }
    Ok(raw.to_string())
}

/// Parses an `xN` record token, validating `1 <= N <= 20`.
fn parse_record(line: &str, raw: &str) -> Result<u32, ParseError> {
    let digits = raw
        .strip_prefix('x')
        .ok_or_else(|| fail(line, format!("expected a record token like 'x1', got '{raw}'")))?;
    let n: u32 = digits
        .parse()
        .map_err(|_| fail(line, format!("'{raw}' is not a valid record token")))?;
    if !(1..=20).contains(&n) {
        return Err(fail(line, format!("record x{n} is out of range 1..=20")));
    }
    Ok(n)
}

fn parse_site(line: &str, raw: &str) -> Result<u32, ParseError> {
    let n: u32 =
        raw.parse().map_err(|_| fail(line, format!("'{raw}' is not a valid site number")))?;
    if !(1..=10).contains(&n) {
        return Err(fail(line, format!("site {n} is out of range 1..=10")));
    }
    Ok(n)
}

fn parse_value(line: &str, raw: &str) -> Result<i64, ParseError> {
    raw.parse().map_err(|_| fail(line, format!("'{raw}' is not a valid integer value")))
}

/// Parses one already-comment-stripped, non-empty trimmed line. `"quit"` is
/// recognized verbatim and never arity- or range-checked further.
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    if line == "quit" {
        return Ok(Command::Quit);
    }

    let (name, raw_args) = split_call(line)?;
    let args = split_args(raw_args);

    match name {
        "begin" => {
            require_arity(line, &args, 1)?;
            Ok(Command::Begin(parse_tx_name(line, args[0])?.into()))
        }
        "beginRO" => {
            require_arity(line, &args, 1)?;
            Ok(Command::BeginReadOnly(parse_tx_name(line, args[0])?.into()))
        }
        "R" => {
            require_arity(line, &args, 2)?;
            Ok(Command::Read {
                tx: parse_tx_name(line, args[0])?.into(),
                record: parse_record(line, args[1])?,
            })
        }
        "W" => {
            require_arity(line, &args, 3)?;
            Ok(Command::Write {
                tx: parse_tx_name(line, args[0])?.into(),
                record: parse_record(line, args[1])?,
                value: parse_value(line, args[2])?,
            })
        }
        "end" => {
            require_arity(line, &args, 1)?;
            Ok(Command::End(parse_tx_name(line, args[0])?.into()))
        }
        "fail" => {
            require_arity(line, &args, 1)?;
            Ok(Command::Fail(parse_site(line, args[0])?))
        }
        "recover" => {
            require_arity(line, &args, 1)?;
            Ok(Command::Recover(parse_site(line, args[0])?))
        }
        "dump" => {
            require_arity(line, &args, 0)?;
            Ok(Command::Dump)
        }
        other => Err(fail(line, format!("unknown command '{other}'"))),
    }
}

/// Parses a raw trace line: strips comments first, then dispatches to
/// `parse_command`. Returns `Ok(None)` for a blank/comment-only line, which
/// the driver must skip without invoking the coordinator (§4.5, §10).
pub fn parse_line(raw: &str) -> Result<Option<Command>, ParseError> {
    match strip_comment(raw) {
        None => Ok(None),
        Some(line) => parse_command(line).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_grammar_form() {
        assert_eq!(parse_line("begin(T1)").unwrap(), Some(Command::Begin("T1".into())));
        assert_eq!(parse_line("beginRO(U)").unwrap(), Some(Command::BeginReadOnly("U".into())));
        assert_eq!(
            parse_line("R(T1,x1)").unwrap(),
            Some(Command::Read { tx: "T1".into(), record: 1 })
        );
        assert_eq!(
            parse_line("W(T1,x1,101)").unwrap(),
            Some(Command::Write { tx: "T1".into(), record: 1, value: 101 })
        );
        assert_eq!(parse_line("end(T1)").unwrap(), Some(Command::End("T1".into())));
        assert_eq!(parse_line("dump()").unwrap(), Some(Command::Dump));
        assert_eq!(parse_line("fail(3)").unwrap(), Some(Command::Fail(3)));
        assert_eq!(parse_line("recover(3)").unwrap(), Some(Command::Recover(3)));
        assert_eq!(parse_line("quit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn ignores_whitespace_around_commas_and_parens() {
        assert_eq!(
            parse_line("W( T1 , x1 , 101 )").unwrap(),
            Some(Command::Write { tx: "T1".into(), record: 1, value: 101 })
        );
    }

    #[test]
    fn strips_trailing_comment() {
        assert_eq!(
            parse_line("begin(T1) // start a transaction").unwrap(),
            Some(Command::Begin("T1".into()))
        );
    }

    #[test]
    fn blank_or_comment_only_line_yields_no_command() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("// just a comment").unwrap(), None);
    }

    #[test]
    fn rejects_out_of_range_record_and_site() {
        assert!(parse_line("R(T1,x21)").is_err());
        assert!(parse_line("R(T1,x0)").is_err());
        assert!(parse_line("fail(11)").is_err());
        assert!(parse_line("fail(0)").is_err());
    }

    #[test]
    fn rejects_wrong_arity_and_unknown_forms() {
        assert!(parse_line("begin(T1,T2)").is_err());
        assert!(parse_line("dump(x1)").is_err());
        assert!(parse_line("frobnicate(T1)").is_err());
    }

    #[test]
    fn rejects_non_integer_value() {
        assert!(parse_line("W(T1,x1,abc)").is_err());
    }
}
