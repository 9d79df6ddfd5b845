//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses an SMTP reply from its lines (CRLF already stripped).
///
/// Replies are single-line (`250 OK`) or multi-line, where every line but the
/// last uses `-` after the code: `250-First`, `250-Second`, `250 Last`.
///
/// # Errors
///
/// Returns an error if a line is malformed or the lines disagree on the code.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };

    let code = parse_code(first)?;
    let mut text = Vec::with_capacity(lines.len());

    for line in lines {
        if parse_code(line)? != code {
            return Err(Error::Protocol(format!(
                "Reply code changed mid-reply: {line}"
            )));
        }
        match line.as_bytes().get(3) {
            None => text.push(String::new()),
            Some(b' ' | b'-') => text.push(line[4..].to_string()),
            Some(_) => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
        }
    }

    Ok(Reply::new(code, text))
}

fn parse_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .get(..3)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("Invalid reply code: {line}")))?;
    digits
        .parse::<u16>()
        .map(ReplyCode::new)
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {line}")))
}

/// Checks if a line is the last line of a reply.
///
/// A bare code (`250`) also ends a reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() == 3 || line.as_bytes().get(3) == Some(&b' ')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_single_line_reply() {
        let reply = parse_reply(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.lines, vec!["OK"]);
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let reply =
            parse_reply(&lines(&["250-smtp.example.com", "250-SIZE 1000", "250 STARTTLS"]))
                .unwrap();
        assert_eq!(reply.lines, vec!["smtp.example.com", "SIZE 1000", "STARTTLS"]);
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = parse_reply(&lines(&["354"])).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.lines, vec![""]);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-Continuing"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&lines(&["25"])).is_err());
        assert!(parse_reply(&lines(&["ABC OK"])).is_err());
        assert!(parse_reply(&lines(&["250xOK"])).is_err());
        assert!(parse_reply(&lines(&["250-First", "251 Second"])).is_err());
    }
}
