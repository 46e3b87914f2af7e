//! RFC 5322 header block handling: decoding, unfolding, and date parsing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

/// Unfolded header fields of one message, in file order.
///
/// Names are lowercased; values are trimmed. Repeated fields (such as
/// `Received`) are all kept.
#[derive(Debug, Clone, Default)]
pub struct RawHeaders {
    fields: Vec<(String, String)>,
}

impl RawHeaders {
    /// Parse a raw header block (everything before the first blank line).
    pub fn parse(raw_headers: &[u8]) -> Self {
        let text = decode_header_bytes(raw_headers);
        Self {
            fields: unfold_headers(&text),
        }
    }

    /// First value for a header name (case-insensitive).
    pub fn first(&self, name: &str) -> Option<&str> {
        self.all(name).next()
    }

    /// Every value for a header name, in file order.
    pub fn all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .filter(move |(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Byte offset where the header block ends (the first blank line), if any.
pub fn find_header_end(data: &[u8]) -> Option<usize> {
    blank_line(data).map(|(end, _)| end)
}

/// The header block including its terminating blank line. The whole input
/// when there is no body.
pub fn header_block(data: &[u8]) -> &[u8] {
    match blank_line(data) {
        Some((_, body)) => &data[..body],
        None => data,
    }
}

/// Locate the first empty line: `(end of headers, start of body)`.
///
/// A line break is `\n` or `\r\n`, and the two breaks around the empty
/// line need not match.
fn blank_line(data: &[u8]) -> Option<(usize, usize)> {
    if data.starts_with(b"\n") {
        return Some((0, 1));
    }
    if data.starts_with(b"\r\n") {
        return Some((0, 2));
    }
    for (i, &b) in data.iter().enumerate() {
        if b != b'\n' {
            continue;
        }
        let rest = &data[i + 1..];
        let sep = if rest.starts_with(b"\n") {
            1
        } else if rest.starts_with(b"\r\n") {
            2
        } else {
            continue;
        };
        let end = if i > 0 && data[i - 1] == b'\r' { i - 1 } else { i };
        return Some((end, i + 1 + sep));
    }
    None
}

/// Decode raw header bytes to a string.
///
/// UTF-8 first, then Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines (leading space or tab) onto the previous field.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_ascii_lowercase();
            if name.is_empty() || name.contains(' ') {
                continue;
            }
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

/// Extract the date-time clause of a `Received` trace header.
///
/// The clause follows the last `;`. Parenthetical comments such as
/// `(UTC)` or `(PDT)` are dropped before parsing.
pub fn received_date(value: &str) -> Option<DateTime<Utc>> {
    let clause = value.rsplit(';').next().unwrap_or(value);
    parse_date(clause)
}

/// Parse an email date string in the common RFC 2822 shapes and a few
/// broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let cleaned = strip_comments(date_str);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(trimmed);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&no_dow, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&no_dow, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    let replaced = replace_named_tz(&no_dow);
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Last resort: let `mail-parser` read the value as a `Date:` field.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Remove `( … )` comments, including nested ones, and collapse whitespace.
fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for ch in s.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip a leading day-of-week prefix (`"Thu, "` or `"Thu "`).
fn strip_day_of_week(s: &str) -> String {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            let rest = rest.strip_prefix(',').unwrap_or(rest);
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    const TZS: [(&str, &str); 14] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    for (name, offset) in TZS {
        if let Some(head) = s.strip_suffix(name) {
            if head.ends_with(' ') {
                return format!("{head}{offset}");
            }
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_header_end() {
        let data = b"From: a@b.com\nSubject: Hi\n\nBody\n";
        assert_eq!(find_header_end(data), Some(25));
    }

    #[test]
    fn test_find_header_end_crlf() {
        let data = b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n";
        assert_eq!(find_header_end(data), Some(26));
    }

    #[test]
    fn test_find_header_end_mixed_line_breaks() {
        let data = b"From: a@b.com\nSubject: Hi\n\r\nNote: not a header\r\n";
        assert_eq!(find_header_end(data), Some(25));
        assert_eq!(header_block(data), b"From: a@b.com\nSubject: Hi\n\r\n");

        let headers = RawHeaders::parse(&data[..find_header_end(data).unwrap()]);
        assert_eq!(headers.first("note"), None);
        assert_eq!(headers.first("subject"), Some("Hi"));
    }

    #[test]
    fn test_header_block_without_body() {
        let data = b"Subject: only headers\n";
        assert_eq!(find_header_end(data), None);
        assert_eq!(header_block(data), &data[..]);
        assert_eq!(find_header_end(b"\nBody: x\n"), Some(0));
    }

    #[test]
    fn test_unfold_keeps_repeated_fields() {
        let raw = b"Received: from a by b;\n\tFri, 10 Jan 2020 10:00:00 +0000\nReceived: from c; 11 Jan 2020 09:00:00 +0000\nSubject: x\n";
        let headers = RawHeaders::parse(raw);
        assert_eq!(headers.fields.len(), 3);
        let received: Vec<&str> = headers.all("Received").collect();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], "from a by b; Fri, 10 Jan 2020 10:00:00 +0000");
        assert_eq!(headers.first("SUBJECT"), Some("x"));
    }

    #[test]
    fn test_latin1_header_bytes() {
        let raw = b"Subject: caf\xe9\n";
        let headers = RawHeaders::parse(raw);
        assert_eq!(headers.first("subject"), Some("café"));
    }

    #[test]
    fn test_received_date_with_comment() {
        let dt = received_date("from mx by host with ESMTP id 42; Fri, 10 Jan 2020 10:00:00 +0000 (UTC)")
            .unwrap();
        assert_eq!(dt.timestamp(), 1_578_650_400);
    }

    #[test]
    fn test_received_date_without_clause() {
        assert!(received_date("from mx by host with ESMTP").is_none());
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_parse_date_without_dow() {
        assert!(parse_date("04 Jan 2024 10:00:00 +0000").is_some());
    }

    #[test]
    fn test_parse_date_named_tz() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 EST").unwrap();
        assert_eq!(dt.format("%H").to_string(), "15");
    }

    #[test]
    fn test_parse_date_iso8601() {
        assert!(parse_date("2024-01-04T10:00:00Z").is_some());
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date at all").is_none());
    }

    #[test]
    fn test_strip_comments_nested() {
        assert_eq!(
            strip_comments("10 Jan 2020 10:00:00 +0000 (UTC (really))"),
            "10 Jan 2020 10:00:00 +0000"
        );
    }
}
