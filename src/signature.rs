//! Author/committer/tagger lines.
//!
//! A user line has the shape `Name <email> <unix-seconds> <±HHMM>`. The
//! line is split on the first `<` and `>`; seconds are signed decimal and
//! the zone is four digits with a sign, interpreted as an offset in
//! minutes from UTC. Re-rendering a parsed signature reproduces the input
//! line byte-exactly for valid UTF-8 input.

use std::fmt;

use memchr::memchr;

use crate::errors::ObjectError;

/// An instant: Unix seconds plus a signed zone offset in minutes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Time {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Offset from UTC in minutes (e.g. `-480` for `-0800`).
    pub offset_minutes: i32,
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        write!(f, "{} {}{:02}{:02}", self.seconds, sign, abs / 60, abs % 60)
    }
}

/// A name/email/instant triple from a commit or tag header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: Time,
}

impl Signature {
    /// Parses a user line (the bytes after `author `/`committer `/`tagger `).
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let lt = memchr(b'<', data).ok_or(ObjectError::malformed("user line missing '<'"))?;
        let name_end = lt.saturating_sub(1); // drop the space before '<'
        let name = &data[..name_end];

        let rest = &data[lt + 1..];
        let gt = memchr(b'>', rest).ok_or(ObjectError::malformed("user line missing '>'"))?;
        let email = &rest[..gt];

        // Skip "> " to reach the timestamp fields.
        let after = rest
            .get(gt + 2..)
            .ok_or(ObjectError::malformed("user line missing timestamp"))?;
        let space =
            memchr(b' ', after).ok_or(ObjectError::malformed("user line missing zone offset"))?;

        let seconds = parse_i64(&after[..space])
            .ok_or(ObjectError::malformed("invalid timestamp seconds"))?;
        let offset_minutes = parse_zone(&after[space + 1..])
            .ok_or(ObjectError::malformed("invalid zone offset"))?;

        Ok(Self {
            name: String::from_utf8_lossy(name).into_owned(),
            email: String::from_utf8_lossy(email).into_owned(),
            time: Time {
                seconds,
                offset_minutes,
            },
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.time)
    }
}

/// Parses a signed decimal integer with no surrounding whitespace.
fn parse_i64(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Parses a `±HHMM` zone field into minutes from UTC.
fn parse_zone(bytes: &[u8]) -> Option<i32> {
    if bytes.len() != 5 {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digit = |b: u8| -> Option<i32> {
        if b.is_ascii_digit() {
            Some((b - b'0') as i32)
        } else {
            None
        }
    };
    let hours = digit(bytes[1])? * 10 + digit(bytes[2])?;
    let minutes = digit(bytes[3])? * 10 + digit(bytes[4])?;
    Some(sign * (hours * 60 + minutes))
}
