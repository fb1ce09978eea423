/*
 * date.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Postino, a synchronous HTTP client library.
 *
 * Postino is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Postino is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Postino.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP date parsing (RFC 7231 section 7.1.1.1) with the legacy formats still seen in
//! `Expires` and `Set-Cookie` headers.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Which format a date matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpDateFormat {
    /// `Sun, 06 Nov 1994 08:49:37 GMT`
    Rfc1123,
    /// One of the legacy formats, numbered from 1 in the order they are tried.
    Legacy(usize),
}

struct Layout {
    /// Text between the weekday name and the date.
    separator: &'static str,
    /// chrono format for the rest, without the zone.
    body: &'static str,
    zoned: bool,
}

const fn layout(separator: &'static str, body: &'static str, zoned: bool) -> Layout {
    Layout { separator, body, zoned }
}

const RFC1123: Layout = layout(", ", "%d %b %Y %H:%M:%S", true);

const LEGACY: &[Layout] = &[
    layout(", ", "%d-%b-%y %H:%M:%S", true), // RFC 1036
    layout(" ", "%b %d %H:%M:%S %Y", false), // asctime
    layout(", ", "%d-%b-%Y %H:%M:%S", true),
    layout(", ", "%d-%b-%Y %H-%M-%S", true),
    layout(", ", "%d %b %y %H:%M:%S", true),
    layout(" ", "%d-%b-%Y %H:%M:%S", true),
    layout(" ", "%d %b %Y %H:%M:%S", true),
    layout(" ", "%d-%b-%Y %H-%M-%S", true),
    layout(" ", "%d-%b-%y %H:%M:%S", true),
    layout(" ", "%d %b %y %H:%M:%S", true),
    layout(",", "%d-%b-%y %H:%M:%S", true),
    layout(",", "%d-%b-%Y %H:%M:%S", true),
    layout(", ", "%d-%m-%Y %H:%M:%S", true),
    layout(" ", "%b %d %Y %H:%M:%S", true),
];

const WEEKDAYS: &[(&str, &str)] = &[
    ("mon", "monday"),
    ("tue", "tuesday"),
    ("wed", "wednesday"),
    ("thu", "thursday"),
    ("fri", "friday"),
    ("sat", "saturday"),
    ("sun", "sunday"),
];

/// Parse an HTTP date. RFC 1123 is tried first, then the legacy formats in order.
/// Returns None when nothing matches.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    parse_http_date_detailed(value).map(|(dt, _)| dt)
}

/// As `parse_http_date`, also reporting which format matched.
pub fn parse_http_date_detailed(value: &str) -> Option<(DateTime<Utc>, HttpDateFormat)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(dt) = parse_layout(value, &RFC1123) {
        return Some((dt, HttpDateFormat::Rfc1123));
    }
    LEGACY
        .iter()
        .enumerate()
        .find_map(|(i, l)| parse_layout(value, l).map(|dt| (dt, HttpDateFormat::Legacy(i + 1))))
}

/// Format a timestamp in RFC 1123 form, e.g. for `If-Modified-Since`.
pub fn format_http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_layout(value: &str, layout: &Layout) -> Option<DateTime<Utc>> {
    let rest = strip_weekday(value)?;
    let rest = rest.strip_prefix(layout.separator)?;
    let (body, offset) = if layout.zoned {
        let (body, zone) = rest.trim_end().rsplit_once(' ')?;
        (body, zone_offset(zone)?)
    } else {
        (rest, 0)
    };
    // asctime pads single-digit days with a second space
    let body = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&body, layout.body).ok()?;
    if layout.body.contains("%Y") && naive.year() < 1000 {
        // two-digit years belong to the %y layouts
        return None;
    }
    let zone = FixedOffset::east_opt(offset)?;
    let local = zone.from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

/// Remove a leading short or long weekday name, leaving what follows it.
fn strip_weekday(value: &str) -> Option<&str> {
    let end = value
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(value.len());
    let name = value[..end].to_ascii_lowercase();
    if WEEKDAYS.iter().any(|(short, long)| name == *short || name == *long) {
        Some(&value[end..])
    } else {
        None
    }
}

/// Zone token to seconds east of UTC: named zones, `+hhmm`, `+hh:mm`, optionally after GMT/UTC.
fn zone_offset(zone: &str) -> Option<i32> {
    let upper = zone.to_ascii_uppercase();
    let hours = match upper.as_str() {
        "GMT" | "UTC" | "UT" | "Z" => Some(0),
        "EST" => Some(-5),
        "EDT" => Some(-4),
        "CST" => Some(-6),
        "CDT" => Some(-5),
        "MST" => Some(-7),
        "MDT" => Some(-6),
        "PST" => Some(-8),
        "PDT" => Some(-7),
        _ => None,
    };
    if let Some(h) = hours {
        return Some(h * 3600);
    }
    let numeric = upper
        .strip_prefix("GMT")
        .or_else(|| upper.strip_prefix("UTC"))
        .unwrap_or(&upper);
    numeric_offset(numeric)
}

fn numeric_offset(s: &str) -> Option<i32> {
    let (sign, digits) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits = digits.replace(':', "");
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (h, m) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if h > 23 || m > 59 {
        return None;
    }
    Some(sign * (h * 3600 + m * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
    }

    #[test]
    fn rfc1123_is_primary() {
        let (dt, fmt) = parse_http_date_detailed("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(dt, expected());
        assert_eq!(fmt, HttpDateFormat::Rfc1123);
    }

    #[test]
    fn rfc1036_is_first_fallback() {
        let (dt, fmt) = parse_http_date_detailed("Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
        assert_eq!(dt, expected());
        assert_eq!(fmt, HttpDateFormat::Legacy(1));
    }

    #[test]
    fn asctime_is_utc() {
        let (dt, fmt) = parse_http_date_detailed("Sun Nov  6 08:49:37 1994").unwrap();
        assert_eq!(dt, expected());
        assert_eq!(fmt, HttpDateFormat::Legacy(2));
    }

    #[test]
    fn cookie_style_dates() {
        assert_eq!(parse_http_date("Sun, 06-Nov-1994 08:49:37 GMT"), Some(expected()));
        assert_eq!(parse_http_date("Sun, 06-Nov-1994 08-49-37 GMT"), Some(expected()));
        assert_eq!(parse_http_date("Sun,06-Nov-94 08:49:37 GMT"), Some(expected()));
        assert_eq!(parse_http_date("Sun 06 Nov 1994 08:49:37 GMT"), Some(expected()));
        assert_eq!(parse_http_date("Sun, 06-11-1994 08:49:37 GMT"), Some(expected()));
        assert_eq!(parse_http_date("Sun Nov 6 1994 08:49:37 GMT"), Some(expected()));
    }

    #[test]
    fn two_digit_year_in_space_layout() {
        let (dt, fmt) = parse_http_date_detailed("Sun, 06 Nov 94 08:49:37 GMT").unwrap();
        assert_eq!(dt, expected());
        assert_eq!(fmt, HttpDateFormat::Legacy(5));
    }

    #[test]
    fn zone_offsets_are_applied() {
        let dt = parse_http_date("Sun, 06 Nov 1994 03:49:37 EST").unwrap();
        assert_eq!(dt, expected());
        let dt = parse_http_date("Sun, 06 Nov 1994 09:49:37 +0100").unwrap();
        assert_eq!(dt, expected());
        let dt = parse_http_date("Sun, 06 Nov 1994 09:49:37 GMT+01:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_http_date("not-a-date"), None);
        assert_eq!(parse_http_date(""), None);
        assert_eq!(parse_http_date("Xyz, 06 Nov 1994 08:49:37 GMT"), None);
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 Mars"), None);
    }

    #[test]
    fn format_round_trips() {
        let s = format_http_date(&expected());
        assert_eq!(s, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date(&s), Some(expected()));
    }
}
