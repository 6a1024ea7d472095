//! `document.cookie` string encoding.
//!
//! Reads see `name=value; name2=value2`. Writes are one cookie at a time,
//! `name=value` followed by `; attribute` pairs. Names and values are
//! percent-encoded with the `encodeURIComponent` character set.

use super::types::{Cookie, CookieDeleteOptions, CookieInit};
use crate::error::{Result, StoreError};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Characters left unescaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Expiry used to make the host drop a cookie.
pub const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

// First second of year 10000, which an HTTP date cannot express.
const MAX_EXPIRES_SECS: u64 = 253_402_300_800;

/// Format an `expires` attribute value.
///
/// Dates before the epoch clamp to [`EPOCH_EXPIRES`], which still expires the
/// cookie. Dates past year 9999 are rejected.
pub fn format_expires(at: SystemTime) -> Result<String> {
    match at.duration_since(UNIX_EPOCH) {
        Err(_) => Ok(EPOCH_EXPIRES.to_string()),
        Ok(since) if since >= Duration::from_secs(MAX_EXPIRES_SECS) => Err(StoreError::InvalidCookie(
            format!("expiry more than {MAX_EXPIRES_SECS}s after the epoch"),
        )),
        Ok(_) => Ok(httpdate::fmt_http_date(at)),
    }
}

pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Percent-decode, replacing invalid UTF-8 rather than failing.
pub fn decode_component(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Parse one `name=value` pair. Pairs without `=` or with an empty name are
/// rejected.
pub fn parse_cookie_pair(pair: &str) -> Option<Cookie> {
    let trimmed = pair.trim();
    let (name, value) = trimmed.split_once('=')?;
    let name = decode_component(name.trim());
    if name.is_empty() {
        return None;
    }
    Some(Cookie::new(name, decode_component(value.trim())))
}

/// Parse a full `document.cookie` read.
pub fn parse_cookie_string(cookies: &str) -> Vec<Cookie> {
    cookies.split(';').filter_map(parse_cookie_pair).collect()
}

pub fn serialize_cookie(init: &CookieInit) -> Result<String> {
    let mut parts = vec![format!(
        "{}={}",
        encode_component(&init.name),
        encode_component(&init.value)
    )];

    if let Some(expires) = init.expires {
        parts.push(format!("expires={}", format_expires(expires)?));
    }
    if let Some(path) = init.path.as_deref().filter(|p| !p.is_empty()) {
        parts.push(format!("path={path}"));
    }
    if let Some(domain) = init.domain.as_deref().filter(|d| !d.is_empty()) {
        parts.push(format!("domain={domain}"));
    }
    if let Some(same_site) = init.same_site {
        parts.push(format!("SameSite={same_site}"));
    }

    Ok(parts.join("; "))
}

/// Serialize a write that expires `options.name` immediately.
///
/// The path defaults to `/` since the host only removes a cookie whose path
/// matches.
pub fn serialize_deletion(options: &CookieDeleteOptions) -> String {
    let mut parts = vec![
        format!("{}=", encode_component(&options.name)),
        format!("expires={EPOCH_EXPIRES}"),
    ];

    match options.path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => parts.push(format!("path={path}")),
        None => parts.push("path=/".to_string()),
    }
    if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
        parts.push(format!("domain={domain}"));
    }

    parts.join("; ")
}

/// The parts of a cookie write a host needs to apply it.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieWrite {
    /// Encoded name, as it will appear in later reads.
    pub name: String,
    /// Encoded value.
    pub value: String,
    pub expires: Option<SystemTime>,
}

/// Split a serialized cookie write into its pair and expiry.
///
/// Unknown attributes are ignored, as is an unparsable `expires`.
pub fn parse_cookie_write(write: &str) -> Option<CookieWrite> {
    let mut segments = write.split(';');
    let (name, value) = segments.next()?.trim().split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let expires = segments
        .filter_map(|segment| segment.trim().split_once('='))
        .find(|(attr, _)| attr.trim().eq_ignore_ascii_case("expires"))
        .and_then(|(_, date)| httpdate::parse_http_date(date.trim()).ok());

    Some(CookieWrite {
        name: name.to_string(),
        value: value.trim().to_string(),
        expires,
    })
}
