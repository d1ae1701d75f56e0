//! Session correlation ids.
//!
//! A local id looks like `<host>-<pid>-<timestamp>-<sequence>`. When a
//! connection is a forwarded hop, the upstream id is kept in front of it,
//! separated by `;`, so one request can be followed across proxies:
//!
//! ```text
//! frontend1-812-1760000000-4;mail01-17234-1760000001-42
//! ```
//!
//! The printable form never exceeds [`MAX_SESSIONID_SIZE`] bytes. When it
//! would, the oldest (leftmost) hops are dropped first so the most recent
//! ones stay visible.

use configuration::GateConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ParseError;

pub const MAX_SESSIONID_SIZE: usize = 256;
pub const HOP_SEPARATOR: char = ';';
const MAX_HOST_LEN: usize = 128;
const ENVELOPE_PREFIX: &str = "SESSIONID=<";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionId {
    host_component: String,
    pid_component: u32,
    timestamp_component: u64,
    sequence_component: u64,
    inherited_prefix: Option<String>,
}

impl SessionId {
    fn assemble(
        host: String,
        pid: u32,
        timestamp: u64,
        sequence: u64,
        upstream: Option<&str>,
    ) -> Self {
        let mut id = Self {
            host_component: host,
            pid_component: pid,
            timestamp_component: timestamp,
            sequence_component: sequence,
            inherited_prefix: None,
        };
        let local_len = id.local().len();
        id.inherited_prefix = upstream.and_then(|u| fit_prefix(u, local_len));
        id
    }

    pub fn host_component(&self) -> &str {
        &self.host_component
    }

    pub fn pid_component(&self) -> u32 {
        self.pid_component
    }

    pub fn timestamp_component(&self) -> u64 {
        self.timestamp_component
    }

    pub fn sequence_component(&self) -> u64 {
        self.sequence_component
    }

    pub fn inherited_prefix(&self) -> Option<&str> {
        self.inherited_prefix.as_deref()
    }

    /// This hop's part of the id.
    pub fn local(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.host_component,
            self.pid_component,
            self.timestamp_component,
            self.sequence_component
        )
    }

    /// Printable form, at most [`MAX_SESSIONID_SIZE`] bytes.
    pub fn format(&self) -> String {
        match &self.inherited_prefix {
            Some(prefix) => format!("{}{}{}", prefix, HOP_SEPARATOR, self.local()),
            None => self.local(),
        }
    }

    /// Parse a printable id, optionally wrapped as `SESSIONID=<...>`.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let text = strip_envelope(input)?;
        validate_fragment(text)?;

        let (prefix, local) = match text.rsplit_once(HOP_SEPARATOR) {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, text),
        };
        if prefix.is_some_and(str::is_empty) {
            return Err(ParseError::Malformed("empty upstream segment".to_string()));
        }

        let mut fields = local.rsplitn(4, '-');
        let sequence = parse_number(fields.next(), "sequence")?;
        let timestamp = parse_number(fields.next(), "timestamp")?;
        let pid = parse_number(fields.next(), "pid")?;
        let host = fields
            .next()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ParseError::Malformed("missing host".to_string()))?;
        let pid = u32::try_from(pid)
            .map_err(|_| ParseError::Malformed(format!("pid {} out of range", pid)))?;

        Ok(Self {
            host_component: host.to_string(),
            pid_component: pid,
            timestamp_component: timestamp,
            sequence_component: sequence,
            inherited_prefix: prefix.map(str::to_string),
        })
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

fn parse_number(field: Option<&str>, what: &str) -> Result<u64, ParseError> {
    let field = field.ok_or_else(|| ParseError::Malformed(format!("missing {}", what)))?;
    field
        .parse::<u64>()
        .map_err(|_| ParseError::Malformed(format!("{} '{}' is not a number", what, field)))
}

/// Unwrap `SESSIONID=<...>` if present.
fn strip_envelope(input: &str) -> Result<&str, ParseError> {
    match input.find(ENVELOPE_PREFIX) {
        Some(start) => {
            let rest = &input[start + ENVELOPE_PREFIX.len()..];
            let end = rest
                .find('>')
                .ok_or_else(|| ParseError::Malformed("unterminated SESSIONID envelope".to_string()))?;
            Ok(&rest[..end])
        }
        None => Ok(input),
    }
}

/// Non-empty, bounded, printable ASCII without whitespace.
pub fn validate_fragment(fragment: &str) -> Result<(), ParseError> {
    if fragment.is_empty() {
        return Err(ParseError::Malformed("empty".to_string()));
    }
    if fragment.len() > MAX_SESSIONID_SIZE {
        return Err(ParseError::Malformed(format!(
            "{} bytes exceeds {}",
            fragment.len(),
            MAX_SESSIONID_SIZE
        )));
    }
    if let Some(c) = fragment.chars().find(|c| !c.is_ascii_graphic()) {
        return Err(ParseError::Malformed(format!(
            "invalid character {:?}",
            c
        )));
    }
    Ok(())
}

/// Longest suffix of `s` that fits in `max` bytes, on a char boundary.
fn keep_tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Shrink an upstream prefix so `prefix;local` fits the size cap.
fn fit_prefix(upstream: &str, local_len: usize) -> Option<String> {
    let budget = MAX_SESSIONID_SIZE.checked_sub(local_len + HOP_SEPARATOR.len_utf8())?;
    if budget == 0 || upstream.is_empty() {
        return None;
    }
    let mut prefix = upstream;
    while prefix.len() > budget {
        match prefix.split_once(HOP_SEPARATOR) {
            Some((_, newer)) if !newer.is_empty() => prefix = newer,
            _ => {
                prefix = keep_tail(prefix, budget);
                break;
            }
        }
    }
    Some(prefix.to_string())
}

/// Join an upstream id and a local suffix under the size cap.
pub fn chain(upstream: &str, local: &str) -> String {
    let local = keep_tail(local, MAX_SESSIONID_SIZE);
    match fit_prefix(upstream, local.len()) {
        Some(prefix) => format!("{}{}{}", prefix, HOP_SEPARATOR, local),
        None => local.to_string(),
    }
}

/// Keep only characters that cannot break the id grammar.
fn sanitize_host(host: &str) -> String {
    let cleaned: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_HOST_LEN)
        .collect();
    if cleaned.is_empty() {
        "localhost".to_string()
    } else {
        cleaned
    }
}

/// Produces ids for connections handled by this process.
#[derive(Debug, Clone)]
pub struct SessionIdGenerator {
    host: String,
}

impl SessionIdGenerator {
    pub fn new(host: &str) -> Self {
        Self {
            host: sanitize_host(host),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(&config.server_name)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Fresh id, chained onto `upstream` when it is well-formed.
    ///
    /// A malformed upstream fragment never fails the connection: it is
    /// logged and a fresh, unchained id is returned.
    pub fn new_id(&self, upstream: Option<&str>) -> SessionId {
        match self.try_new_id(upstream) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Ignoring upstream session id: {}", e);
                self.generate(None)
            }
        }
    }

    /// Like [`new_id`](Self::new_id) but reports a malformed upstream.
    pub fn try_new_id(&self, upstream: Option<&str>) -> Result<SessionId, ParseError> {
        let upstream = match upstream {
            Some(raw) => {
                let fragment = strip_envelope(raw)?;
                validate_fragment(fragment)?;
                Some(fragment)
            }
            None => None,
        };
        Ok(self.generate(upstream))
    }

    fn generate(&self, upstream: Option<&str>) -> SessionId {
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
        let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        SessionId::assemble(
            self.host.clone(),
            std::process::id(),
            timestamp,
            sequence,
            upstream,
        )
    }
}
