//! Compiled regex patterns for reading QR payloads.
//!
//! Compiled once on first use. Update these when the printed ticket formats
//! change.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Key/Value Payloads
// ═══════════════════════════════════════════════════════════════════════════════

/// Separators between `key=value` pairs: `;` `,` `&` `#` or whitespace, in runs.
pub static RE_PAIR_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;,&#\s]+").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// Event Paths
// ═══════════════════════════════════════════════════════════════════════════════

/// `/events/<digits>` ending at a segment boundary, for URL paths.
pub static RE_EVENT_PATH_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/events/(\d+)(?:/|$)").unwrap());

/// `/events/<digits>` anywhere in free text.
pub static RE_EVENT_PATH_ANYWHERE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/events/(\d+)").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// Embedded Tokens
// ═══════════════════════════════════════════════════════════════════════════════

/// `token=<chars>` or `token:<chars>` preceded by start, whitespace or `?&#;,:`.
pub static RE_EMBEDDED_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s?&#;,:])token[:=]([A-Za-z0-9._~+/=-]+)").unwrap());
