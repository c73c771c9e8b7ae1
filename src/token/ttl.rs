//! Expiry-hint parsing for portal token issuance
//!
//! Issuance callers supply `customExpiry` as a hint, not a contract: the
//! accepted values are the enumerated 7/14/30/60/90 day windows, and
//! anything unrecognized falls back to the 30-day default instead of
//! failing the request.

use std::time::Duration;

const DAY_SECS: u64 = 24 * 60 * 60;

/// Portal token lifetime, one of the enumerated issuance windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTtl {
    Days7,
    Days14,
    Days30,
    Days60,
    Days90,
}

impl TokenTtl {
    /// Fallback window applied to absent or unrecognized hints
    pub const DEFAULT: TokenTtl = TokenTtl::Days30;

    /// Lifetime in seconds
    pub fn as_secs(self) -> u64 {
        match self {
            TokenTtl::Days7 => 7 * DAY_SECS,
            TokenTtl::Days14 => 14 * DAY_SECS,
            TokenTtl::Days30 => 30 * DAY_SECS,
            TokenTtl::Days60 => 60 * DAY_SECS,
            TokenTtl::Days90 => 90 * DAY_SECS,
        }
    }

    /// Canonical hint form ("7d", "30d", ...)
    pub fn as_str(self) -> &'static str {
        match self {
            TokenTtl::Days7 => "7d",
            TokenTtl::Days14 => "14d",
            TokenTtl::Days30 => "30d",
            TokenTtl::Days60 => "60d",
            TokenTtl::Days90 => "90d",
        }
    }

    /// Resolve an optional caller-supplied hint to a TTL.
    ///
    /// The canonical forms match directly. Other spellings (e.g. "7 days")
    /// are accepted via humantime when they land exactly on an enumerated
    /// window. Everything else falls back to `DEFAULT`.
    pub fn from_hint(hint: Option<&str>) -> TokenTtl {
        let Some(raw) = hint else {
            return TokenTtl::DEFAULT;
        };

        match raw.trim() {
            "7d" => TokenTtl::Days7,
            "14d" => TokenTtl::Days14,
            "30d" => TokenTtl::Days30,
            "60d" => TokenTtl::Days60,
            "90d" => TokenTtl::Days90,
            other => humantime::parse_duration(other)
                .ok()
                .and_then(Self::from_exact_duration)
                .unwrap_or(TokenTtl::DEFAULT),
        }
    }

    fn from_exact_duration(d: Duration) -> Option<TokenTtl> {
        match d.as_secs() {
            s if s == 7 * DAY_SECS => Some(TokenTtl::Days7),
            s if s == 14 * DAY_SECS => Some(TokenTtl::Days14),
            s if s == 30 * DAY_SECS => Some(TokenTtl::Days30),
            s if s == 60 * DAY_SECS => Some(TokenTtl::Days60),
            s if s == 90 * DAY_SECS => Some(TokenTtl::Days90),
            _ => None,
        }
    }
}
