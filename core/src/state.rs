//! The request lifecycle label stored in the Request State Store (§3, §4.2).

use std::fmt;
use std::time::Duration;

/// Default TTL for non-terminal and `success`/`failed` terminal labels.
///
/// §3: "TTL 5 minutes on every non-terminal write; terminal labels may be
/// written with the same TTL (see §4.2 for the exception in C7)."
pub const STATE_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL the cancel consumer uses when it writes `cancelled`. §4.2: "C7 writes
/// `cancelled` with effectively-infinite TTL so late-arriving booking
/// workers still observe it when their message lands after the cancel."
/// §9 flags that the source's "TTL 0" means "no expiry" in the underlying
/// store; we preserve that semantics explicitly rather than leaving it
/// implicit (see DESIGN.md, Open Question).
pub const CANCELLED_TTL: Option<Duration> = None;

/// The lifecycle label for a request fingerprint, stored at
/// `reqstate:<RF>` (§3, §6).
///
/// `Cancelled` is sticky: once observed, [`RequestStateStore::compare_and_advance`]
/// will never overwrite it with anything else (§3, §4.2).
///
/// [`RequestStateStore::compare_and_advance`]: crate::request_state_store::RequestStateStore::compare_and_advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    /// Seat reservation in progress.
    S1,
    /// Booking persistence in progress.
    S2,
    /// Inventory propagation in progress.
    S3,
    /// Terminal: booking confirmed and inventory delta published.
    Success,
    /// Terminal: seat reservation failed (insufficient seats or unknown
    /// event).
    Failed,
    /// Terminal, sticky: the request was cancelled.
    Cancelled,
}

impl RequestState {
    /// Whether this label is one of `s1`/`s2`/`s3` — a request "inflight"
    /// per the glossary.
    #[must_use]
    pub const fn is_inflight(self) -> bool {
        matches!(self, Self::S1 | Self::S2 | Self::S3)
    }

    /// Whether this label can never transition to anything else.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// The store label string, matching the wire-level vocabulary used
    /// throughout §3-§4.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S1 => "s1",
            Self::S2 => "s2",
            Self::S3 => "s3",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a label read back from the store. Unrecognized labels are
    /// treated as absent by callers (defensive: the label space is closed).
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "s1" => Some(Self::S1),
            "s2" => Some(Self::S2),
            "s3" => Some(Self::S3),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
