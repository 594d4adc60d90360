//! Temporal access policy: when a container may be opened.
//!
//! Evaluation order is fixed: deadline first, then time-lock. A container
//! that is both past its deadline and not yet unlocked reports `Expired`,
//! since expiry is terminal.

use core::fmt;

use chrono::{DateTime, Utc};

use crate::error::SealError;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

// ---------------------------------------------------------------------------
// Access window
// ---------------------------------------------------------------------------

/// Optional unlock instant and optional deadline, at millisecond precision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessWindow {
    unlock_at: Option<DateTime<Utc>>,
    expire_at: Option<DateTime<Utc>>,
}

impl AccessWindow {
    /// No time-lock, no deadline.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Build a window. Instants are truncated to whole milliseconds, the
    /// precision stored on the wire. Ordering is checked by [`validate`](Self::validate).
    pub fn new(unlock_at: Option<DateTime<Utc>>, expire_at: Option<DateTime<Utc>>) -> Self {
        Self {
            unlock_at: unlock_at.map(truncate_to_millis),
            expire_at: expire_at.map(truncate_to_millis),
        }
    }

    pub fn unlocks_at(at: DateTime<Utc>) -> Self {
        Self::new(Some(at), None)
    }

    pub fn expires_at(at: DateTime<Utc>) -> Self {
        Self::new(None, Some(at))
    }

    /// Returns None if either timestamp is outside chrono's range.
    pub fn from_millis(unlock_at: Option<i64>, expire_at: Option<i64>) -> Option<Self> {
        let unlock_at = match unlock_at {
            Some(ms) => Some(DateTime::from_timestamp_millis(ms)?),
            None => None,
        };
        let expire_at = match expire_at {
            Some(ms) => Some(DateTime::from_timestamp_millis(ms)?),
            None => None,
        };
        Some(Self {
            unlock_at,
            expire_at,
        })
    }

    pub fn unlock_at(&self) -> Option<DateTime<Utc>> {
        self.unlock_at
    }

    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    pub fn is_unrestricted(&self) -> bool {
        self.unlock_at.is_none() && self.expire_at.is_none()
    }

    /// Seal-time check: when both bounds are set the window must be non-empty.
    pub fn validate(&self) -> Result<(), SealError> {
        match (self.unlock_at, self.expire_at) {
            (Some(unlock_at), Some(expire_at)) if unlock_at >= expire_at => {
                Err(SealError::InvalidWindow {
                    unlock_at,
                    expire_at,
                })
            }
            _ => Ok(()),
        }
    }

    /// Decide access at `now`.
    pub fn evaluate(&self, now: DateTime<Utc>) -> AccessState {
        if let Some(expired_at) = self.expire_at {
            if now > expired_at {
                return AccessState::Expired { expired_at };
            }
        }

        if let Some(unlock_at) = self.unlock_at {
            if now < unlock_at {
                return AccessState::Locked;
            }
        }

        if self.is_unrestricted() {
            return AccessState::NoRestriction;
        }

        AccessState::Available {
            remaining: self
                .expire_at
                .map(|expire_at| TimeRemaining::between(now, expire_at)),
        }
    }
}

fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

// ---------------------------------------------------------------------------
// Access state
// ---------------------------------------------------------------------------

/// Outcome of evaluating an [`AccessWindow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessState {
    /// Neither a time-lock nor a deadline is set.
    NoRestriction,
    /// Not yet unlocked. Deliberately carries no timestamp.
    Locked,
    /// Past the deadline.
    Expired { expired_at: DateTime<Utc> },
    /// Every configured restriction is satisfied.
    Available { remaining: Option<TimeRemaining> },
}

impl AccessState {
    pub fn permits_decryption(&self) -> bool {
        matches!(self, Self::NoRestriction | Self::Available { .. })
    }

    /// The refusal to report when decryption is blocked.
    pub fn refusal(&self) -> Option<Refusal> {
        match *self {
            Self::Locked => Some(Refusal::Locked),
            Self::Expired { expired_at } => Some(Refusal::Expired { expired_at }),
            Self::NoRestriction | Self::Available { .. } => None,
        }
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRestriction => write!(f, "No time restrictions."),
            Self::Locked => fmt::Display::fmt(&Refusal::Locked, f),
            Self::Expired { expired_at } => fmt::Display::fmt(
                &Refusal::Expired {
                    expired_at: *expired_at,
                },
                f,
            ),
            Self::Available {
                remaining: Some(remaining),
            } => write!(f, "File will expire in {}.", remaining),
            Self::Available { remaining: None } => {
                write!(f, "Time-lock expired. File is available for decryption.")
            }
        }
    }
}

/// Time left before a deadline, floored to whole days and hours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
}

impl TimeRemaining {
    pub fn between(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        let ms = (deadline - now).num_milliseconds().max(0);
        Self {
            days: ms / MILLIS_PER_DAY,
            hours: (ms % MILLIS_PER_DAY) / MILLIS_PER_HOUR,
        }
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days and {} hours", self.days, self.hours)
    }
}

// ---------------------------------------------------------------------------
// Refusals
// ---------------------------------------------------------------------------

/// Why `open` declined to decrypt. Expected outcomes, not failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refusal {
    /// Not available yet. When it unlocks is not disclosed.
    Locked,
    /// Past the deadline; permanent.
    Expired { expired_at: DateTime<Utc> },
}

impl Refusal {
    /// Locked containers may open later; expired ones never will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Locked)
    }
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "This file isn't available for decryption yet!"),
            Self::Expired { .. } => write!(
                f,
                "This file has expired and is no longer available for decryption."
            ),
        }
    }
}
