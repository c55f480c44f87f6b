//! SM-2 Spaced Repetition Algorithm
//!
//! Simplified SuperMemo 2 scheduling for topics. The scheduler is a pure
//! function of the topic's memory-strength state, the review quality and
//! the current time; callers supply `now`.
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout, no recall
//! - 1: Incorrect, but upon seeing answer, remembered
//! - 2: Incorrect, but answer seemed easy to recall
//! - 3: Correct response with serious difficulty
//! - 4: Correct response after hesitation
//! - 5: Perfect response with no hesitation

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{latest_review_date, ReviewState, MIN_EASE_FACTOR};

/// Lowest quality that counts as a successful recall
const PASSING_QUALITY: u8 = 3;

/// Longest interval ever computed, well past the latest schedulable date
const MAX_INTERVAL_DAYS: f64 = 4_000_000.0;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid review quality: {0} (expected 0-5)")]
pub struct InvalidQuality(pub i32);

/// A validated review quality in `0..=5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether this rating counts as a successful recall
    pub fn is_pass(self) -> bool {
        self.0 >= PASSING_QUALITY
    }

    /// All six ratings, lowest first
    pub fn all() -> impl Iterator<Item = Quality> {
        (0..=Self::MAX).map(Quality)
    }
}

impl TryFrom<i32> for Quality {
    type Error = InvalidQuality;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(q) if q <= Self::MAX => Ok(Quality(q)),
            _ => Err(InvalidQuality(value)),
        }
    }
}

impl From<Quality> for i32 {
    fn from(quality: Quality) -> Self {
        quality.0 as i32
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of calculating the next review
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewOutcome {
    pub next_review_date: DateTime<Utc>,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval: Duration,
}

impl ReviewOutcome {
    pub fn state(&self) -> ReviewState {
        ReviewState {
            repetitions: self.repetitions,
            ease_factor: self.ease_factor,
        }
    }
}

/// Calculate the next review date, streak and ease factor
///
/// A failed recall (quality below 3) resets the streak and lowers the ease
/// factor by 0.2. A successful recall extends the streak and adjusts the
/// ease factor by the SM-2 formula. The ease factor never drops below 1.3,
/// on either branch: plain SM-2 lets q=3 push it under the floor, this
/// version clamps it.
///
/// The due date never goes past [`latest_review_date`]; `interval` is the
/// distance actually scheduled.
pub fn compute_next_review(
    state: ReviewState,
    quality: Quality,
    now: DateTime<Utc>,
) -> ReviewOutcome {
    let (repetitions, ease_factor) = if quality.is_pass() {
        // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
        let miss = (Quality::MAX - quality.value()) as f64;
        let ease_factor = state.ease_factor + (0.1 - miss * (0.08 + miss * 0.02));
        // q=3 lowers the factor by 0.14
        (state.repetitions.saturating_add(1), ease_factor.max(MIN_EASE_FACTOR))
    } else {
        (0, (state.ease_factor - 0.2).max(MIN_EASE_FACTOR))
    };

    let latest = latest_review_date().max(now);
    let next_review_date = now
        .checked_add_signed(interval_for(repetitions, ease_factor))
        .map_or(latest, |next| next.min(latest));

    ReviewOutcome {
        next_review_date,
        repetitions,
        ease_factor,
        interval: next_review_date - now,
    }
}

/// Interval until the next review for a given streak
pub fn interval_for(repetitions: u32, ease_factor: f64) -> Duration {
    match repetitions {
        0 => Duration::minutes(1),
        1 => Duration::days(1),
        2 => Duration::days(6),
        n => {
            let days = (n as f64 * ease_factor).floor().min(MAX_INTERVAL_DAYS);
            Duration::days(days as i64)
        }
    }
}

/// Calculate the interval each quality rating would give
/// Used to show users what a rating does before they pick it
pub fn preview_intervals(state: ReviewState, now: DateTime<Utc>) -> [Duration; 6] {
    let mut intervals = [Duration::zero(); 6];
    for (slot, quality) in intervals.iter_mut().zip(Quality::all()) {
        *slot = compute_next_review(state, quality, now).interval;
    }
    intervals
}

/// Format an interval to a short human-readable string
pub fn format_interval(interval: Duration) -> String {
    let minutes = interval.num_minutes();
    if minutes <= 0 {
        return "now".to_string();
    }
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = interval.num_hours();
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = interval.num_days();
    if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}
