//! Repeat policy: `(count, unit)` translated to the remote `(seconds, mode)` pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatUnit {
    Day,
    Week,
    Month,
    Year,
}

impl RepeatUnit {
    /// Fixed multiplier table. `Month` has no entry: it is encoded as a mode.
    fn seconds(&self) -> Option<u64> {
        match self {
            RepeatUnit::Day => Some(SECONDS_PER_DAY),
            RepeatUnit::Week => Some(7 * SECONDS_PER_DAY),
            RepeatUnit::Year => Some(365 * SECONDS_PER_DAY),
            RepeatUnit::Month => None,
        }
    }
}

impl fmt::Display for RepeatUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepeatUnit::Day => "day",
            RepeatUnit::Week => "week",
            RepeatUnit::Month => "month",
            RepeatUnit::Year => "year",
        };
        f.write_str(s)
    }
}

impl FromStr for RepeatUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().trim_end_matches('s') {
            "day" | "daily" => Ok(RepeatUnit::Day),
            "week" | "weekly" => Ok(RepeatUnit::Week),
            "month" | "monthly" => Ok(RepeatUnit::Month),
            "year" | "yearly" => Ok(RepeatUnit::Year),
            _ => Err(s.to_string()),
        }
    }
}

/// How the remote service interprets `repeat_after`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Repeat every `repeat_after` seconds.
    #[default]
    UseInterval,
    /// Repeat on the same day every month; `repeat_after` is ignored.
    Monthly,
    /// Repeat `repeat_after` seconds after the task was marked done.
    FromCurrentDate,
}

/// Caller-facing repeat policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatPolicy {
    pub every: u32,
    pub unit: RepeatUnit,
}

/// Remote representation of a repeat policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepeat {
    pub repeat_after: u64,
    pub repeat_mode: RepeatMode,
}

impl RepeatPolicy {
    pub fn new(every: u32, unit: RepeatUnit) -> Self {
        Self { every, unit }
    }

    pub fn to_remote(&self) -> RemoteRepeat {
        match self.unit.seconds() {
            Some(per_unit) => RemoteRepeat {
                repeat_after: u64::from(self.every) * per_unit,
                repeat_mode: RepeatMode::UseInterval,
            },
            None => RemoteRepeat {
                repeat_after: 0,
                repeat_mode: RepeatMode::Monthly,
            },
        }
    }
}

impl RemoteRepeat {
    pub const NONE: RemoteRepeat = RemoteRepeat {
        repeat_after: 0,
        repeat_mode: RepeatMode::UseInterval,
    };

    /// Best-effort reverse translation, picking the largest unit that divides
    /// the interval evenly.
    pub fn to_policy(&self) -> Option<RepeatPolicy> {
        if self.repeat_mode == RepeatMode::Monthly {
            return Some(RepeatPolicy::new(1, RepeatUnit::Month));
        }
        if self.repeat_after == 0 {
            return None;
        }
        [RepeatUnit::Year, RepeatUnit::Week, RepeatUnit::Day]
            .into_iter()
            .find_map(|unit| {
                let per_unit = unit.seconds()?;
                (self.repeat_after % per_unit == 0)
                    .then(|| u32::try_from(self.repeat_after / per_unit).ok())
                    .flatten()
                    .map(|every| RepeatPolicy::new(every, unit))
            })
    }
}
