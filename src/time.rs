use crate::error::Error;
use std::fmt;
use std::str::FromStr;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Wall-clock hour at which the service day starts. Times earlier than this
/// belong to the previous service day and are shifted by 24h.
pub const SERVICE_DAY_START_HOUR: u32 = 4;

/// Rendering of a time that is missing or failed to parse.
pub const UNKNOWN_TIME: &str = "—";

/// Minutes since midnight of the service day. A wall-clock time before 04:00
/// is stored as `24h + time`, so the whole service day is monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct ServiceMinute(pub u32);

impl ServiceMinute {
    pub fn from_hm(hours: u32, minutes: u32) -> ServiceMinute {
        let mut total = hours * 60 + minutes;
        if hours < SERVICE_DAY_START_HOUR {
            total += MINUTES_PER_DAY;
        }
        ServiceMinute(total)
    }

    /// Parses `HH:MM` (extra `:SS` is ignored). Anything else is `None`.
    pub fn parse(s: &str) -> Option<ServiceMinute> {
        let mut parts = s.trim().split(':');
        let h = parts.next()?.trim().parse::<u32>().ok()?;
        let m = parts.next()?.trim().parse::<u32>().ok()?;
        if m >= 60 || h >= 24 {
            return None;
        }
        Some(ServiceMinute::from_hm(h, m))
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn plus(self, minutes: u32) -> ServiceMinute {
        ServiceMinute(self.0 + minutes)
    }

    pub fn elapsed_since(self, earlier: ServiceMinute) -> u32 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for ServiceMinute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mins = self.0 % MINUTES_PER_DAY;
        write!(f, "{:02}:{:02}", mins / 60, mins % 60)
    }
}

impl FromStr for ServiceMinute {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceMinute::parse(s).ok_or_else(|| Error::InvalidTime(s.to_string()))
    }
}

pub fn format_opt(t: Option<ServiceMinute>) -> String {
    t.map(|t| t.to_string())
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

/// Deserializes an optional `HH:MM` string. Malformed strings and values of
/// any other JSON type become `None`.
pub fn deserialize_opt_time<'de, D>(d: D) -> Result<Option<ServiceMinute>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: serde_json::Value = serde::Deserialize::deserialize(d)?;
    Ok(value.as_str().and_then(ServiceMinute::parse))
}

/// Deserializes a loosely typed text field: strings are kept, numbers are
/// rendered as text, anything else becomes `None`.
pub fn deserialize_opt_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: serde_json::Value = serde::Deserialize::deserialize(d)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
