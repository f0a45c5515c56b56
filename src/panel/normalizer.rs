//! Maps heterogeneous panel payloads into one canonical status record
//!
//! Each field has a fixed list of alternative keys, checked in order. The first key holding
//! a value of the right JSON type wins; absent fields take a safe default (`false` / `0`).
//! A value that is present but out of range fails the whole record with `StatusUnavailable`
//! instead of being clamped into a plausible-looking reading.

use serde::{Deserialize, Serialize};

use crate::error::StatusError;
use crate::panel::payload::RawPayload;

const ONLINE_KEYS: &[&str] = &["online", "running"];
const STATUS_KEYS: &[&str] = &["status"];
// "online" last: some panels report the player count under it
const PLAYER_COUNT_KEYS: &[&str] = &[
    "playerCount",
    "players",
    "online_players",
    "playersOnline",
    "online",
];
const MAX_PLAYERS_KEYS: &[&str] = &["maxPlayers", "max_players", "max"];
const PING_KEYS: &[&str] = &["ping", "latency"];
const TPS_KEYS: &[&str] = &["tps", "ticksPerSecond"];
const CPU_KEYS: &[&str] = &["cpuUsage", "cpu", "cpu_percent"];
const RAM_KEYS: &[&str] = &["ramUsage", "memoryUsage", "mem_percent"];
const UPTIME_KEYS: &[&str] = &["uptime", "uptimeSeconds"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalStatus {
    pub online: bool,
    pub player_count: u32,
    pub max_players: u32,
    pub ping: f64,
    pub tps: f64,
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub uptime: u64,
}

pub fn normalize(raw: &RawPayload) -> Result<CanonicalStatus, StatusError> {
    if raw.body().is_none() {
        return Err(StatusError::StatusUnavailable(
            "panel payload is not an object".to_string(),
        ));
    }

    let online = raw.first_bool(ONLINE_KEYS).unwrap_or_else(|| {
        raw.first_str(STATUS_KEYS)
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("running"))
    });

    Ok(CanonicalStatus {
        online,
        player_count: count(raw, "playerCount", PLAYER_COUNT_KEYS)?,
        max_players: count(raw, "maxPlayers", MAX_PLAYERS_KEYS)?,
        ping: non_negative(raw, "ping", PING_KEYS)?,
        tps: non_negative(raw, "tps", TPS_KEYS)?,
        cpu_usage: percent(raw, "cpuUsage", CPU_KEYS)?,
        ram_usage: ram_usage(raw)?,
        uptime: whole(raw, "uptime", UPTIME_KEYS, u64::MAX as f64)?,
    })
}

fn unavailable(field: &str, key: &str, value: f64, expected: &str) -> StatusError {
    StatusError::StatusUnavailable(format!(
        "{} (from {}) = {} is not {}",
        field, key, value, expected
    ))
}

fn non_negative(raw: &RawPayload, field: &str, keys: &[&str]) -> Result<f64, StatusError> {
    match raw.first_number(keys) {
        None => Ok(0.0),
        Some((key, value)) if !value.is_finite() || value < 0.0 => {
            Err(unavailable(field, key, value, "a non-negative number"))
        }
        Some((_, value)) => Ok(value),
    }
}

/// Fractional values are rejected rather than truncated
fn whole(raw: &RawPayload, field: &str, keys: &[&str], max: f64) -> Result<u64, StatusError> {
    match raw.first_number(keys) {
        None => Ok(0),
        Some((key, value))
            if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > max =>
        {
            Err(unavailable(field, key, value, "a non-negative whole number"))
        }
        Some((_, value)) => Ok(value as u64),
    }
}

fn count(raw: &RawPayload, field: &str, keys: &[&str]) -> Result<u32, StatusError> {
    whole(raw, field, keys, f64::from(u32::MAX)).map(|value| value as u32)
}

fn percent(raw: &RawPayload, field: &str, keys: &[&str]) -> Result<f64, StatusError> {
    match raw.first_number(keys) {
        None => Ok(0.0),
        Some((key, value)) if !(0.0..=100.0).contains(&value) => {
            Err(unavailable(field, key, value, "a percentage in [0, 100]"))
        }
        Some((_, value)) => Ok(value),
    }
}

/// Explicit percentage keys first, then a `memory: {used, max}` object
fn ram_usage(raw: &RawPayload) -> Result<f64, StatusError> {
    if raw.first_number(RAM_KEYS).is_some() {
        return percent(raw, "ramUsage", RAM_KEYS);
    }

    let Some(memory) = raw.get("memory").and_then(|m| m.as_object()) else {
        return Ok(0.0);
    };

    let used = memory.get("used").and_then(|v| v.as_f64());
    let max = memory.get("max").and_then(|v| v.as_f64());

    match (used, max) {
        (Some(used), Some(max)) if max > 0.0 => {
            let value = used / max * 100.0;
            if !(0.0..=100.0).contains(&value) {
                return Err(unavailable("ramUsage", "memory", value, "a percentage in [0, 100]"));
            }
            Ok(value)
        }
        _ => Ok(0.0),
    }
}
