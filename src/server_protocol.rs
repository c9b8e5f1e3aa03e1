use serde_json::Value;

use crate::constants::MAX_POINTS;
use crate::sensing::{PointCounts, PresenceFrame};
use crate::types::{GameConfig, ModeKind, Team};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverrideTarget {
    pub index: usize,
    pub team: Team,
    pub active: bool,
}

#[derive(Debug)]
pub enum ParsedClientMessage {
    StartRound {
        config: GameConfig,
    },
    StopRound,
    Reset,
    SensorReport {
        frame: PresenceFrame,
    },
    SetOverride {
        enabled: Option<bool>,
        target: Option<OverrideTarget>,
    },
    Ping {
        t: f64,
    },
}

/// Strict message parser: an absent field falls back to its default, a
/// present but malformed field rejects the whole message.
pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "start_round" => {
            let mut config = GameConfig::default();
            if let Some(value) = object.get("mode") {
                config.mode = ModeKind::parse(value.as_str()?)?;
            }
            if let Some(number) = parse_optional_u64(object.get("captureMs"))? {
                config.capture_ms = number;
            }
            if let Some(number) = parse_optional_u64(object.get("timeLimitMs"))? {
                config.time_limit_ms = number;
            }
            if let Some(number) = parse_optional_u64(object.get("startDelayMs"))? {
                config.start_delay_ms = number;
            }
            if let Some(number) = parse_optional_u64(object.get("bonusMs"))? {
                config.bonus_ms = number;
            }
            if let Some(number) = parse_optional_u64(object.get("presenceDecayMs"))? {
                config.presence_decay_ms = number;
            }
            if let Some(value) = object.get("used") {
                let slots = value.as_array()?;
                if slots.len() != MAX_POINTS {
                    return None;
                }
                for (slot, value) in config.used.iter_mut().zip(slots) {
                    *slot = value.as_bool()?;
                }
            }
            Some(ParsedClientMessage::StartRound { config })
        }
        "stop_round" => Some(ParsedClientMessage::StopRound),
        "reset" => Some(ParsedClientMessage::Reset),
        "sensor_report" => {
            let points = object.get("points")?.as_array()?;
            if points.len() > MAX_POINTS {
                return None;
            }
            let mut frame = PresenceFrame::default();
            for (slot, value) in frame.points.iter_mut().zip(points) {
                let entry = value.as_object()?;
                *slot = PointCounts {
                    red: parse_count(entry.get("red"))?,
                    blue: parse_count(entry.get("blue"))?,
                    unknown: parse_count(entry.get("unknown"))?,
                };
            }
            Some(ParsedClientMessage::SensorReport { frame })
        }
        "override" => {
            let enabled = match object.get("enabled") {
                None => None,
                Some(value) => Some(value.as_bool()?),
            };
            let has_target = object.get("point").is_some()
                || object.get("team").is_some()
                || object.get("active").is_some();
            let target = if has_target {
                let index = object.get("point")?.as_u64()?;
                if index >= MAX_POINTS as u64 {
                    return None;
                }
                let team = Team::parse(object.get("team")?.as_str()?)?;
                if !team.is_side() {
                    return None;
                }
                let active = object.get("active")?.as_bool()?;
                Some(OverrideTarget {
                    index: index as usize,
                    team,
                    active,
                })
            } else {
                None
            };
            if enabled.is_none() && target.is_none() {
                return None;
            }
            Some(ParsedClientMessage::SetOverride { enabled, target })
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_optional_u64(value: Option<&Value>) -> Option<Option<u64>> {
    const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

    let Some(value) = value else {
        return Some(None);
    };
    if let Some(number) = value.as_u64() {
        return Some(Some(number));
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() {
            let floored = number.floor();
            if floored < 0.0 || floored > MAX_SAFE_INTEGER_F64 {
                return None;
            }
            return Some(Some(floored as u64));
        }
    }
    None
}

fn parse_count(value: Option<&Value>) -> Option<u32> {
    match parse_optional_u64(value)? {
        None => Some(0),
        Some(number) => u32::try_from(number).ok(),
    }
}
