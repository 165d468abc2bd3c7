use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::NotifyError;

/// Name of the single built-in message template.
pub const TEAM_MESSAGE_TEMPLATE: &str = "team-incoming-message.json";

/// Job lifecycle event reported by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Start,
    Success,
    Failure,
}

impl Trigger {
    pub const ALL: [Trigger; 3] = [Trigger::Start, Trigger::Success, Trigger::Failure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Start => "start",
            Trigger::Success => "success",
            Trigger::Failure => "failure",
        }
    }

    pub fn profile(&self) -> &'static PresentationProfile {
        match self {
            Trigger::Start => &PROFILES[0],
            Trigger::Success => &PROFILES[1],
            Trigger::Failure => &PROFILES[2],
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = NotifyError;

    /// Exact, case-sensitive match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Trigger::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NotifyError::InvalidTrigger(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Yellow,
    Green,
    Red,
}

impl Color {
    pub fn name(&self) -> &'static str {
        match self {
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Red => "red",
        }
    }

    /// Hex code used as the card's theme color.
    pub fn code(&self) -> &'static str {
        match self {
            Color::Yellow => "FFC107",
            Color::Green => "2EB886",
            Color::Red => "D50200",
        }
    }
}

/// Template and color a trigger is presented with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationProfile {
    pub template: &'static str,
    pub color: Color,
}

static PROFILES: [PresentationProfile; 3] = [
    PresentationProfile {
        template: TEAM_MESSAGE_TEMPLATE,
        color: Color::Yellow,
    },
    PresentationProfile {
        template: TEAM_MESSAGE_TEMPLATE,
        color: Color::Green,
    },
    PresentationProfile {
        template: TEAM_MESSAGE_TEMPLATE,
        color: Color::Red,
    },
];

/// Look up the presentation profile for a trigger name.
pub fn resolve(trigger: &str) -> Result<(Trigger, &'static PresentationProfile), NotifyError> {
    let trigger: Trigger = trigger.parse()?;
    Ok((trigger, trigger.profile()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn known_triggers_map_to_distinct_colors() {
        let (_, start) = resolve("start").unwrap();
        let (_, success) = resolve("success").unwrap();
        let (_, failure) = resolve("failure").unwrap();

        assert_eq!(start.color, Color::Yellow);
        assert_eq!(success.color, Color::Green);
        assert_eq!(failure.color, Color::Red);

        assert_eq!(start.template, TEAM_MESSAGE_TEMPLATE);
        assert_eq!(success.template, start.template);
        assert_eq!(failure.template, start.template);
    }

    #[test]
    fn unknown_trigger_is_rejected() {
        for name in ["unknown", "Start", "SUCCESS", "", " failure"] {
            assert_matches!(resolve(name), Err(NotifyError::InvalidTrigger(n)) if n == name);
        }
    }

    #[test]
    fn trigger_name_round_trips() {
        for t in Trigger::ALL {
            assert_eq!(t.as_str().parse::<Trigger>().unwrap(), t);
        }
    }
}
