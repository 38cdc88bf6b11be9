use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use hamster_client::Endpoint;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Where the panel sits in a GNOME-like top bar. Passed through to the bar as a hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PanelPlacement {
    #[default]
    Default,
    ReplaceCalendar,
    ReplaceActivitiesMenu,
}

/// What the panel shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelAppearance {
    #[default]
    Label,
    Icon,
    LabelAndIcon,
}

impl PanelAppearance {
    pub fn shows_label(self) -> bool {
        matches!(self, PanelAppearance::Label | PanelAppearance::LabelAndIcon)
    }

    pub fn shows_icon(self) -> bool {
        matches!(self, PanelAppearance::Icon | PanelAppearance::LabelAndIcon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SmartDefault)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Connect to `custom-dbus` instead of the session bus.
    pub enable_custom_dbus: bool,
    pub custom_dbus: String,
    pub panel_placement: PanelPlacement,
    pub panel_appearance: PanelAppearance,
    #[default(8.0)]
    pub hours_per_day: f64,
    #[default(5.0)]
    pub days_per_week: f64,
    /// Seconds between two periodic refreshes.
    #[default(60)]
    pub refresh_interval: u64,
    #[default(30)]
    pub connection_retries: u32,
    /// Seconds to wait before retrying a custom bus that isn't ready.
    #[default(10)]
    pub connection_retry_delay: u64,
}

impl Settings {
    pub fn endpoint(&self) -> Endpoint {
        if self.enable_custom_dbus {
            Endpoint::Address(self.custom_dbus.clone())
        } else {
            Endpoint::Session
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval.max(1))
    }

    pub fn connection_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connection_retry_delay)
    }

    pub fn targets(&self) -> Targets {
        Targets { hours_per_day: self.hours_per_day, days_per_week: self.days_per_week }
    }
}

/// The amount of work the user wants to get done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Targets {
    pub hours_per_day: f64,
    pub days_per_week: f64,
}

impl Targets {
    pub fn day_seconds(&self) -> f64 {
        self.hours_per_day * 60.0 * 60.0
    }

    pub fn week_seconds(&self) -> f64 {
        self.days_per_week * self.day_seconds()
    }

    /// How much should be done by the end of the given weekday (Monday = 1), capped at the weekly target.
    pub fn pace_seconds(&self, weekday_index: u32) -> f64 {
        f64::from(weekday_index).min(self.days_per_week) * self.day_seconds()
    }
}

/// Whether `total_seconds` reaches the given limit. Reaching it exactly counts.
pub fn is_time_done(total_seconds: i64, limit_seconds: f64) -> bool {
    total_seconds as f64 >= limit_seconds
}

pub fn read_from_file(path: &Path) -> Result<Settings> {
    if !path.exists() {
        log::info!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_settings(&content).with_context(|| format!("Failed to parse settings file {}", path.display()))
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    Ok(serde_json::from_str(content)?)
}
