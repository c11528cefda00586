use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Russian,
    French,
    German,
}

impl Language {
    /// ISO 639-1 code understood by the remote source.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Russian => "ru",
            Language::French => "fr",
            Language::German => "de",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Interval {
    #[default]
    Min15,
    Min30,
    Hour1,
    Hour2,
    Hour4,
    Hour8,
    Hour12,
    Hour24,
}

impl Interval {
    pub const ALL: [Interval; 8] = [
        Interval::Min15,
        Interval::Min30,
        Interval::Hour1,
        Interval::Hour2,
        Interval::Hour4,
        Interval::Hour8,
        Interval::Hour12,
        Interval::Hour24,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            Interval::Min15 => 15,
            Interval::Min30 => 30,
            Interval::Hour1 => 60,
            Interval::Hour2 => 120,
            Interval::Hour4 => 240,
            Interval::Hour8 => 480,
            Interval::Hour12 => 720,
            Interval::Hour24 => 1440,
        }
    }
}

impl TryFrom<u32> for Interval {
    type Error = AppError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Interval::ALL
            .into_iter()
            .find(|interval| interval.minutes() == minutes)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "unsupported refresh interval {} minutes (expected one of 15, 30, 60, 120, 240, 480, 720, 1440)",
                    minutes
                ))
            })
    }
}

impl From<Interval> for u32 {
    fn from(interval: Interval) -> Self {
        interval.minutes()
    }
}

/// User settings as published by the settings source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub language: Language,
    #[serde(default, rename = "interval_minutes")]
    pub interval: Interval,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub wifi_only: bool,
}

impl Settings {
    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            interval: self.interval,
            wifi_only: self.wifi_only,
        }
    }
}

/// The scheduling-relevant projection of [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshPolicy {
    pub interval: Interval,
    pub wifi_only: bool,
}
