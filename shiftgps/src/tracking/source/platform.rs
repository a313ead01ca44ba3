//! Platform-specific location settings.
//!
//! Each mobile platform needs a different subscription recipe to keep fixes
//! flowing in the background. The recipe is a [`LocationStrategy`] chosen
//! once when the engine is built; nothing on the hot path branches on the
//! platform.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tracking::config::EngineConfig;

/// Upper bound of the interval hint on Android.
pub const ANDROID_MAX_INTERVAL_HINT: Duration = Duration::from_secs(15);

/// Target mobile platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Android,
    Ios,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => write!(f, "android"),
            Platform::Ios => write!(f, "ios"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(format!("unknown platform '{}' (expected android or ios)", other)),
        }
    }
}

/// Requested fix quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationAccuracy {
    High,
    Balanced,
}

/// Settings handed to the OS when opening a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSettings {
    pub accuracy: LocationAccuracy,
    pub distance_filter_meters: f64,
    pub interval_hint: Duration,
    pub show_background_indicator: bool,
    pub pauses_updates_automatically: bool,
}

/// Builds subscription settings for one platform.
pub trait LocationStrategy: Send + Sync {
    fn platform(&self) -> Platform;

    fn settings(&self, config: &EngineConfig) -> LocationSettings;
}

/// Android: bounded interval hint, distance filter from config.
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidStrategy;

impl LocationStrategy for AndroidStrategy {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn settings(&self, config: &EngineConfig) -> LocationSettings {
        let active = Duration::from_secs(u64::from(config.active_interval_seconds));
        LocationSettings {
            accuracy: LocationAccuracy::High,
            distance_filter_meters: config.distance_filter_meters,
            interval_hint: active.min(ANDROID_MAX_INTERVAL_HINT),
            show_background_indicator: false,
            pauses_updates_automatically: false,
        }
    }
}

/// iOS: the OS suspends a stream with a non-zero distance filter while the
/// device is still, so the filter is forced to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct IosStrategy;

impl LocationStrategy for IosStrategy {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn settings(&self, config: &EngineConfig) -> LocationSettings {
        LocationSettings {
            accuracy: LocationAccuracy::High,
            distance_filter_meters: 0.0,
            interval_hint: Duration::from_secs(u64::from(config.active_interval_seconds)),
            show_background_indicator: true,
            pauses_updates_automatically: false,
        }
    }
}

/// Select the strategy for a platform.
pub fn strategy_for(platform: Platform) -> Box<dyn LocationStrategy> {
    match platform {
        Platform::Android => Box::new(AndroidStrategy),
        Platform::Ios => Box::new(IosStrategy),
    }
}
