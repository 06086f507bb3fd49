//! Percent to gain conversion.
//!
//! Volume sliders speak in whole percent (`0..=max_percent`). Below 100% the
//! curve is quadratic, which ramps more gently near silence than a straight
//! line. Above 100% it becomes a linear boost capped at [`MAX_GAIN`].

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};

/// Default upper bound of a volume slider.
pub const DEFAULT_MAX_PERCENT: u32 = 150;

/// Percent that maps to unity gain.
pub const UNITY_PERCENT: u32 = 100;

/// Hard ceiling for any computed gain, independent of the slider range.
pub const MAX_GAIN: f64 = 1.5;

/// Highest gain a resource can apply natively, without a processing graph.
pub const NATIVE_MAX_GAIN: f64 = 1.0;

/// Inputs within this distance of [`UNITY_PERCENT`] snap onto it.
pub const SNAP_THRESHOLD: u32 = 2;

/// Gain added per percent above [`UNITY_PERCENT`].
const BOOST_STEP: f64 = 0.01;

/// Decimal places kept in a computed gain.
const GAIN_SCALE: f64 = 10_000.0;

/// Raw percent as handed over by a host: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PercentInput {
    Number(f64),
    Text(String),
}

impl PercentInput {
    /// Parse into a finite number, if possible.
    pub fn parse(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl Default for PercentInput {
    fn default() -> Self {
        Self::Number(f64::from(UNITY_PERCENT))
    }
}

impl From<u32> for PercentInput {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i32> for PercentInput {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<f64> for PercentInput {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PercentInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PercentInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Normalize a raw percent to an integer in `[0, max_percent]`.
///
/// Non-numeric input falls back to `default`, which is itself clamped.
pub fn normalize_percent(input: &PercentInput, max_percent: u32, default: u32) -> u32 {
    let fallback = f64::from(default.min(max_percent));
    let value = input.parse().unwrap_or(fallback).round();
    value.clamp(0.0, f64::from(max_percent)) as u32
}

/// Snap a percent onto unity when it lands within [`SNAP_THRESHOLD`] of it.
///
/// Ranges that cannot reach unity are left alone.
pub const fn snap_percent(percent: u32, max_percent: u32) -> u32 {
    if max_percent >= UNITY_PERCENT && percent.abs_diff(UNITY_PERCENT) <= SNAP_THRESHOLD {
        UNITY_PERCENT
    } else {
        percent
    }
}

/// Gain for an already normalized percent.
pub fn gain_for_percent(percent: u32) -> f64 {
    let gain = if percent <= UNITY_PERCENT {
        let ratio = f64::from(percent) / f64::from(UNITY_PERCENT);
        ratio * ratio
    } else {
        f64::from(percent - UNITY_PERCENT).mul_add(BOOST_STEP, 1.0)
    };
    round_gain(gain).clamp(0.0, MAX_GAIN)
}

/// Convert a raw percent into a linear gain factor in `[0, MAX_GAIN]`.
///
/// Unparseable input is treated as unity.
pub fn percent_to_gain(input: impl Into<PercentInput>, max_percent: u32) -> f64 {
    let percent = normalize_percent(&input.into(), max_percent, UNITY_PERCENT);
    gain_for_percent(percent)
}

fn round_gain(gain: f64) -> f64 {
    (gain * GAIN_SCALE).round() / GAIN_SCALE
}
