//! Model configuration and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deployment scenario selecting the statistical tables and the LOS
/// probability law.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    /// Rural macrocell
    RMa,
    /// Urban macrocell
    UMa,
    /// Urban microcell, street canyon
    UMi,
    /// Indoor hotspot
    InH,
    /// Indoor factory
    InF,
}

impl Scenario {
    /// Indoor scenarios use Poisson cluster counts and exponential subpath
    /// counts regardless of frequency.
    pub fn is_indoor(&self) -> bool {
        matches!(self, Scenario::InH | Scenario::InF)
    }
}

/// Building penetration regime used by the companion large-scale loss model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum O2iLossType {
    #[default]
    LowLoss,
    HighLoss,
}

/// Configuration surface of the channel model.
///
/// `shadowing_enabled`, `o2i_loss_type`, `foliage_loss_enabled` and
/// `atmospheric_loss_enabled` select optional additive terms in the
/// deterministic large-scale loss model that runs alongside this one; they
/// are carried here so a single scenario file configures both models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub scenario: Scenario,
    /// Operating carrier frequency in Hz, valid between 0.5 and 150 GHz.
    pub frequency_hz: f64,
    /// RF bandwidth in Hz; sets the delay resolution below which subpaths
    /// merge.
    pub rf_bandwidth_hz: f64,
    /// Simulated seconds after which cached conditions/parameters go stale.
    /// Zero means generate once and never refresh.
    pub update_period_s: f64,
    pub shadowing_enabled: bool,
    pub o2i_loss_type: O2iLossType,
    pub foliage_loss_enabled: bool,
    pub atmospheric_loss_enabled: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::RMa,
            frequency_hz: 140.0e9,
            rf_bandwidth_hz: 500.0e6,
            update_period_s: 0.0,
            shadowing_enabled: true,
            o2i_loss_type: O2iLossType::LowLoss,
            foliage_loss_enabled: false,
            atmospheric_loss_enabled: false,
        }
    }
}

impl ChannelConfig {
    /// Check the frequency/bandwidth preconditions that must hold before the
    /// model generates anything.
    pub fn validate(&self) -> Result<(), ChannelError> {
        if !(0.5e9..=150.0e9).contains(&self.frequency_hz) {
            return Err(ChannelError::FrequencyOutOfRange(self.frequency_hz));
        }
        if !(self.rf_bandwidth_hz > 0.0 && self.rf_bandwidth_hz <= 1000.0e6) {
            return Err(ChannelError::BandwidthOutOfRange(self.rf_bandwidth_hz));
        }
        if self.update_period_s < 0.0 {
            return Err(ChannelError::NegativeUpdatePeriod(self.update_period_s));
        }
        Ok(())
    }
}

/// Configuration errors a caller can correct before first use.
#[derive(Debug, Error, PartialEq)]
pub enum ChannelError {
    #[error("frequency must be between 0.5 and 150 GHz, got {0} Hz")]
    FrequencyOutOfRange(f64),
    #[error("RF bandwidth must be between 0 and 1000 MHz, got {0} Hz")]
    BandwidthOutOfRange(f64),
    #[error("update period must be non-negative, got {0} s")]
    NegativeUpdatePeriod(f64),
}
