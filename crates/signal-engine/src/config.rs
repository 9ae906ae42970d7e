use serde::{Deserialize, Serialize};

/// Thresholds and scales for the ten derived signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// PCR above this is bearish
    #[serde(default = "default_pcr_bearish")]
    pub pcr_bearish_threshold: f64,
    /// PCR below this is bullish
    #[serde(default = "default_pcr_bullish")]
    pub pcr_bullish_threshold: f64,
    /// PCR distance past a threshold that maps to full magnitude
    #[serde(default = "default_pcr_span")]
    pub pcr_span: f64,

    #[serde(default = "default_gamma_scale")]
    pub gamma_scale: f64,

    /// Volume / average volume ratio where the anomaly starts
    #[serde(default = "default_volume_trigger")]
    pub volume_trigger: f64,
    #[serde(default = "default_volume_span")]
    pub volume_span: f64,

    /// Overshoot of the expected move (as a multiple) that maps to full magnitude
    #[serde(default = "default_unit_span")]
    pub expected_move_span: f64,

    /// IV/HV ratio above 1.0 that maps to full magnitude
    #[serde(default = "default_unit_span")]
    pub vol_expansion_span: f64,

    #[serde(default = "default_oi_scale")]
    pub oi_scale: f64,

    /// Distance from the gamma flip, in percent of spot, inside which proximity registers
    #[serde(default = "default_flip_band_pct")]
    pub flip_band_pct: f64,

    /// Call/put volume imbalance below this is noise
    #[serde(default = "default_flow_dead_zone")]
    pub flow_dead_zone: f64,
}

fn default_pcr_bearish() -> f64 { 1.10 }
fn default_pcr_bullish() -> f64 { 0.90 }
fn default_pcr_span() -> f64 { 0.5 }
fn default_gamma_scale() -> f64 { 50_000.0 }
fn default_volume_trigger() -> f64 { 1.5 }
fn default_volume_span() -> f64 { 2.0 }
fn default_unit_span() -> f64 { 1.0 }
fn default_oi_scale() -> f64 { 1_000.0 }
fn default_flip_band_pct() -> f64 { 1.0 }
fn default_flow_dead_zone() -> f64 { 0.1 }

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            pcr_bearish_threshold: default_pcr_bearish(),
            pcr_bullish_threshold: default_pcr_bullish(),
            pcr_span: default_pcr_span(),
            gamma_scale: default_gamma_scale(),
            volume_trigger: default_volume_trigger(),
            volume_span: default_volume_span(),
            expected_move_span: default_unit_span(),
            vol_expansion_span: default_unit_span(),
            oi_scale: default_oi_scale(),
            flip_band_pct: default_flip_band_pct(),
            flow_dead_zone: default_flow_dead_zone(),
        }
    }
}
