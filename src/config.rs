//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter for the full photometry
//! pipeline. It is built once (in code or from JSON) and passed by reference
//! into each stage; no stage mutates it.
//!
//! Parameters without a safe default (frames to discard, region names,
//! baseline pairs) are `Option`s. Their accessors return
//! [`FphotError::Configuration`] when the value was never supplied, so a
//! missing parameter aborts the run before any table is produced.
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FphotError, Result};

/// A `(region, channel)` pair, e.g. `("Green0", "470nm")`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub region: String,
    pub channel: String,
}

impl ChannelRef {
    pub fn new(region: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            channel: channel.into(),
        }
    }
}

/// One baseline assignment: `target` is corrected against `baseline`,
/// or left alone when `baseline` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub target: ChannelRef,
    #[serde(default)]
    pub baseline: Option<ChannelRef>,
}

/// Resolved baseline map: target → baseline (`None` = no correction).
pub type BaselineMap = BTreeMap<ChannelRef, Option<ChannelRef>>;

/// Default light-source code → channel label table.
pub fn default_led_map() -> BTreeMap<i64, String> {
    BTreeMap::from([
        (7, "initial".to_string()),
        (1, "415nm".to_string()),
        (2, "470nm".to_string()),
        (4, "560nm".to_string()),
    ])
}

fn default_event_range() -> (i64, i64) {
    (-500, 500)
}

fn default_true() -> bool {
    true
}

fn default_peak_channels() -> Option<Vec<String>> {
    Some(vec!["470nm-norm-zs".to_string()])
}

fn default_export_channels() -> Vec<String> {
    vec![
        "415nm".to_string(),
        "470nm-norm".to_string(),
        "470nm-norm-zs".to_string(),
    ]
}

/// Configuration for the full photometry pipeline.
///
/// ```
/// use fphot::PipelineConfig;
/// use std::collections::BTreeMap;
///
/// let cfg = PipelineConfig {
///     discard_frames: Some(100),
///     region_map: Some(BTreeMap::from([("G0".to_string(), "Green0".to_string())])),
///     ..PipelineConfig::default()
/// };
/// assert_eq!(cfg.regions().unwrap(), vec!["Green0".to_string()]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Leading frames to drop: rows with `FrameCounter <= discard_frames`
    /// are removed before anything else. Cropping the start of a recording
    /// usually helps the biexponential fit; 100 frames is a good start.
    #[serde(default)]
    pub discard_frames: Option<i64>,

    /// `LedState` code → channel label. Rows with codes missing from this map
    /// are dropped by the loader.
    ///
    /// Default: `{7: "initial", 1: "415nm", 2: "470nm", 4: "560nm"}`.
    #[serde(default = "default_led_opt")]
    pub led_map: Option<BTreeMap<i64, String>>,

    /// Raw region column → region name. `-` in names is replaced with `_`.
    #[serde(default)]
    pub region_map: Option<BTreeMap<String, String>>,

    /// Which baseline channel debleaches which target.
    #[serde(default)]
    pub baselines: Option<Vec<BaselineEntry>>,

    /// Minimum prominence for a sample to count as a peak.
    #[serde(default)]
    pub peak_prominence: Option<f64>,

    /// Trailing window (rows) for the rolling peak count.
    #[serde(default)]
    pub peak_window: Option<usize>,

    /// Channels searched for peaks; `None` searches every channel.
    ///
    /// Default: `["470nm-norm-zs"]`.
    #[serde(default = "default_peak_channels")]
    pub peak_channels: Option<Vec<String>>,

    /// Frames before/after each event kept by the pooler.
    ///
    /// Default: `(-500, 500)`.
    #[serde(default = "default_event_range")]
    pub event_range: (i64, i64),

    /// Z-score each event window against its own pre-event samples.
    ///
    /// Default: `true`.
    #[serde(default = "default_true")]
    pub normalize_events: bool,

    /// Channel labels written by the corrected-signal export.
    ///
    /// Default: `["415nm", "470nm-norm", "470nm-norm-zs"]`.
    #[serde(default = "default_export_channels")]
    pub export_channels: Vec<String>,
}

fn default_led_opt() -> Option<BTreeMap<i64, String>> {
    Some(default_led_map())
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            discard_frames: None,
            led_map: default_led_opt(),
            region_map: None,
            baselines: None,
            peak_prominence: None,
            peak_window: None,
            peak_channels: default_peak_channels(),
            event_range: default_event_range(),
            normalize_events: true,
            export_channels: default_export_channels(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| FphotError::configuration(format!("invalid config JSON: {e}")))
    }

    pub fn discard_frames(&self) -> Result<i64> {
        match self.discard_frames {
            Some(n) if n >= 0 => Ok(n),
            Some(n) => Err(FphotError::configuration(format!(
                "frames to discard must be >= 0, got {n}"
            ))),
            None => Err(FphotError::configuration("please set frames to discard first")),
        }
    }

    pub fn led_map(&self) -> Result<&BTreeMap<i64, String>> {
        self.led_map
            .as_ref()
            .ok_or_else(|| FphotError::configuration("please set the LED state mapping first"))
    }

    /// Raw column → region name, with `-` replaced by `_` in names.
    pub fn region_map(&self) -> Result<BTreeMap<String, String>> {
        let map = self
            .region_map
            .as_ref()
            .ok_or_else(|| FphotError::configuration("please set ROIs first"))?;
        if map.is_empty() {
            return Err(FphotError::configuration("ROI mapping is empty"));
        }
        Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), v.replace('-', "_")))
            .collect())
    }

    /// Region names in configured order.
    pub fn regions(&self) -> Result<Vec<String>> {
        Ok(self.region_map()?.into_values().collect())
    }

    pub fn baseline_map(&self) -> Result<BaselineMap> {
        let entries = self
            .baselines
            .as_ref()
            .ok_or_else(|| FphotError::configuration("please set baseline signal first"))?;
        Ok(entries
            .iter()
            .map(|e| (e.target.clone(), e.baseline.clone()))
            .collect())
    }

    pub fn peak_prominence(&self) -> Result<f64> {
        match self.peak_prominence {
            Some(p) if p.is_finite() && p >= 0.0 => Ok(p),
            Some(p) => Err(FphotError::configuration(format!(
                "peak prominence must be a finite value >= 0, got {p}"
            ))),
            None => Err(FphotError::configuration("please set peak prominence first")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_values_are_configuration_errors() {
        let cfg = PipelineConfig::default();
        assert!(matches!(cfg.discard_frames(), Err(FphotError::Configuration(_))));
        assert!(matches!(cfg.region_map(), Err(FphotError::Configuration(_))));
        assert!(matches!(cfg.baseline_map(), Err(FphotError::Configuration(_))));
        assert!(cfg.led_map().is_ok());
    }

    #[test]
    fn region_names_replace_dashes() {
        let cfg = PipelineConfig {
            region_map: Some(BTreeMap::from([("R1".to_string(), "left-nac".to_string())])),
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.regions().unwrap(), vec!["left_nac".to_string()]);
    }

    #[test]
    fn json_fills_defaults() {
        let cfg = PipelineConfig::from_json_str(
            r#"{
                "discard_frames": 100,
                "region_map": {"G0": "Green0"},
                "baselines": [
                    {"target": {"region": "Green0", "channel": "470nm"},
                     "baseline": {"region": "Green0", "channel": "415nm"}},
                    {"target": {"region": "Green0", "channel": "560nm"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.discard_frames().unwrap(), 100);
        assert_eq!(cfg.event_range, (-500, 500));
        assert_eq!(cfg.led_map().unwrap().get(&2).map(String::as_str), Some("470nm"));
        let base = cfg.baseline_map().unwrap();
        assert_eq!(
            base.get(&ChannelRef::new("Green0", "470nm")),
            Some(&Some(ChannelRef::new("Green0", "415nm")))
        );
        assert_eq!(base.get(&ChannelRef::new("Green0", "560nm")), Some(&None));
    }

    #[test]
    fn negative_discard_rejected() {
        let cfg = PipelineConfig {
            discard_frames: Some(-1),
            ..PipelineConfig::default()
        };
        assert!(cfg.discard_frames().is_err());
    }
}
