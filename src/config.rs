use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dsp::filter::{FilterKind, FilterPrototype, FilterSettings};
use crate::dsp::pitch::EstimatorConfig;

/// Tracker configuration, loadable from a TOML file.
///
/// serde's `default` attribute means: if a field is missing from the
/// TOML file, use the value from the Default implementation instead of
/// failing to parse. Every field has a sensible default, so the file
/// is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub detection: DetectionConfig,
    pub bands: BandsConfig,
    pub frames: FrameConfig,
}

/// Pitch detection range and gating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub sample_rate: u32,
    /// Lowest detectable fundamental in Hz.
    pub min_pitch_hz: f32,
    /// Highest detectable fundamental in Hz.
    pub max_pitch_hz: f32,
    /// Frames whose samples all stay below this absolute level are
    /// treated as silence.
    pub detect_level_threshold: f32,
}

/// The two band-splitting filter chains feeding the estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandsConfig {
    /// Band used for candidates below the detection crossover.
    pub low: BandConfig,
    /// Band used for candidates above it.
    pub high: BandConfig,
}

/// One band: a high-pass stage into a low-pass stage, both Butterworth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    /// High-pass cutoff removing rumble and handling noise.
    pub highpass_hz: f32,
    /// Low-pass cutoff bounding the band from above.
    pub lowpass_hz: f32,
    /// Order of each stage.
    pub order: usize,
}

/// Frame slicing for offline contour analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Samples per analysis frame. 4096 at 44.1 kHz is ~93 ms, enough
    /// to hold two periods of the lowest default pitch plus its
    /// comparison window.
    pub frame_size: usize,
}

// --- Default implementations ---

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            bands: BandsConfig::default(),
            frames: FrameConfig::default(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            min_pitch_hz: 50.0,
            max_pitch_hz: 1600.0,
            detect_level_threshold: 0.01,
        }
    }
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            // One octave-ish of margin around the 250 Hz crossover:
            // the low band keeps fundamentals up to ~280 Hz and sheds
            // their harmonics; the high band keeps the rest of the
            // singing range.
            low: BandConfig {
                highpass_hz: 45.0,
                lowpass_hz: 280.0,
                order: 5,
            },
            high: BandConfig {
                highpass_hz: 45.0,
                lowpass_hz: 1500.0,
                order: 5,
            },
        }
    }
}

impl Default for BandConfig {
    fn default() -> Self {
        BandsConfig::default().low
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { frame_size: 4096 }
    }
}

/// Bridge into the estimator's parameter struct.
impl From<&DetectionConfig> for EstimatorConfig {
    fn from(cfg: &DetectionConfig) -> Self {
        EstimatorConfig {
            sample_rate: cfg.sample_rate as f32,
            min_pitch_hz: cfg.min_pitch_hz,
            max_pitch_hz: cfg.max_pitch_hz,
            detect_level_threshold: cfg.detect_level_threshold,
        }
    }
}

impl BandConfig {
    /// Settings for the band's high-pass stage.
    pub fn highpass_settings(&self, sample_rate: f32) -> FilterSettings {
        FilterSettings {
            prototype: FilterPrototype::Butterworth,
            kind: FilterKind::HighPass,
            order: self.order,
            sample_rate,
            freq_low: self.highpass_hz,
            ..FilterSettings::default()
        }
    }

    /// Settings for the band's low-pass stage.
    pub fn lowpass_settings(&self, sample_rate: f32) -> FilterSettings {
        FilterSettings {
            prototype: FilterPrototype::Butterworth,
            kind: FilterKind::LowPass,
            order: self.order,
            sample_rate,
            freq_high: self.lowpass_hz,
            ..FilterSettings::default()
        }
    }
}

/// Load a tracker config from a TOML file. If the file doesn't exist,
/// returns defaults.
pub fn load_config(path: &Path) -> Result<TrackerConfig> {
    if !path.exists() {
        return Ok(TrackerConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = TrackerConfig::default();
        assert_eq!(cfg.detection.sample_rate, 44100);
        assert_eq!(cfg.detection.min_pitch_hz, 50.0);
        assert_eq!(cfg.bands.low.lowpass_hz, 280.0);
        assert_eq!(cfg.bands.high.lowpass_hz, 1500.0);
        assert_eq!(cfg.frames.frame_size, 4096);
    }

    #[test]
    fn parse_partial_toml() {
        // If the user only specifies some fields, the rest should use
        // defaults.
        let toml_str = r#"
[detection]
min_pitch_hz = 80.0
max_pitch_hz = 1000.0
"#;
        let cfg: TrackerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.detection.min_pitch_hz, 80.0);
        assert_eq!(cfg.detection.max_pitch_hz, 1000.0);
        // Unspecified fields should be defaults.
        assert_eq!(cfg.detection.sample_rate, 44100);
        assert_eq!(cfg.bands.low.order, 5);
    }

    #[test]
    fn estimator_config_conversion() {
        let cfg = DetectionConfig::default();
        let est: EstimatorConfig = (&cfg).into();
        assert_eq!(est.sample_rate, 44100.0);
        assert_eq!(est.min_pitch_hz, 50.0);
        assert_eq!(est.detect_level_threshold, 0.01);
    }

    #[test]
    fn band_filter_settings() {
        let band = BandConfig {
            highpass_hz: 45.0,
            lowpass_hz: 280.0,
            order: 5,
        };
        let hp = band.highpass_settings(44100.0);
        assert_eq!(hp.kind, FilterKind::HighPass);
        assert_eq!(hp.freq_low, 45.0);
        assert_eq!(hp.order, 5);
        let lp = band.lowpass_settings(44100.0);
        assert_eq!(lp.kind, FilterKind::LowPass);
        assert_eq!(lp.freq_high, 280.0);
    }

    #[test]
    fn roundtrip_toml() {
        let cfg = TrackerConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let loaded: TrackerConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.detection.min_pitch_hz, cfg.detection.min_pitch_hz);
        assert_eq!(loaded.bands.high.lowpass_hz, cfg.bands.high.lowpass_hz);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config(Path::new("/tmp/does-not-exist-pitchtrack.toml")).unwrap();
        assert_eq!(cfg.detection.sample_rate, 44100);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(load_config(&path).is_err());
    }
}
