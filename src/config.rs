use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Serialize, Deserialize};

use crate::error::{LensError, Result};

/// Tunable constants of the saliency overlay.
///
/// The defaults reproduce the reference look: a 10 px mask margin, keeping
/// the top 20% of masked pixels, an 11×11 blur, and a 0.7/0.3 blend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyConfig {
    /// Pixels trimmed from the circular brain mask's radius.
    pub mask_margin: u32,
    /// Percentile (0–100) of masked values below which pixels are zeroed.
    pub threshold_percentile: f64,
    /// Side of the square Gaussian kernel; must be odd.
    pub blur_kernel: usize,
    pub heatmap_weight: f64,
    pub image_weight: f64,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        SaliencyConfig {
            mask_margin: 10,
            threshold_percentile: 80.0,
            blur_kernel: 11,
            heatmap_weight: 0.7,
            image_weight: 0.3,
        }
    }
}

impl SaliencyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.threshold_percentile) {
            return Err(LensError::Config(format!(
                "threshold_percentile must be within [0, 100], got {}", self.threshold_percentile
            )));
        }
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(LensError::Config(format!(
                "blur_kernel must be a positive odd number, got {}", self.blur_kernel
            )));
        }
        if !(self.heatmap_weight >= 0.0 && self.image_weight >= 0.0) {
            return Err(LensError::Config("blend weights must be non-negative".into()));
        }
        Ok(())
    }
}

/// Application configuration. Every field has a default, so a config file
/// only needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Where blended overlays are written.
    pub output_dir: PathBuf,
    /// Where copies of the raw uploaded bytes are written.
    pub upload_dir: PathBuf,
    pub transfer_weights: PathBuf,
    pub custom_weights: PathBuf,
    pub gemini_model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub saliency: SaliencyConfig,
}

impl Default for LensConfig {
    fn default() -> Self {
        LensConfig {
            output_dir: PathBuf::from("saliency_maps"),
            upload_dir: PathBuf::from("uploads"),
            transfer_weights: PathBuf::from("models/xception_model.json"),
            custom_weights: PathBuf::from("models/cnn_model.json"),
            gemini_model: "gemini-1.5-flash".into(),
            api_key_env: "GOOGLE_API_KEY".into(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            request_timeout_secs: 60,
            saliency: SaliencyConfig::default(),
        }
    }
}

pub const OUTPUT_DIR_ENV: &str = "MRI_LENS_OUTPUT_DIR";
pub const UPLOAD_DIR_ENV: &str = "MRI_LENS_UPLOAD_DIR";

impl LensConfig {
    /// Deserializes a config from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<LensConfig> {
        let reader = BufReader::new(File::open(path)?);
        let config: LensConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given (defaults otherwise), then applies environment
    /// overrides.
    pub fn resolve(path: Option<&Path>) -> Result<LensConfig> {
        let mut config = match path {
            Some(p) => {
                debug!("Reading configuration from {:?}", p);
                LensConfig::load_json(p)?
            }
            None => LensConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `MRI_LENS_*` overrides. `lookup` is injected so tests do not
    /// have to mutate the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|s| !s.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(UPLOAD_DIR_ENV).filter(|s| !s.is_empty()) {
            self.upload_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(LensError::Config("request_timeout_secs must be at least 1".into()));
        }
        self.saliency.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: LensConfig = serde_json::from_str(
            r#"{"output_dir":"out","saliency":{"blur_kernel":5}}"#,
        ).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.saliency.blur_kernel, 5);
        assert_eq!(config.saliency.threshold_percentile, 80.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_even_kernel_and_bad_percentile() {
        let mut s = SaliencyConfig { blur_kernel: 10, ..Default::default() };
        assert!(s.validate().is_err());
        s.blur_kernel = 11;
        s.threshold_percentile = 120.0;
        assert!(s.validate().is_err());
        s.threshold_percentile = 80.0;
        s.image_weight = -0.1;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_env_overrides_directories() {
        let mut config = LensConfig::default();
        config.apply_env(|key| match key {
            OUTPUT_DIR_ENV => Some("/tmp/maps".into()),
            UPLOAD_DIR_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.output_dir, PathBuf::from("/tmp/maps"));
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn test_load_json_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lens.json");
        std::fs::write(&path, r#"{"request_timeout_secs":0}"#).unwrap();
        assert!(matches!(LensConfig::load_json(&path), Err(LensError::Config(_))));
    }
}
