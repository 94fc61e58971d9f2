use checkin_core::assets::DEFAULT_MODEL_FILE;
use checkin_core::{CaptureConfig, Normalization, TensorLayout, TransformConfig};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// CLI configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Recognition backend base URL.
    pub api_url: String,
    pub api_timeout: Duration,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory holding the detector graph and its weights blob.
    pub model_dir: PathBuf,
    pub model_file: String,
    /// Where to copy the weights blob from when it is missing next to the graph.
    pub model_weights: Option<PathBuf>,
    /// Directory captured photos are written to.
    pub capture_dir: PathBuf,
    pub input_width: usize,
    pub input_height: usize,
    pub normalization: Normalization,
    /// Channel-major (NCHW) detector input; NHWC otherwise.
    pub channel_major: bool,
    /// Minimum spacing between frames that reach the detector.
    pub throttle_interval: Duration,
    /// Quiet period after an automatic capture.
    pub cooldown: Duration,
    /// Detector score needed to trigger an automatic capture.
    pub confidence_threshold: f32,
    /// Similarity threshold sent with each detect upload.
    pub match_threshold: f32,
}

impl Config {
    /// Load configuration from `CHECKIN_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("checkin");

        let normalization = match var("CHECKIN_NORMALIZATION") {
            Some(raw) => Normalization::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "unknown CHECKIN_NORMALIZATION; using unit range");
                Normalization::UnitRange
            }),
            None => Normalization::UnitRange,
        };

        Self {
            api_url: var("CHECKIN_API_URL")
                .unwrap_or_else(|| checkin_api::client::DEFAULT_API_URL.to_string()),
            api_timeout: Duration::from_secs(parse_or(&var, "CHECKIN_API_TIMEOUT_SECS", 90)),
            camera_device: var("CHECKIN_CAMERA_DEVICE")
                .unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir: var("CHECKIN_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("models")),
            model_file: var("CHECKIN_MODEL_FILE")
                .unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string()),
            model_weights: var("CHECKIN_MODEL_WEIGHTS").map(PathBuf::from),
            capture_dir: var("CHECKIN_CAPTURE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("captures")),
            input_width: parse_or(&var, "CHECKIN_INPUT_WIDTH", 256),
            input_height: parse_or(&var, "CHECKIN_INPUT_HEIGHT", 256),
            normalization,
            channel_major: var("CHECKIN_CHANNEL_MAJOR")
                .map(|v| v != "0")
                .unwrap_or(true),
            throttle_interval: Duration::from_millis(parse_or(&var, "CHECKIN_THROTTLE_MS", 500)),
            cooldown: Duration::from_millis(parse_or(&var, "CHECKIN_COOLDOWN_MS", 4000)),
            confidence_threshold: parse_or(&var, "CHECKIN_CONFIDENCE_THRESHOLD", 0.75),
            match_threshold: parse_or(&var, "CHECKIN_MATCH_THRESHOLD", 0.2),
        }
    }

    pub fn transform(&self) -> TransformConfig {
        TransformConfig {
            width: self.input_width,
            height: self.input_height,
            normalization: self.normalization,
            layout: if self.channel_major {
                TensorLayout::Nchw
            } else {
                TensorLayout::Nhwc
            },
        }
    }

    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            threshold: self.confidence_threshold,
            cooldown: self.cooldown,
        }
    }
}

fn parse_or<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("HOME", "/home/kiosk")]);
        assert_eq!(config.api_url, "http://127.0.0.1:8000");
        assert_eq!(config.api_timeout, Duration::from_secs(90));
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(
            config.model_dir,
            PathBuf::from("/home/kiosk/.local/share/checkin/models")
        );
        assert_eq!(config.model_file, "blazeface.onnx");
        assert!(config.model_weights.is_none());
        assert_eq!(config.throttle_interval, Duration::from_millis(500));
        assert_eq!(config.cooldown, Duration::from_millis(4000));
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.match_threshold, 0.2);

        let transform = config.transform();
        assert_eq!((transform.width, transform.height), (256, 256));
        assert_eq!(transform.layout, TensorLayout::Nchw);
        assert_eq!(transform.normalization, Normalization::UnitRange);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("XDG_DATA_HOME", "/var/lib"),
            ("CHECKIN_API_URL", "https://faces.example.com"),
            ("CHECKIN_INPUT_WIDTH", "128"),
            ("CHECKIN_INPUT_HEIGHT", "128"),
            ("CHECKIN_NORMALIZATION", "symmetric"),
            ("CHECKIN_CHANNEL_MAJOR", "0"),
            ("CHECKIN_COOLDOWN_MS", "1000"),
            ("CHECKIN_MODEL_WEIGHTS", "/opt/models/blazeface.onnx.data"),
        ]);
        assert_eq!(config.api_url, "https://faces.example.com");
        assert_eq!(config.capture_dir, PathBuf::from("/var/lib/checkin/captures"));
        assert_eq!(
            config.model_weights,
            Some(PathBuf::from("/opt/models/blazeface.onnx.data"))
        );
        assert_eq!(config.capture().cooldown, Duration::from_millis(1000));

        let transform = config.transform();
        assert_eq!((transform.width, transform.height), (128, 128));
        assert_eq!(transform.layout, TensorLayout::Nhwc);
        assert_eq!(transform.normalization, Normalization::Symmetric);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("CHECKIN_THROTTLE_MS", "soon"),
            ("CHECKIN_CONFIDENCE_THRESHOLD", "high"),
            ("CHECKIN_NORMALIZATION", "imagenet"),
        ]);
        assert_eq!(config.throttle_interval, Duration::from_millis(500));
        assert_eq!(config.confidence_threshold, 0.75);
        assert_eq!(config.normalization, Normalization::UnitRange);
    }
}
