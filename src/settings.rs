use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::correction::DEFAULT_SIMILARITY_THRESHOLD;
use crate::ocr::{BaiduCredentials, OcrLimits};
use crate::providers::{DEFAULT_BASE_URL, DEFAULT_MODEL, ProviderConfig, get_env};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub confidence_threshold: f32,
    pub ocr_limits: OcrLimits,
    pub ocr_api_key: Option<String>,
    pub ocr_secret_key: Option<String>,
    pub noise_filter: bool,
    pub reasoning_api_key: Option<String>,
    pub reasoning_base_url: String,
    pub reasoning_model: String,
    pub similarity_threshold: f64,
    pub visual_classifier: bool,
    pub remove_text: bool,
    pub work_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            ocr_limits: OcrLimits::default(),
            ocr_api_key: None,
            ocr_secret_key: None,
            noise_filter: true,
            reasoning_api_key: None,
            reasoning_base_url: DEFAULT_BASE_URL.to_string(),
            reasoning_model: DEFAULT_MODEL.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            visual_classifier: false,
            remove_text: true,
            work_dir: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSettings>,
    reasoning: Option<ReasoningSettings>,
    correction: Option<CorrectionSettings>,
    style: Option<StyleSettings>,
    output: Option<OutputSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    confidence_threshold: Option<f32>,
    max_dimension: Option<u32>,
    max_payload_bytes: Option<usize>,
    api_key: Option<String>,
    secret_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReasoningSettings {
    noise_filter: Option<bool>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CorrectionSettings {
    similarity_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    visual_classifier: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSettings {
    remove_text: Option<bool>,
    work_dir: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    settings.apply_env();
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Layers one TOML document over the current values.
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            if let Some(threshold) = ocr.confidence_threshold {
                self.confidence_threshold = threshold;
            }
            if let Some(max) = ocr.max_dimension
                && max > 0
            {
                self.ocr_limits.max_dimension = max;
            }
            if let Some(max) = ocr.max_payload_bytes
                && max > 0
            {
                self.ocr_limits.max_payload_bytes = max;
            }
            if let Some(key) = non_blank(ocr.api_key) {
                self.ocr_api_key = Some(key);
            }
            if let Some(key) = non_blank(ocr.secret_key) {
                self.ocr_secret_key = Some(key);
            }
        }
        if let Some(reasoning) = incoming.reasoning {
            if let Some(enabled) = reasoning.noise_filter {
                self.noise_filter = enabled;
            }
            if let Some(key) = non_blank(reasoning.api_key) {
                self.reasoning_api_key = Some(key);
            }
            if let Some(url) = non_blank(reasoning.base_url) {
                self.reasoning_base_url = url;
            }
            if let Some(model) = non_blank(reasoning.model) {
                self.reasoning_model = model;
            }
        }
        if let Some(correction) = incoming.correction
            && let Some(threshold) = correction.similarity_threshold
        {
            self.similarity_threshold = threshold;
        }
        if let Some(style) = incoming.style
            && let Some(enabled) = style.visual_classifier
        {
            self.visual_classifier = enabled;
        }
        if let Some(output) = incoming.output {
            if let Some(remove) = output.remove_text {
                self.remove_text = remove;
            }
            if let Some(dir) = non_blank(output.work_dir) {
                self.work_dir = Some(PathBuf::from(dir));
            }
        }
    }

    /// Secrets and endpoints from the environment win over every file.
    fn apply_env(&mut self) {
        if let Some(key) = get_env("BAIDU_OCR_API_KEY") {
            self.ocr_api_key = Some(key);
        }
        if let Some(key) = get_env("BAIDU_OCR_SECRET_KEY") {
            self.ocr_secret_key = Some(key);
        }
        if let Some(key) = get_env("DEEPSEEK_API_KEY") {
            self.reasoning_api_key = Some(key);
        }
        if let Some(url) = get_env("DEEPSEEK_BASE_URL") {
            self.reasoning_base_url = url;
        }
        if let Some(model) = get_env("DEEPSEEK_MODEL") {
            self.reasoning_model = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "ocr.confidence_threshold must be within 0..=1, got {}",
                self.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(anyhow!(
                "correction.similarity_threshold must be within 0..=1, got {}",
                self.similarity_threshold
            ));
        }
        Ok(())
    }

    pub fn ocr_credentials(&self) -> Option<BaiduCredentials> {
        Some(BaiduCredentials {
            api_key: self.ocr_api_key.clone()?,
            secret_key: self.ocr_secret_key.clone()?,
        })
    }

    /// `None` disables the noise filter.
    pub fn reasoning_config(&self) -> Option<ProviderConfig> {
        if !self.noise_filter {
            return None;
        }
        Some(ProviderConfig {
            key: self.reasoning_api_key.clone()?,
            base_url: self.reasoning_base_url.clone(),
            model: self.reasoning_model.clone(),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".slide-rebuild"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_struct_defaults() {
        let mut settings = Settings::default();
        settings.merge_str(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(settings.confidence_threshold, 0.6);
        assert_eq!(settings.ocr_limits.max_dimension, 4096);
        assert_eq!(settings.ocr_limits.max_payload_bytes, 4 * 1024 * 1024);
        assert!(settings.noise_filter);
        assert!(settings.remove_text);
        assert!(!settings.visual_classifier);
        assert!(settings.ocr_credentials().is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let mut settings = Settings::default();
        settings
            .merge_str("[ocr]\napi_key = \"a\"\nsecret_key = \"b\"\n[output]\nwork_dir = \"/tmp/work\"\n")
            .unwrap();
        settings
            .merge_str("[ocr]\nconfidence_threshold = 0.8\napi_key = \"  \"\n[style]\nvisual_classifier = true\n")
            .unwrap();
        let credentials = settings.ocr_credentials().unwrap();
        assert_eq!(credentials.api_key, "a");
        assert_eq!(credentials.secret_key, "b");
        assert_eq!(settings.confidence_threshold, 0.8);
        assert!(settings.visual_classifier);
        assert_eq!(settings.work_dir, Some(PathBuf::from("/tmp/work")));
    }

    #[test]
    fn reasoning_needs_a_key_and_the_toggle() {
        let mut settings = Settings::default();
        assert!(settings.reasoning_config().is_none());
        settings.merge_str("[reasoning]\napi_key = \"sk\"\n").unwrap();
        let config = settings.reasoning_config().unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        settings.merge_str("[reasoning]\nnoise_filter = false\n").unwrap();
        assert!(settings.reasoning_config().is_none());
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let mut settings = Settings::default();
        settings.merge_str("[ocr]\nconfidence_threshold = 1.5\n").unwrap();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.merge_str("[correction]\nsimilarity_threshold = -0.1\n").unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Settings::default().merge_str("[ocr\n").is_err());
    }
}
