use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_script_file")]
    pub script_file: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub unattended: bool,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub style: StyleConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ApiConfig {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,

    #[serde(default = "default_google_pacing_ms")]
    pub google_pacing_ms: u64,

    #[serde(default = "default_openai_pacing_ms")]
    pub openai_pacing_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StyleConfig {
    pub preset: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
}

fn default_script_file() -> String {
    "script.json".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}
fn default_aspect_ratio() -> String {
    "16:9".to_string()
}
fn default_google_pacing_ms() -> u64 {
    1000
}
fn default_openai_pacing_ms() -> u64 {
    2000
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            aspect_ratio: default_aspect_ratio(),
            google_pacing_ms: default_google_pacing_ms(),
            openai_pacing_ms: default_openai_pacing_ms(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            script_file: default_script_file(),
            output_folder: default_output(),
            unattended: false,
            api: ApiConfig::default(),
            image: ImageConfig::default(),
            style: StyleConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    // Every setting is defaultable or prompted interactively, so a missing
    // config.yml is not an error.
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        let config: Config =
            serde_yaml_ng::from_str(&content).context("Failed to parse config.yml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mapping_yields_defaults() {
        let config: Config = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(config.script_file, "script.json");
        assert_eq!(config.output_folder, "output");
        assert!(!config.unattended);
        assert_eq!(config.image.model, "gemini-3-pro-image-preview");
        assert_eq!(config.image.aspect_ratio, "16:9");
        assert_eq!(config.image.google_pacing_ms, 1000);
        assert_eq!(config.image.openai_pacing_ms, 2000);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert!(config.api.google_api_key.is_none());
        assert!(config.style.preset.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "\
image:
  model: gpt-image-1
  openai_pacing_ms: 5000
api:
  openai_api_key: sk-test
";
        let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.image.model, "gpt-image-1");
        assert_eq!(config.image.openai_pacing_ms, 5000);
        assert_eq!(config.image.google_pacing_ms, 1000);
        assert_eq!(config.api.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.script_file, "script.json");
    }

    #[test]
    fn test_round_trip_through_yaml() {
        let mut config = Config::default();
        config.unattended = true;
        config.style.preset = Some("水墨畫風".to_string());

        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        let parsed: Config = serde_yaml_ng::from_str(&yaml).unwrap();

        assert!(parsed.unattended);
        assert_eq!(parsed.style.preset.as_deref(), Some("水墨畫風"));
        assert_eq!(parsed.image.aspect_ratio, config.image.aspect_ratio);
    }
}
