pub mod gemini;
pub mod openai;

use async_trait::async_trait;

use crate::core::error::{GenerationError, Provider};
use crate::core::script::Panel;
use crate::core::state::ImageRef;

pub const GEMINI_PRO_IMAGE: &str = "gemini-3-pro-image-preview";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: Provider,
}

pub static MODELS: [ModelInfo; 4] = [
    ModelInfo {
        id: GEMINI_PRO_IMAGE,
        name: "Gemini 3 Pro (Nano Banana Pro)",
        provider: Provider::Google,
    },
    ModelInfo {
        id: "gemini-2.5-flash-image",
        name: "Gemini 2.5 Flash Image",
        provider: Provider::Google,
    },
    ModelInfo {
        id: "imagen-3.0-generate-001",
        name: "Imagen 3",
        provider: Provider::Google,
    },
    ModelInfo {
        id: "gpt-image-1",
        name: "GPT Image 1",
        provider: Provider::OpenAi,
    },
];

pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.id == id)
}

// Read-only request snapshot, assembled fresh from current settings for
// every call.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    pub aspect_ratio: String,
    pub image_size: Option<String>,
}

impl GenerationConfig {
    pub fn new(model: &ModelInfo, api_key: String, aspect_ratio: String) -> Self {
        // Only the pro model accepts an image size option.
        let image_size = (model.id == GEMINI_PRO_IMAGE).then(|| "1K".to_string());
        Self {
            provider: model.provider,
            model: model.id.to_string(),
            api_key,
            aspect_ratio,
            image_size,
        }
    }
}

pub fn build_prompt(style: &str, panel: &Panel) -> String {
    let mut prompt = format!(
        "{}\nScene Description: {}",
        style.trim(),
        panel.visual_description
    );
    if !panel.dialogue.is_empty() {
        let action = panel
            .dialogue
            .iter()
            .map(|d| format!("{} says: \"{}\"", d.character, d.text))
            .collect::<Vec<_>>()
            .join(" ");
        prompt.push_str(&format!("\nAction/Context: {}", action));
    }
    prompt
}

#[async_trait]
pub trait ImageClient: Send + Sync {
    async fn generate(
        &self,
        panel: &Panel,
        style: &str,
        config: &GenerationConfig,
    ) -> Result<ImageRef, GenerationError>;
}

pub struct ApiImageClient {
    client: reqwest::Client,
}

impl ApiImageClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ApiImageClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageClient for ApiImageClient {
    async fn generate(
        &self,
        panel: &Panel,
        style: &str,
        config: &GenerationConfig,
    ) -> Result<ImageRef, GenerationError> {
        let prompt = build_prompt(style, panel);
        log::debug!("Generating panel {} with {}", panel.id, config.model);

        match config.provider {
            Provider::Google => {
                if config.model.starts_with("imagen-") {
                    gemini::generate_imagen(&self.client, &prompt, config).await
                } else {
                    gemini::generate_gemini(&self.client, &prompt, config).await
                }
            }
            Provider::OpenAi => openai::generate(&self.client, &prompt, config).await,
        }
    }
}

pub fn create_image_client() -> Box<dyn ImageClient> {
    Box::new(ApiImageClient::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::DialogueLine;

    fn panel_with_dialogue() -> Panel {
        Panel {
            id: 1,
            act: "Act 1".to_string(),
            title: "Opening".to_string(),
            visual_description: "A windmill on a hill.".to_string(),
            dialogue: vec![
                DialogueLine {
                    character: "綱手".to_string(),
                    text: "開始吧！".to_string(),
                },
                DialogueLine {
                    character: "鳴人".to_string(),
                    text: "交給我！".to_string(),
                },
            ],
            tech_note: None,
        }
    }

    #[test]
    fn test_build_prompt_layout() {
        let prompt = build_prompt("Art Style: test style.", &panel_with_dialogue());
        assert_eq!(
            prompt,
            "Art Style: test style.\n\
             Scene Description: A windmill on a hill.\n\
             Action/Context: 綱手 says: \"開始吧！\" 鳴人 says: \"交給我！\""
        );
    }

    #[test]
    fn test_build_prompt_is_deterministic() {
        let panel = panel_with_dialogue();
        assert_eq!(
            build_prompt("Style", &panel),
            build_prompt("Style", &panel)
        );
    }

    #[test]
    fn test_build_prompt_without_dialogue_has_no_action_clause() {
        let mut panel = panel_with_dialogue();
        panel.dialogue.clear();
        let prompt = build_prompt("Style", &panel);
        assert!(!prompt.contains("Action/Context"));
        assert!(prompt.ends_with("Scene Description: A windmill on a hill."));
    }

    #[test]
    fn test_build_prompt_trims_style_whitespace() {
        let prompt = build_prompt("\n  Style  \n", &panel_with_dialogue());
        assert!(prompt.starts_with("Style\nScene Description:"));
    }

    #[test]
    fn test_model_catalog_lookup() {
        let model = find_model("gpt-image-1").unwrap();
        assert_eq!(model.provider, Provider::OpenAi);
        assert!(find_model("dall-e-9").is_none());
    }

    #[test]
    fn test_generation_config_image_size_only_for_pro_model() {
        let pro = find_model(GEMINI_PRO_IMAGE).unwrap();
        let config = GenerationConfig::new(pro, "key".to_string(), "16:9".to_string());
        assert_eq!(config.image_size.as_deref(), Some("1K"));

        let flash = find_model("gemini-2.5-flash-image").unwrap();
        let config = GenerationConfig::new(flash, "key".to_string(), "16:9".to_string());
        assert!(config.image_size.is_none());

        let openai = find_model("gpt-image-1").unwrap();
        let config = GenerationConfig::new(openai, "key".to_string(), "16:9".to_string());
        assert!(config.image_size.is_none());
        assert_eq!(config.provider, Provider::OpenAi);
    }
}
