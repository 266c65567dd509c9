use anyhow::{anyhow, Result};
use inquire::{Password, Select};

use crate::core::config::Config;
use crate::core::error::Provider;
use crate::services::image::{find_model, ModelInfo, MODELS};

// First-run adjustments before the session starts. The model choice is
// persisted; API keys entered here stay in memory for this session only.
pub fn run_setup(config: &mut Config) -> Result<()> {
    let mut needs_save = false;

    let model = match find_model(&config.image.model) {
        Some(model) => model,
        None if config.unattended => {
            return Err(anyhow!(
                "Unknown image model in config: {}",
                config.image.model
            ));
        }
        None => {
            println!(
                "Configured image model {:?} is not available.",
                config.image.model
            );
            let model = select_model("Select an image model:")?;
            config.image.model = model.id.to_string();
            needs_save = true;
            model
        }
    };

    if needs_save {
        config.save()?;
        println!("Configuration saved.");
    }

    let missing_key = match model.provider {
        Provider::Google => key_is_blank(&config.api.google_api_key),
        Provider::OpenAi => key_is_blank(&config.api.openai_api_key),
    };

    if missing_key {
        if config.unattended {
            return Err(anyhow!(
                "{} API key is required for {} in unattended mode",
                model.provider,
                model.id
            ));
        }

        println!("{} needs a {} API key.", model.name, model.provider);
        let key = Password::new(&format!("Enter your {} API key:", model.provider))
            .without_confirmation()
            .prompt()?;
        match model.provider {
            Provider::Google => config.api.google_api_key = Some(key),
            Provider::OpenAi => config.api.openai_api_key = Some(key),
        }
    }

    Ok(())
}

fn key_is_blank(key: &Option<String>) -> bool {
    key.as_deref().map_or(true, |k| k.trim().is_empty())
}

fn select_model(prompt: &str) -> Result<&'static ModelInfo> {
    let options: Vec<String> = MODELS
        .iter()
        .map(|m| format!("{} - {} ({})", m.id, m.name, m.provider))
        .collect();

    let selection = Select::new(prompt, options).prompt()?;

    let id = selection.split_whitespace().next().unwrap();
    find_model(id).ok_or_else(|| anyhow!("Unknown model selected: {}", selection))
}
