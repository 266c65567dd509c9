use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::error::ScriptError;

pub const DEFAULT_SCRIPT_JSON: &str = include_str!("../../assets/default_script.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueLine {
    pub character: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel {
    pub id: u32,
    pub act: String,
    pub title: String,
    pub visual_description: String,
    #[serde(default)]
    pub dialogue: Vec<DialogueLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    panels: Vec<Panel>,
}

impl Script {
    pub fn new(panels: Vec<Panel>) -> Result<Self, ScriptError> {
        let mut seen = HashSet::new();
        for panel in &panels {
            if !seen.insert(panel.id) {
                return Err(ScriptError::DuplicateId(panel.id));
            }
        }
        Ok(Self { panels })
    }

    pub fn parse(input: &str) -> Result<Self, ScriptError> {
        let value: serde_json::Value = serde_json::from_str(input)?;
        if !value.is_array() {
            return Err(ScriptError::NotAnArray);
        }
        let panels: Vec<Panel> = serde_json::from_value(value)?;
        Self::new(panels)
    }

    pub fn default_script() -> Result<Self, ScriptError> {
        Self::parse(DEFAULT_SCRIPT_JSON)
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn panel(&self, id: u32) -> Option<&Panel> {
        self.panels.iter().find(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.panels.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.panels)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script file {:?}", path))?;
        let script = Self::parse(&content)
            .with_context(|| format!("Failed to parse script file {:?}", path))?;
        Ok(script)
    }

    // Falls back to the bundled demo script when no file exists yet.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("Script file {:?} not found, using the bundled script", path);
            Ok(Self::default_script()?)
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_pretty_json()?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write script file {:?}", path))?;
        Ok(())
    }
}
