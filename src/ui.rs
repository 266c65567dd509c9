use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Confirm, Password, Select, Text};

use crate::core::config::Config;
use crate::core::error::{ExportError, GenerationError, Provider};
use crate::core::script::Script;
use crate::core::state::PanelState;
use crate::core::style;
use crate::services::export::{Exporter, ARCHIVE_FILE_NAME};
use crate::services::image::{create_image_client, MODELS};
use crate::services::llm::GeminiTextClient;
use crate::services::scriptwriter::{self, ScriptRequest};
use crate::services::workflow::{BatchOutcome, GenerationManager, Settings, StateListener};

// Renders panel transitions on the console. During a batch run the updates
// feed a progress bar; single regenerations just print lines.
pub struct ConsoleListener {
    style: ProgressStyle,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleListener {
    pub fn new() -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-");
        Ok(Self {
            style,
            bar: Mutex::new(None),
        })
    }
}

impl StateListener for ConsoleListener {
    fn on_batch_started(&self, total: usize) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(self.style.clone());
        *self.bar.lock().unwrap() = Some(pb);
    }

    fn on_transition(&self, id: u32, state: &PanelState) {
        let bar = self.bar.lock().unwrap();
        match (bar.as_ref(), state) {
            (Some(pb), PanelState::Loading) => pb.set_message(format!("panel {:02}", id)),
            (Some(pb), PanelState::Success(_)) => pb.inc(1),
            (Some(pb), PanelState::Error(reason)) => {
                pb.println(format!("Panel {:02} failed: {}", id, reason));
                pb.inc(1);
            }
            (None, PanelState::Loading) => println!("Generating panel {:02}...", id),
            (None, PanelState::Success(_)) => println!("Panel {:02} done.", id),
            (None, PanelState::Error(reason)) => println!("Panel {:02} failed: {}", id, reason),
            (_, PanelState::Idle) => {}
        }
    }

    fn on_batch_finished(&self, outcome: BatchOutcome) {
        if let Some(pb) = self.bar.lock().unwrap().take() {
            match outcome {
                BatchOutcome::Completed => pb.finish_with_message("全部完成"),
                BatchOutcome::Cancelled => pb.abandon_with_message("已取消"),
                BatchOutcome::AlreadyRunning => {}
            }
        }
    }
}

const MENU_GENERATE_ALL: &str = "Generate all panels";
const MENU_REGENERATE: &str = "Regenerate one panel";
const MENU_STATUS: &str = "Show panel status";
const MENU_AI_SCRIPT: &str = "Write a new script with AI";
const MENU_RELOAD: &str = "Reload script from file";
const MENU_SAVE: &str = "Save script to file";
const MENU_RESET: &str = "Reset to the bundled script";
const MENU_STYLE: &str = "Change art style";
const MENU_MODEL: &str = "Change image model";
const MENU_EXPORT: &str = "Export archive";
const MENU_QUIT: &str = "Quit";

const CUSTOM_STYLE: &str = "Custom...";

struct Session {
    config: Config,
    script: Script,
    manager: Arc<GenerationManager>,
    exporter: Exporter,
}

pub async fn run_session(config: Config) -> Result<()> {
    let script = Script::load_or_default(&config.script_file)?;
    let settings = Settings::from_config(&config);
    let manager = Arc::new(GenerationManager::new(
        settings,
        create_image_client(),
        Box::new(ConsoleListener::new()?),
    ));
    manager.states().reconcile(&script.ids());

    let mut session = Session {
        config,
        script,
        manager,
        exporter: Exporter::new(),
    };

    if session.config.unattended {
        return session.run_unattended().await;
    }

    println!(
        "Loaded script with {} panels. Model: {}.",
        session.script.len(),
        session.manager.settings().model.name
    );

    loop {
        let options = vec![
            MENU_GENERATE_ALL,
            MENU_REGENERATE,
            MENU_STATUS,
            MENU_AI_SCRIPT,
            MENU_RELOAD,
            MENU_SAVE,
            MENU_RESET,
            MENU_STYLE,
            MENU_MODEL,
            MENU_EXPORT,
            MENU_QUIT,
        ];
        let choice = match Select::new("What would you like to do?", options).prompt() {
            Ok(choice) => choice,
            Err(_) => break,
        };

        match choice {
            MENU_GENERATE_ALL => session.generate_all().await?,
            MENU_REGENERATE => session.regenerate_single().await?,
            MENU_STATUS => session.show_status(),
            MENU_AI_SCRIPT => session.write_script_with_ai().await?,
            MENU_RELOAD => session.reload_script(),
            MENU_SAVE => session.save_script()?,
            MENU_RESET => session.reset_script()?,
            MENU_STYLE => session.change_style(),
            MENU_MODEL => session.change_model(),
            MENU_EXPORT => session.export_archive().await?,
            MENU_QUIT => break,
            _ => {}
        }
    }

    Ok(())
}

impl Session {
    async fn run_unattended(&mut self) -> Result<()> {
        println!("Running unattended: generating {} panels.", self.script.len());
        let outcome = self.manager.run_all(&self.script).await?;
        println!(
            "Batch finished ({} of {} successful).",
            self.manager.states().success_count(),
            self.script.len()
        );
        if outcome != BatchOutcome::Completed {
            log::warn!("Batch ended early: {:?}", outcome);
        }

        let bytes = self
            .exporter
            .export_all(&self.script, self.manager.states())
            .await?;
        self.write_archive(&bytes)
    }

    async fn generate_all(&mut self) -> Result<()> {
        println!("Press Ctrl-C to stop after the current panel.");
        let watcher = {
            let manager = self.manager.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    println!("\nStopping after the current panel...");
                    manager.request_cancel();
                }
            })
        };

        let result = self.manager.run_all(&self.script).await;
        watcher.abort();

        match result {
            Ok(BatchOutcome::Completed) => {
                println!(
                    "All panels processed ({} of {} successful).",
                    self.manager.states().success_count(),
                    self.script.len()
                );
            }
            Ok(BatchOutcome::Cancelled) => println!("Batch run cancelled."),
            Ok(BatchOutcome::AlreadyRunning) => println!("A batch run is already active."),
            Err(err) => self.handle_generation_error(err)?,
        }
        Ok(())
    }

    async fn regenerate_single(&mut self) -> Result<()> {
        if self.script.is_empty() {
            println!("The script has no panels.");
            return Ok(());
        }

        let options: Vec<String> = self
            .script
            .panels()
            .iter()
            .map(|p| {
                format!(
                    "{:02} [{}] {}",
                    p.id,
                    state_label(&self.manager.states().get(p.id)),
                    p.title
                )
            })
            .collect();
        let selection = match Select::new("Regenerate which panel?", options.clone()).prompt() {
            Ok(selection) => selection,
            Err(_) => return Ok(()),
        };
        let index = options.iter().position(|o| *o == selection).unwrap_or(0);
        let panel = &self.script.panels()[index];

        if let Err(err) = self.manager.generate_panel(panel).await {
            self.handle_generation_error(err)?;
        }
        Ok(())
    }

    // A missing key is recoverable at the prompt; anything else bubbles up.
    fn handle_generation_error(&self, err: GenerationError) -> Result<()> {
        match err {
            GenerationError::MissingCredential(provider) => {
                println!("{}", err);
                if let Ok(key) = Password::new(&format!("Enter your {} API key:", provider))
                    .without_confirmation()
                    .prompt()
                {
                    if !key.trim().is_empty() {
                        self.manager
                            .update_settings(|s| s.set_api_key(provider, key));
                        println!("Key stored for this session.");
                    }
                }
                Ok(())
            }
            other => Err(other.into()),
        }
    }

    fn show_status(&self) {
        let settings = self.manager.settings();
        println!("Model: {}", settings.model.name);
        println!("Style: {}", first_line(&settings.style_prompt));
        for panel in self.script.panels() {
            match self.manager.states().get(panel.id) {
                PanelState::Error(reason) => {
                    println!("{:>3}  {:<8} {} ({})", panel.id, "ERROR", panel.title, reason)
                }
                state => println!("{:>3}  {:<8} {}", panel.id, state_label(&state), panel.title),
            }
        }
        println!(
            "{} of {} panels generated.",
            self.manager.states().success_count(),
            self.script.len()
        );
    }

    async fn write_script_with_ai(&mut self) -> Result<()> {
        let api_key = match self.manager.settings().api_key_for(Provider::Google) {
            Some(key) => key,
            None => {
                println!("Writing a script uses Gemini, which needs a Google API key.");
                let key = match Password::new("Enter your Google API key:")
                    .without_confirmation()
                    .prompt()
                {
                    Ok(key) if !key.trim().is_empty() => key,
                    _ => return Ok(()),
                };
                self.manager
                    .update_settings(|s| s.set_api_key(Provider::Google, key.clone()));
                key
            }
        };

        let topic = match Text::new("Story topic or concept:").prompt() {
            Ok(topic) if !topic.trim().is_empty() => topic,
            Ok(_) => {
                println!("A topic is required.");
                return Ok(());
            }
            Err(_) => return Ok(()),
        };
        let style_label = match Select::new("Art style:", style::preset_labels()).prompt() {
            Ok(label) => label.to_string(),
            Err(_) => return Ok(()),
        };
        let panel_count = match Select::new("Panel count:", vec![4u32, 8, 12, 16]).prompt() {
            Ok(count) => count,
            Err(_) => return Ok(()),
        };

        let llm = GeminiTextClient::new(&api_key, &self.config.llm.model);
        let request = ScriptRequest {
            topic,
            style_label: style_label.clone(),
            panel_count,
        };

        println!("Drafting the script with {}...", self.config.llm.model);
        match scriptwriter::write_script(&llm, &request).await {
            Ok(script) => {
                // A fresh story starts from a clean slate, old panel results
                // would not match the new descriptions anyway.
                self.manager
                    .update_settings(|s| s.style_prompt = style::resolve(&style_label));
                self.manager.states().clear();
                self.script = script;
                self.manager.states().reconcile(&self.script.ids());
                println!("New script ready with {} panels.", self.script.len());
            }
            Err(err) => println!("Script writing failed: {:#}", err),
        }
        Ok(())
    }

    fn reload_script(&mut self) {
        match Script::load(&self.config.script_file) {
            Ok(script) => {
                self.script = script;
                self.manager.states().reconcile(&self.script.ids());
                println!(
                    "Loaded {} panels from {}.",
                    self.script.len(),
                    self.config.script_file
                );
            }
            // A bad file leaves the current script and panel states untouched.
            Err(err) => println!("Could not load script: {:#}", err),
        }
    }

    fn save_script(&self) -> Result<()> {
        self.script.save(&self.config.script_file)?;
        println!("Script saved to {}.", self.config.script_file);
        Ok(())
    }

    fn reset_script(&mut self) -> Result<()> {
        let confirmed = Confirm::new("Replace the current script with the bundled demo script?")
            .with_default(false)
            .prompt()
            .unwrap_or(false);
        if !confirmed {
            return Ok(());
        }

        self.script = Script::default_script()?;
        self.manager
            .update_settings(|s| s.style_prompt = style::DEFAULT_STYLE_PROMPT.to_string());
        self.manager.states().reconcile(&self.script.ids());
        println!("Script reset ({} panels).", self.script.len());
        Ok(())
    }

    fn change_style(&self) {
        println!(
            "Current style: {}",
            first_line(&self.manager.settings().style_prompt)
        );

        let mut options: Vec<String> = style::preset_labels()
            .iter()
            .map(|label| label.to_string())
            .collect();
        options.push(CUSTOM_STYLE.to_string());

        let selection = match Select::new("Pick a style:", options).prompt() {
            Ok(selection) => selection,
            Err(_) => return,
        };

        let prompt = if selection == CUSTOM_STYLE {
            match Text::new("Describe the style:").prompt() {
                Ok(label) if !label.trim().is_empty() => style::resolve(label.trim()),
                _ => return,
            }
        } else {
            style::resolve(&selection)
        };

        self.manager.update_settings(|s| s.style_prompt = prompt);
        println!("Style updated.");
    }

    fn change_model(&self) {
        let options: Vec<String> = MODELS
            .iter()
            .map(|m| format!("{} - {} ({})", m.id, m.name, m.provider))
            .collect();
        let selection = match Select::new("Select an image model:", options.clone()).prompt() {
            Ok(selection) => selection,
            Err(_) => return,
        };
        let index = options.iter().position(|o| *o == selection).unwrap_or(0);
        let model = &MODELS[index];

        self.manager.update_settings(|s| s.model = model);
        println!("Model set to {}.", model.name);
    }

    async fn export_archive(&self) -> Result<()> {
        match self
            .exporter
            .export_all(&self.script, self.manager.states())
            .await
        {
            Ok(bytes) => self.write_archive(&bytes),
            Err(ExportError::NoSuccessfulPanels) => {
                println!("Nothing to export yet, no panel has a generated image.");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn write_archive(&self, bytes: &[u8]) -> Result<()> {
        let path = Path::new(&self.config.output_folder).join(ARCHIVE_FILE_NAME);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write archive to {:?}", path))?;
        println!("Archive written to {:?} ({} bytes).", path, bytes.len());
        Ok(())
    }
}

fn state_label(state: &PanelState) -> &'static str {
    match state {
        PanelState::Idle => "IDLE",
        PanelState::Loading => "LOADING",
        PanelState::Success(_) => "SUCCESS",
        PanelState::Error(_) => "ERROR",
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
