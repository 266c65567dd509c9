use anyhow::Result;

use script2comic::core::config::Config;
use script2comic::services::setup;
use script2comic::ui;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Configuration (defaults apply when config.yml is absent)
    let mut config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Could not read config.yml: {}", e);
            eprintln!("Fix the file or delete it to start from defaults.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    // 2. First-run setup (image model and API key)
    setup::run_setup(&mut config)?;

    // 3. Console session
    ui::run_session(config).await
}
