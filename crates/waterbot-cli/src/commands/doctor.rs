use std::path::Path;

use waterbot_core::WaterbotConfig;
use waterbot_core::config::CONFIG_FILE;
use waterbot_engine::{CheckResult, Engine};

pub async fn doctor() -> anyhow::Result<()> {
    let config = WaterbotConfig::load(Path::new("."));
    let engine_config = config
        .as_ref()
        .map(|c| c.engine.clone())
        // arch-lint: allow(no-silent-result-drop) reason="doctor must report diagnostics even when waterbot.toml is invalid"
        .ok()
        .unwrap_or_default();

    let engine = Engine::from_config(&engine_config);
    let mut report = engine.doctor().await;

    report.config_file = match &config {
        Ok(_) if Path::new(CONFIG_FILE).exists() => CheckResult::ok("Found"),
        Ok(_) => CheckResult::ok("Not found (using defaults)"),
        Err(e) => CheckResult::fail(&e.to_string()),
    };

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed; see above for details");
    }

    Ok(())
}
