//! `actloop doctor` — diagnose configuration and endpoint health.

use actloop_config::AppConfig;
use actloop_core::provider::Provider;
use actloop_providers::OllamaProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("actloop Doctor — System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `actloop onboard`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    let workspace = &config.tools.workspace_root;
    if workspace.is_dir() {
        println!("  ✅ Workspace root exists: {}", workspace.display());
    } else {
        println!("  ❌ Workspace root missing: {}", workspace.display());
        issues += 1;
    }

    let provider = OllamaProvider::new(&config.endpoint, config.request_timeout_secs);
    match provider.health_check().await {
        Ok(true) => println!("  ✅ Endpoint reachable: {}", provider.base_url()),
        Ok(false) => {
            println!("  ❌ Endpoint answered with an error: {}", provider.base_url());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Endpoint unreachable: {e}");
            issues += 1;
        }
    }
    println!("  Model: {}", config.model);

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
