use crate::config::Config;
use crate::error::{CivicError, Result};

use super::prompt;

fn render_config(config: &Config) -> Result<String> {
    Ok(toml::to_string(config)?)
}

fn optional(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

pub fn run() -> Result<()> {
    let config_path = Config::config_path()?;

    if config_path.exists() {
        let answer = prompt(&format!(
            "Config file already exists at {}. Overwrite? [y/N] ",
            config_path.display()
        ))?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    println!("Civic Admin Configuration");
    println!("=========================\n");

    let database_url =
        prompt("Realtime database URL (https://<project>-default-rtdb.<region>.firebasedatabase.app): ")?;
    if database_url.is_empty() {
        return Err(CivicError::MissingDatabaseUrl);
    }

    let api_key = prompt("Web API key of the project: ")?;
    if api_key.is_empty() {
        return Err(CivicError::MissingApiKey);
    }

    let email = prompt("Administrator email [optional]: ")?;
    let default_pincode = prompt("Default pincode for new workers [optional]: ")?;

    let config = Config {
        database_url: Some(database_url),
        api_key: Some(api_key),
        email: optional(email),
        default_pincode: optional(default_pincode),
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CivicError::ConfigRead {
            path: config_path.clone(),
            source: e,
        })?;
    }

    std::fs::write(&config_path, render_config(&config)?).map_err(|e| CivicError::ConfigRead {
        path: config_path.clone(),
        source: e,
    })?;

    println!("\nConfig saved to {}", config_path.display());
    println!("Run 'civic login' to sign in.");

    Ok(())
}
