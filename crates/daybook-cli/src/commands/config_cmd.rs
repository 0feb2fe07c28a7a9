use daybook_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::config::CliConfig;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            backend_url,
            anon_key,
            table,
        } => {
            let backend_url = normalize_text_option(Some(backend_url))
                .filter(|url| is_http_url(url))
                .ok_or_else(|| {
                    CliError::Config("backend URL must include http:// or https://".to_string())
                })?;
            let anon_key = normalize_text_option(Some(anon_key))
                .ok_or_else(|| CliError::Config("anon key must not be empty".to_string()))?;

            let mut config = CliConfig::load().map_err(CliError::Config)?;
            config.backend_url = Some(backend_url);
            config.backend_anon_key = Some(anon_key);
            config.record_table = normalize_text_option(table);

            let path = config.save().map_err(CliError::Config)?;
            println!("Saved backend configuration to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = CliConfig::load().map_err(CliError::Config)?;
            match config.resolve_backend().map_err(CliError::Config)? {
                Some((url, _)) => {
                    println!("Backend URL: {url}");
                    println!(
                        "Record table: {}",
                        config.record_table.as_deref().unwrap_or("sync_records")
                    );
                }
                None => println!("No sync backend configured."),
            }
            Ok(())
        }
    }
}
