use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;

use super::OutputFormat;
use lockin::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# lockin configuration

# Path to SQLite database (default: platform data dir, e.g. ~/.local/share/lockin/lockin.db)
# database_path: ~/.local/share/lockin/lockin.db

sync:
  # Base URL of the LockIn API
  api_url: http://localhost:8000

  # Bearer token sent with each delivery
  # api_key: your-api-key

  # Sync right after `lockin save`
  auto_sync: true

  # Background scheduler timing, in seconds
  interval_secs: 300
  startup_delay_secs: 60

  # Upper bound on a single delivery request, in seconds
  request_timeout_secs: 30

  # Rejections before a record is set aside (0 = never)
  quarantine_after: 5
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("database_path: {}", config.database_path.value.display());
                        println!("  source: {}", config.database_path.source);
                        println!();

                        let sync = &config.sync;
                        println!("sync.api_url: {}", sync.api_url);
                        println!(
                            "sync.api_key: {}",
                            if sync.api_key.is_some() { "(set)" } else { "(none)" }
                        );
                        println!("sync.auto_sync: {}", sync.auto_sync);
                        println!("sync.interval_secs: {}", sync.interval_secs);
                        println!("sync.startup_delay_secs: {}", sync.startup_delay_secs);
                        println!("sync.request_timeout_secs: {}", sync.request_timeout_secs);
                        println!("sync.quarantine_after: {}", sync.quarantine_after);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'lockin config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockin::config::SyncConfig;

    #[test]
    fn test_default_config_template_parses() {
        #[derive(serde::Deserialize)]
        struct Template {
            sync: SyncConfig,
        }

        let template: Template = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = SyncConfig::default();
        assert_eq!(template.sync.api_url, defaults.api_url);
        assert_eq!(template.sync.interval_secs, defaults.interval_secs);
        assert_eq!(template.sync.quarantine_after, defaults.quarantine_after);
    }
}
