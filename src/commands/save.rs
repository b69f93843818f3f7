use clap::Args;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::OutputFormat;
use lockin::{Config, Engine, RecordKind, SaveResponse};

#[derive(Args)]
pub struct SaveCommand {
    /// Record kind (workout, nutrition)
    kind: RecordKind,

    /// JSON payload
    #[arg(long, conflicts_with = "file")]
    payload: Option<String>,

    /// Read the JSON payload from a file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl SaveCommand {
    pub async fn run(
        &self,
        engine: &Engine,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let payload = read_payload(self.payload.as_deref(), self.file.as_deref())?;
        validate_payload(&payload)?;

        let result = engine.capture().save(self.kind, &payload).await;

        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&SaveResponse::from(&result))?
                );
            }
            OutputFormat::Text => {
                if let Ok(id) = &result {
                    println!("Saved {} #{}", self.kind, id);
                }
            }
        }
        result?;

        if config.sync.auto_sync {
            try_auto_sync(engine, self.kind).await;
        }

        Ok(())
    }
}

/// Runs one pass for `kind` after a save. Failures leave the record pending
/// and are only reported, never returned.
async fn try_auto_sync(engine: &Engine, kind: RecordKind) {
    let report = engine.sync_kind(kind).await;
    if let Some(error) = report.error() {
        eprintln!("Auto-sync: {} (record kept for a later pass)", error);
    }
}

fn read_payload(
    payload: Option<&str>,
    file: Option<&Path>,
) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(payload) = payload {
        return Ok(payload.to_string());
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e).into());
    }

    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn validate_payload(payload: &str) -> Result<(), Box<dyn std::error::Error>> {
    if payload.trim().is_empty() {
        return Err("Payload is empty".into());
    }
    serde_json::from_str::<serde_json::Value>(payload)
        .map_err(|e| format!("Payload is not valid JSON: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_inline_payload_wins() {
        let payload = read_payload(Some("{\"reps\":3}"), None).unwrap();
        assert_eq!(payload, "{\"reps\":3}");
    }

    #[test]
    fn test_payload_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("meal.json");
        std::fs::write(&path, "{\"kcal\":600}").unwrap();

        assert_eq!(read_payload(None, Some(&path)).unwrap(), "{\"kcal\":600}");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = read_payload(None, Some(Path::new("/nonexistent/meal.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_validate_payload() {
        assert!(validate_payload("{\"exercise\":\"deadlift\"}").is_ok());
        assert!(validate_payload("[1, 2]").is_ok());
        assert!(validate_payload("   ").is_err());
        assert!(validate_payload("{not json").is_err());
    }
}
