use chrono::{Duration, Utc};
use clap::{Args, Subcommand};

use super::OutputFormat;
use lockin::{Engine, Record, RecordId, RecordKind, StatusCounts};

#[derive(Args)]
pub struct PendingCommand {
    /// Record kind (workout, nutrition)
    kind: RecordKind,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl PendingCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        let records = engine.store().list_pending(self.kind).await?;
        print_records(&records, self.format, &format!("No pending {} records.", self.kind))
    }
}

#[derive(Args)]
pub struct StatusCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(serde::Serialize)]
struct KindStatus {
    kind: RecordKind,
    #[serde(flatten)]
    counts: StatusCounts,
}

impl StatusCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        let mut statuses = Vec::with_capacity(RecordKind::ALL.len());
        for kind in RecordKind::ALL {
            statuses.push(KindStatus {
                kind,
                counts: engine.store().counts(kind).await?,
            });
        }

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            }
            OutputFormat::Text => {
                println!(
                    "{:<15} {:>8} {:>8} {:>12}",
                    "KIND", "PENDING", "SYNCED", "QUARANTINED"
                );
                for status in &statuses {
                    println!(
                        "{:<15} {:>8} {:>8} {:>12}",
                        status.kind.to_string(),
                        status.counts.pending,
                        status.counts.synced,
                        status.counts.quarantined
                    );
                }
            }
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct QuarantineCommand {
    #[command(subcommand)]
    pub command: QuarantineSubcommand,
}

#[derive(Subcommand)]
pub enum QuarantineSubcommand {
    /// List quarantined records
    List {
        /// Record kind (workout, nutrition)
        kind: RecordKind,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Move a quarantined record back to pending
    Requeue {
        /// Record kind (workout, nutrition)
        kind: RecordKind,

        /// Record ID
        id: RecordId,
    },
}

impl QuarantineCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            QuarantineSubcommand::List { kind, format } => {
                let records = engine.store().list_quarantined(*kind).await?;
                print_records(&records, *format, &format!("No quarantined {} records.", kind))
            }
            QuarantineSubcommand::Requeue { kind, id } => {
                if engine.store().requeue(*kind, *id).await? {
                    println!("Requeued {} #{}", kind, id);
                    Ok(())
                } else {
                    Err(format!("No quarantined {} record with id {}", kind, id).into())
                }
            }
        }
    }
}

#[derive(Args)]
pub struct CompactCommand {
    /// Delete synced records older than this many days
    #[arg(long, default_value = "30")]
    older_than_days: u32,
}

impl CompactCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        let cutoff = Utc::now() - Duration::days(i64::from(self.older_than_days));

        let mut total = 0;
        for kind in RecordKind::ALL {
            let purged = engine.store().purge_synced(kind, cutoff).await?;
            if purged > 0 {
                println!("Purged {} synced {} record(s)", purged, kind);
            }
            total += purged;
        }

        if total == 0 {
            println!("Nothing to compact.");
        }
        Ok(())
    }
}

fn print_records(
    records: &[Record],
    format: OutputFormat,
    empty_message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(records)?);
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("{}", empty_message);
            }
            for record in records {
                println!("{}", record);
                println!("  {}", record.payload);
            }
        }
    }
    Ok(())
}
