//! Sync CLI commands: one-shot passes and the long-running scheduler.

use clap::Args;

use super::OutputFormat;
use lockin::sync::{PassOutcome, PassReport, SyncEvent};
use lockin::{Engine, RecordKind};

/// Run a sync pass now
#[derive(Args)]
pub struct SyncCommand {
    /// Only sync this kind (workout, nutrition)
    #[arg(long)]
    kind: Option<RecordKind>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl SyncCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        let reports = match self.kind {
            Some(kind) => vec![engine.sync_kind(kind).await],
            None => engine.sync_now().await,
        };

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
            OutputFormat::Text => {
                println!("Syncing {}...", kind_list(&reports));
                println!();
                for report in &reports {
                    println!("  {}", describe_report(report));
                }
                if reports
                    .iter()
                    .any(|r| matches!(r.outcome, PassOutcome::Halted { .. }))
                {
                    println!();
                    println!("Unsynced records stay pending and will retry on the next pass.");
                }
            }
        }

        check_store(&reports)
    }
}

/// Delivery failures are retried later and never fail the command. Only a
/// local store failure does.
fn check_store(reports: &[PassReport]) -> Result<(), Box<dyn std::error::Error>> {
    for report in reports {
        if let PassOutcome::StoreFailed { error } = &report.outcome {
            let message = format!("Local store failed while syncing {}: {}", report.kind, error);
            return Err(message.into());
        }
    }
    Ok(())
}

/// Run the background scheduler until interrupted
#[derive(Args)]
pub struct RunCommand {
    /// Output format for events
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl RunCommand {
    pub async fn run(&self, engine: &Engine) -> Result<(), Box<dyn std::error::Error>> {
        let mut events = engine.subscribe();
        let scheduler = engine.start_scheduler();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut user_signal = signal(SignalKind::user_defined1())?;
            let trigger = engine.trigger();
            tokio::spawn(async move {
                while user_signal.recv().await.is_some() {
                    tracing::info!("SIGUSR1 received, requesting sync");
                    trigger.trigger_now();
                }
            });
        }

        tracing::info!("Scheduler running; press Ctrl-C to stop");

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("Shutting down");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.print_event(&event)?,
                    None => break,
                },
            }
        }

        scheduler.shutdown().await;
        Ok(())
    }

    fn print_event(&self, event: &SyncEvent) -> Result<(), Box<dyn std::error::Error>> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
            OutputFormat::Text => println!("{}", describe_event(event)),
        }
        Ok(())
    }
}

fn kind_list(reports: &[PassReport]) -> String {
    let kinds: Vec<String> = reports.iter().map(|r| r.kind.to_string()).collect();
    kinds.join(", ")
}

fn describe_report(report: &PassReport) -> String {
    let mut line = match &report.outcome {
        PassOutcome::Idle => format!("✓ {} up to date", report.kind),
        PassOutcome::Completed => format!("✓ {} synced {}", report.kind, report.synced),
        PassOutcome::Halted { record_id, error } => format!(
            "✗ {} synced {}, stopped at #{}: {}",
            report.kind, report.synced, record_id, error
        ),
        PassOutcome::StoreFailed { error } => {
            format!("✗ {} local store error: {}", report.kind, error)
        }
    };
    if !report.quarantined.is_empty() {
        let ids: Vec<String> = report.quarantined.iter().map(|id| format!("#{}", id)).collect();
        line.push_str(&format!(" (quarantined {})", ids.join(", ")));
    }
    line
}

fn describe_event(event: &SyncEvent) -> String {
    match event {
        SyncEvent::RecordSaved { kind, id } => format!("saved {} #{}", kind, id),
        SyncEvent::SyncCompleted {
            kind,
            success: true,
            synced,
            ..
        } => format!("sync {}: ok ({} synced)", kind, synced),
        SyncEvent::SyncCompleted {
            kind,
            synced,
            error,
            ..
        } => format!(
            "sync {}: failed after {} synced: {}",
            kind,
            synced,
            error.as_deref().unwrap_or("unknown error")
        ),
        SyncEvent::RecordQuarantined { kind, id, reason } => {
            format!("quarantined {} #{}: {}", kind, id, reason)
        }
    }
}
