use clap::ValueEnum;

mod config_cmd;
mod records;
mod save;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use records::{CompactCommand, PendingCommand, QuarantineCommand, StatusCommand};
pub use save::SaveCommand;
pub use sync_cmd::{RunCommand, SyncCommand};

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
