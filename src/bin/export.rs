//! Export the dataset to a file without starting the server.
//!
//! Run with: `cargo run --bin dataset-export -- [DESTINATION]`
//!
//! `DESTINATION` is a directory (the export lands there as `dataset.jsonl`) or
//! a path ending in `.jsonl`. It defaults to the current directory. The source
//! dataset is taken from the same `DATASET_*` variables the server reads.

use std::path::PathBuf;
use std::process::ExitCode;

use convo_dataset::dataset::{
    ConversationStore, DatasetConfig, DatasetError, DirectoryDestination, FileDestination,
    SaveDestination, export_to,
};
use convo_dataset::start_dataset_builder::init_tracing;

/// Pick a destination from the command-line argument.
fn destination_from_arg(arg: Option<String>) -> Box<dyn SaveDestination> {
    let target = arg.map_or_else(|| PathBuf::from("."), PathBuf::from);
    let is_file = target
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
    if is_file {
        Box::new(FileDestination::new(target))
    } else {
        Box::new(DirectoryDestination::new(target))
    }
}

fn main() -> ExitCode {
    init_tracing();

    let config = match DatasetConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let store = ConversationStore::from_config(&config.storage);
    let destination = destination_from_arg(std::env::args().nth(1));

    match export_to(&store, destination.as_ref()) {
        Ok(Some(path)) => {
            tracing::info!("Wrote {}", path.display());
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(DatasetError::EmptyStore) => {
            tracing::warn!("No conversations to export.");
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!("Export failed: {e}");
            ExitCode::from(1)
        }
    }
}
