//! Binary entrypoint that serves the dataset builder.

use std::process::ExitCode;

use convo_dataset::start_dataset_builder;

/// Start the HTTP server over the configured dataset file.
fn main() -> ExitCode {
    start_dataset_builder::run()
}
