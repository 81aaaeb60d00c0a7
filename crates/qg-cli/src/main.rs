mod cmd;

use clap::Parser;
use flow_cli_common::{init_logging, LogArgs};

/// Command-line entry point for the query gateway: run the server, or
/// validate a catalogue/query without starting it.
#[derive(Debug, Parser)]
#[clap(author, name = "qg", version)]
struct Cli {
    #[clap(flatten)]
    log_args: LogArgs,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Subcommand {
    /// Run the HTTP query gateway.
    Serve(cmd::serve::Args),
    /// Validate a metadata catalogue file (C3).
    ValidateConfig(cmd::validate_config::Args),
    /// Validate a query against a catalogue and roles file (C6).
    ValidateQuery(cmd::validate_query::Args),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_args);

    let result = match cli.subcommand {
        Subcommand::Serve(args) => cmd::serve::run(args),
        Subcommand::ValidateConfig(args) => cmd::validate_config::run(args),
        Subcommand::ValidateQuery(args) => cmd::validate_query::run(args),
    };

    if let Err(err) = result.as_ref() {
        tracing::error!(error = ?err, "command failed");
    }
    result
}
