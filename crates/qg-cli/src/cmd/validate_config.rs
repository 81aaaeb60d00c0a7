use std::path::PathBuf;

use qg_metadata::MetadataConfig;

/// Runs C3 against a catalogue file and prints whether it passes.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Path to a metadata catalogue JSON file.
    path: PathBuf,
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.path)?;
    let config: MetadataConfig = serde_json::from_slice(&bytes)?;

    match qg_metadata::validate_config(&config) {
        Ok(()) => {
            println!("ok");
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&err)?);
            std::process::exit(1);
        }
    }
}
