use std::path::PathBuf;
use std::sync::Arc;

use qg_metadata::ExecutionContext;
use qg_query::QueryDefinition;
use qg_registry::Registry;

/// Runs C6 against a query, loading the catalogue/roles the same way
/// `qg-server` does, without planning or executing anything.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Path to a metadata catalogue JSON file.
    #[arg(long)]
    catalog: PathBuf,
    /// Path to a roles JSON file.
    #[arg(long)]
    roles: PathBuf,
    /// Path to a JSON file with `{"query": ..., "context": ...}`.
    query: PathBuf,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: QueryDefinition,
    #[serde(default)]
    context: ExecutionContext,
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_async(args))
}

async fn run_async(args: Args) -> anyhow::Result<()> {
    let metadata_provider = Arc::new(qg_server::FileMetadataProvider {
        path: args.catalog.to_string_lossy().into_owned(),
    });
    let role_provider = Arc::new(qg_server::FileRoleProvider {
        path: args.roles.to_string_lossy().into_owned(),
    });
    let registry = Registry::bootstrap(metadata_provider, role_provider).await?;

    let bytes = std::fs::read(&args.query)?;
    let req: QueryRequest = serde_json::from_slice(&bytes)?;

    let snapshot = registry.current();
    match qg_validate::validate_query(&req.query, &snapshot, &req.context) {
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
