/// Runs the HTTP query gateway (§6), reusing `qg-server`'s own startup
/// path so the binary and this subcommand never drift apart.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Directory holding base.{yaml,toml,json} and <APP_ENV>.{yaml,toml,json}.
    #[arg(long, default_value = "config")]
    config_dir: String,
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(qg_server::run(&args.config_dir))
}
