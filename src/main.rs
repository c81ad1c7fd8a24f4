use clap::Parser;
use git_spice::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.run().map_err(anyhow::Error::new)
}
