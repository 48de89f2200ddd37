//! `spectrace` extracts requirements from specifications and reports how far
//! annotated source code covers them.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
