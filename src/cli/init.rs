use std::path::{Path, PathBuf};

use clap::Parser;
use spectrace::{Config, CONFIG_FILE};
use tracing::instrument;

#[derive(Debug, Parser)]
pub struct Init {
    /// Specification files or directories to track (defaults to `specs`)
    #[arg(value_name = "PATH")]
    specifications: Vec<PathBuf>,

    /// Directory for requirement snapshots
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<PathBuf>,
}

impl Init {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            anyhow::bail!("Already initialized (found existing {CONFIG_FILE})");
        }

        let mut config = if self.specifications.is_empty() {
            Config::default()
        } else {
            Config::new(self.specifications)
        };
        config.snapshot_dir = self.snapshot_dir;
        config
            .save(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {CONFIG_FILE}: {e}"))?;

        println!("Initialized {} in {}", CONFIG_FILE, root.display());
        for path in config.specifications() {
            println!("  Tracking: {}", path.display());
        }

        println!();
        println!("Next steps:");
        println!("  spectrace extract");
        println!("  spectrace report --annotations annotations.json");

        Ok(())
    }
}
