use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::json;
use spectrace::{storage, Config, Specification};
use tracing::{info, instrument};

use super::{
    terminal::{is_narrow, terminal_width, truncate, Colorize},
    OutputFormat,
};

#[derive(Debug, Parser, Default)]
#[command(about = "Extract requirements from specifications")]
pub struct Extract {
    /// Specification files or directories (defaults to the configured
    /// specifications)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Output format (table, json)
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Write requirement snapshots to this directory
    #[arg(long, value_name = "DIR")]
    snapshot: Option<PathBuf>,
}

impl Extract {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = Config::load_or_default(root);
        let entries = if self.paths.is_empty() {
            config.specifications().to_vec()
        } else {
            self.paths
        };

        let load = storage::load_specifications(root, &entries)?;

        if let Some(dir) = self.snapshot.or(config.snapshot_dir) {
            let dir = root.join(dir);
            let mut written = 0;
            for specification in &load.specifications {
                written += storage::write_snapshots(specification, &dir)?.len();
            }
            info!(count = written, dir = %dir.display(), "wrote snapshots");
        }

        match self.format {
            OutputFormat::Json => output_json(&load.specifications)?,
            OutputFormat::Table => output_table(&load.specifications, load.skipped.len()),
        }

        Ok(())
    }
}

fn output_json(specifications: &[Specification]) -> anyhow::Result<()> {
    let output: Vec<_> = specifications
        .iter()
        .map(|specification| {
            let sections: Vec<_> = specification
                .sections()
                .map(|section| {
                    let requirements: Vec<_> = section
                        .requirements()
                        .map(|requirement| {
                            json!({
                                "id": requirement.id(),
                                "level": requirement.level(),
                                "content": requirement.content(),
                            })
                        })
                        .collect();
                    json!({
                        "uri": section.uri(),
                        "title": section.title(),
                        "start_line": section.start_line(),
                        "end_line": section.end_line(),
                        "requirements": requirements,
                    })
                })
                .collect();
            json!({
                "source": specification.source_uri(),
                "title": specification.title(),
                "sections": sections,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_table(specifications: &[Specification], skipped: usize) {
    let narrow = is_narrow();
    let width = terminal_width().map_or(usize::MAX, usize::from);

    let mut total = 0;
    for specification in specifications {
        println!("{}", specification.source_uri().info());
        for section in specification.sections().filter(|section| !section.is_empty()) {
            println!("  {}", section.fragment().dim());
            for requirement in section.requirements() {
                total += 1;
                if narrow {
                    println!("    {}", requirement.level());
                    println!("    {}", requirement.content());
                } else {
                    let content = truncate(requirement.content(), width.saturating_sub(13));
                    println!("    {:<6} {content}", requirement.level().as_str());
                }
            }
        }
    }

    if total == 0 {
        println!("No requirements found.");
    } else {
        println!();
        println!(
            "{total} requirements in {} specifications",
            specifications.len()
        );
    }
    if skipped > 0 {
        println!("{}", format!("{skipped} files skipped").warning());
    }
}
