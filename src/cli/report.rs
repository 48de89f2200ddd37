use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process,
};

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use spectrace::{domain::LinkSummary, storage, Config, Level, Status};
use tracing::instrument;

use super::{
    terminal::{is_narrow, terminal_width, truncate, Colorize},
    OutputFormat,
};

#[derive(Debug, Parser)]
#[command(about = "Link annotations to requirements and report compliance")]
pub struct Report {
    /// JSON file of annotations found in source code
    #[arg(long, value_name = "FILE")]
    annotations: PathBuf,

    /// Build the report from snapshots in this directory instead of parsing
    /// the specifications
    #[arg(long, value_name = "DIR")]
    snapshots: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,

    /// Pass requirements that are implemented but untested
    #[arg(long)]
    allow_untested: bool,
}

impl Report {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config = Config::load_or_default(root);

        let (specifications, skipped) = if let Some(dir) = &self.snapshots {
            let load = storage::load_snapshots(&root.join(dir))?;
            (load.specifications, load.skipped.len())
        } else {
            let load = storage::load_specifications(root, config.specifications())?;
            (load.specifications, load.skipped.len())
        };

        let annotations = storage::load_annotations(&root.join(&self.annotations))
            .with_context(|| format!("in {}", self.annotations.display()))?;

        let mut report = spectrace::Report::new(specifications);
        report.record_skipped(skipped);
        let links = report.link(annotations);
        let summary = report.summary();
        let passed = summary.passes(config.require_tests && !self.allow_untested);

        match self.format {
            OutputFormat::Json => output_json(&report, &summary, links, passed)?,
            OutputFormat::Table => output_table(&report, &summary, links, passed),
        }

        if !passed {
            process::exit(1);
        }

        Ok(())
    }
}

fn output_json(
    report: &spectrace::Report,
    summary: &spectrace::domain::Summary,
    links: LinkSummary,
    passed: bool,
) -> anyhow::Result<()> {
    let specifications: Vec<_> = report
        .specifications()
        .map(|specification| {
            let requirements: Vec<_> = specification
                .requirements()
                .map(|requirement| {
                    let annotations: Vec<_> = requirement
                        .annotations()
                        .values()
                        .map(|annotation| {
                            json!({
                                "id": annotation.id(),
                                "type": annotation.kind(),
                                "source": annotation.source_location(),
                                "start_line": annotation.start_line(),
                                "end_line": annotation.end_line(),
                            })
                        })
                        .collect();
                    json!({
                        "id": requirement.id(),
                        "level": requirement.level(),
                        "content": requirement.content(),
                        "status": requirement.status(),
                        "annotations": annotations,
                    })
                })
                .collect();
            json!({
                "source": specification.source_uri(),
                "requirements": requirements,
            })
        })
        .collect();

    let by_status: BTreeMap<_, _> = Status::ALL
        .iter()
        .map(|&status| (status.as_str(), summary.count(status)))
        .collect();
    let by_level: BTreeMap<_, _> = summary
        .by_level
        .iter()
        .map(|(level, count)| (level.as_str(), count))
        .collect();

    let output = json!({
        "specifications": specifications,
        "summary": {
            "specifications": summary.specifications,
            "skipped_files": summary.skipped_files,
            "total": summary.total,
            "by_status": by_status,
            "by_level": by_level,
        },
        "annotations": {
            "linked": links.linked,
            "skipped": links.skipped,
        },
        "passed": passed,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_table(
    report: &spectrace::Report,
    summary: &spectrace::domain::Summary,
    links: LinkSummary,
    passed: bool,
) {
    let narrow = is_narrow();
    let width = terminal_width().map_or(usize::MAX, usize::from);

    for specification in report.specifications() {
        println!("{}", specification.source_uri().info());
        for requirement in specification.requirements() {
            let status = requirement.status();
            if narrow {
                println!("  {}", status.as_str().status(status));
                println!("  {} {}", requirement.level(), requirement.content());
            } else {
                let content = truncate(requirement.content(), width.saturating_sub(33));
                println!(
                    "  {} {:<6} {content}",
                    format!("{:<22}", status.as_str()).status(status),
                    requirement.level().as_str(),
                );
            }
        }
    }

    println!();
    println!("Requirement status");
    println!("{}", "──────────────────".dim());
    for status in Status::ALL {
        let count = summary.count(status);
        if count > 0 {
            println!("{:<22} {count}", status.as_str());
        }
    }
    let levels: Vec<String> = [Level::Must, Level::Should, Level::May]
        .into_iter()
        .map(|level| {
            let count = summary.by_level.get(&level).copied().unwrap_or(0);
            format!("{level} {count}")
        })
        .collect();
    println!("Total {} ({})", summary.total, levels.join(", "));
    println!("Specifications loaded: {}", summary.specifications);
    if summary.skipped_files > 0 {
        println!(
            "Specification files skipped: {}",
            summary.skipped_files.to_string().warning()
        );
    }
    println!();

    println!("Annotations linked: {}", links.linked);
    if links.skipped > 0 {
        println!(
            "Annotations skipped: {}",
            links.skipped.to_string().warning()
        );
    }
    println!();

    if passed {
        println!("{} ✅", "PASS".success());
    } else {
        println!("{} ❌", "FAIL".failure());
    }
}
