use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{error, info, warn};

pub mod cli;
pub mod config;
pub mod core;
pub mod models;

use crate::cli::{AnalyzeArgs, Cli, Command, ConvertArgs};
use crate::config::PortwireConfig;
use crate::core::patch::{patch_class, PatchError};
use crate::core::render::{render_preview, render_report};
use crate::core::{analyze_project, Analysis, FlatWiringPlan};
use crate::models::{AnalysisExport, Severity};

/// Files touched by one `convert --apply` run.
#[derive(Debug, Default)]
pub struct ConvertSummary {
    pub modified: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub failed: Vec<(String, PatchError)>,
    pub skipped_classes: Vec<String>,
}

impl ConvertSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped_classes.is_empty()
    }
}

pub struct Portwire;

impl Portwire {
    /// Runs the analysis and logs every file- and class-level diagnostic.
    pub fn analyze(project_root: &Path, root_class: &str, config: &PortwireConfig) -> anyhow::Result<Analysis> {
        let analysis = analyze_project(project_root, root_class, config)?;
        for diagnostic in &analysis.diagnostics {
            match diagnostic.severity {
                Severity::Warning => warn!("{diagnostic}"),
                Severity::Error => error!("{diagnostic}"),
            }
        }
        let unresolved = analysis.resolution.unresolved().count();
        if unresolved > 0 {
            warn!(unresolved, "some connections could not be resolved");
        }
        Ok(analysis)
    }

    pub fn load_export(json_file: &Path) -> anyhow::Result<AnalysisExport> {
        let text = fs::read_to_string(json_file)
            .with_context(|| format!("Failed to read analysis file {}", json_file.display()))?;
        AnalysisExport::from_json(&text)
            .with_context(|| format!("Failed to parse analysis file {}", json_file.display()))
    }

    pub fn write_export(analysis: &Analysis, json_file: &Path) -> anyhow::Result<()> {
        let json = analysis.export().to_json().context("Failed to serialize analysis")?;
        fs::write(json_file, json).with_context(|| format!("Failed to write {}", json_file.display()))?;
        info!(path = %json_file.display(), "exported analysis");
        Ok(())
    }

    /// Patches every class of the plan. A class that fails is reported and
    /// the remaining classes are still processed.
    pub fn apply(plan: &FlatWiringPlan, config: &PortwireConfig, backup: bool) -> ConvertSummary {
        let mut summary = ConvertSummary::default();
        for class in plan.pending_classes() {
            println!("Processing {}...", class.class_name);
            if class.header_path.is_none() || class.impl_path.is_none() {
                error!(class = %class.class_name, "source files unknown, skipping class");
                summary.skipped_classes.push(class.class_name.clone());
                continue;
            }

            let statements: Vec<_> = plan.statements_for(&class.class_name).collect();
            let patches = match patch_class(class, &statements, &config.registration_method) {
                Ok(patches) => patches,
                Err(e) => {
                    error!(class = %class.class_name, "{e}");
                    summary.failed.push((class.class_name.clone(), e));
                    continue;
                }
            };

            for patch in patches {
                match patch.write(backup) {
                    Ok(true) => {
                        println!("  Modified: {}", patch.path.display());
                        summary.modified.push(patch.path);
                    }
                    Ok(false) => {
                        println!("  Skipped: {} (no changes needed)", patch.path.display());
                        summary.unchanged.push(patch.path);
                    }
                    Err(e) => {
                        error!(class = %class.class_name, "{e}");
                        summary.failed.push((class.class_name.clone(), e));
                    }
                }
            }
        }
        summary
    }
}

fn run_analyze(args: &AnalyzeArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = PortwireConfig::discover(&args.project_root, config_path)?;
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }

    let analysis = Portwire::analyze(&args.project_root, &args.root_class, &config)?;
    println!("{}", render_report(&analysis.root_class, &analysis.tree, &analysis.resolution));

    if let Some(json_file) = &args.export_json {
        Portwire::write_export(&analysis, json_file)?;
        println!("\nExported analysis to {}", json_file.display());
    }
    Ok(())
}

fn run_convert(args: &ConvertArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = PortwireConfig::discover(Path::new("."), config_path)?;
    let export = Portwire::load_export(&args.json_file)?;
    let plan = FlatWiringPlan::build(&export, &config);

    let report = plan.validate();
    for warning in &report.warnings {
        warn!("{warning}");
    }
    for e in &report.errors {
        error!("{e}");
    }

    if args.dry_run {
        println!("{}", render_preview(&plan));
        return Ok(());
    }

    let summary = Portwire::apply(&plan, &config, config.backup && !args.no_backup);
    println!();
    println!("Conversion complete: {}", report.summary());
    println!(
        "  {} files modified, {} unchanged, {} classes failed",
        summary.modified.len(),
        summary.unchanged.len(),
        summary.failed.len() + summary.skipped_classes.len()
    );
    if !summary.is_success() {
        bail!("{} classes could not be converted", summary.failed.len() + summary.skipped_classes.len());
    }
    Ok(())
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref();
    match &cli.command {
        Command::Analyze(args) => run_analyze(args, config_path),
        Command::Convert(args) => run_convert(args, config_path),
    }
}
