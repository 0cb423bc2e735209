// Copyright (c) 2025 - Cowboy AI, Inc.
//! Hub-and-Spoke Deployment CLI
//!
//! Previews, applies and destroys the hub-and-spoke topology of one stack
//! against the simulated account, and inspects what the last apply left.
//!
//! Run with: cargo run --bin hub-spoke -- --stack dev up
//!
//! State lives in `--state-dir` (default `.hub-spoke`):
//! - `<stack>.json`: deployment snapshot
//! - `cloud-<stack>.json`: simulated account

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hub_spoke_infrastructure::{
    components::describe_analyses,
    config::{HubAndSpokeSettings, StackConfig},
    domain::{validate_snapshot, Urn},
    engine::{Deployment, FileStateStore, Snapshot, UpdateSummary},
    provider::{AnalysisStatus, SimulatedCloud},
    stack,
    state_machine::{DeclarationReport, DeclarationStatus},
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "hub-spoke", version, about = "Transit-gateway hub-and-spoke deployments")]
struct Cli {
    /// Stack name
    #[arg(long, short, env = "HUBSPOKE_STACK", default_value = "dev")]
    stack: String,

    /// Stack file (defaults to config/Stack.<stack>.yaml)
    #[arg(long, short, env = "HUBSPOKE_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Directory holding snapshots and the simulated account
    #[arg(long, env = "HUBSPOKE_STATE_DIR", default_value = ".hub-spoke")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the steps an apply would take
    Preview,
    /// Converge the account on the configuration
    Up,
    /// Delete everything the stack owns
    Destroy,
    /// Describe the reachability analyses of the last apply
    Verify,
    /// Check the topology invariants of the last apply
    Validate,
    /// Print the component hierarchy of the last apply
    Tree,
}

struct Workspace {
    cloud: Arc<SimulatedCloud>,
    cloud_path: PathBuf,
    deployment: Deployment,
}

impl Workspace {
    async fn open(cli: &Cli, region: &str) -> Result<Self> {
        let cloud_path = cli.state_dir.join(format!("cloud-{}.json", cli.stack));
        let cloud = Arc::new(
            SimulatedCloud::load(&cloud_path, region)
                .await
                .context("Failed to load simulated account")?,
        );
        let store = Arc::new(FileStateStore::new(&cli.state_dir));
        let deployment = Deployment::new(&cli.stack, stack::PROJECT, cloud.clone(), store);
        Ok(Self {
            cloud,
            cloud_path,
            deployment,
        })
    }

    async fn persist(&self) -> Result<()> {
        self.cloud
            .save(&self.cloud_path)
            .await
            .context("Failed to save simulated account")
    }
}

async fn load_settings(cli: &Cli) -> Result<HubAndSpokeSettings> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("config/Stack.{}.yaml", cli.stack)));
    let config = StackConfig::load(stack::PROJECT, &path)
        .await
        .with_context(|| format!("Failed to read stack file {}", path.display()))?;
    let settings = HubAndSpokeSettings::from_config(&config).context("Invalid configuration")?;
    info!(
        supernet = %settings.supernet,
        hub = %settings.hub_vpc_cidr,
        spokes = settings.spokes.len(),
        "configuration loaded"
    );
    Ok(settings)
}

/// Region of the stack; the account file keeps its own region once it exists
async fn configured_region(cli: &Cli) -> String {
    match load_settings(cli).await {
        Ok(settings) => settings.region,
        Err(e) => {
            warn!(error = %e, "stack configuration unavailable, assuming the default region");
            HubAndSpokeSettings::DEFAULT_REGION.to_string()
        }
    }
}

/// Declarations that failed on their own, and how many were cancelled
fn print_failures(reports: &BTreeMap<Urn, DeclarationReport>) {
    for (urn, report) in reports.iter().filter(|(_, r)| r.critical) {
        println!("✗ {}", urn.name());
        for warning in &report.warnings {
            println!("    {warning}");
        }
    }
    let cancelled = reports
        .values()
        .filter(|r| r.status == DeclarationStatus::Failed && !r.critical)
        .count();
    if cancelled > 0 {
        println!("{cancelled} declarations cancelled");
    }
}

fn print_summary(summary: &UpdateSummary) {
    for step in summary.plan.changes() {
        println!("{step}");
    }
    let counts = summary.plan.summary();
    println!(
        "\n{:?} {}: {} to create, {} to update, {} to replace, {} to delete, {} unchanged ({:.2?})",
        summary.mode,
        summary.update_id,
        counts.create,
        counts.update,
        counts.replace,
        counts.delete,
        counts.same,
        summary.duration
    );
    if !summary.exports.is_empty() {
        println!("\nOutputs:");
        for (name, value) in &summary.exports {
            match value {
                Some(value) => println!("  {name}: {value}"),
                None => println!("  {name}: (known after apply)"),
            }
        }
    }
}

fn print_tree(snapshot: &Snapshot) {
    let roots = snapshot.components.iter().filter(|c| c.parent.is_none());
    for root in roots {
        print_component(snapshot, &root.urn, 0);
    }
    for resource in snapshot.live().filter(|r| r.parent.is_none()) {
        println!("{} {}", resource.kind, resource.urn.name());
        print_children(snapshot, &resource.urn, 1);
    }
}

fn print_component(snapshot: &Snapshot, urn: &Urn, depth: usize) {
    if let Some(component) = snapshot.component(urn) {
        println!("{}{} {}", "  ".repeat(depth), component.type_name, component.name);
        for child in &component.children {
            if snapshot.component(child).is_some() {
                print_component(snapshot, child, depth + 1);
            } else if let Some(resource) = snapshot.find(child) {
                println!("{}{} {} ({})", "  ".repeat(depth + 1), resource.kind, child.name(), resource.id);
                print_children(snapshot, child, depth + 2);
            }
        }
    }
}

fn print_children(snapshot: &Snapshot, parent: &Urn, depth: usize) {
    for resource in snapshot.live().filter(|r| r.parent.as_ref() == Some(parent)) {
        println!("{}{} {} ({})", "  ".repeat(depth), resource.kind, resource.urn.name(), resource.id);
        print_children(snapshot, &resource.urn, depth + 1);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!(stack = %cli.stack, state_dir = %cli.state_dir.display(), "hub-spoke starting");

    match cli.command {
        Command::Preview => {
            let settings = load_settings(&cli).await?;
            let workspace = Workspace::open(&cli, &settings.region).await?;
            let summary = workspace
                .deployment
                .preview(|ctx| stack::program(ctx, settings))
                .await
                .context("Preview failed")?;
            print_summary(&summary);
        }
        Command::Up => {
            let settings = load_settings(&cli).await?;
            let workspace = Workspace::open(&cli, &settings.region).await?;
            let result = workspace
                .deployment
                .up(|ctx| stack::program(ctx, settings))
                .await;
            // The account changed even if the run stopped early
            workspace.persist().await?;
            if result.is_err() {
                print_failures(&workspace.deployment.last_declarations());
            }
            let summary = result.context("Update failed")?;
            print_summary(&summary);

            let violations = validate_snapshot(&summary.snapshot);
            for violation in &violations {
                warn!(%violation, "topology invariant violated");
            }
        }
        Command::Destroy => {
            let workspace = Workspace::open(&cli, &configured_region(&cli).await).await?;
            let result = workspace.deployment.destroy().await;
            workspace.persist().await?;
            print_summary(&result.context("Destroy failed")?);
        }
        Command::Verify => {
            let workspace = Workspace::open(&cli, &configured_region(&cli).await).await?;
            let snapshot = workspace.deployment.snapshot().await?;
            let reports = describe_analyses(workspace.cloud.as_ref(), &snapshot)
                .await
                .context("Failed to describe analyses")?;
            if reports.is_empty() {
                println!("No reachability analyses deployed");
            }
            let mut unreachable = 0;
            for (name, report) in &reports {
                let found = report.network_path_found.unwrap_or(false);
                if report.status != AnalysisStatus::Succeeded || !found {
                    unreachable += 1;
                }
                println!("{name}: {:?}, path found: {found}", report.status);
                for hop in &report.forward_path {
                    println!("    {hop}");
                }
                for explanation in &report.explanations {
                    println!("    ! {explanation}");
                }
            }
            if unreachable > 0 {
                bail!("{unreachable} of {} analyses found no path", reports.len());
            }
        }
        Command::Validate => {
            let workspace = Workspace::open(&cli, &configured_region(&cli).await).await?;
            let snapshot = workspace.deployment.snapshot().await?;
            let violations = validate_snapshot(&snapshot);
            for violation in &violations {
                println!("✗ {violation}");
            }
            if !violations.is_empty() {
                bail!("{} invariant violations", violations.len());
            }
            println!("✓ {} resources, all invariants hold", snapshot.live().count());
        }
        Command::Tree => {
            let workspace = Workspace::open(&cli, &configured_region(&cli).await).await?;
            print_tree(&workspace.deployment.snapshot().await?);
        }
    }

    Ok(())
}
