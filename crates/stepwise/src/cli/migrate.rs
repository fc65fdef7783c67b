use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};
use tracing::info;

use stepwise::{load_catalog_from_dir, Catalog, Database, MigrationRunner, PgScope, PgStore};
use stepwise::{MigrationStatus, RunReport, StepwiseConfig};

/// Manage database migrations.
#[derive(Parser)]
pub struct MigrateCommand {
    #[command(subcommand)]
    pub action: MigrateAction,

    /// Configuration file path.
    #[arg(short, long, default_value = "stepwise.toml", global = true)]
    pub config: String,

    /// Migrations directory path (overrides config).
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Run all pending migrations.
    Up,

    /// Show migration status.
    Status,
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let config_path = Path::new(&self.config);
        if !config_path.exists() {
            anyhow::bail!("Configuration file not found: {}", self.config);
        }

        let config = StepwiseConfig::from_file(config_path)?;
        let migrations_dir = self.resolve_dir(&config, config_path);
        info!("Loading migrations from {}", migrations_dir.display());
        let catalog = load_catalog_from_dir(&migrations_dir)?;

        let db = Database::connect(&config.database).await?;
        if let Err(e) = db.health_check().await {
            db.close().await;
            return Err(e.into());
        }
        let runner = MigrationRunner::from_config(db.store(), &config.migrations);

        let result = match self.action {
            MigrateAction::Up => up(&runner, &catalog, &migrations_dir).await,
            MigrateAction::Status => status(&runner, &catalog).await,
        };

        db.close().await;
        result
    }

    /// The `--migrations-dir` flag is taken as given. A relative `dir` from
    /// the config file is relative to that file.
    fn resolve_dir(&self, config: &StepwiseConfig, config_path: &Path) -> PathBuf {
        if let Some(dir) = &self.migrations_dir {
            return PathBuf::from(dir);
        }
        let dir = Path::new(&config.migrations.dir);
        match config_path.parent() {
            Some(base) if dir.is_relative() => base.join(dir),
            _ => dir.to_path_buf(),
        }
    }
}

fn header(title: &str) {
    println!();
    println!("  {} {}", style("STEPWISE").bold().cyan(), style(title).bold());
    println!();
}

async fn up(
    runner: &MigrationRunner<PgStore>,
    catalog: &Catalog<PgScope>,
    dir: &Path,
) -> Result<()> {
    header("Migrations");

    if catalog.is_empty() {
        println!("  {} No migrations found in {}", style("ℹ").blue(), dir.display());
        return Ok(());
    }

    println!("  {} Running pending migrations...", style("→").dim());
    match runner.run(catalog).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            if let Some(name) = e.failed_migration() {
                println!("  {} {}", style("✗").red(), style(name).red().bold());
            }
            Err(e.into())
        }
    }
}

fn print_report(report: &RunReport) {
    if report.is_noop() {
        println!(
            "  {} Already at version {}",
            style("✓").green(),
            report.to_version
        );
    } else {
        for name in &report.applied {
            println!("  {} Applied: {}", style("✓").green(), style(name).cyan());
        }
        println!();
        println!(
            "  {} Version {} → {}",
            style("✓").green(),
            report.from_version,
            report.to_version
        );
    }
    println!();
}

async fn status(runner: &MigrationRunner<PgStore>, catalog: &Catalog<PgScope>) -> Result<()> {
    header("Migration Status");

    let status = runner.status(catalog).await?;
    print_status(&status);
    Ok(())
}

fn print_status(status: &MigrationStatus) {
    if status.applied.is_empty() && status.pending.is_empty() {
        println!("  {} No migrations found", style("ℹ").blue());
        println!();
        return;
    }

    if !status.applied.is_empty() {
        println!("  {} Applied:", style("✓").green());
        for (i, name) in status.applied.iter().enumerate() {
            println!("    {:>4} {}", style(i + 1).dim(), style(name).cyan());
        }
    }

    if !status.pending.is_empty() {
        if !status.applied.is_empty() {
            println!();
        }
        println!("  {} Pending:", style("○").yellow());
        let offset = status.applied.len();
        for (i, name) in status.pending.iter().enumerate() {
            println!(
                "    {:>4} {}",
                style(offset + i + 1).dim(),
                style(name).yellow()
            );
        }
    }

    println!();
    println!(
        "  {} version {}: {} applied, {} pending",
        style("ℹ").blue(),
        status.version,
        status.applied.len(),
        status.pending.len()
    );
    if status.ahead {
        println!(
            "  {} Stored version is ahead of the migrations directory",
            style("!").yellow().bold()
        );
    }
    println!();
}
