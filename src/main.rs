use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use estatedesk::{
    ApiConfig, CommitOutcome, DraftFile, ProjectWizard, RestClient, WizardConfig,
    core::api::{UnitFilter, UnitService},
    wizard::compute_available,
};

#[derive(Parser)]
#[command(name = "estatedesk")]
#[command(about = "Create and edit real-estate projects against the back-office API")]
struct Cli {
    /// Base url of the back-office API
    #[arg(long, env = "ESTATEDESK_API_URL", value_name = "URL")]
    api_url: String,

    /// Bearer token for the API
    #[arg(long, env = "ESTATEDESK_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "ESTATEDESK_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a draft file through the project wizard and save it
    Submit {
        /// Path to the JSON draft file
        #[arg(value_name = "DRAFT")]
        draft: PathBuf,

        /// Edit this existing project instead of creating a new one
        #[arg(long, value_name = "ID")]
        project: Option<String>,
    },
    /// List units that can be assigned to a project
    Units {
        /// Project being edited; omit for a new project
        #[arg(long, value_name = "ID")]
        project: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let config = ApiConfig::new(&args.api_url)?
        .with_token(args.token)
        .with_timeout(Duration::from_secs(args.timeout_secs));
    let client = RestClient::new(&config)?;

    match args.command {
        Command::Submit { draft, project } => {
            let draft = DraftFile::load(&draft)?;
            let mut wizard = ProjectWizard::new(client, WizardConfig::default());
            wizard.open(project.as_deref()).await?;
            draft.stage(&mut wizard).await?;

            match wizard.commit().await? {
                CommitOutcome::Skipped => println!("Submission skipped (duplicate)."),
                CommitOutcome::Updated(project) => {
                    println!("Updated project {:?}", project.fields.name);
                }
                CommitOutcome::Created(report) => {
                    println!("\n=== Project Created ===");
                    println!("Project: {} ({})", report.project.fields.name, report.project_id);
                    println!("Phases created: {}", report.phases_created);
                    println!("Blocks created: {}", report.blocks_created);
                    println!("Units assigned: {}", report.units_assigned);
                    if !report.is_complete() {
                        println!("\nFailed operations ({}):", report.failures.len());
                        for failure in &report.failures {
                            println!(
                                "  {:?} {:?}: {} (payload: {})",
                                failure.kind, failure.name, failure.error, failure.payload
                            );
                        }
                    }
                }
            }
        }
        Command::Units { project } => {
            let units = client.list_units(&UnitFilter::default()).await?;
            let availability = compute_available(&units, project.as_deref());

            println!("=== Available Units ===");
            println!("Total: {}", availability.available.len());
            for unit in &availability.available {
                let marker = if availability.currently_assigned.contains(&unit.id) {
                    "*"
                } else {
                    " "
                };
                println!(" {} {} {}", marker, unit.id, unit.name);
            }
            if project.is_some() {
                println!("\n* already assigned to this project");
            }
        }
    }

    Ok(())
}
