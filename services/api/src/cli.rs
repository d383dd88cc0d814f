use crate::server;
use agvet::error::AppError;
use agvet::workflows::telemedicine::OnboardingStep;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "AgVet Telemedicine",
    about = "Run the agricultural-veterinary telemedicine service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect the veterinarian onboarding pipeline
    Onboarding {
        #[command(subcommand)]
        command: OnboardingCommand,
    },
}

#[derive(Subcommand, Debug)]
enum OnboardingCommand {
    /// Print every onboarding step in order with the documents it requires
    Steps,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Onboarding {
            command: OnboardingCommand::Steps,
        } => {
            print!("{}", render_step_catalog());
            Ok(())
        }
    }
}

pub(crate) fn render_step_catalog() -> String {
    let mut output = String::from("Onboarding steps\n");
    for step in OnboardingStep::ordered() {
        let documents = step.documents_required();
        let documents = if documents.is_empty() {
            "none".to_string()
        } else {
            documents.join(", ")
        };
        let marker = if step.is_external_verification() {
            " [external verification]"
        } else {
            ""
        };
        output.push_str(&format!(
            "{:>2}. {} ({}){}\n    documents: {}\n",
            step.position() + 1,
            step.label(),
            step.key(),
            marker,
            documents
        ));
    }
    output
}
