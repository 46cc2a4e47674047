//! Uploads one lease PDF, waits for the analysis and prints the result.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carlease_client::cli::UploadAndPollCli;
use carlease_client::models::LeaseUpload;
use carlease_client::orchestrator::AnalysisOutcome;
use carlease_client::{Config, LeaseApiClient, Orchestrator, PollOutcome, PollSettings, Session};

/// Main entry point for the upload script.
///
/// Prints the final (or best partial) result as JSON on stdout. Exits with
/// an error when the upload fails or polling does not finish cleanly.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carlease_client=info,upload_and_poll=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = UploadAndPollCli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = args.api_url.as_deref() {
        config = config.with_base_url(url)?;
    }
    if let Some(timeout) = args.timeout {
        config.poll_timeout_secs = timeout;
    }

    let upload = LeaseUpload::from_path(&args.pdf, args.fast || config.fast_mode).await?;

    let api = LeaseApiClient::new(&config)?;
    let mut session = Session::anonymous();
    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        session.login(&api, username, password).await?;
    }

    let orchestrator = Orchestrator::new(api.clone(), PollSettings::from_config(&config));

    let outcome = orchestrator.analyze_then_logout(&mut session, &upload).await?;
    println!("{}", serde_json::to_string_pretty(outcome.result())?);

    match outcome {
        AnalysisOutcome::Completed(_) => {
            tracing::info!("✓ Analysis returned with the upload");
            Ok(())
        }
        AnalysisOutcome::Polled { job_id, outcome, .. } => match outcome.error(&job_id) {
            None if matches!(outcome, PollOutcome::Done(_)) => Ok(()),
            None => anyhow::bail!("polling for job {} was interrupted", job_id),
            Some(e) => Err(e.into()),
        },
    }
}
