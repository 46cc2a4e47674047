use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carlease_client::chat::ChatThread;
use carlease_client::cli::{zero_based, Cli, ReplCommand, ReplLine, UploadArgs};
use carlease_client::comparison::compare;
use carlease_client::contracts::ContractShelf;
use carlease_client::models::{ChatRole, LeaseUpload};
use carlease_client::normalize::{self, LeaseSummary};
use carlease_client::orchestrator::{JobPhase, Submission};
use carlease_client::{Config, LeaseApiClient, Orchestrator, PollOutcome, PollSettings, Session};

/// Everything one interactive session holds.
struct App {
    config: Config,
    api: LeaseApiClient,
    session: Session,
    /// Latest session, for background polls started earlier.
    published_session: watch::Sender<Session>,
    orchestrator: Orchestrator,
    shelf: ContractShelf,
    chat: ChatThread,
}

impl App {
    fn new(config: Config) -> anyhow::Result<Self> {
        let api = LeaseApiClient::new(&config)?;
        let orchestrator = Orchestrator::new(api.clone(), PollSettings::from_config(&config));
        let (published_session, _) = watch::channel(Session::anonymous());

        Ok(Self {
            config,
            api,
            session: Session::anonymous(),
            published_session,
            orchestrator,
            shelf: ContractShelf::new(),
            chat: ChatThread::new(),
        })
    }

    /// Runs one command. Returns `false` when the user asked to quit.
    async fn dispatch(&mut self, command: ReplCommand) -> anyhow::Result<bool> {
        match command {
            ReplCommand::Health => self.health().await,
            ReplCommand::Register(args) => {
                self.session
                    .register(&self.api, &args.username, &args.password)
                    .await?;
                println!("Account {} created. Log in with `login`.", args.username);
            }
            ReplCommand::Login(args) => {
                let credential = self
                    .session
                    .login(&self.api, &args.username, &args.password)
                    .await?;
                self.published_session.send_replace(self.session.clone());
                println!("Logged in as {}", credential.username);
            }
            ReplCommand::Logout => {
                self.session.logout(&self.api).await;
                self.published_session.send_replace(self.session.clone());
                println!("Logged out");
            }
            ReplCommand::Whoami => match self.session.username() {
                Some(username) => println!("{}", username),
                None => println!("Not logged in"),
            },
            ReplCommand::Upload(args) => self.upload(args).await?,
            ReplCommand::Status => self.status(),
            ReplCommand::Show => match self.orchestrator.current().result {
                Some(result) => print!("{}", LeaseSummary::from_result(&result)),
                None => println!("No analysis yet. Use `upload <file.pdf>`."),
            },
            ReplCommand::Save { name } => {
                let result = self
                    .orchestrator
                    .current()
                    .result
                    .ok_or_else(|| anyhow::anyhow!("nothing to save, upload a lease first"))?;
                let index = self.shelf.save(result, name.join(" "));
                println!("Saved as #{}", index + 1);
            }
            ReplCommand::Saved => self.list_saved(),
            ReplCommand::Remove { index } => {
                let removed = zero_based(index)
                    .and_then(|i| self.shelf.remove(i))
                    .ok_or_else(|| anyhow::anyhow!("no saved contract #{}", index))?;
                println!("Removed '{}'", removed.saved_name);
            }
            ReplCommand::Compare { indices } => self.compare(&indices)?,
            ReplCommand::History { import } => self.history(import).await?,
            ReplCommand::Select { index } => {
                let contract = zero_based(index)
                    .and_then(|i| self.shelf.get(i))
                    .ok_or_else(|| anyhow::anyhow!("no saved contract #{}", index))?;
                self.chat.select(contract);
                match self.chat.job_id() {
                    Some(_) => println!("Chatting about '{}'", contract.saved_name),
                    None => println!("'{}' has no analysis job to chat about", contract.saved_name),
                }
            }
            ReplCommand::Chat { message } => {
                let reply = self
                    .chat
                    .send(&self.api, &self.session, &message.join(" "))
                    .await?;
                println!("bot: {}", reply.text);
            }
            ReplCommand::Transcript => {
                if self.chat.transcript().is_empty() {
                    println!("No messages yet");
                }
                for message in self.chat.transcript() {
                    let speaker = match message.role {
                        ChatRole::User => "you",
                        ChatRole::Bot => "bot",
                    };
                    println!("{}: {}", speaker, message.text);
                }
            }
            ReplCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    async fn health(&self) {
        match self.api.health().await {
            Ok(true) => println!("Backend reachable at {}", self.api.base_url()),
            Ok(false) => println!("Backend at {} answered but is unhealthy", self.api.base_url()),
            Err(e) => println!("Backend unreachable: {}", e),
        }
    }

    async fn upload(&mut self, args: UploadArgs) -> anyhow::Result<()> {
        let upload = LeaseUpload::from_path(&args.path, args.fast || self.config.fast_mode).await?;
        println!("Uploading {}...", upload.file_name);

        match self.orchestrator.submit(&self.session, &upload).await? {
            Submission::Completed(result) => {
                println!("Analysis complete");
                print!("{}", LeaseSummary::from_result(&result));
            }
            Submission::Pending { ticket, job_id, .. } => {
                println!(
                    "Analysis queued as job {}. Keep working; results appear when ready.",
                    job_id
                );
                let orchestrator = self.orchestrator.clone();
                let sessions = self.published_session.subscribe();
                tokio::spawn(async move {
                    match orchestrator.poll_following(&sessions, ticket, &job_id).await {
                        PollOutcome::Done(result) => println!(
                            "\nAnalysis {} ready: rating {:.1}/10. Use `show` for details.",
                            job_id,
                            normalize::deal_rating(&result)
                        ),
                        PollOutcome::Superseded => {}
                        _ => println!(
                            "\nAnalysis {} did not finish. The partial result is kept; see `status`.",
                            job_id
                        ),
                    }
                });
            }
        }
        Ok(())
    }

    fn status(&self) {
        let view = self.orchestrator.current();
        let phase = match &view.phase {
            JobPhase::Idle => "idle".to_string(),
            JobPhase::Uploading => "uploading".to_string(),
            JobPhase::UploadFailed(reason) => format!("upload failed: {}", reason),
            JobPhase::Completed => "complete".to_string(),
            JobPhase::Pending { job_id } => format!("job {} queued", job_id),
            JobPhase::Polling { job_id } => format!("waiting for job {}", job_id),
            JobPhase::Done => "analysis finished".to_string(),
            JobPhase::Errored => "analysis failed".to_string(),
            JobPhase::NotFound => "job unknown to the backend".to_string(),
            JobPhase::TimedOut => "gave up waiting".to_string(),
        };
        println!("{}", phase);
    }

    fn list_saved(&self) {
        if self.shelf.is_empty() {
            println!("No saved contracts");
            return;
        }
        for (i, contract) in self.shelf.iter().enumerate() {
            let monthly = normalize::monthly_payment(&contract.result)
                .map(|m| format!("${:.2}/mo", m))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "#{} {} | {:.1}/10 | {} | saved {}",
                i + 1,
                contract.saved_name,
                normalize::deal_rating(&contract.result),
                monthly,
                contract.saved_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    fn compare(&self, indices: &[usize]) -> anyhow::Result<()> {
        let selected = if indices.is_empty() {
            self.shelf.as_slice().to_vec()
        } else {
            let zero: Vec<usize> = indices
                .iter()
                .map(|&i| zero_based(i).ok_or_else(|| anyhow::anyhow!("no saved contract #{}", i)))
                .collect::<anyhow::Result<_>>()?;
            self.shelf
                .select(&zero)
                .map_err(|i| anyhow::anyhow!("no saved contract #{}", i + 1))?
        };

        print!("{}", compare(&selected)?);
        Ok(())
    }

    async fn history(&mut self, import: bool) -> anyhow::Result<()> {
        let leases = self.api.my_leases(&self.session).await?;
        if leases.is_empty() {
            println!("No leases stored for this account");
            return Ok(());
        }
        for lease in &leases {
            println!(
                "- {} | {:.1}/10",
                lease
                    .get("file_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("(unnamed)"),
                normalize::deal_rating(lease)
            );
        }
        if import {
            let added = self.shelf.import_remote(leases);
            println!("Imported {} leases into saved contracts", added);
        }
        Ok(())
    }
}

fn prompt() {
    print!("carlease> ");
    std::io::stdout().flush().ok();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't interleave with command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carlease_client=info,carlease=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_base_url(url)?;
    }
    config.fast_mode |= cli.fast;

    let mut app = App::new(config)?;
    tracing::info!("✓ Lease API client initialized: {}", app.api.base_url());
    app.health().await;
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        let parsed = match ReplLine::parse_line(&line) {
            None => {
                prompt();
                continue;
            }
            Some(parsed) => parsed,
        };

        match parsed {
            Ok(ReplLine { command }) => match app.dispatch(command).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => println!("Error: {}", e),
            },
            // `help` and usage errors both arrive here
            Err(e) => {
                e.print().ok();
            }
        }
        prompt();
    }

    app.orchestrator.reset();
    Ok(())
}
