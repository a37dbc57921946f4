use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use roundup_core::{KeywordSet, MemoryStore, RateLimiter};
use roundup_engine::{Orchestrator, PipelineApi, ReqwestPipelineClient, RunEvent, SessionManager};
use roundup_logging::{roundup_info, roundup_warn};

use crate::cli::{AppConfig, Command};
use crate::persistence::FileStore;
use crate::render;

const STALE_RUN_HINT: &str =
    "If the run never finishes, `roundup clear` unlocks the next run without a cooldown.";

pub(crate) struct App {
    config: AppConfig,
    session: Arc<SessionManager>,
    client: Arc<ReqwestPipelineClient>,
    store: Arc<FileStore>,
}

impl App {
    pub(crate) fn new(config: AppConfig) -> Result<Self> {
        // Tokens never outlive the process.
        let session = Arc::new(SessionManager::new(
            config.client.clone(),
            Arc::new(MemoryStore::new()),
        )?);
        let client = Arc::new(ReqwestPipelineClient::new(
            config.client.clone(),
            session.clone(),
        )?);
        let store = Arc::new(FileStore::open(&config.state_dir));
        Ok(Self {
            config,
            session,
            client,
            store,
        })
    }

    pub(crate) async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Run { keywords, download } => self.run(&keywords, download.as_deref()).await,
            Command::Status => self.status().await,
            Command::Artifact => {
                self.login().await?;
                let result = self.client.latest_result().await?;
                println!("Last run: {}", result.run_state());
                println!("{}", render::artifact(result.artifact.as_ref()));
                Ok(())
            }
            Command::Download { dir } => {
                self.login().await?;
                self.download(&dir).await
            }
            Command::Clear => {
                self.limiter()
                    .manual_clear_running()
                    .context("could not update the rate-limit state")?;
                println!("Cleared the running flag. The cooldown clock is unchanged.");
                Ok(())
            }
        }
    }

    fn limiter(&self) -> RateLimiter {
        RateLimiter::new(self.store.clone())
    }

    async fn login(&self) -> Result<()> {
        match &self.config.password {
            Some(password) => self.session.login(password).await.context("login failed"),
            None => {
                roundup_warn!("No password configured; calling the backend without a session");
                Ok(())
            }
        }
    }

    async fn run(&self, keywords: &str, download: Option<&Path>) -> Result<()> {
        let (orchestrator, mut events) =
            Orchestrator::new(self.client.clone(), self.limiter(), self.config.poll.clone());
        orchestrator.watch_session(&self.session);
        orchestrator.set_keywords(keywords);
        if let Some(advice) = render::keyword_advice(&orchestrator.view()) {
            println!("{advice}");
        }

        // Fail locally before logging in.
        let gate = orchestrator.limiter().can_run_pipeline();
        if !gate.can_run {
            let mut message =
                render::gate(&gate, &orchestrator.limiter().format_remaining_time());
            if orchestrator.limiter().state().is_running {
                self.login().await?;
                let remote_active = self.client.is_run_active().await?;
                if let Some(hint) = render::stale_run_hint(true, remote_active) {
                    message.push('\n');
                    message.push_str(hint);
                }
            }
            bail!(message);
        }
        KeywordSet::parse(keywords).validate()?;
        self.login().await?;

        let receipt = orchestrator.trigger_run(keywords).await?;
        if receipt.already_running {
            println!("A run is already in progress; following it.");
        }
        if let Some(message) = receipt.message.as_deref() {
            roundup_info!("Backend: {}", message);
        }

        loop {
            let event = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    orchestrator.reset().await;
                    println!("Stopped following the run. {STALE_RUN_HINT}");
                    return Ok(());
                }
                event = events.recv() => event,
            };
            let Some(event) = event else {
                bail!("run tracking ended unexpectedly");
            };
            match event {
                RunEvent::StateChanged(state) => println!("{}", render::progress(state)),
                RunEvent::Succeeded { artifact } => {
                    println!("{}", render::artifact(artifact.as_ref()));
                    if let Some(dir) = download {
                        self.download(dir).await?;
                    }
                    return Ok(());
                }
                RunEvent::Failed { message } => bail!(message),
                RunEvent::SessionExpired => {
                    bail!("Session expired while following the run. {STALE_RUN_HINT}")
                }
            }
        }
    }

    async fn status(&self) -> Result<()> {
        let limiter = self.limiter();
        let gate = limiter.can_run_pipeline();
        println!("{}", render::gate(&gate, &limiter.format_remaining_time()));

        self.login().await?;
        let report = self.client.run_status().await?;
        println!("{}", render::remote_status(&report));
        let locally_running = limiter.state().is_running;
        if let Some(hint) = render::stale_run_hint(locally_running, report.is_run_active()) {
            println!("{hint}");
        }
        Ok(())
    }

    async fn download(&self, dir: &Path) -> Result<()> {
        match self.client.download_latest_artifact().await? {
            Some(artifact) => {
                let path = artifact
                    .save(dir)
                    .with_context(|| format!("could not save artifact into {}", dir.display()))?;
                println!("Saved {}", path.display());
            }
            None => println!("{}", render::artifact(None)),
        }
        Ok(())
    }
}
