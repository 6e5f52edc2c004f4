mod cli;
mod ui;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, Input};
use etapa::backend::{Backend, HttpBackend};
use etapa::buffer::{FileResponseBuffer, ResponseStore};
use etapa::config::EtapaConfig;
use etapa::connectivity::ConnectivityMonitor;
use etapa::session::{Proceeded, SessionController, flush_buffered};
use etapa::stage::{StageRef, StageResolver, StageSequencer};
use etapa::timebox::{Countdown, TimeBox};
use ui::{SessionView, Spinner};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = EtapaConfig::load().context("failed to load etapa.toml")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(dir) = cli.buffer_dir {
        config.buffer_dir = dir;
    }
    let config = config.validated()?;

    match cli.command {
        Command::Start { candidate, stage } => run_session(&config, &candidate, &stage, cli.offline).await,
        Command::Status { candidate, stage } => show_status(&config, &candidate, &stage).await,
        Command::Pending { candidate, flush } => show_pending(&config, &candidate, flush).await,
    }
}

/// Logs go to stderr so they never interleave with the session prompt.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug,hyper=warn,reqwest=warn"
    } else {
        "info,hyper=warn,reqwest=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn backend(config: &EtapaConfig) -> Result<HttpBackend> {
    HttpBackend::new(
        &config.api_base_url,
        config.connect_timeout(),
        config.request_timeout(),
    )
    .context("failed to build backend client")
}

async fn run_session(config: &EtapaConfig, candidate: &str, stage: &str, offline: bool) -> Result<()> {
    let backend = backend(config)?;
    let store = FileResponseBuffer::open(&config.buffer_dir)?;
    let monitor = ConnectivityMonitor::new(!offline);
    let view = SessionView::default();

    let spinner = Spinner::start("Carregando sessão…");
    let loaded = async {
        let session = backend.fetch_session(candidate).await?;
        let ctx = session.context();
        let controller =
            SessionController::enter(backend, store, ctx, monitor.subscribe(), &StageRef::parse(stage))
                .await?;
        anyhow::Ok((session, controller))
    }
    .await;
    spinner.finish();
    let (session, mut controller) = loaded?;

    // Tied to this scope: dropping the handle stops the ticking task.
    let countdown: Option<Countdown> = session.time_limit_seconds().map(|limit| {
        TimeBox::resume(limit, session.started_at(), Utc::now()).spawn(config.tick_interval())
    });
    let mut expiry = countdown
        .as_ref()
        .filter(|c| !c.is_expired())
        .map(Countdown::subscribe);

    view.warnings(&controller.take_warnings());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        view.stage(
            controller.current_stage(),
            controller.navigation(),
            countdown.as_ref().map(Countdown::remaining),
        );
        view.questions(controller.questions(), controller.answers());
        view.prompt(controller.unanswered());

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = wait_expired(&mut expiry) => {
                view.expired();
                expiry = None;
                continue;
            }
        };
        let Some(line) = line else {
            view.saved_locally();
            break;
        };

        match Input::parse(&line) {
            Input::Answer { question, option } => {
                let ids = controller.questions().get(question - 1).and_then(|q| {
                    q.options
                        .get(option - 1)
                        .map(|o| (q.id.clone(), o.id.clone()))
                });
                match ids {
                    Some((question_id, option_id)) => {
                        if let Err(e) = controller.select_answer(&question_id, &option_id) {
                            view.error(&e);
                        }
                    }
                    None => view.invalid_input(&line),
                }
            }
            Input::Proceed => {
                let spinner = Spinner::start("Enviando respostas…");
                let result = controller.proceed().await;
                spinner.finish();
                view.warnings(&controller.take_warnings());
                match result {
                    Ok(Proceeded::Completed) => {
                        view.completed();
                        break;
                    }
                    Ok(Proceeded::Advanced(nav)) => debug!(position = nav.position(), "advanced"),
                    Err(e) => view.error(&e),
                }
            }
            Input::Network(online) => {
                if let Some(edge) = monitor.set_online(online) {
                    view.connectivity(edge);
                }
            }
            Input::Help => view.help(),
            Input::Quit => {
                view.saved_locally();
                break;
            }
            Input::Unknown(line) => view.invalid_input(&line),
        }
    }

    drop(countdown);
    Ok(())
}

/// Resolves once the countdown reaches zero; never resolves without one.
async fn wait_expired(expiry: &mut Option<watch::Receiver<u64>>) {
    if let Some(rx) = expiry
        && rx.wait_for(|remaining| *remaining == 0).await.is_ok()
    {
        return;
    }
    std::future::pending::<()>().await
}

async fn show_status(config: &EtapaConfig, candidate: &str, stage: &str) -> Result<()> {
    let backend = backend(config)?;
    let spinner = Spinner::start("Consultando etapas…");
    let session = backend.fetch_session(candidate).await;
    let result = match session {
        Ok(session) => {
            let ctx = session.context();
            let resolution = StageResolver::resolve(&backend, &StageRef::parse(stage), &ctx).await;
            StageSequencer::navigation(&backend, &resolution.stage, &ctx)
                .await
                .map(|nav| (resolution.stage, nav))
                .map_err(anyhow::Error::from)
        }
        Err(e) => Err(e.into()),
    };
    spinner.finish();
    let (stage, nav) = result?;
    SessionView::default().navigation(&stage, &nav);
    Ok(())
}

async fn show_pending(config: &EtapaConfig, candidate: &str, flush: bool) -> Result<()> {
    let store = FileResponseBuffer::open(&config.buffer_dir)?;
    let view = SessionView::default();
    let pending = store.pending_stages(candidate)?;
    view.pending(&pending);
    if !flush || pending.is_empty() {
        return Ok(());
    }

    let backend = backend(config)?;
    let spinner = Spinner::start("Reenviando respostas…");
    let report = flush_buffered(&backend, &store, candidate, None).await;
    spinner.finish();
    view.flush_report(&report?);
    Ok(())
}
