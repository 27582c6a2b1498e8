mod app;
mod cli;
mod config;
mod diagram;
mod health;
mod input;
mod k8s;
mod model;
mod pane;
mod sched;
mod select;
mod ui;

use anyhow::{Context, Result};
use app::{App, EngineCommand};
use clap::Parser;
use cli::CliArgs;
use config::RuntimeConfig;
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind,
};
use crossterm::execute;
use crossterm::style::Print;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use input::InputContext;
use k8s::KubeGateway;
use model::PaneId;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use sched::{FetchPayload, FetchRequest, FetchSpec, Scheduler};
use std::io::{self, Stdout};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::info;
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let config = RuntimeConfig::load()?;
    let mut gateway = KubeGateway::new().await?;

    let mut app = App::new(gateway.context().to_string());
    app.set_openshift(gateway.openshift());
    app.set_page_size(args.page_size.unwrap_or(config.page_size));
    let namespace = args
        .namespace
        .clone()
        .unwrap_or_else(|| gateway.default_namespace().to_string());
    app.set_initial_namespace(Some(namespace));
    app.set_status(format!("Connected to context '{}'", gateway.context()));

    let refresh_secs = args.refresh_secs.unwrap_or(config.refresh_secs).max(1);
    let feedback_command = config.feedback_command.clone();

    run(&mut app, &mut gateway, refresh_secs, feedback_command).await
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    // The TUI owns the terminal; log output goes nowhere by default.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::sink)
        .try_init();

    Ok(())
}

async fn run(
    app: &mut App,
    gateway: &mut KubeGateway,
    refresh_secs: u64,
    feedback_command: Option<String>,
) -> Result<()> {
    let mut terminal = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, gateway, refresh_secs, feedback_command).await;
    let restore_result = restore_terminal(&mut terminal);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )
    .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    gateway: &mut KubeGateway,
    refresh_secs: u64,
    feedback_command: Option<String>,
) -> Result<()> {
    let mut scheduler = Scheduler::new();
    let mut reader = EventStream::new();
    let mut ticker = interval(Duration::from_secs(refresh_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        let context = InputContext::for_view(app.view());
                        if let Some(action) = input::map_key(context, key) {
                            let command = app.apply_action(action);
                            execute_engine_command(
                                gateway,
                                &mut scheduler,
                                feedback_command.as_deref(),
                                command,
                            );
                        }
                    }
                    Some(Ok(Event::Mouse(mouse))) => {
                        if let Some(action) = input::map_mouse(mouse) {
                            let command = app.apply_action(action);
                            execute_engine_command(
                                gateway,
                                &mut scheduler,
                                feedback_command.as_deref(),
                                command,
                            );
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => {}
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                let command = app.tick();
                execute_engine_command(
                    gateway,
                    &mut scheduler,
                    feedback_command.as_deref(),
                    command,
                );
            }
            maybe_outcome = scheduler.next() => {
                let Some(mut outcome) = maybe_outcome else {
                    continue;
                };
                if !scheduler.accept(&outcome) {
                    continue;
                }

                // A context switch rebuilds the client; that has to
                // happen here where the gateway lives, before the
                // state machine folds the result in.
                let switched_context = match &outcome.result {
                    Ok(FetchPayload::ContextSwitched(name)) => Some(name.clone()),
                    _ => None,
                };
                if let Some(name) = switched_context {
                    match gateway.switch_context(&name).await {
                        Ok(()) => app.set_openshift(gateway.openshift()),
                        Err(error) => outcome.result = Err(error),
                    }
                }

                let follow_up = app.apply_fetch(outcome);
                execute_engine_command(
                    gateway,
                    &mut scheduler,
                    feedback_command.as_deref(),
                    follow_up,
                );
            }
        }
    }

    Ok(())
}

fn execute_engine_command(
    gateway: &KubeGateway,
    scheduler: &mut Scheduler,
    feedback_command: Option<&str>,
    command: EngineCommand,
) {
    match command {
        EngineCommand::None => {}
        EngineCommand::Copy(text) => {
            // OSC 52 reaches the outer terminal even over SSH.
            let _ = execute!(io::stdout(), Print(select::osc52_sequence(&text)));
        }
        EngineCommand::Fetch(request) => {
            dispatch_fetch(gateway, scheduler, feedback_command, request);
        }
    }
}

/// Builds the provider future for a fetch request and hands it to the
/// scheduler. This is the only place gateway calls are constructed.
fn dispatch_fetch(
    gateway: &KubeGateway,
    scheduler: &mut Scheduler,
    feedback_command: Option<&str>,
    request: FetchRequest,
) {
    let gateway = gateway.clone();
    match request.spec.clone() {
        FetchSpec::List {
            scope,
            namespace,
            kind,
        } => {
            scheduler.dispatch(request, async move {
                let records = gateway
                    .list_resources(scope, namespace.as_deref(), kind)
                    .await?;
                Ok(FetchPayload::Records(records))
            });
        }
        FetchSpec::PaneText {
            pane,
            kind,
            namespace,
            name,
        } => {
            scheduler.dispatch(request, async move {
                let namespace = namespace.as_deref();
                let text = match pane {
                    PaneId::Describe => gateway.describe(kind, namespace, &name).await?,
                    PaneId::Yaml => gateway.fetch_yaml(kind, namespace, &name).await?,
                    PaneId::Tags => gateway.fetch_tags(kind, namespace, &name).await?,
                    PaneId::Logs => gateway.fetch_logs(namespace, &name).await?,
                    PaneId::Events => gateway.fetch_events(namespace, &name).await?,
                    PaneId::Memory => gateway.fetch_memory(namespace, &name).await?,
                    PaneId::Diagram => {
                        let source = gateway
                            .fetch_diagram_source(kind, namespace, &name)
                            .await?;
                        diagram::render(&diagram::parse_manifest(&source))
                    }
                    PaneId::Resources => {
                        anyhow::bail!("the resource table is loaded as a list, not pane text")
                    }
                };
                Ok(FetchPayload::PaneText { pane, text })
            });
        }
        FetchSpec::Namespaces => {
            scheduler.dispatch(request, async move {
                let names = gateway.list_namespaces().await?;
                Ok(FetchPayload::Namespaces(names))
            });
        }
        FetchSpec::Contexts => {
            scheduler.dispatch(request, async move {
                let (names, current) = gateway.list_contexts().await?;
                Ok(FetchPayload::Contexts { names, current })
            });
        }
        FetchSpec::SwitchContext { name } => {
            scheduler.dispatch(request, async move {
                gateway.validate_context(&name).await?;
                Ok(FetchPayload::ContextSwitched(name))
            });
        }
        FetchSpec::SwitchNamespace { name } => {
            scheduler.dispatch(request, async move {
                gateway.switch_namespace(&name).await?;
                Ok(FetchPayload::NamespaceSwitched(name))
            });
        }
        FetchSpec::SubmitFeedback { body } => {
            let command = feedback_command.map(str::to_string);
            scheduler.dispatch(request, async move { submit_feedback(command, body).await });
        }
    }
}

/// Delivery is delegated to whatever sink the config names; without
/// one the message only lands in the trace log.
async fn submit_feedback(command: Option<String>, body: String) -> Result<FetchPayload> {
    let payload = serde_json::json!({
        "tool": "manta",
        "version": env!("CARGO_PKG_VERSION"),
        "message": body,
    })
    .to_string();

    match command {
        Some(command) => {
            let mut child = TokioCommand::new("sh")
                .arg("-c")
                .arg(&command)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .context("failed to spawn feedback command")?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(payload.as_bytes())
                    .await
                    .context("failed to write feedback payload")?;
            }
            let status = child
                .wait()
                .await
                .context("failed to wait for feedback command")?;
            if !status.success() {
                anyhow::bail!("feedback command exited with {status}");
            }
        }
        None => info!("feedback recorded: {body}"),
    }

    Ok(FetchPayload::FeedbackSent)
}
