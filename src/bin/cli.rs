//! CLI binary for deferred-notify.

use clap::{Args, Parser, Subcommand};
use deferred_notify::codec;
use deferred_notify::notify_dirs;
use deferred_notify::render::{ChannelRenderer, LogRenderer, Notification, NotificationRenderer};
use deferred_notify::scheduler::{IdentifierStore, JsonFileStore};
use deferred_notify::{NotifyConfig, NotifyService, ResumeKind, TriggerBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

/// Deferred local notifications with cooldown.
#[derive(Parser)]
#[command(name = "deferred-notify", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Schedule one notification and wait for it to be delivered.
    Trigger(TriggerArgs),

    /// List recorded work identifiers.
    Pending,

    /// Deliver queued work and accept commands on stdin.
    Serve,
}

#[derive(Args)]
struct TriggerArgs {
    /// Destination opened when the notification is tapped.
    #[arg(long)]
    target: String,

    /// `activity` or `fragment`.
    #[arg(long, default_value = "activity")]
    kind: ResumeKind,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    thumbnail: Option<String>,

    /// Delay in seconds; the configured default when omitted.
    #[arg(long, allow_negative_numbers = true)]
    delay: Option<i64>,

    /// JSON object or array, or any other text carried as a string.
    #[arg(long)]
    payload: Option<String>,

    /// Exit after scheduling; the next `serve` delivers it.
    #[arg(long)]
    no_wait: bool,
}

impl TriggerArgs {
    fn into_request(self) -> deferred_notify::Result<TriggerBuilder> {
        let mut request = TriggerBuilder::new()
            .resume_target(self.target)
            .resume_kind(self.kind);
        if let Some(title) = self.title {
            request = request.title(title);
        }
        if let Some(description) = self.description {
            request = request.description(description);
        }
        if let Some(thumbnail) = self.thumbnail {
            request = request.thumbnail(thumbnail);
        }
        if let Some(delay) = self.delay {
            request = request.delay_secs(delay);
        }
        if let Some(payload) = self.payload {
            request = match codec::decode_value(&payload) {
                Ok(value) => request.payload_object(&value)?,
                Err(_) => request.payload_object(&payload)?,
            };
        }
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => NotifyConfig::from_file(path)?,
        None => NotifyConfig::load_or_default(&NotifyConfig::default_config_path())?,
    };
    let _log_guard = deferred_notify::logging::init(&config.logging)?;

    match cli.command {
        Command::Trigger(args) => {
            let no_wait = args.no_wait;
            run_trigger(config, args.into_request()?, no_wait).await
        }
        Command::Pending => list_pending(&config),
        Command::Serve => run_serve(config).await,
    }
}

async fn run_trigger(
    config: NotifyConfig,
    request: TriggerBuilder,
    no_wait: bool,
) -> anyhow::Result<()> {
    let (renderer, mut delivered) = ChannelRenderer::channel();
    let service = NotifyService::open(&config, Arc::new(renderer))?;

    let descriptor = request.build_with(service.defaults())?;
    let work_id = service.submit(&descriptor)?;
    println!("scheduled {work_id}");
    if no_wait {
        service.shutdown();
        return Ok(());
    }

    let wait = Duration::from_secs(descriptor.delay_secs().saturating_add(5));
    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            received = delivered.recv() => {
                let Some(notification) = received else { break };
                show(&notification);
                if notification.work_id == work_id {
                    break;
                }
            }
            () = &mut deadline => {
                warn!("work {work_id} was not delivered within {}s", wait.as_secs());
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, leaving {work_id} queued");
                break;
            }
        }
    }

    service.shutdown();
    Ok(())
}

fn list_pending(config: &NotifyConfig) -> anyhow::Result<()> {
    let state_dir = config.scheduler.resolved_state_dir();
    let store = JsonFileStore::new(notify_dirs::work_ids_file(&state_dir));
    let recorded = store.all()?;

    if recorded.is_empty() {
        println!("no recorded work in {}", state_dir.display());
        return Ok(());
    }
    for work in recorded {
        println!("{}  recorded {}", work.work_id, work.recorded_at.to_rfc3339());
    }
    Ok(())
}

async fn run_serve(config: NotifyConfig) -> anyhow::Result<()> {
    let (renderer, delivered) = ChannelRenderer::channel();
    let service = NotifyService::open(&config, Arc::new(renderer))?;
    let printer = tokio::spawn(print_deliveries(delivered));

    println!("deferred-notify v{}", env!("CARGO_PKG_VERSION"));
    println!("commands: trigger <title> [delay] | latest | all | pending | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&service, line.trim()) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    service.shutdown();
    printer.abort();
    Ok(())
}

/// Run one stdin command. Returns `false` to stop serving.
fn handle_command(service: &NotifyService, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return true;
    };

    let outcome = match command {
        "trigger" => {
            let title = words.next().unwrap_or("Reminder").to_owned();
            let mut request = TriggerBuilder::new()
                .resume_target("deferred-notify.cli")
                .resume_kind(ResumeKind::Activity)
                .title(title);
            if let Some(delay) = words.next() {
                match delay.parse::<i64>() {
                    Ok(delay) => request = request.delay_secs(delay),
                    Err(e) => {
                        println!("invalid delay {delay:?}: {e}");
                        return true;
                    }
                }
            }
            service
                .trigger(request)
                .map(|work_id| println!("scheduled {work_id}"))
        }
        "latest" => service.cool_down_latest().map(|removed| match removed {
            Some(work_id) => println!("cooled down {work_id}"),
            None => println!("nothing to cool down"),
        }),
        "all" => service
            .cool_down_all()
            .map(|cleared| println!("cooled down {cleared} recorded")),
        "pending" => service.recorded_work().map(|recorded| {
            for work in recorded {
                let state = service
                    .state(&work.work_id)
                    .map_or_else(|| "unknown".to_owned(), |s| format!("{s:?}"));
                println!("{}  {state}", work.work_id);
            }
        }),
        "quit" | "exit" => return false,
        other => {
            println!("unknown command {other:?}");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        println!("error: {e}");
    }
    true
}

async fn print_deliveries(mut delivered: UnboundedReceiver<Notification>) {
    while let Some(notification) = delivered.recv().await {
        show(&notification);
    }
}

fn show(notification: &Notification) {
    if let Err(e) = LogRenderer.show(notification) {
        warn!("cannot log notification: {e}");
    }
    println!(
        "[{}] {} | {}",
        notification.work_id,
        notification.title.as_deref().unwrap_or(""),
        notification.description.as_deref().unwrap_or("")
    );
    if let Some(payload) = &notification.tap.payload {
        println!("  payload: {payload}");
    }
}
