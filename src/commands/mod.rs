//! Terminal front end
//!
//! One command per line on stdin drives the pipeline; notices are printed
//! as they arrive. An empty line presses the primary control.

use crate::capture::FfmpegCaptureDevice;
use crate::config::PipelineConfig;
use crate::pipeline::{DirectoryDownloads, PipelineController, PipelineEvent, PipelineNotice};
use crate::transcode::FfmpegEngine;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

/// Every command the terminal accepts
pub const COMMAND_HELP: &str = "press, acquire, stop, download, restart, discard, quit";

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Event(PipelineEvent),
    Quit,
}

pub fn parse_command(line: &str) -> Option<Command> {
    let event = match line.trim().to_lowercase().as_str() {
        "" | "press" => PipelineEvent::Press,
        "acquire" => PipelineEvent::Acquire,
        "start" => PipelineEvent::Start,
        "stop" => PipelineEvent::Stop,
        "download" => PipelineEvent::Download,
        "restart" => PipelineEvent::Restart,
        "discard" => PipelineEvent::Discard,
        "quit" | "q" | "exit" => return Some(Command::Quit),
        _ => return None,
    };
    Some(Command::Event(event))
}

pub fn render_notice(notice: &PipelineNotice) -> String {
    match notice {
        PipelineNotice::StateChanged { to, control, .. } => {
            let hint = if control.enabled { "press Enter" } else { "disabled" };
            format!("[{}] {} ({})", to.name(), control.label, hint)
        }
        PipelineNotice::Error { error } => format!("error {}: {}", error.code, error.message),
    }
}

/// Run the pipeline against the local camera until stdin closes or `quit`
pub async fn run_terminal(config: PipelineConfig) -> anyhow::Result<()> {
    let device = FfmpegCaptureDevice::new(&config.ffmpeg_path, config.device.clone());
    let engine = FfmpegEngine::new(&config.ffmpeg_path);
    let downloads = DirectoryDownloads::new(&config.downloads.dir);

    let mut controller = PipelineController::new(
        config,
        Box::new(device),
        Box::new(engine),
        Box::new(downloads),
    );

    let printer = tokio::spawn(print_notices(controller.subscribe()));

    let (tx, rx) = mpsc::channel(32);
    tx.send(PipelineEvent::Acquire).await?;
    let reader = tokio::spawn(read_commands(tx));

    controller.run_loop(rx).await;
    controller.shutdown().await;

    reader.abort();
    drop(controller);
    let _ = printer.await;
    Ok(())
}

async fn print_notices(mut notices: broadcast::Receiver<PipelineNotice>) {
    loop {
        match notices.recv().await {
            Ok(notice) => println!("{}", render_notice(&notice)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!("Missed {} notice(s)", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn read_commands(tx: mpsc::Sender<PipelineEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Some(Command::Event(event)) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Some(Command::Quit) => break,
                None => eprintln!("unknown command '{}' ({})", line.trim(), COMMAND_HELP),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}
