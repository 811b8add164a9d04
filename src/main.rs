use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ringapp_core::audio::{AudioDevice, RecordingArtifact, SilentAudioDevice};
use ringapp_core::config::CallConfig;
use ringapp_core::dialogue::HttpDialogueClient;
use ringapp_core::session::{
    CallController, CallDestination, CallEvent, CallReaction, LoggingNavigator, Speaker,
};
use ringapp_core::telemetry::init_tracing;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "commands: answer | decline | record | stop | send <path> | hangup | status | transcript | quit";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = CallConfig::from_env().context("invalid configuration")?;
    let service = Arc::new(
        HttpDialogueClient::from_config(&config).context("failed to build dialogue client")?,
    );
    let device = build_device(&config);
    let controller =
        CallController::open(config, None, device, service, Arc::new(LoggingNavigator)).await;

    spawn_printers(&controller);

    let scenario = controller.scenario();
    println!("📞 Incoming call: {}", scenario.title);
    println!("   {}", scenario.context);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            destination = controller.wait_for_outcome() => {
                print_destination(&destination);
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let line = line.trim().to_string();
                if matches!(line.as_str(), "quit" | "exit") {
                    break;
                }
                // 播放 AI 语音期间也要能继续读取输入（例如挂断）
                let controller = controller.clone();
                tokio::spawn(async move { handle_command(&controller, &line).await });
            }
        }
    }

    controller.teardown().await;
    Ok(())
}

fn build_device(config: &CallConfig) -> Arc<dyn AudioDevice> {
    #[cfg(feature = "device-audio")]
    {
        match ringapp_core::audio::RodioAudioDevice::new(config) {
            Ok(device) => return Arc::new(device),
            Err(err) => {
                tracing::warn!(%err, "audio device unavailable; falling back to silent output")
            }
        }
    }
    #[cfg(not(feature = "device-audio"))]
    let _ = config;

    Arc::new(SilentAudioDevice::new())
}

fn spawn_printers(controller: &CallController) {
    let mut lifecycle = controller.subscribe_lifecycle();
    tokio::spawn(async move {
        loop {
            match lifecycle.recv().await {
                Ok(update) => println!("· {}", update.phase.as_str()),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut notices = controller.subscribe_notices();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => println!("! [{:?}] {}", notice.level, notice.message),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// 处理一行输入。
async fn handle_command(controller: &CallController, line: &str) {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    let event = match command {
        "" => return,
        "answer" => CallEvent::Answer,
        "decline" => CallEvent::Decline,
        "record" => CallEvent::StartRecording,
        "stop" => CallEvent::StopRecording,
        "send" if !argument.is_empty() => {
            CallEvent::SubmitTurn(RecordingArtifact::new(PathBuf::from(argument)))
        }
        "hangup" => CallEvent::HangUp,
        "status" => {
            let snapshot = controller.snapshot();
            println!(
                "{:?} | turns {}/{} | {}s | listening={} speaking={} recording={}",
                snapshot.phase,
                snapshot.turn_count,
                snapshot.max_turns,
                snapshot.duration_secs(),
                snapshot.is_listening,
                snapshot.is_ai_speaking,
                snapshot.is_recording,
            );
            return;
        }
        "transcript" => {
            for message in controller.transcript().messages() {
                let speaker = match message.speaker {
                    Speaker::Ai => "AI ",
                    Speaker::User => "You",
                };
                println!("{speaker}: {}", message.text);
            }
            return;
        }
        _ => {
            println!("{HELP}");
            return;
        }
    };

    match controller.dispatch(event).await {
        Ok(CallReaction::Ignored) => println!("(ignored in current phase)"),
        Ok(CallReaction::Turn(outcome)) => println!("turn: {outcome:?}"),
        Ok(_) => {}
        Err(err) => println!("error: {err}"),
    }
}

fn print_destination(destination: &CallDestination) {
    match destination {
        CallDestination::Feedback {
            report,
            scenario,
            duration,
        } => {
            println!("✅ Call finished: {scenario} ({}s)", duration.as_secs());
            println!(
                "   score {}% · {} · participation {}% · {} exchanges",
                report.score_or_zero(),
                report.grade().label(),
                report.participation_percent(),
                report.exchange_count(),
            );
            for correction in &report.grammar_errors {
                println!("   ✗ {} → {}", correction.error, correction.correction);
            }
            if !report.encouragement.is_empty() {
                println!("   {}", report.encouragement);
            }
        }
        CallDestination::Home { reason } => println!("🏠 Call over ({reason})"),
    }
}
