//! Line-oriented driver: camera frames and push messages in, mirror events out.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::{broadcast::error::RecvError, mpsc},
    time::{self, Duration},
};
use tokio_util::sync::CancellationToken;

use crate::{gesture::FrameReport, push::push_feed_loop, session::MirrorController};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const PUSH_QUEUE: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ReplayLine {
    Frame(FrameReport),
    Push(Value),
    /// Pause between frames, in milliseconds, so dwell timers can elapse.
    Wait(u64),
}

/// Feed every input line to `controller` and write each emitted event to
/// `output` as one JSON line. Returns `output` once the controller is shut
/// down and every event has been written.
pub async fn replay<R, W>(controller: MirrorController, input: R, output: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let printer = tokio::spawn(print_events(controller.subscribe(), output));

    let (push_tx, push_rx) = mpsc::channel(PUSH_QUEUE);
    let feed = tokio::spawn(push_feed_loop(
        controller.clone(),
        push_rx,
        CancellationToken::new(),
    ));

    controller.start().await;

    let mut lines = input.lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("failed to read replay input")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ReplayLine>(&line) {
            Ok(ReplayLine::Frame(report)) => controller.on_frame(&report).await,
            Ok(ReplayLine::Push(message)) => {
                if push_tx.send(message.to_string()).await.is_err() {
                    log_error!("push feed stopped; dropping line {}", line_no);
                }
            }
            Ok(ReplayLine::Wait(ms)) => time::sleep(Duration::from_millis(ms)).await,
            Err(err) => log_warn!("skipping replay line {}: {err}", line_no),
        }
    }
    log_info!("replay input exhausted after {} lines", line_no);

    drop(push_tx);
    feed.await.context("push feed task failed")?;
    controller.shutdown().await;
    drop(controller);

    printer.await.context("event printer task failed")?
}

async fn print_events<W>(
    mut events: tokio::sync::broadcast::Receiver<crate::state::MirrorEvent>,
    mut output: W,
) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    loop {
        match events.recv().await {
            Ok(event) => {
                let mut line = serde_json::to_vec(&event).context("failed to encode event")?;
                line.push(b'\n');
                output.write_all(&line).await.context("failed to write event")?;
            }
            Err(RecvError::Lagged(skipped)) => {
                log_warn!("event printer fell behind, {} events skipped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
    output.flush().await.context("failed to flush events")?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::RecordingCuePlayer, config::InteractionConfig, db::temp_database,
        gesture::landmarks::make_hand,
    };
    use std::sync::Arc;

    fn frame_line(x: f32, y: f32, pinch: f32) -> String {
        let report = FrameReport::with_hand(make_hand(1.0 - x / 100.0, y / 100.0, pinch));
        format!(
            "{{\"frame\":{}}}",
            serde_json::to_string(&report).unwrap()
        )
    }

    #[tokio::test]
    async fn test_replay_prints_events_as_json_lines() {
        let controller = MirrorController::new(
            InteractionConfig::default(),
            temp_database(),
            Arc::new(RecordingCuePlayer::default()),
        )
        .await
        .unwrap();

        let input = [
            frame_line(20.0, 20.0, 0.01),
            frame_line(30.0, 30.0, 0.01),
            "garbage".to_string(),
            frame_line(30.0, 30.0, 0.2),
            r#"{"push":{"event":"new-notification","payload":{"message":"hi"}}}"#.to_string(),
        ]
        .join("\n");

        let output = replay(controller, input.as_bytes(), Vec::new()).await.unwrap();
        let text = String::from_utf8(output).unwrap();
        let kinds: Vec<String> = text
            .lines()
            .map(|line| {
                let value: Value = serde_json::from_str(line).unwrap();
                value["type"].as_str().unwrap().to_string()
            })
            .collect();

        assert_eq!(kinds[0], "grabStarted");
        assert!(kinds.contains(&"widgetSettled".to_string()));
        assert!(kinds.contains(&"widgetUpdated".to_string()));
        assert!(kinds.contains(&"cue".to_string()));
    }
}
