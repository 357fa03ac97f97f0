use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::session::MirrorController;

use super::PushEvent;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Drain raw relay messages into the controller until the sender goes away
/// or the token is cancelled. Bad messages are logged and skipped.
pub async fn push_feed_loop(
    controller: MirrorController,
    mut rx: mpsc::Receiver<String>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(text) = message else {
                    log_info!("push feed closed");
                    break;
                };
                match PushEvent::parse(&text) {
                    Ok(event) => {
                        log_debug!("push event for {:?}", event.widget_kind());
                        controller.apply_push(event).await;
                    }
                    Err(err) => log_warn!("dropping push message: {err:#}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("push feed shutting down");
                break;
            }
        }
    }
}
