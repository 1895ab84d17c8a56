//! The persistent WebSocket connection to the controller's topology feed.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::RwLock;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};
use url::Url;

use crate::error::DaemonError;
use crate::DaemonState;

/// Connect once and serve frames until the peer closes or the socket fails.
///
/// Each text frame is one call. A frame that does not decode is logged and
/// dropped without a reply; the loop carries on with the next one.
pub async fn run(url: Url, state: Arc<RwLock<DaemonState>>) -> Result<(), DaemonError> {
    let (ws, _) = connect_async(url.as_str()).await?;
    info!("Connected to topology feed at {}", url);
    let (mut sink, mut stream) = ws.split();

    while let Some(msg) = stream.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(frame) => {
                info!("Topology feed closed by peer: {:?}", frame);
                break;
            }
            other => {
                debug!("ignoring non-text frame ({} bytes)", other.len());
                continue;
            }
        };

        let reply = {
            let mut s = state.write().await;
            s.viewer.handle_frame(text.as_str())
        };
        match reply {
            Ok(reply) => {
                let json = serde_json::to_string(&reply)?;
                sink.send(Message::Text(json.into())).await?;
            }
            Err(e) => error!("Dropping frame: {}", e),
        }
    }

    Ok(())
}
