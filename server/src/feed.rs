//! Websocket trade feed.
//!
//! Each client connection gets its own task. Frames are decoded and routed
//! inline, so a full processor queue stalls reads on that socket instead of
//! buffering without bound.

use std::net::SocketAddr;
use std::sync::Arc;

use dispatch::{RouteOutcome, Router};
use futures::{SinkExt, StreamExt};
use market::wire::decode_trade_update;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub frames: u64,
    pub routed: u64,
    pub rejected: u64,
}

/// Accepts feed connections until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    router: Arc<Router>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(component = "feed", addr = %listener.local_addr()?, "trade feed listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(component = "feed", "trade feed stopped");
                return Ok(());
            }

            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(component = "feed", error = %e, "accept failed");
                        continue;
                    }
                };

                let router = router.clone();
                let cancel = shutdown.child_token();
                let span = info_span!("feed_conn", %peer);
                tokio::spawn(
                    async move {
                        match handle_connection(stream, peer, router, cancel).await {
                            Ok(stats) => info!(
                                frames = stats.frames,
                                routed = stats.routed,
                                rejected = stats.rejected,
                                "feed connection closed"
                            ),
                            Err(e) => warn!(error = ?e, "feed connection failed"),
                        }
                    }
                    .instrument(span),
                );
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    cancel: CancellationToken,
) -> anyhow::Result<ConnectionStats> {
    let ws = accept_async(stream).await?;
    info!(%peer, "feed connection opened");

    let (mut write, mut read) = ws.split();
    let mut stats = ConnectionStats::default();

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = read.next() => msg,
        };

        let Some(msg) = msg else { break };

        match msg? {
            Message::Text(text) => ingest(&router, text.as_str().as_bytes(), &mut stats).await,
            Message::Binary(bytes) => ingest(&router, &bytes, &mut stats).await,
            Message::Ping(payload) => write.send(Message::Pong(payload)).await?,
            Message::Close(_) => break,
            Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    Ok(stats)
}

async fn ingest(router: &Router, frame: &[u8], stats: &mut ConnectionStats) {
    stats.frames += 1;

    let batch = match decode_trade_update(frame) {
        Ok(batch) => batch,
        Err(e) => {
            stats.rejected += 1;
            warn!(component = "feed", event = "decode_error", error = %e, "frame skipped");
            return;
        }
    };

    debug!(market = %batch.market, trades = batch.len(), "frame decoded");

    if router.route(batch).await == RouteOutcome::Delivered {
        stats.routed += 1;
    }
}
