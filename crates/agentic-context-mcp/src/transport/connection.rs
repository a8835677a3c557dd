//! Per-connection driver shared by every stream transport.
//!
//! Frames are read in order. `initialize`, `shutdown`, and anything that
//! arrives before the session is READY run inline, so they linearize with
//! respect to later frames. Everything else is dispatched concurrently and
//! answered through a single writer task, in completion order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::protocol::{codec, ProtocolHandler};
use crate::session::Session;
use crate::types::{JsonRpcRequest, McpError, McpResult, Response};

use super::{MessageReader, MessageWriter, Transport};

/// Outbound frames buffered ahead of the writer.
const RESPONSE_QUEUE: usize = 256;

/// Drive one connection until end of stream, `shutdown`, or a transport fault.
pub async fn serve_connection<T: Transport>(handler: ProtocolHandler, transport: T) -> McpResult<()> {
    let (mut reader, writer) = transport.split();
    let session = handler.new_session();

    let (tx, rx) = mpsc::channel::<Vec<u8>>(RESPONSE_QUEUE);
    let writer_task = tokio::spawn(write_loop(writer, rx));
    let mut in_flight: JoinSet<()> = JoinSet::new();

    let outcome: McpResult<()> = loop {
        tokio::select! {
            frame = reader.receive() => match frame {
                Ok(Some(bytes)) => {
                    let request = match codec::decode(&bytes) {
                        Ok(request) => request,
                        Err(e) => {
                            tracing::warn!("Session {}: {e}", session.id());
                            if tx.send(codec::encode(&Response::from_decode_error(&e))).await.is_err() {
                                break Err(McpError::Transport("writer closed".to_string()));
                            }
                            continue;
                        }
                    };

                    if runs_inline(&session, &request) {
                        let response = handler.dispatch(&session, request).await;
                        if tx.send(codec::encode(&response)).await.is_err() {
                            break Err(McpError::Transport("writer closed".to_string()));
                        }
                        if session.is_closed() {
                            in_flight.abort_all();
                            break Ok(());
                        }
                    } else {
                        let handler = handler.clone();
                        let session = Arc::clone(&session);
                        let tx = tx.clone();
                        in_flight.spawn(async move {
                            let response = handler.dispatch(&session, request).await;
                            // The writer is gone only if the connection is closing.
                            let _ = tx.send(codec::encode(&response)).await;
                        });
                    }
                }
                Ok(None) => {
                    tracing::info!("Session {}: end of stream", session.id());
                    while let Some(joined) = in_flight.join_next().await {
                        log_join_error(joined);
                    }
                    break Ok(());
                }
                Err(e) => {
                    tracing::warn!("Session {}: transport error: {e}", session.id());
                    in_flight.abort_all();
                    break Err(e);
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_join_error(joined);
            }
            _ = tx.closed() => {
                in_flight.abort_all();
                break Err(McpError::Transport("writer closed".to_string()));
            }
        }
    };

    session.close();
    drop(tx);
    in_flight.shutdown().await;

    let written = match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(McpError::Transport(format!("writer task failed: {e}"))),
    };
    tracing::info!("Session {} closed", session.id());

    // A writer fault explains a "writer closed" outcome, so report it first.
    written.and(outcome)
}

fn runs_inline(session: &Session, request: &JsonRpcRequest) -> bool {
    matches!(request.method.as_str(), "initialize" | "shutdown") || !session.is_ready()
}

async fn write_loop<W: MessageWriter>(mut writer: W, mut rx: mpsc::Receiver<Vec<u8>>) -> McpResult<()> {
    while let Some(frame) = rx.recv().await {
        writer.send(&frame).await?;
    }
    Ok(())
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!("Dispatch task panicked: {e}");
        }
    }
}
