// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound side of a duplex connection.
//!
//! Every socket gets a bounded queue drained by a dedicated writer task.
//! [`ConnectionHandle`] is the sending half. Closing a handle is synchronous
//! and final: once closed, `send` returns [`TransportFailure::Closed`]
//! without touching the queue, so a dropped session never sees another write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;

use crate::error::TransportFailure;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Cloneable sender for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    tx: mpsc::Sender<String>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end its writer drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, tx, closed: CancellationToken::new() }, rx)
    }

    /// Process-unique connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a text frame, waiting at most `timeout` for queue space.
    pub async fn send(&self, text: String, timeout: Duration) -> Result<(), TransportFailure> {
        if self.closed.is_cancelled() {
            return Err(TransportFailure::Closed);
        }
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(TransportFailure::Closed),
            res = self.tx.send_timeout(text, timeout) => match res {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(TransportFailure::Timeout),
                Err(SendTimeoutError::Closed(_)) => Err(TransportFailure::Closed),
            },
        }
    }

    /// Serialize `msg` as JSON and queue it.
    pub async fn send_json<T: Serialize>(
        &self,
        msg: &T,
        timeout: Duration,
    ) -> Result<(), TransportFailure> {
        let text = serde_json::to_string(msg).map_err(|e| {
            tracing::error!(connection = self.id, err = %e, "failed to serialize outbound message");
            TransportFailure::Closed
        })?;
        self.send(text, timeout).await
    }

    /// Mark the connection dead. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

/// Drain `rx` into `sink` until the handle is closed, the queue ends, or a
/// write fails. Closes `handle` on exit so the read loop notices too.
pub async fn pump_outbound<S, M>(
    handle: ConnectionHandle,
    mut rx: mpsc::Receiver<String>,
    mut sink: S,
    into_frame: fn(String) -> M,
) where
    S: Sink<M> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = handle.closed() => break,
            next = rx.recv() => {
                let Some(text) = next else { break };
                if sink.send(into_frame(text)).await.is_err() {
                    tracing::debug!(connection = handle.id(), "outbound write failed");
                    break;
                }
            }
        }
    }
    handle.close();
    let _ = sink.close().await;
}
