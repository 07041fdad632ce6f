// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A single RFCOMM peer connection.
//!
//! Bytes from the peer are cut into AT command lines on `\r` and handed to
//! the engine. Lines the engine produces are framed as `\r\n<line>\r\n`.

use anyhow::Result;
use bluer::rfcomm::Stream;
use bluer::Address;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::hfp::{HandsfreeEngine, PeerKind};

/// Longest command line accepted before the buffer is discarded.
const MAX_LINE_LEN: usize = 512;

/// Events emitted by a connection.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected { address: Address, kind: PeerKind },
    Disconnected { address: Address },
}

/// Frame one response line for the wire.
pub fn frame_response(line: &str) -> String {
    format!("\r\n{}\r\n", line)
}

/// Splits a byte stream into command lines.
///
/// `\r` terminates a line, `\n` is ignored, and blank lines are dropped.
/// A line longer than [`MAX_LINE_LEN`] is dropped in full, up to and
/// including its `\r`.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
    discarding: bool,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed received bytes, returning every line they complete.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in data {
            match byte {
                b'\r' => {
                    if self.discarding {
                        self.discarding = false;
                        continue;
                    }
                    let line = String::from_utf8_lossy(&self.buf).trim().to_string();
                    self.buf.clear();
                    if !line.is_empty() {
                        lines.push(line);
                    }
                }
                b'\n' => {}
                _ if self.discarding => {}
                _ => {
                    if self.buf.len() >= MAX_LINE_LEN {
                        warn!("Command line exceeds {} bytes, discarding", MAX_LINE_LEN);
                        self.buf.clear();
                        self.discarding = true;
                        continue;
                    }
                    self.buf.push(byte);
                }
            }
        }

        lines
    }

    /// Bytes of an unterminated line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Handler for a single peer connection.
pub struct ConnectionHandler {
    stream: Stream,
    address: Address,
    kind: PeerKind,
    engine: Arc<HandsfreeEngine>,
    event_tx: mpsc::Sender<ConnectionEvent>,
}

impl ConnectionHandler {
    pub fn new(
        stream: Stream,
        address: Address,
        kind: PeerKind,
        engine: Arc<HandsfreeEngine>,
        event_tx: mpsc::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            stream,
            address,
            kind,
            engine,
            event_tx,
        }
    }

    /// Run until the peer goes away.
    pub async fn run(self) -> Result<()> {
        let Self {
            stream,
            address,
            kind,
            engine,
            event_tx,
        } = self;

        info!("Connection handler started for {}", address);

        let (mut reader, mut writer) = stream.into_split();
        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                debug!("AT -> {}", line);
                if let Err(e) = writer.write_all(frame_response(&line).as_bytes()).await {
                    error!("Write error: {}", e);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    error!("Flush error: {}", e);
                    break;
                }
            }
        });

        engine.on_peer_connected(address.to_string(), kind, line_tx);
        if let Err(e) = event_tx
            .send(ConnectionEvent::Connected { address, kind })
            .await
        {
            error!("Failed to send connected event: {}", e);
        }

        let mut splitter = LineSplitter::new();
        let mut buf = [0u8; 256];
        let result = loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    info!("Connection closed by remote");
                    break Ok(());
                }
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        engine.handle_line(&line);
                    }
                }
                Err(e) => {
                    error!("Read error: {}", e);
                    break Err(e.into());
                }
            }
        };

        engine.on_peer_disconnected();
        writer_task.abort();
        if let Err(e) = event_tx
            .send(ConnectionEvent::Disconnected { address })
            .await
        {
            error!("Failed to send disconnected event: {}", e);
        }

        result
    }
}
