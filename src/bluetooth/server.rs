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

//! RFCOMM audio gateway server.
//!
//! Each gateway service is registered with bluetoothd as a profile, which
//! publishes its SDP record and hands incoming RFCOMM connections to us.

use anyhow::Result;
use bluer::rfcomm::{Profile, ProfileHandle, ReqError, Role};
use bluer::Address;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::connection::{ConnectionEvent, ConnectionHandler};
use crate::config::BluetoothConfig;
use crate::hfp::{HandsfreeEngine, PeerKind};

/// Hands-free audio gateway service class.
pub const HFP_AG_UUID: Uuid = Uuid::from_u128(0x0000111F_0000_1000_8000_00805F9B34FB);

/// Headset audio gateway service class.
pub const HSP_AG_UUID: Uuid = Uuid::from_u128(0x00001112_0000_1000_8000_00805F9B34FB);

/// HFP 1.5
const HFP_VERSION: u16 = 0x0105;
/// HSP 1.2
const HSP_VERSION: u16 = 0x0102;

/// SDP SupportedFeatures of the gateway: three-way calling, EC/NR.
const HFP_SDP_FEATURES: u16 = 0x0003;

impl PeerKind {
    /// Service class UUID peers of this kind connect to.
    pub fn service_uuid(&self) -> Uuid {
        match self {
            PeerKind::Handsfree => HFP_AG_UUID,
            PeerKind::Headset => HSP_AG_UUID,
        }
    }

    fn service_name(&self) -> &'static str {
        match self {
            PeerKind::Handsfree => "Handsfree Gateway",
            PeerKind::Headset => "Headset Gateway",
        }
    }
}

/// SDP profile advertising the gateway service of `kind` on `channel`.
pub fn gateway_profile(kind: PeerKind, channel: u8) -> Profile {
    let (version, features) = match kind {
        PeerKind::Handsfree => (HFP_VERSION, Some(HFP_SDP_FEATURES)),
        PeerKind::Headset => (HSP_VERSION, None),
    };
    Profile {
        uuid: kind.service_uuid(),
        name: Some(kind.service_name().to_string()),
        role: Some(Role::Server),
        channel: Some(channel.into()),
        require_authentication: Some(true),
        require_authorization: Some(false),
        version: Some(version),
        features,
        ..Default::default()
    }
}

/// Accepts hands-free and headset peers, one at a time.
pub struct GatewayServer {
    session: bluer::Session,
    adapter: bluer::Adapter,
    config: BluetoothConfig,
    engine: Arc<HandsfreeEngine>,
    busy: Arc<AtomicBool>,
}

impl GatewayServer {
    pub async fn new(config: BluetoothConfig, engine: Arc<HandsfreeEngine>) -> Result<Self> {
        info!("Initializing Bluetooth server...");

        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        adapter.set_alias(config.device_name.clone()).await?;
        adapter.set_discoverable(true).await?;
        adapter.set_pairable(true).await?;
        info!("Adapter visible as \"{}\"", config.device_name);

        Ok(Self {
            session,
            adapter,
            config,
            engine,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn address(&self) -> Result<Address> {
        Ok(self.adapter.address().await?)
    }

    /// Register both gateway services and start accepting.
    ///
    /// A service stays registered while its accept task runs.
    pub async fn listen(&self) -> Result<mpsc::Receiver<ConnectionEvent>> {
        let (event_tx, event_rx) = mpsc::channel(32);

        for (kind, channel) in [
            (PeerKind::Handsfree, self.config.handsfree_channel),
            (PeerKind::Headset, self.config.headset_channel),
        ] {
            let handle = self
                .session
                .register_profile(gateway_profile(kind, channel))
                .await?;
            info!(
                "{:?} gateway registered on channel {} (UUID: {})",
                kind,
                channel,
                kind.service_uuid()
            );

            let engine = self.engine.clone();
            let busy = self.busy.clone();
            let event_tx = event_tx.clone();
            tokio::spawn(async move {
                Self::accept_loop(handle, kind, engine, busy, event_tx).await;
            });
        }

        Ok(event_rx)
    }

    async fn accept_loop(
        mut handle: ProfileHandle,
        kind: PeerKind,
        engine: Arc<HandsfreeEngine>,
        busy: Arc<AtomicBool>,
        event_tx: mpsc::Sender<ConnectionEvent>,
    ) {
        while let Some(request) = handle.next().await {
            let address = request.device();
            if busy.swap(true, Ordering::SeqCst) {
                warn!(
                    "Rejecting {:?} connection from {}: peer already connected",
                    kind, address
                );
                request.reject(ReqError::Rejected);
                continue;
            }

            let stream = match request.accept() {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Accept error: {}", e);
                    busy.store(false, Ordering::SeqCst);
                    continue;
                }
            };

            info!("{:?} connection from {}", kind, address);
            let handler =
                ConnectionHandler::new(stream, address, kind, engine.clone(), event_tx.clone());

            let busy = busy.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.run().await {
                    error!("Connection handler error: {}", e);
                }
                busy.store(false, Ordering::SeqCst);
            });
        }

        warn!("{:?} gateway registration ended", kind);
    }
}
