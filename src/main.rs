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

//! HFP/HSP audio gateway daemon backed by a simulated phone.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hfp_gateway::bluetooth::{ConnectionEvent, GatewayServer};
use hfp_gateway::config::Config;
use hfp_gateway::console::{ConsoleCommand, HELP};
use hfp_gateway::hfp::{Collaborators, HandsfreeEngine};
use hfp_gateway::sim::{SimAudio, SimPhone, SimSco};
use hfp_gateway::storage::PhonebookStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hfp_gateway=info".parse()?),
        )
        .init();

    info!("Starting HFP gateway v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("Configuration loaded");

    let store = PhonebookStore::open(&config.data_dir, config.phonebook.call_log_limit)?;
    info!("Phonebook storage initialized");

    let phone = SimPhone::new(Some(store.clone()));
    let sco = SimSco::new();
    let audio = SimAudio::new();

    let engine = HandsfreeEngine::new(
        config.engine.clone(),
        Collaborators {
            telephony: phone.clone(),
            routing: audio.clone(),
            phonebook: Arc::new(store.clone()),
            sco: sco.clone(),
        },
        tokio::runtime::Handle::current(),
    );
    phone.attach(&engine);
    sco.attach(&engine, tokio::runtime::Handle::current());
    engine.on_radio_enabled();

    match GatewayServer::new(config.bluetooth.clone(), engine.clone()).await {
        Ok(server) => {
            let mut events = server.listen().await?;
            if let Ok(address) = server.address().await {
                info!("Gateway ready on {}", address);
            }
            tokio::spawn(async move {
                // The services stay registered while the session lives.
                let _server = server;
                while let Some(event) = events.recv().await {
                    match event {
                        ConnectionEvent::Connected { address, kind } => {
                            info!("Peer connected: {} ({:?})", address, kind);
                        }
                        ConnectionEvent::Disconnected { address } => {
                            info!("Peer disconnected: {}", address);
                        }
                    }
                }
            });
        }
        Err(e) => {
            error!("Bluetooth unavailable, running console only: {}", e);
        }
    }

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Console read error: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match ConsoleCommand::parse(&line) {
                    Some(ConsoleCommand::Quit) => break,
                    Some(command) => match command.execute(&phone, &engine, &store) {
                        Ok(output) => println!("{}", output),
                        Err(e) => warn!("{}", e),
                    },
                    None => println!("unknown command, try 'help'"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    engine.on_peer_disconnected();
    engine.on_radio_disabled();
    info!("HFP gateway stopped");
    Ok(())
}
