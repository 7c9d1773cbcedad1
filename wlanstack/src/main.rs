// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use anyhow::Context as _;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use wlan_common::mac::parse_mac;
use wlanstack::client::{self, Client, Context, MlmeSink};
use wlanstack::config;
use wlanstack::mlme::{codec, MlmeEvent};
use wlanstack::service;

#[derive(Debug, Parser)]
#[command(name = "wlanstack", about = "Station-mode wlan client daemon")]
struct Opts {
    /// MAC address of the station interface, e.g. b0:70:35:8b:4a:01.
    #[arg(long)]
    sta_addr: String,
    /// MLME endpoint of the interface driver.
    #[arg(long, default_value = "/run/wlanstack/mlme.sock")]
    mlme_socket: PathBuf,
    /// Socket to serve the wlan control API on.
    #[arg(long, default_value = "/run/wlanstack/control.sock")]
    control_socket: PathBuf,
    /// Station config document.
    #[arg(long, default_value = "/etc/wlanstack/config.json")]
    config: PathBuf,
    /// AP config document. When given, the client boots into AP mode
    /// instead of scanning.
    #[arg(long)]
    ap_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = Opts::parse();

    let sta_addr = parse_mac(&opts.sta_addr)
        .map_err(|e| anyhow::format_err!("invalid --sta-addr: {}", e))?;
    let cfg = config::load_station_config(&opts.config)?;
    if cfg.is_none() {
        info!("no station config at {}; waiting for a connect command", opts.config.display());
    }
    let ap_cfg = opts.ap_config.as_deref().map(config::load_ap_config).transpose()?;

    let stream = UnixStream::connect(&opts.mlme_socket).await.with_context(|| {
        format!("failed to connect to MLME socket {}", opts.mlme_socket.display())
    })?;
    let (read_half, write_half) = stream.into_split();

    if opts.control_socket.exists() {
        std::fs::remove_file(&opts.control_socket).with_context(|| {
            format!("failed to remove stale control socket {}", opts.control_socket.display())
        })?;
    }
    let listener = UnixListener::bind(&opts.control_socket).with_context(|| {
        format!("failed to bind control socket {}", opts.control_socket.display())
    })?;
    info!("serving wlan control API on {}", opts.control_socket.display());

    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(1);

    let client = Client::new(Context::new(sta_addr, cfg, ap_cfg, MlmeSink::new(frame_tx)));

    tokio::select! {
        result = client::serve(client, cmd_rx, event_rx) => result,
        result = read_mlme(read_half, event_tx) => result,
        result = write_mlme(write_half, frame_rx) => result,
        result = service::serve(listener, cmd_tx) => result,
    }
}

/// Decodes inbound MLME frames into events for the driver loop. Dropping
/// the event sender on EOF lets the loop shut down cleanly.
async fn read_mlme(
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<MlmeEvent>,
) -> Result<(), anyhow::Error> {
    loop {
        match codec::read_frame(&mut reader).await? {
            Some((method, body)) => {
                let event = match codec::decode_event(method, &body) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("dropping undecodable MLME frame: {}", e);
                        continue;
                    }
                };
                if events.send(event).is_err() {
                    return Ok(());
                }
            }
            None => {
                info!("MLME endpoint closed");
                return Ok(());
            }
        }
    }
}

async fn write_mlme(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
) -> Result<(), anyhow::Error> {
    while let Some(frame) = frames.recv().await {
        codec::write_frame(&mut writer, &frame).await?;
    }
    Ok(())
}
