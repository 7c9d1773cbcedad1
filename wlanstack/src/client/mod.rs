// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-interface station client: the context, the command queue and the
//! driver loop that multiplexes commands, MLME messages and timers into the
//! current protocol state.

pub mod states;

use crate::config::{ApConfig, Config};
use crate::mlme::{codec, BssDescription, EapolRequest, MlmeEvent, MlmeRequest};
use anyhow::format_err;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use self::states::{Next, State};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use wlan_common::mac::{MacAddr, MacFmt};

pub type Responder<T> = oneshot::Sender<Result<T, ServiceError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrCode {
    NotFound,
    InvalidArgs,
    NotSupported,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code:?}: {description}")]
pub struct ServiceError {
    pub code: ErrCode,
    pub description: String,
}

impl ServiceError {
    pub fn not_supported(state_name: &str) -> Self {
        ServiceError {
            code: ErrCode::NotSupported,
            description: format!("Can't run the command in {} state", state_name),
        }
    }

    pub fn invalid_args(description: impl Into<String>) -> Self {
        ServiceError { code: ErrCode::InvalidArgs, description: description.into() }
    }

    pub fn internal(description: impl Into<String>) -> Self {
        ServiceError { code: ErrCode::Internal, description: description.into() }
    }
}

/// Immutable snapshot of a BSS, taken from a scan result when it is selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Ap {
    pub bssid: MacAddr,
    pub ssid: String,
    pub last_rssi: i8,
    pub bss_desc: BssDescription,
}

impl Ap {
    pub fn from_bss_description(bss: &BssDescription) -> Ap {
        Ap { bssid: bss.bssid, ssid: bss.ssid.clone(), last_rssi: bss.rssi_dbm, bss_desc: bss.clone() }
    }

    pub fn is_secure(&self) -> bool {
        self.bss_desc.rsne.as_ref().map_or(false, |rsne| !rsne.is_empty())
    }
}

/// Control-surface view of a scanned AP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApInfo {
    pub bssid: MacAddr,
    pub ssid: String,
    pub last_rssi: i8,
    pub is_secure: bool,
}

impl From<&Ap> for ApInfo {
    fn from(ap: &Ap) -> ApInfo {
        ApInfo {
            bssid: ap.bssid,
            ssid: ap.ssid.clone(),
            last_rssi: ap.last_rssi,
            is_secure: ap.is_secure(),
        }
    }
}

/// Operator scan parameters. A zero timeout selects the default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    #[serde(default)]
    pub timeout: i32,
}

impl ScanParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout < 0 || self.timeout > 300 {
            return Err(format!("scan timeout {} is out of range", self.timeout));
        }
        Ok(())
    }
}

/// Operator commands, each carrying its one-shot reply carrier. Every
/// command is answered exactly once: either directly from `on_command` or,
/// for a latched scan, on the next scan response.
pub enum Command {
    Scan(ScanParams, Responder<Vec<ApInfo>>),
    SetScanConfig(Config, Responder<()>),
    Disconnect(Responder<()>),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Scan(..) => "scan",
            Command::SetScanConfig(..) => "set-scan-config",
            Command::Disconnect(..) => "disconnect",
        }
    }

    /// Answers the command with an error, whatever its variant.
    pub fn reject(self, err: ServiceError) {
        let delivered = match self {
            Command::Scan(_, responder) => responder.send(Err(err)).is_ok(),
            Command::SetScanConfig(_, responder) => responder.send(Err(err)).is_ok(),
            Command::Disconnect(responder) => responder.send(Err(err)).is_ok(),
        };
        if !delivered {
            warn!("command requester went away before the reply was ready");
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode MLME request: {0}")]
    Codec(#[from] codec::Error),
    #[error("MLME transport closed")]
    Closed,
}

/// Send side of the MLME transport: encodes requests and hands the frames to
/// the writer task.
#[derive(Clone)]
pub struct MlmeSink {
    sink: mpsc::UnboundedSender<Vec<u8>>,
}

impl MlmeSink {
    pub fn new(sink: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        MlmeSink { sink }
    }

    pub fn send(&self, req: MlmeRequest) -> Result<(), SinkError> {
        let frame = codec::encode_request(&req)?;
        self.sink.send(frame).map_err(|_| SinkError::Closed)
    }
}

/// EAPOL transport bound to the MLME send path. The supplicant never sees
/// the transport underneath.
pub struct MlmeEapolTransport {
    sink: MlmeSink,
    src_addr: MacAddr,
    dst_addr: MacAddr,
}

impl MlmeEapolTransport {
    pub fn new(sink: MlmeSink, src_addr: MacAddr, dst_addr: MacAddr) -> Self {
        MlmeEapolTransport { sink, src_addr, dst_addr }
    }
}

impl wlan_rsn::EapolTransport for MlmeEapolTransport {
    fn send_eapol(&mut self, data: Vec<u8>) -> Result<(), wlan_rsn::Error> {
        self.sink
            .send(MlmeRequest::Eapol(EapolRequest {
                src_addr: self.src_addr,
                dst_addr: self.dst_addr,
                data,
            }))
            .map_err(|e| wlan_rsn::Error::Transport(e.to_string()))
    }
}

/// Station context. The driver loop is its sole owner; states receive it
/// mutably for the duration of a callback.
pub struct Context {
    pub sta_addr: MacAddr,
    pub cfg: Option<Config>,
    pub ap_cfg: Option<ApConfig>,
    pub ap: Option<Ap>,
    pub eapol_client: Option<eapol::Client>,
    mlme_sink: MlmeSink,
}

impl Context {
    pub fn new(
        sta_addr: MacAddr,
        cfg: Option<Config>,
        ap_cfg: Option<ApConfig>,
        mlme_sink: MlmeSink,
    ) -> Self {
        Context { sta_addr, cfg, ap_cfg, ap: None, eapol_client: None, mlme_sink }
    }

    pub fn send_mlme(&self, req: MlmeRequest) -> Result<(), SinkError> {
        self.mlme_sink.send(req)
    }

    pub fn mlme_sink(&self) -> MlmeSink {
        self.mlme_sink.clone()
    }
}

pub struct Client {
    ctx: Context,
    // Only vacant while a callback owns the state; see `dispatch`.
    state: Option<State>,
    mlme_deadline: Option<Instant>,
}

impl Client {
    pub fn new(ctx: Context) -> Self {
        Client { ctx, state: None, mlme_deadline: None }
    }

    /// Enters the initial state. Must be called before any event is
    /// dispatched.
    pub fn start(&mut self) -> Result<(), anyhow::Error> {
        let state = State::initial(&self.ctx);
        info!(
            "starting client for {} in {} state",
            self.ctx.sta_addr.to_mac_str(),
            state.name()
        );
        self.state = Some(state);
        self.enter_current()
    }

    /// Runs `enter` for the current state and re-arms the MLME timeout.
    /// Protocol errors fall back to a fresh scan; transport errors are
    /// terminal for the client.
    fn enter_current(&mut self) -> Result<(), anyhow::Error> {
        loop {
            let state = self.state.as_mut().ok_or_else(|| format_err!("no active state"))?;
            match state.on_enter(&mut self.ctx) {
                Ok(timeout) => {
                    self.mlme_deadline = timeout.map(|t| Instant::now() + t);
                    return Ok(());
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("failed to enter {} state: {}; returning to scan", state.name(), e);
                    self.state = Some(State::scan(&self.ctx));
                }
            }
        }
    }

    fn dispatch<F>(&mut self, f: F) -> Result<(), anyhow::Error>
    where
        F: FnOnce(State, &mut Context) -> Next,
    {
        let state = self.state.take().ok_or_else(|| format_err!("no active state"))?;
        let previous = state.name();
        match f(state, &mut self.ctx) {
            Next::SameState(state) => {
                self.state = Some(state);
                Ok(())
            }
            Next::NewState(state) => {
                info!("{} -> {}", previous, state.name());
                self.state = Some(state);
                self.enter_current()
            }
        }
    }

    pub fn handle_mlme(&mut self, event: MlmeEvent) -> Result<(), anyhow::Error> {
        self.dispatch(|state, ctx| state.on_mlme(event, ctx))
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<(), anyhow::Error> {
        let state = self.state.as_ref().ok_or_else(|| format_err!("no active state"))?;
        if state.commands_disabled() {
            cmd.reject(ServiceError::not_supported(state.name()));
            return Ok(());
        }
        self.dispatch(|state, ctx| state.on_command(cmd, ctx))
    }

    pub fn handle_mlme_timeout(&mut self) -> Result<(), anyhow::Error> {
        self.mlme_deadline = None;
        self.dispatch(|state, ctx| state.on_mlme_timeout(ctx))
    }

    pub fn handle_timer(&mut self) -> Result<(), anyhow::Error> {
        self.dispatch(|state, ctx| state.on_timer_expired(ctx))
    }

    pub fn want_timer(&self) -> Option<Duration> {
        self.state.as_ref().and_then(|state| state.want_timer(&self.ctx))
    }

    pub fn mlme_deadline(&self) -> Option<Instant> {
        self.mlme_deadline
    }

    pub fn state_name(&self) -> &'static str {
        self.state.as_ref().map_or("stopped", State::name)
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

// Placeholder deadline for disabled select branches; tokio evaluates the
// branch expression even when the precondition is false.
const FAR_FUTURE: Duration = Duration::from_secs(24 * 60 * 60);

/// Drives a client until its MLME transport closes.
///
/// The loop suspends only here: callbacks never block. MLME events take
/// priority over commands so driver responses are never starved, the MLME
/// timeout is re-armed on every state entry, and the interval timer is
/// consulted after every step.
pub async fn serve(
    mut client: Client,
    mut commands: mpsc::Receiver<Command>,
    mut mlme_events: mpsc::UnboundedReceiver<MlmeEvent>,
) -> Result<(), anyhow::Error> {
    client.start()?;
    loop {
        let mlme_deadline = client.mlme_deadline();
        let timer_interval = client.want_timer();
        tokio::select! {
            biased;
            event = mlme_events.recv() => match event {
                Some(event) => client.handle_mlme(event)?,
                None => {
                    info!("MLME transport closed; stopping client");
                    return Ok(());
                }
            },
            _ = time::sleep_until(mlme_deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE)),
                    if mlme_deadline.is_some() => {
                client.handle_mlme_timeout()?;
            }
            command = commands.recv() => match command {
                Some(command) => client.handle_command(command)?,
                None => return Err(format_err!("command queue closed unexpectedly")),
            },
            _ = time::sleep(timer_interval.unwrap_or(FAR_FUTURE)),
                    if timer_interval.is_some() => {
                client.handle_timer()?;
            }
        }
    }
}
