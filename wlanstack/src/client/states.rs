// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Protocol states of a station client. Exactly one state is active per
//! client; every callback either keeps the current state or hands a new one
//! back to the driver loop, which then runs its `on_enter`.

use super::{Ap, ApInfo, Command, Context, Responder, ServiceError};
use crate::mlme::{self, MlmeEvent, MlmeRequest};

use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;
use wlan_common::ie::rsn::rsne;
use wlan_common::mac::{MacFmt, BCAST_ADDR};
use wlan_rsn::{Supplicant, SupplicantConfig};

pub const SCAN_TIMEOUT: Duration = Duration::from_secs(30);
pub const START_BSS_TIMEOUT: Duration = Duration::from_secs(30);
// Failure timeouts are in units defined by the MLME (beacon intervals).
pub const JOIN_FAILURE_TIMEOUT: u32 = 20;
pub const AUTH_FAILURE_TIMEOUT: u32 = 20;
/// IEEE 802.11-2016, 9.4.1.7, Table 9-45: requesting STA is leaving the BSS.
pub const REASON_STA_LEAVING: u16 = 36;

const TWO_POINT_FOUR_GHZ_CHANNELS: &[u16] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

#[derive(Debug, Error)]
pub enum StateError {
    #[error("unsupported RSN: {0}")]
    UnsupportedRsn(#[from] rsne::Error),
    #[error("failed to parse beacon RSNE: {0}")]
    MalformedRsne(#[from] rsne::ParseError),
    #[error(transparent)]
    Supplicant(#[from] wlan_rsn::Error),
    #[error("no AP selected")]
    NoSelectedAp,
    #[error("no AP configuration")]
    NoApConfig,
    #[error("failed to send MLME request: {0}")]
    Transport(#[from] super::SinkError),
}

impl StateError {
    /// Transport failures terminate the driver loop; everything else is
    /// recovered by falling back to a fresh scan.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StateError::Transport(_))
    }
}

/// Outcome of a state callback. `NewState` makes the loop run the next
/// state's `on_enter` and re-arm the MLME timeout; `SameState` preserves the
/// running timeout.
pub enum Next {
    SameState(State),
    NewState(State),
}

pub enum State {
    StartBss(StartBss),
    Scanning(Scanning),
    Joining(Joining),
    Authenticating(Authenticating),
    Associating(Associating),
    Associated(Associated),
}

impl State {
    pub fn initial(ctx: &Context) -> State {
        if ctx.ap_cfg.is_some() {
            State::StartBss(StartBss { running: false })
        } else {
            State::scan(ctx)
        }
    }

    /// A fresh scan state; the fallback target of every protocol failure.
    pub fn scan(ctx: &Context) -> State {
        State::Scanning(Scanning::new(ctx))
    }

    pub fn name(&self) -> &'static str {
        match self {
            State::StartBss(_) => "starting-bss",
            State::Scanning(_) => "scanning",
            State::Joining(_) => "joining",
            State::Authenticating(_) => "authenticating",
            State::Associating(_) => "associating",
            State::Associated(_) => "associated",
        }
    }

    pub fn on_enter(&mut self, ctx: &mut Context) -> Result<Option<Duration>, StateError> {
        match self {
            State::StartBss(state) => state.on_enter(ctx),
            State::Scanning(state) => state.on_enter(ctx),
            State::Joining(state) => state.on_enter(ctx),
            State::Authenticating(state) => state.on_enter(ctx),
            State::Associating(state) => state.on_enter(ctx),
            State::Associated(state) => state.on_enter(ctx),
        }
    }

    /// While joining, authenticating or associating, commands are rejected
    /// by the driver loop without reaching the state.
    pub fn commands_disabled(&self) -> bool {
        matches!(self, State::Joining(_) | State::Authenticating(_) | State::Associating(_))
    }

    pub fn on_command(self, cmd: Command, ctx: &mut Context) -> Next {
        match self {
            State::StartBss(state) => state.on_command(cmd),
            State::Scanning(state) => state.on_command(cmd, ctx),
            State::Associated(state) => state.on_command(cmd, ctx),
            other => {
                // Unreachable while the loop honors commands_disabled().
                cmd.reject(ServiceError::not_supported(other.name()));
                Next::SameState(other)
            }
        }
    }

    pub fn on_mlme(self, event: MlmeEvent, ctx: &mut Context) -> Next {
        match self {
            State::StartBss(state) => state.on_mlme(event),
            State::Scanning(state) => state.on_mlme(event, ctx),
            State::Joining(state) => state.on_mlme(event, ctx),
            State::Authenticating(state) => state.on_mlme(event, ctx),
            State::Associating(state) => state.on_mlme(event, ctx),
            State::Associated(state) => state.on_mlme(event, ctx),
        }
    }

    pub fn on_mlme_timeout(self, ctx: &mut Context) -> Next {
        match self {
            State::StartBss(state) => state.on_mlme_timeout(),
            State::Scanning(state) => state.on_mlme_timeout(ctx),
            other => Next::SameState(other),
        }
    }

    pub fn want_timer(&self, ctx: &Context) -> Option<Duration> {
        match self {
            State::Scanning(state) => state.want_timer(ctx),
            _ => None,
        }
    }

    pub fn on_timer_expired(self, _ctx: &mut Context) -> Next {
        match self {
            State::Scanning(state) => state.on_timer_expired(),
            other => Next::SameState(other),
        }
    }
}

fn reply<T>(responder: Responder<T>, result: Result<T, ServiceError>) {
    if responder.send(result).is_err() {
        warn!("command requester went away before the reply was ready");
    }
}

// Start BSS. AP mode is a bootstrap stub: the start request is issued and
// the response acknowledged, nothing more.

pub struct StartBss {
    running: bool,
}

impl StartBss {
    fn on_enter(&mut self, ctx: &mut Context) -> Result<Option<Duration>, StateError> {
        let ap_cfg = ctx.ap_cfg.as_ref().ok_or(StateError::NoApConfig)?;
        let req = mlme::StartRequest {
            ssid: ap_cfg.ssid.clone(),
            bss_type: mlme::BssType::Infrastructure,
            beacon_period: ap_cfg.beacon_period,
            dtim_period: ap_cfg.dtim_period,
        };
        debug!("start bss request: {:?} (timeout {:?})", req, START_BSS_TIMEOUT);
        ctx.send_mlme(MlmeRequest::Start(req))?;
        self.running = true;
        Ok(Some(START_BSS_TIMEOUT))
    }

    fn on_command(self, cmd: Command) -> Next {
        cmd.reject(ServiceError::not_supported("starting-bss"));
        Next::SameState(State::StartBss(self))
    }

    fn on_mlme(mut self, event: MlmeEvent) -> Next {
        match event {
            MlmeEvent::Start(resp) => {
                // The result code is not evaluated; AP mode has no states to
                // advance to yet.
                debug!("start bss response: {:?}", resp.result_code);
                self.running = false;
                Next::SameState(State::StartBss(self))
            }
            other => {
                warn!("unexpected MLME event in starting-bss state: {}", other.name());
                Next::SameState(State::StartBss(self))
            }
        }
    }

    fn on_mlme_timeout(self) -> Next {
        if self.running {
            warn!("timed out waiting for the start response");
        }
        Next::SameState(State::StartBss(self))
    }
}

// Scanning.

pub struct PendingScan {
    params: super::ScanParams,
    responder: Responder<Vec<ApInfo>>,
}

pub struct Scanning {
    /// Set when a periodic scan found no matching BSS; cleared by the
    /// interval timer and the MLME timeout.
    pause: bool,
    /// A scan request is in flight. Gates both re-entry and the interval
    /// timer, keeping at most one request outstanding.
    running: bool,
    /// At most one latched operator scan; a second one is rejected.
    pending: Option<PendingScan>,
}

impl Scanning {
    pub fn new(ctx: &Context) -> Self {
        let pause = !ctx.cfg.as_ref().map_or(false, |cfg| !cfg.ssid.is_empty());
        Scanning { pause, running: false, pending: None }
    }

    fn on_enter(&mut self, ctx: &mut Context) -> Result<Option<Duration>, StateError> {
        // No BSS is selected and no handshake is in flight while scanning.
        ctx.ap = None;
        ctx.eapol_client = None;

        let mut timeout = SCAN_TIMEOUT;
        let req = if let Some(pending) = &self.pending {
            // An operator scan is a broadcast scan; its timeout overrides
            // the default.
            if pending.params.timeout > 0 {
                timeout = Duration::from_secs(pending.params.timeout as u64);
            }
            Some(new_scan_request(String::new()))
        } else if let Some(cfg) = ctx.cfg.as_ref().filter(|cfg| !cfg.ssid.is_empty()) {
            if self.pause {
                None
            } else {
                Some(new_scan_request(cfg.ssid.clone()))
            }
        } else {
            None
        };

        if let Some(req) = req {
            debug!("scan request: {:?} (timeout {:?})", req, timeout);
            ctx.send_mlme(MlmeRequest::Scan(req))?;
            self.running = true;
        }
        Ok(Some(timeout))
    }

    fn on_command(mut self, cmd: Command, ctx: &mut Context) -> Next {
        match cmd {
            Command::Scan(params, responder) => {
                if let Err(e) = params.validate() {
                    reply(responder, Err(ServiceError::invalid_args(e)));
                    return Next::SameState(State::Scanning(self));
                }
                if self.pending.is_some() {
                    reply(
                        responder,
                        Err(ServiceError {
                            code: super::ErrCode::NotSupported,
                            description: "another scan command is already pending".to_string(),
                        }),
                    );
                    return Next::SameState(State::Scanning(self));
                }
                self.pending = Some(PendingScan { params, responder });
                if self.running {
                    // The response to the request in flight will serve it.
                    Next::SameState(State::Scanning(self))
                } else {
                    Next::NewState(State::Scanning(self))
                }
            }
            Command::SetScanConfig(cfg, responder) => {
                if let Err(e) = cfg.validate() {
                    reply(responder, Err(ServiceError::invalid_args(e)));
                    return Next::SameState(State::Scanning(self));
                }
                debug!("new config: SSID {} interval {:?}", cfg.ssid, cfg.scan_interval);
                ctx.cfg = Some(cfg);
                reply(responder, Ok(()));
                if self.running {
                    Next::SameState(State::Scanning(self))
                } else {
                    let mut next = Scanning::new(ctx);
                    next.pending = self.pending;
                    Next::NewState(State::Scanning(next))
                }
            }
            Command::Disconnect(responder) => {
                reply(responder, Err(ServiceError::not_supported("scanning")));
                Next::SameState(State::Scanning(self))
            }
        }
    }

    fn on_mlme(mut self, event: MlmeEvent, ctx: &mut Context) -> Next {
        match event {
            MlmeEvent::Scan(resp) => {
                self.running = false;

                if let Some(pending) = self.pending.take() {
                    // Operator scans are served unfiltered.
                    let aps = collect_scan_results(&resp, None, None);
                    reply(pending.responder, Ok(aps.iter().map(ApInfo::from).collect()));
                    return Next::SameState(State::Scanning(self));
                }

                let (ssid, bssid) = match &ctx.cfg {
                    Some(cfg) if !cfg.ssid.is_empty() => (cfg.ssid.clone(), cfg.bssid_filter()),
                    _ => return Next::SameState(State::Scanning(self)),
                };
                let mut aps = collect_scan_results(&resp, Some(&ssid), bssid);
                if !aps.is_empty() {
                    let ap = aps.remove(0);
                    info!("selected BSS {} for SSID {}", ap.bssid.to_mac_str(), ap.ssid);
                    ctx.ap = Some(ap);
                    Next::NewState(State::Joining(Joining))
                } else {
                    self.pause = true;
                    Next::SameState(State::Scanning(self))
                }
            }
            other => {
                warn!("unexpected MLME event in scanning state: {}", other.name());
                Next::SameState(State::Scanning(self))
            }
        }
    }

    fn on_mlme_timeout(mut self, ctx: &mut Context) -> Next {
        debug!("scan timeout");
        self.pause = false;
        self.running = false;
        // Re-issue the lost scan if there is anything to scan for.
        if self.pending.is_some()
            || ctx.cfg.as_ref().map_or(false, |cfg| !cfg.ssid.is_empty())
        {
            Next::NewState(State::Scanning(self))
        } else {
            Next::SameState(State::Scanning(self))
        }
    }

    fn want_timer(&self, ctx: &Context) -> Option<Duration> {
        if self.running {
            return None;
        }
        match &ctx.cfg {
            Some(cfg) if !cfg.ssid.is_empty() => Some(cfg.scan_interval()),
            _ => None,
        }
    }

    fn on_timer_expired(mut self) -> Next {
        debug!("scan pause finished");
        self.pause = false;
        Next::NewState(State::Scanning(self))
    }
}

fn new_scan_request(ssid: String) -> mlme::ScanRequest {
    mlme::ScanRequest {
        bss_type: mlme::BssType::Infrastructure,
        bssid: BCAST_ADDR,
        ssid,
        scan_type: mlme::ScanType::Passive,
        channel_list: TWO_POINT_FOUR_GHZ_CHANNELS.to_vec(),
        min_channel_time: 100,
        max_channel_time: 300,
    }
}

fn collect_scan_results(
    resp: &mlme::ScanResponse,
    ssid: Option<&str>,
    bssid: Option<wlan_common::mac::MacAddr>,
) -> Vec<Ap> {
    resp.bss_description_set
        .iter()
        .filter(|bss| ssid.map_or(true, |ssid| bss.ssid == ssid))
        .filter(|bss| bssid.map_or(true, |bssid| bss.bssid == bssid))
        .map(Ap::from_bss_description)
        .collect()
}

// Joining.

pub struct Joining;

impl Joining {
    fn on_enter(&mut self, ctx: &mut Context) -> Result<Option<Duration>, StateError> {
        let ap = ctx.ap.as_ref().ok_or(StateError::NoSelectedAp)?;

        // Refuse to join a network whose RSN cannot be negotiated; no
        // request is sent in that case.
        if let Some(raw_rsne) = &ap.bss_desc.rsne {
            let bcn_rsne = rsne::from_bytes(raw_rsne)?;
            bcn_rsne.derive_assoc_rsne()?;
        }

        let req = mlme::JoinRequest {
            selected_bss: ap.bss_desc.clone(),
            join_failure_timeout: JOIN_FAILURE_TIMEOUT,
        };
        debug!("join request: {:?}", req);
        ctx.send_mlme(MlmeRequest::Join(req))?;
        Ok(None)
    }

    fn on_mlme(self, event: MlmeEvent, ctx: &mut Context) -> Next {
        match event {
            MlmeEvent::Join(resp) => {
                if resp.result_code == mlme::JoinResultCode::Success {
                    Next::NewState(State::Authenticating(Authenticating))
                } else {
                    warn!("join failed: {:?}", resp.result_code);
                    Next::NewState(State::scan(ctx))
                }
            }
            other => {
                warn!("unexpected MLME event in joining state: {}", other.name());
                Next::SameState(State::Joining(self))
            }
        }
    }
}

// Authenticating.

pub struct Authenticating;

impl Authenticating {
    fn on_enter(&mut self, ctx: &mut Context) -> Result<Option<Duration>, StateError> {
        let ap = ctx.ap.as_ref().ok_or(StateError::NoSelectedAp)?;
        let req = mlme::AuthenticateRequest {
            peer_sta_address: ap.bssid,
            auth_type: mlme::AuthenticationType::OpenSystem,
            auth_failure_timeout: AUTH_FAILURE_TIMEOUT,
        };
        debug!("auth request: {:?}", req);
        ctx.send_mlme(MlmeRequest::Authenticate(req))?;
        Ok(None)
    }

    fn on_mlme(self, event: MlmeEvent, ctx: &mut Context) -> Next {
        match event {
            MlmeEvent::Authenticate(resp) => {
                if resp.result_code == mlme::AuthenticateResultCode::Success {
                    Next::NewState(State::Associating(Associating))
                } else {
                    warn!("authentication failed: {:?}", resp.result_code);
                    Next::NewState(State::scan(ctx))
                }
            }
            other => {
                warn!("unexpected MLME event in authenticating state: {}", other.name());
                Next::SameState(State::Authenticating(self))
            }
        }
    }
}

// Associating.

pub struct Associating;

impl Associating {
    fn on_enter(&mut self, ctx: &mut Context) -> Result<Option<Duration>, StateError> {
        let ap = ctx.ap.clone().ok_or(StateError::NoSelectedAp)?;
        let mut req = mlme::AssociateRequest { peer_sta_address: ap.bssid, rsne: None };

        match &ap.bss_desc.rsne {
            Some(raw_rsne) => {
                // Announce our cipher and AKM choice and stand up the
                // supplicant before the association completes, so the first
                // EAPOL frame cannot race it.
                let bcn_rsne = rsne::from_bytes(raw_rsne)?;
                let assoc_rsne = bcn_rsne.derive_assoc_rsne()?;
                req.rsne = Some(assoc_rsne.to_bytes());

                let pass_phrase =
                    ctx.cfg.as_ref().and_then(|cfg| cfg.password.clone()).unwrap_or_default();
                let supplicant = Supplicant::new(SupplicantConfig {
                    transport: Box::new(super::MlmeEapolTransport::new(
                        ctx.mlme_sink(),
                        ctx.sta_addr,
                        ap.bssid,
                    )),
                    pass_phrase,
                    ssid: ap.ssid.clone(),
                    peer_addr: ap.bssid,
                    sta_addr: ctx.sta_addr,
                    assoc_rsne,
                    beacon_rsne: bcn_rsne,
                })?;
                let mic_size = supplicant.mic_size();
                ctx.eapol_client = Some(eapol::Client::new(eapol::Config {
                    mic_size,
                    key_exchange: Box::new(supplicant),
                }));
            }
            None => {
                ctx.eapol_client = None;
            }
        }

        debug!("assoc request: {:?}", req);
        ctx.send_mlme(MlmeRequest::Associate(req))?;
        Ok(None)
    }

    fn on_mlme(self, event: MlmeEvent, ctx: &mut Context) -> Next {
        match event {
            MlmeEvent::Associate(resp) => {
                if resp.result_code == mlme::AssociateResultCode::Success {
                    Next::NewState(State::Associated(Associated))
                } else {
                    warn!("association failed: {:?}", resp.result_code);
                    Next::NewState(State::scan(ctx))
                }
            }
            other => {
                warn!("unexpected MLME event in associating state: {}", other.name());
                Next::SameState(State::Associating(self))
            }
        }
    }
}

// Associated.

pub struct Associated;

impl Associated {
    fn on_enter(&mut self, _ctx: &mut Context) -> Result<Option<Duration>, StateError> {
        Ok(None)
    }

    fn on_command(self, cmd: Command, ctx: &mut Context) -> Next {
        match cmd {
            Command::Disconnect(responder) => {
                let peer = match ctx.ap.as_ref() {
                    Some(ap) => ap.bssid,
                    None => {
                        reply(responder, Err(ServiceError::internal("no selected AP")));
                        return Next::SameState(State::Associated(self));
                    }
                };
                let req = mlme::DeauthenticateRequest {
                    peer_sta_address: peer,
                    reason_code: REASON_STA_LEAVING,
                };
                debug!("deauthenticate request: {:?}", req);
                match ctx.send_mlme(MlmeRequest::Deauthenticate(req)) {
                    Ok(()) => reply(responder, Ok(())),
                    Err(e) => {
                        warn!("failed to send deauthenticate request: {}", e);
                        reply(
                            responder,
                            Err(ServiceError::internal("Could not send MLME request")),
                        );
                    }
                }
                // Stay until the response arrives; disconnect is not
                // cancellable.
                Next::SameState(State::Associated(self))
            }
            other => {
                other.reject(ServiceError::not_supported("associated"));
                Next::SameState(State::Associated(self))
            }
        }
    }

    fn on_mlme(self, event: MlmeEvent, ctx: &mut Context) -> Next {
        match event {
            MlmeEvent::DisassociateInd(ind) => {
                info!(
                    "disassociated by {}: reason {}",
                    ind.peer_sta_address.to_mac_str(),
                    ind.reason_code
                );
                Next::NewState(State::Associating(Associating))
            }
            MlmeEvent::Deauthenticate(_resp) => {
                // This was a user issued deauthentication. Clear the config
                // to prevent an automatic reconnect and enter scan state.
                ctx.cfg = None;
                Next::NewState(State::scan(ctx))
            }
            MlmeEvent::DeauthenticateInd(ind) => {
                info!(
                    "deauthenticated by {}: reason {}",
                    ind.peer_sta_address.to_mac_str(),
                    ind.reason_code
                );
                Next::NewState(State::Authenticating(Authenticating))
            }
            MlmeEvent::SignalReport(ind) => {
                debug!("signal report: {} dBm", ind.rssi_dbm);
                Next::SameState(State::Associated(self))
            }
            MlmeEvent::EapolInd(ind) => {
                if let Some(client) = ctx.eapol_client.as_mut() {
                    client.handle_frame(&ind.data);
                }
                Next::SameState(State::Associated(self))
            }
            MlmeEvent::Eapol(_resp) => Next::SameState(State::Associated(self)),
            other => {
                warn!("unexpected MLME event in associated state: {}", other.name());
                Next::SameState(State::Associated(self))
            }
        }
    }
}
