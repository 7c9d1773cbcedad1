// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The MLME message set: request bodies sent to the driver and the
//! response/indication bodies it delivers, each addressed by a 32-bit
//! method code on the framed transport.

pub mod codec;

use serde::{Deserialize, Serialize};
use wlan_common::mac::MacAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Method {
    ScanRequest = 1,
    ScanResponse = 2,
    JoinRequest = 3,
    JoinResponse = 4,
    AuthenticateRequest = 5,
    AuthenticateResponse = 6,
    DeauthenticateRequest = 7,
    DeauthenticateResponse = 8,
    DeauthenticateIndication = 9,
    AssociateRequest = 10,
    AssociateResponse = 11,
    DisassociateIndication = 12,
    StartRequest = 13,
    StartResponse = 14,
    SignalReportIndication = 15,
    EapolRequest = 16,
    EapolResponse = 17,
    EapolIndication = 18,
}

impl Method {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Method> {
        match code {
            1 => Some(Method::ScanRequest),
            2 => Some(Method::ScanResponse),
            3 => Some(Method::JoinRequest),
            4 => Some(Method::JoinResponse),
            5 => Some(Method::AuthenticateRequest),
            6 => Some(Method::AuthenticateResponse),
            7 => Some(Method::DeauthenticateRequest),
            8 => Some(Method::DeauthenticateResponse),
            9 => Some(Method::DeauthenticateIndication),
            10 => Some(Method::AssociateRequest),
            11 => Some(Method::AssociateResponse),
            12 => Some(Method::DisassociateIndication),
            13 => Some(Method::StartRequest),
            14 => Some(Method::StartResponse),
            15 => Some(Method::SignalReportIndication),
            16 => Some(Method::EapolRequest),
            17 => Some(Method::EapolResponse),
            18 => Some(Method::EapolIndication),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BssType {
    Infrastructure,
    Independent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationType {
    OpenSystem,
    SharedKey,
    FastBssTransition,
    Sae,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanResultCode {
    Success,
    InvalidArgs,
    InternalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinResultCode {
    Success,
    JoinFailureTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticateResultCode {
    Success,
    Refused,
    AuthFailureTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociateResultCode {
    Success,
    RefusedReasonUnspecified,
    RefusedCapabilitiesMismatch,
    AssocFailureTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartResultCode {
    Success,
    BssAlreadyStartedOrJoined,
    InternalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EapolResultCode {
    Success,
    TransmissionFailure,
}

/// BSS snapshot reported by a scan. `rsne` carries the payload of the RSN
/// information element without the element-ID/length prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BssDescription {
    pub bssid: MacAddr,
    pub ssid: String,
    pub bss_type: BssType,
    pub beacon_period: u16,
    pub dtim_period: u8,
    pub channel: u16,
    pub rssi_dbm: i8,
    pub rsne: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub bss_type: BssType,
    pub bssid: MacAddr,
    pub ssid: String,
    pub scan_type: ScanType,
    pub channel_list: Vec<u16>,
    pub min_channel_time: u32,
    pub max_channel_time: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub result_code: ScanResultCode,
    pub bss_description_set: Vec<BssDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub selected_bss: BssDescription,
    pub join_failure_timeout: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub result_code: JoinResultCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub peer_sta_address: MacAddr,
    pub auth_type: AuthenticationType,
    pub auth_failure_timeout: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    pub peer_sta_address: MacAddr,
    pub result_code: AuthenticateResultCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociateRequest {
    pub peer_sta_address: MacAddr,
    pub rsne: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssociateResponse {
    pub result_code: AssociateResultCode,
    pub association_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeauthenticateRequest {
    pub peer_sta_address: MacAddr,
    pub reason_code: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeauthenticateResponse {
    pub peer_sta_address: MacAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeauthenticateIndication {
    pub peer_sta_address: MacAddr,
    pub reason_code: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisassociateIndication {
    pub peer_sta_address: MacAddr,
    pub reason_code: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub ssid: String,
    pub bss_type: BssType,
    pub beacon_period: u32,
    pub dtim_period: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    pub result_code: StartResultCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalReportIndication {
    pub rssi_dbm: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EapolRequest {
    pub src_addr: MacAddr,
    pub dst_addr: MacAddr,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EapolResponse {
    pub result_code: EapolResultCode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EapolIndication {
    pub src_addr: MacAddr,
    pub dst_addr: MacAddr,
    pub data: Vec<u8>,
}

/// Requests the station sends to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum MlmeRequest {
    Scan(ScanRequest),
    Join(JoinRequest),
    Authenticate(AuthenticateRequest),
    Associate(AssociateRequest),
    Deauthenticate(DeauthenticateRequest),
    Start(StartRequest),
    Eapol(EapolRequest),
}

impl MlmeRequest {
    pub fn method(&self) -> Method {
        match self {
            MlmeRequest::Scan(_) => Method::ScanRequest,
            MlmeRequest::Join(_) => Method::JoinRequest,
            MlmeRequest::Authenticate(_) => Method::AuthenticateRequest,
            MlmeRequest::Associate(_) => Method::AssociateRequest,
            MlmeRequest::Deauthenticate(_) => Method::DeauthenticateRequest,
            MlmeRequest::Start(_) => Method::StartRequest,
            MlmeRequest::Eapol(_) => Method::EapolRequest,
        }
    }
}

/// Responses and indications delivered by the driver. Frames with a method
/// code the codec does not know decode to `Unknown` rather than being
/// dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum MlmeEvent {
    Scan(ScanResponse),
    Join(JoinResponse),
    Authenticate(AuthenticateResponse),
    Associate(AssociateResponse),
    Deauthenticate(DeauthenticateResponse),
    DeauthenticateInd(DeauthenticateIndication),
    DisassociateInd(DisassociateIndication),
    Start(StartResponse),
    SignalReport(SignalReportIndication),
    Eapol(EapolResponse),
    EapolInd(EapolIndication),
    Unknown { method: u32 },
}

impl MlmeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MlmeEvent::Scan(_) => "ScanResponse",
            MlmeEvent::Join(_) => "JoinResponse",
            MlmeEvent::Authenticate(_) => "AuthenticateResponse",
            MlmeEvent::Associate(_) => "AssociateResponse",
            MlmeEvent::Deauthenticate(_) => "DeauthenticateResponse",
            MlmeEvent::DeauthenticateInd(_) => "DeauthenticateIndication",
            MlmeEvent::DisassociateInd(_) => "DisassociateIndication",
            MlmeEvent::Start(_) => "StartResponse",
            MlmeEvent::SignalReport(_) => "SignalReportIndication",
            MlmeEvent::Eapol(_) => "EapolResponse",
            MlmeEvent::EapolInd(_) => "EapolIndication",
            MlmeEvent::Unknown { .. } => "Unknown",
        }
    }
}
