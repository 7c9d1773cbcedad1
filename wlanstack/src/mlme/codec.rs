// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Framing for the MLME transport. A frame is a little-endian length,
//! a 32-bit method code and a JSON-encoded body:
//!
//! ```text
//! [ len: u32 | method: u32 | body: len - 4 bytes ]
//! ```
//!
//! The length field covers the method code and the body.

use super::{Method, MlmeEvent, MlmeRequest};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_FRAME_LEN: u32 = 64 * 1024;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on MLME transport: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize MLME body: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to deserialize MLME body for method {method}: {source}")]
    Deserialize {
        method: u32,
        #[source]
        source: serde_json::Error,
    },
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(u32),
    #[error("frame of {0} bytes is too short for a method code")]
    FrameTooShort(usize),
    #[error("method {0} is not a request")]
    NotARequest(u32),
}

fn frame(method: Method, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + body.len());
    buf.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
    buf.extend_from_slice(&method.code().to_le_bytes());
    buf.extend_from_slice(body);
    buf
}

pub fn encode_request(req: &MlmeRequest) -> Result<Vec<u8>, Error> {
    let body = match req {
        MlmeRequest::Scan(r) => serde_json::to_vec(r),
        MlmeRequest::Join(r) => serde_json::to_vec(r),
        MlmeRequest::Authenticate(r) => serde_json::to_vec(r),
        MlmeRequest::Associate(r) => serde_json::to_vec(r),
        MlmeRequest::Deauthenticate(r) => serde_json::to_vec(r),
        MlmeRequest::Start(r) => serde_json::to_vec(r),
        MlmeRequest::Eapol(r) => serde_json::to_vec(r),
    }
    .map_err(Error::Serialize)?;
    Ok(frame(req.method(), &body))
}

pub fn encode_event(event: &MlmeEvent) -> Result<Vec<u8>, Error> {
    let (method, body) = match event {
        MlmeEvent::Scan(r) => (Method::ScanResponse, serde_json::to_vec(r)),
        MlmeEvent::Join(r) => (Method::JoinResponse, serde_json::to_vec(r)),
        MlmeEvent::Authenticate(r) => (Method::AuthenticateResponse, serde_json::to_vec(r)),
        MlmeEvent::Associate(r) => (Method::AssociateResponse, serde_json::to_vec(r)),
        MlmeEvent::Deauthenticate(r) => (Method::DeauthenticateResponse, serde_json::to_vec(r)),
        MlmeEvent::DeauthenticateInd(r) => {
            (Method::DeauthenticateIndication, serde_json::to_vec(r))
        }
        MlmeEvent::DisassociateInd(r) => (Method::DisassociateIndication, serde_json::to_vec(r)),
        MlmeEvent::Start(r) => (Method::StartResponse, serde_json::to_vec(r)),
        MlmeEvent::SignalReport(r) => (Method::SignalReportIndication, serde_json::to_vec(r)),
        MlmeEvent::Eapol(r) => (Method::EapolResponse, serde_json::to_vec(r)),
        MlmeEvent::EapolInd(r) => (Method::EapolIndication, serde_json::to_vec(r)),
        MlmeEvent::Unknown { method } => {
            let mut buf = Vec::with_capacity(8);
            buf.extend_from_slice(&4u32.to_le_bytes());
            buf.extend_from_slice(&method.to_le_bytes());
            return Ok(buf);
        }
    };
    Ok(frame(method, &body.map_err(Error::Serialize)?))
}

fn parse<'a, T: serde::Deserialize<'a>>(method: u32, body: &'a [u8]) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|source| Error::Deserialize { method, source })
}

/// Decodes an inbound body by method code. Unknown codes, including codes of
/// outbound requests, surface as `MlmeEvent::Unknown`.
pub fn decode_event(method: u32, body: &[u8]) -> Result<MlmeEvent, Error> {
    let event = match Method::from_code(method) {
        Some(Method::ScanResponse) => MlmeEvent::Scan(parse(method, body)?),
        Some(Method::JoinResponse) => MlmeEvent::Join(parse(method, body)?),
        Some(Method::AuthenticateResponse) => MlmeEvent::Authenticate(parse(method, body)?),
        Some(Method::AssociateResponse) => MlmeEvent::Associate(parse(method, body)?),
        Some(Method::DeauthenticateResponse) => MlmeEvent::Deauthenticate(parse(method, body)?),
        Some(Method::DeauthenticateIndication) => {
            MlmeEvent::DeauthenticateInd(parse(method, body)?)
        }
        Some(Method::DisassociateIndication) => MlmeEvent::DisassociateInd(parse(method, body)?),
        Some(Method::StartResponse) => MlmeEvent::Start(parse(method, body)?),
        Some(Method::SignalReportIndication) => MlmeEvent::SignalReport(parse(method, body)?),
        Some(Method::EapolResponse) => MlmeEvent::Eapol(parse(method, body)?),
        Some(Method::EapolIndication) => MlmeEvent::EapolInd(parse(method, body)?),
        Some(_) | None => MlmeEvent::Unknown { method },
    };
    Ok(event)
}

/// Decodes an outbound body by method code; the driver side of the codec.
pub fn decode_request(method: u32, body: &[u8]) -> Result<MlmeRequest, Error> {
    let req = match Method::from_code(method) {
        Some(Method::ScanRequest) => MlmeRequest::Scan(parse(method, body)?),
        Some(Method::JoinRequest) => MlmeRequest::Join(parse(method, body)?),
        Some(Method::AuthenticateRequest) => MlmeRequest::Authenticate(parse(method, body)?),
        Some(Method::AssociateRequest) => MlmeRequest::Associate(parse(method, body)?),
        Some(Method::DeauthenticateRequest) => {
            MlmeRequest::Deauthenticate(parse(method, body)?)
        }
        Some(Method::StartRequest) => MlmeRequest::Start(parse(method, body)?),
        Some(Method::EapolRequest) => MlmeRequest::Eapol(parse(method, body)?),
        Some(_) | None => return Err(Error::NotARequest(method)),
    };
    Ok(req)
}

/// Splits an already-read frame into its method code and body.
pub fn split_frame(frame: &[u8]) -> Result<(u32, &[u8]), Error> {
    if frame.len() < 8 {
        return Err(Error::FrameTooShort(frame.len()));
    }
    let method = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
    Ok((method, &frame[8..]))
}

/// Reads one frame. Returns `None` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<(u32, Vec<u8>)>, Error>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(Error::FrameTooLarge(len));
    }
    if len < 4 {
        return Err(Error::FrameTooShort(len as usize));
    }
    let mut buf = vec![0; len as usize];
    reader.read_exact(&mut buf).await?;
    let method = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    Ok(Some((method, buf.split_off(4))))
}

pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use super::*;
    use wlan_common::assert_variant;
    use wlan_common::mac::BCAST_ADDR;

    fn scan_request() -> MlmeRequest {
        MlmeRequest::Scan(ScanRequest {
            bss_type: BssType::Infrastructure,
            bssid: BCAST_ADDR,
            ssid: "testnet".to_string(),
            scan_type: ScanType::Passive,
            channel_list: vec![1, 6, 11],
            min_channel_time: 100,
            max_channel_time: 300,
        })
    }

    #[test]
    fn test_request_round_trip() {
        let req = scan_request();
        let frame = encode_request(&req).expect("failed to encode request");
        let (method, body) = split_frame(&frame).expect("failed to split frame");
        assert_eq!(method, Method::ScanRequest.code());
        let decoded = decode_request(method, body).expect("failed to decode request");
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_event_round_trip() {
        let event = MlmeEvent::Join(JoinResponse { result_code: JoinResultCode::Success });
        let frame = encode_event(&event).expect("failed to encode event");
        let (method, body) = split_frame(&frame).expect("failed to split frame");
        assert_eq!(method, Method::JoinResponse.code());
        let decoded = decode_event(method, body).expect("failed to decode event");
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_unknown_method_surfaces() {
        let event = decode_event(0xDEAD, b"{}").expect("unknown codes must decode");
        assert_eq!(event, MlmeEvent::Unknown { method: 0xDEAD });
        // A request code is not an inbound event either.
        let event = decode_event(Method::ScanRequest.code(), b"{}").expect("decode failed");
        assert_eq!(event, MlmeEvent::Unknown { method: Method::ScanRequest.code() });
    }

    #[test]
    fn test_decode_request_rejects_events() {
        let err = decode_request(Method::ScanResponse.code(), b"{}").unwrap_err();
        assert_variant!(err, Error::NotARequest(2));
    }

    #[test]
    fn test_malformed_body() {
        let err = decode_event(Method::JoinResponse.code(), b"not json").unwrap_err();
        assert_variant!(err, Error::Deserialize { method: 4, .. });
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let (mut tx, mut rx) = tokio::io::duplex(1024);
        let frame = encode_request(&scan_request()).expect("failed to encode request");
        write_frame(&mut tx, &frame).await.expect("failed to write frame");
        drop(tx);

        let (method, body) =
            read_frame(&mut rx).await.expect("failed to read frame").expect("missing frame");
        assert_eq!(method, Method::ScanRequest.code());
        assert_eq!(
            decode_request(method, &body).expect("failed to decode request"),
            scan_request()
        );
        assert!(read_frame(&mut rx).await.expect("clean EOF expected").is_none());
    }
}
