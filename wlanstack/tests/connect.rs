// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! End-to-end exercise of the driver loop over its channels: connect to a
//! WPA2 network, answer message 1 of the four-way handshake, then
//! disconnect.

use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use wlan_common::assert_variant;
use wlan_common::ie::rsn::akm::AKM_PSK;
use wlan_common::ie::rsn::cipher::CIPHER_CCMP_128;
use wlan_common::ie::rsn::rsne::Rsne;
use wlan_common::mac::MacAddr;
use wlanstack::client::{self, Client, Command, Context, MlmeSink};
use wlanstack::config::Config;
use wlanstack::mlme::{self, codec, MlmeEvent, MlmeRequest};

const STA_ADDR: MacAddr = [0x64, 0x0E, 0x36, 0x70, 0x4D, 0xE2];
const AP_ADDR: MacAddr = [0x1E, 0x52, 0x6E, 0x7A, 0x29, 0x63];

async fn next_request(frames: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> MlmeRequest {
    let frame = timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("timed out waiting for an MLME request")
        .expect("MLME frame channel closed");
    let (method, body) = codec::split_frame(&frame).expect("bad frame");
    codec::decode_request(method, body).expect("failed to decode request")
}

fn wpa2_bss() -> mlme::BssDescription {
    let rsne = Rsne {
        group_data_cipher_suite: Some(CIPHER_CCMP_128),
        pairwise_cipher_suites: vec![CIPHER_CCMP_128],
        akm_suites: vec![AKM_PSK],
        rsn_capabilities: Some(0),
        ..Default::default()
    };
    mlme::BssDescription {
        bssid: AP_ADDR,
        ssid: "wpa2net".to_string(),
        bss_type: mlme::BssType::Infrastructure,
        beacon_period: 100,
        dtim_period: 1,
        channel: 6,
        rssi_dbm: -40,
        rsne: Some(rsne.to_bytes()),
    }
}

#[tokio::test]
async fn wpa2_connect_handshake_and_disconnect() {
    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(1);

    let ctx = Context::new(STA_ADDR, None, None, MlmeSink::new(frame_tx));
    let server = tokio::spawn(client::serve(Client::new(ctx), cmd_rx, event_rx));

    // Connect: set the scan config; the periodic scan starts immediately.
    let (responder, receiver) = oneshot::channel();
    let cfg = Config {
        ssid: "wpa2net".to_string(),
        bssid: None,
        password: Some("abcdefgh".to_string()),
        scan_interval: None,
    };
    cmd_tx.send(Command::SetScanConfig(cfg, responder)).await.expect("client gone");
    assert_eq!(receiver.await.expect("no reply"), Ok(()));

    let req = assert_variant!(next_request(&mut frames).await, MlmeRequest::Scan(req) => req);
    assert_eq!(req.ssid, "wpa2net");
    event_tx
        .send(MlmeEvent::Scan(mlme::ScanResponse {
            result_code: mlme::ScanResultCode::Success,
            bss_description_set: vec![wpa2_bss()],
        }))
        .expect("client gone");

    assert_variant!(next_request(&mut frames).await, MlmeRequest::Join(_));
    event_tx
        .send(MlmeEvent::Join(mlme::JoinResponse { result_code: mlme::JoinResultCode::Success }))
        .expect("client gone");

    assert_variant!(next_request(&mut frames).await, MlmeRequest::Authenticate(_));
    event_tx
        .send(MlmeEvent::Authenticate(mlme::AuthenticateResponse {
            peer_sta_address: AP_ADDR,
            result_code: mlme::AuthenticateResultCode::Success,
        }))
        .expect("client gone");

    let req = assert_variant!(next_request(&mut frames).await, MlmeRequest::Associate(req) => req);
    assert!(req.rsne.is_some());
    event_tx
        .send(MlmeEvent::Associate(mlme::AssociateResponse {
            result_code: mlme::AssociateResultCode::Success,
            association_id: 1,
        }))
        .expect("client gone");

    // Message 1 of the handshake comes in; the supplicant answers with
    // message 2 through the MLME send path.
    let mut msg1 = eapol::KeyFrame::new(128);
    msg1.key_info.set_key_descriptor_version(2);
    msg1.key_info.set_key_type_pairwise(true);
    msg1.key_info.set_key_ack(true);
    msg1.key_replay_counter = 1;
    msg1.key_nonce = [0x42; 32];
    event_tx
        .send(MlmeEvent::EapolInd(mlme::EapolIndication {
            src_addr: AP_ADDR,
            dst_addr: STA_ADDR,
            data: msg1.to_bytes(),
        }))
        .expect("client gone");

    let req = assert_variant!(next_request(&mut frames).await, MlmeRequest::Eapol(req) => req);
    assert_eq!(req.src_addr, STA_ADDR);
    assert_eq!(req.dst_addr, AP_ADDR);
    let msg2 = eapol::KeyFrame::from_bytes(&req.data, 128).expect("bad EAPOL frame");
    assert_eq!(msg2.key_replay_counter, 1);
    assert!(msg2.key_info.key_mic());
    assert_ne!(msg2.key_nonce, [0; 32]);

    // Operator disconnect: deauthenticate with reason 36, then back to an
    // idle scan state once the response arrives.
    let (responder, receiver) = oneshot::channel();
    cmd_tx.send(Command::Disconnect(responder)).await.expect("client gone");
    let req =
        assert_variant!(next_request(&mut frames).await, MlmeRequest::Deauthenticate(req) => req);
    assert_eq!(req.reason_code, 36);
    assert_eq!(receiver.await.expect("no reply"), Ok(()));
    event_tx
        .send(MlmeEvent::Deauthenticate(mlme::DeauthenticateResponse {
            peer_sta_address: AP_ADDR,
        }))
        .expect("client gone");

    // The config was cleared, so no new scan request may show up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(frames.try_recv().is_err(), "unexpected MLME request after disconnect");

    // Closing the MLME transport stops the loop cleanly.
    drop(event_tx);
    let result = timeout(Duration::from_secs(5), server)
        .await
        .expect("loop did not stop")
        .expect("loop panicked");
    assert!(result.is_ok(), "loop failed: {:?}", result);
}

#[tokio::test]
async fn operator_scan_without_config() {
    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(1);

    let ctx = Context::new(STA_ADDR, None, None, MlmeSink::new(frame_tx));
    let server = tokio::spawn(client::serve(Client::new(ctx), cmd_rx, event_rx));

    let (responder, receiver) = oneshot::channel();
    cmd_tx
        .send(Command::Scan(client::ScanParams { timeout: 3 }, responder))
        .await
        .expect("client gone");

    let req = assert_variant!(next_request(&mut frames).await, MlmeRequest::Scan(req) => req);
    assert_eq!(req.ssid, "");
    event_tx
        .send(MlmeEvent::Scan(mlme::ScanResponse {
            result_code: mlme::ScanResultCode::Success,
            bss_description_set: vec![wpa2_bss()],
        }))
        .expect("client gone");

    let aps = receiver.await.expect("no reply").expect("scan failed");
    assert_eq!(aps.len(), 1);
    assert_eq!(aps[0].ssid, "wpa2net");
    assert!(aps[0].is_secure);

    drop(event_tx);
    let result = timeout(Duration::from_secs(5), server)
        .await
        .expect("loop did not stop")
        .expect("loop panicked");
    assert!(result.is_ok(), "loop failed: {:?}", result);
}
