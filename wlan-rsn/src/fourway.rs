// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::psk::{self, Psk};
use crate::ptk::{self, Ptk};
use crate::{EapolTransport, Error};

use eapol::{KeyExchange, KeyFrame};
use hmac::{Hmac, Mac};
use log::{debug, info, warn};
use rand::RngCore;
use sha1::Sha1;
use wlan_common::ie::rsn::rsne::Rsne;
use wlan_common::mac::MacAddr;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageNumber {
    Message1 = 1,
    Message2 = 2,
    Message3 = 3,
    Message4 = 4,
}

// IEEE 802.11-2016, 12.7.6: the message is identified by the Key Ack, Key
// MIC and Install bits of the key information field.
fn message_number(frame: &KeyFrame) -> MessageNumber {
    match (frame.key_info.key_ack(), frame.key_info.key_mic()) {
        (true, false) => MessageNumber::Message1,
        (true, true) => MessageNumber::Message3,
        (false, true) if !frame.key_data.is_empty() => MessageNumber::Message2,
        (false, _) => MessageNumber::Message4,
    }
}

pub struct SupplicantConfig {
    pub transport: Box<dyn EapolTransport>,
    pub pass_phrase: String,
    pub ssid: String,
    pub peer_addr: MacAddr,
    pub sta_addr: MacAddr,
    pub assoc_rsne: Rsne,
    pub beacon_rsne: Rsne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingMsg1,
    AwaitingMsg3,
    Established,
}

/// Station side of the four-way handshake: answers messages 1 and 3 of the
/// authenticator and derives the PTK. Keys never leave this object.
pub struct Supplicant {
    transport: Box<dyn EapolTransport>,
    pmk: Psk,
    sta_addr: MacAddr,
    peer_addr: MacAddr,
    assoc_rsne_bytes: Vec<u8>,
    mic_size: u16,
    state: State,
    snonce: [u8; 32],
    anonce: [u8; 32],
    ptk: Option<Ptk>,
    last_key_replay_counter: u64,
}

impl Supplicant {
    /// Derives the PMK from the configured credentials and prepares the
    /// handshake. Fails if the passphrase is rejected or the negotiated AKM
    /// defines no MIC size.
    pub fn new(cfg: SupplicantConfig) -> Result<Supplicant, Error> {
        let mic_bytes = cfg
            .assoc_rsne
            .akm_suites
            .first()
            .and_then(|akm| akm.mic_bytes())
            .ok_or(Error::NoAkmMicBytes)?;
        let pmk = psk::compute(cfg.pass_phrase.as_bytes(), &cfg.ssid)?;

        let subset_of_beacon = cfg
            .assoc_rsne
            .pairwise_cipher_suites
            .iter()
            .all(|c| cfg.beacon_rsne.pairwise_cipher_suites.contains(c))
            && cfg
                .assoc_rsne
                .akm_suites
                .iter()
                .all(|a| cfg.beacon_rsne.akm_suites.contains(a));
        if !subset_of_beacon {
            warn!("association RSNE is not a subset of the beacon RSNE");
        }

        Ok(Supplicant {
            transport: cfg.transport,
            pmk,
            sta_addr: cfg.sta_addr,
            peer_addr: cfg.peer_addr,
            assoc_rsne_bytes: cfg.assoc_rsne.to_bytes(),
            mic_size: mic_bytes * 8,
            state: State::AwaitingMsg1,
            snonce: [0; 32],
            anonce: [0; 32],
            ptk: None,
            last_key_replay_counter: 0,
        })
    }

    pub fn mic_size(&self) -> u16 {
        self.mic_size
    }

    pub fn is_established(&self) -> bool {
        self.state == State::Established
    }

    // IEEE 802.11-2016, 12.7.6.2
    fn on_message_1(&mut self, frame: &KeyFrame) -> Result<(), Error> {
        if frame.key_info.install() {
            return Err(Error::Unexpected4WayHandshakeMessage(MessageNumber::Message1));
        }

        // An authenticator may restart the exchange at any time; a fresh
        // SNonce is drawn for every message 1.
        self.anonce = frame.key_nonce;
        rand::thread_rng().fill_bytes(&mut self.snonce);
        let ptk =
            ptk::derive(&self.pmk, &self.peer_addr, &self.sta_addr, &self.anonce, &self.snonce);

        let mut reply = KeyFrame::new(self.mic_size);
        reply.key_info.set_key_descriptor_version(frame.key_info.key_descriptor_version());
        reply.key_info.set_key_type_pairwise(true);
        reply.key_info.set_key_mic(true);
        reply.key_replay_counter = frame.key_replay_counter;
        reply.key_nonce = self.snonce;
        reply.key_data = self.assoc_rsne_bytes.clone();
        self.transport.send_eapol(seal(reply, ptk.kck(), self.mic_size))?;

        self.last_key_replay_counter = frame.key_replay_counter;
        self.ptk = Some(ptk);
        self.state = State::AwaitingMsg3;
        Ok(())
    }

    // IEEE 802.11-2016, 12.7.6.4
    fn on_message_3(&mut self, frame: &KeyFrame) -> Result<(), Error> {
        let ptk = match self.ptk.as_ref() {
            Some(ptk) => ptk,
            None => {
                return Err(Error::Unexpected4WayHandshakeMessage(MessageNumber::Message3))
            }
        };
        if frame.key_replay_counter <= self.last_key_replay_counter {
            return Err(Error::InvalidKeyReplayCounter {
                got: frame.key_replay_counter,
                last: self.last_key_replay_counter,
            });
        }
        if !frame.key_info.install() {
            return Err(Error::InvalidInstallBit);
        }
        if frame.key_nonce != self.anonce {
            return Err(Error::NonceMismatch);
        }

        let mut unsigned = frame.clone();
        unsigned.key_mic = vec![0; usize::from(self.mic_size / 8)];
        let expected = compute_mic(ptk.kck(), &unsigned.to_bytes(), self.mic_size);
        if expected != frame.key_mic {
            return Err(Error::InvalidMic);
        }

        let mut reply = KeyFrame::new(self.mic_size);
        reply.key_info.set_key_descriptor_version(frame.key_info.key_descriptor_version());
        reply.key_info.set_key_type_pairwise(true);
        reply.key_info.set_key_mic(true);
        reply.key_info.set_secure(true);
        reply.key_replay_counter = frame.key_replay_counter;
        let kck = ptk.kck().to_vec();
        self.transport.send_eapol(seal(reply, &kck, self.mic_size))?;

        self.last_key_replay_counter = frame.key_replay_counter;
        // TODO: unwrap the GTK from the message 3 key data once a key
        // installation path to the MLME exists.
        self.state = State::Established;
        info!("four-way handshake complete");
        Ok(())
    }
}

impl KeyExchange for Supplicant {
    fn on_eapol_key_frame(&mut self, frame: &KeyFrame) -> Result<(), anyhow::Error> {
        if !frame.key_info.key_type_pairwise() {
            debug!("ignoring group key frame");
            return Ok(());
        }
        match message_number(frame) {
            MessageNumber::Message1 => self.on_message_1(frame)?,
            MessageNumber::Message3 => self.on_message_3(frame)?,
            other => return Err(Error::Unexpected4WayHandshakeMessage(other).into()),
        }
        Ok(())
    }
}

/// MICs the frame with the KCK and returns its wire representation.
/// IEEE 802.11-2016, 12.7.2 b) 2): HMAC-SHA-1-128 over the frame with a
/// zeroed MIC field.
fn seal(mut frame: KeyFrame, kck: &[u8], mic_size: u16) -> Vec<u8> {
    frame.key_mic = vec![0; usize::from(mic_size / 8)];
    let mic = compute_mic(kck, &frame.to_bytes(), mic_size);
    frame.key_mic = mic;
    frame.to_bytes()
}

fn compute_mic(kck: &[u8], frame_bytes: &[u8], mic_size: u16) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(kck).expect("HMAC accepts keys of any length");
    mac.update(frame_bytes);
    let mut mic = mac.finalize().into_bytes().to_vec();
    mic.truncate(usize::from(mic_size / 8));
    mic
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wlan_common::ie::rsn::akm::AKM_PSK;
    use wlan_common::ie::rsn::cipher::CIPHER_CCMP_128;

    const STA_ADDR: MacAddr = [0x64, 0x0E, 0x36, 0x70, 0x4D, 0xE2];
    const AP_ADDR: MacAddr = [0x1E, 0x52, 0x6E, 0x7A, 0x29, 0x63];
    const SSID: &str = "wpa2net";
    const PASSPHRASE: &str = "abcdefgh";

    #[derive(Clone)]
    struct SharedTransport {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl EapolTransport for SharedTransport {
        fn send_eapol(&mut self, frame: Vec<u8>) -> Result<(), Error> {
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    fn beacon_rsne() -> Rsne {
        Rsne {
            group_data_cipher_suite: Some(CIPHER_CCMP_128),
            pairwise_cipher_suites: vec![CIPHER_CCMP_128],
            akm_suites: vec![AKM_PSK],
            rsn_capabilities: Some(0),
            ..Default::default()
        }
    }

    fn test_supplicant() -> (Supplicant, Arc<Mutex<Vec<Vec<u8>>>>) {
        let frames = Arc::new(Mutex::new(vec![]));
        let beacon = beacon_rsne();
        let supplicant = Supplicant::new(SupplicantConfig {
            transport: Box::new(SharedTransport { frames: frames.clone() }),
            pass_phrase: PASSPHRASE.to_string(),
            ssid: SSID.to_string(),
            peer_addr: AP_ADDR,
            sta_addr: STA_ADDR,
            assoc_rsne: beacon.derive_assoc_rsne().expect("failed to derive RSNE"),
            beacon_rsne: beacon,
        })
        .expect("failed to create supplicant");
        (supplicant, frames)
    }

    fn message_1(anonce: [u8; 32], replay: u64) -> KeyFrame {
        let mut frame = KeyFrame::new(128);
        frame.key_info.set_key_descriptor_version(2);
        frame.key_info.set_key_type_pairwise(true);
        frame.key_info.set_key_ack(true);
        frame.key_len = 16;
        frame.key_replay_counter = replay;
        frame.key_nonce = anonce;
        frame
    }

    fn message_3(anonce: [u8; 32], replay: u64, kck: &[u8]) -> KeyFrame {
        let mut frame = KeyFrame::new(128);
        frame.key_info.set_key_descriptor_version(2);
        frame.key_info.set_key_type_pairwise(true);
        frame.key_info.set_key_ack(true);
        frame.key_info.set_key_mic(true);
        frame.key_info.set_install(true);
        frame.key_info.set_secure(true);
        frame.key_len = 16;
        frame.key_replay_counter = replay;
        frame.key_nonce = anonce;
        let bytes = seal(frame, kck, 128);
        KeyFrame::from_bytes(&bytes, 128).expect("failed to re-parse message 3")
    }

    // Derives the authenticator's view of the PTK from message 2.
    fn authenticator_ptk(anonce: &[u8; 32], msg2: &KeyFrame) -> Ptk {
        let pmk = psk::compute(PASSPHRASE.as_bytes(), SSID).unwrap();
        ptk::derive(&pmk, &AP_ADDR, &STA_ADDR, anonce, &msg2.key_nonce)
    }

    fn pop_frame(frames: &Arc<Mutex<Vec<Vec<u8>>>>) -> KeyFrame {
        let mut frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        KeyFrame::from_bytes(&frames.pop().unwrap(), 128).expect("failed to parse sent frame")
    }

    #[test]
    fn test_full_handshake() {
        let (mut supplicant, frames) = test_supplicant();
        let anonce = [0x77; 32];

        supplicant
            .on_eapol_key_frame(&message_1(anonce, 1))
            .expect("failed to process message 1");
        let msg2 = pop_frame(&frames);
        assert_eq!(message_number(&msg2), MessageNumber::Message2);
        assert_eq!(msg2.key_replay_counter, 1);
        assert_ne!(msg2.key_nonce, [0; 32]);
        assert_eq!(msg2.key_data, beacon_rsne().derive_assoc_rsne().unwrap().to_bytes());

        // The authenticator derives the same PTK and accepts the MIC.
        let ptk = authenticator_ptk(&anonce, &msg2);
        let mut unsigned = msg2.clone();
        unsigned.key_mic = vec![0; 16];
        assert_eq!(compute_mic(ptk.kck(), &unsigned.to_bytes(), 128), msg2.key_mic);
        assert!(!supplicant.is_established());

        supplicant
            .on_eapol_key_frame(&message_3(anonce, 2, ptk.kck()))
            .expect("failed to process message 3");
        let msg4 = pop_frame(&frames);
        assert_eq!(message_number(&msg4), MessageNumber::Message4);
        assert_eq!(msg4.key_replay_counter, 2);
        assert!(msg4.key_info.secure());
        assert!(msg4.key_data.is_empty());
        let mut unsigned = msg4.clone();
        unsigned.key_mic = vec![0; 16];
        assert_eq!(compute_mic(ptk.kck(), &unsigned.to_bytes(), 128), msg4.key_mic);
        assert!(supplicant.is_established());
    }

    #[test]
    fn test_message_3_invalid_mic() {
        let (mut supplicant, frames) = test_supplicant();
        let anonce = [0x77; 32];
        supplicant
            .on_eapol_key_frame(&message_1(anonce, 1))
            .expect("failed to process message 1");
        pop_frame(&frames);

        let mut msg3 = message_3(anonce, 2, &[0xBB; 16]);
        msg3.key_mic = vec![0xEE; 16];
        let err = supplicant.on_eapol_key_frame(&msg3).unwrap_err();
        assert_eq!(err.downcast::<Error>().unwrap(), Error::InvalidMic);
        assert!(frames.lock().unwrap().is_empty());
        assert!(!supplicant.is_established());
    }

    #[test]
    fn test_message_3_nonce_mismatch() {
        let (mut supplicant, frames) = test_supplicant();
        let anonce = [0x77; 32];
        supplicant
            .on_eapol_key_frame(&message_1(anonce, 1))
            .expect("failed to process message 1");
        let msg2 = pop_frame(&frames);
        let ptk = authenticator_ptk(&anonce, &msg2);

        let err =
            supplicant.on_eapol_key_frame(&message_3([0x78; 32], 2, ptk.kck())).unwrap_err();
        assert_eq!(err.downcast::<Error>().unwrap(), Error::NonceMismatch);
        assert!(!supplicant.is_established());
    }

    #[test]
    fn test_message_3_replay_counter_must_advance() {
        let (mut supplicant, frames) = test_supplicant();
        let anonce = [0x77; 32];
        supplicant
            .on_eapol_key_frame(&message_1(anonce, 5))
            .expect("failed to process message 1");
        let msg2 = pop_frame(&frames);
        let ptk = authenticator_ptk(&anonce, &msg2);

        let err =
            supplicant.on_eapol_key_frame(&message_3(anonce, 5, ptk.kck())).unwrap_err();
        assert_eq!(
            err.downcast::<Error>().unwrap(),
            Error::InvalidKeyReplayCounter { got: 5, last: 5 }
        );
    }

    #[test]
    fn test_message_3_before_message_1() {
        let (mut supplicant, _frames) = test_supplicant();
        let err =
            supplicant.on_eapol_key_frame(&message_3([0x77; 32], 1, &[0xBB; 16])).unwrap_err();
        assert_eq!(
            err.downcast::<Error>().unwrap(),
            Error::Unexpected4WayHandshakeMessage(MessageNumber::Message3)
        );
    }

    #[test]
    fn test_group_key_frame_ignored() {
        let (mut supplicant, frames) = test_supplicant();
        let mut frame = KeyFrame::new(128);
        frame.key_info.set_key_ack(true);
        supplicant.on_eapol_key_frame(&frame).expect("group frames are ignored");
        assert!(frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bad_passphrase_rejected() {
        let beacon = beacon_rsne();
        let result = Supplicant::new(SupplicantConfig {
            transport: Box::new(SharedTransport { frames: Arc::new(Mutex::new(vec![])) }),
            pass_phrase: "short".to_string(),
            ssid: SSID.to_string(),
            peer_addr: AP_ADDR,
            sta_addr: STA_ADDR,
            assoc_rsne: beacon.derive_assoc_rsne().expect("failed to derive RSNE"),
            beacon_rsne: beacon,
        });
        assert!(matches!(result, Err(Error::InvalidPassphraseLen(5))));
    }
}
