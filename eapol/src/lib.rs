// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod frame;

pub use self::frame::{
    Header, KeyFrame, KeyInformation, PacketType, KEY_DESCRIPTOR_IEEE_802DOT11, PROTOCOL_VERSION,
};

use log::{debug, warn};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("EAPOL frame truncated: got {got} bytes, need at least {need}")]
    FrameTruncated { got: usize, need: usize },
    #[error("unknown EAPOL packet type {0}")]
    UnknownPacketType(u8),
    #[error("unknown EAPOL key descriptor type {0}")]
    UnknownKeyDescriptor(u8),
}

/// A key exchange driven by EAPOL key frames, e.g. the four-way handshake.
pub trait KeyExchange: Send {
    fn on_eapol_key_frame(&mut self, frame: &KeyFrame) -> Result<(), anyhow::Error>;
}

pub struct Config {
    /// MIC size in bits of the negotiated AKM.
    pub mic_size: u16,
    pub key_exchange: Box<dyn KeyExchange>,
}

/// Parses inbound EAPOL frames and feeds key frames into the configured key
/// exchange. Owns no keys itself.
pub struct Client {
    mic_size: u16,
    key_exchange: Box<dyn KeyExchange>,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Client { mic_size: config.mic_size, key_exchange: config.key_exchange }
    }

    pub fn handle_frame(&mut self, data: &[u8]) {
        let header = match Header::from_bytes(data) {
            Ok(header) => header,
            Err(e) => {
                warn!("dropping malformed EAPOL frame: {}", e);
                return;
            }
        };
        match header.packet_type {
            PacketType::Key => match KeyFrame::from_bytes(data, self.mic_size) {
                Ok(frame) => {
                    if let Err(e) = self.key_exchange.on_eapol_key_frame(&frame) {
                        warn!("error processing EAPOL key frame: {}", e);
                    }
                }
                Err(e) => warn!("dropping malformed EAPOL key frame: {}", e),
            },
            other => debug!("ignoring EAPOL packet type {:?}", other),
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("mic_size", &self.mic_size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingExchange {
        frames: Arc<Mutex<Vec<KeyFrame>>>,
    }

    impl KeyExchange for RecordingExchange {
        fn on_eapol_key_frame(&mut self, frame: &KeyFrame) -> Result<(), anyhow::Error> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    fn test_client() -> (Client, Arc<Mutex<Vec<KeyFrame>>>) {
        let frames = Arc::new(Mutex::new(vec![]));
        let client = Client::new(Config {
            mic_size: 128,
            key_exchange: Box::new(RecordingExchange { frames: frames.clone() }),
        });
        (client, frames)
    }

    #[test]
    fn test_key_frame_forwarded() {
        let (mut client, frames) = test_client();
        let mut frame = KeyFrame::new(128);
        frame.key_replay_counter = 7;
        client.handle_frame(&frame.to_bytes());
        let seen = frames.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].key_replay_counter, 7);
    }

    #[test]
    fn test_non_key_frame_ignored() {
        let (mut client, frames) = test_client();
        // EAPOL-Start: version 1, type 1, empty body.
        client.handle_frame(&[0x01, 0x01, 0x00, 0x00]);
        assert!(frames.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_frame_dropped() {
        let (mut client, frames) = test_client();
        client.handle_frame(&[0x01]);
        client.handle_frame(&[0x01, 0x03, 0x00, 0x05, 0x02]);
        assert!(frames.lock().unwrap().is_empty());
    }
}
