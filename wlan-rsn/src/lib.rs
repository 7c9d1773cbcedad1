// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod fourway;
mod prf;
pub mod psk;
mod ptk;

pub use self::fourway::{MessageNumber, Supplicant, SupplicantConfig};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("passphrase must be between 8 and 63 characters, got {0}")]
    InvalidPassphraseLen(usize),
    #[error("passphrase contains an invalid character: {0:#04x}")]
    InvalidPassphraseChar(u8),
    #[error("negotiated AKM has no defined MIC size")]
    NoAkmMicBytes,
    #[error("unexpected message of the four-way handshake: {0:?}")]
    Unexpected4WayHandshakeMessage(MessageNumber),
    #[error("invalid MIC on message 3 of the four-way handshake")]
    InvalidMic,
    #[error("message 3 of the handshake must request key installation")]
    InvalidInstallBit,
    #[error("nonce mismatch between message 1 and message 3")]
    NonceMismatch,
    #[error("key replay counter did not advance: got {got}, last seen {last}")]
    InvalidKeyReplayCounter { got: u64, last: u64 },
    #[error("failed to send EAPOL frame: {0}")]
    Transport(String),
}

/// Send path for EAPOL frames produced by a key exchange. The station binds
/// this to its MLME request sink.
pub trait EapolTransport: Send {
    fn send_eapol(&mut self, frame: Vec<u8>) -> Result<(), Error>;
}
