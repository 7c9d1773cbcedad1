// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::Error;
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

pub type Psk = [u8; 32];

/// Computes the pairwise master key from a passphrase and SSID.
/// IEEE 802.11-2016, J.4.1
pub fn compute(passphrase: &[u8], ssid: &str) -> Result<Psk, Error> {
    // IEEE 802.11-2016, J.4.1 limits passphrases to 8-63 printable ASCII
    // characters.
    if passphrase.len() < 8 || passphrase.len() > 63 {
        return Err(Error::InvalidPassphraseLen(passphrase.len()));
    }
    if let Some(c) = passphrase.iter().find(|&&c| c < 32 || c > 126) {
        return Err(Error::InvalidPassphraseChar(*c));
    }

    let mut psk: Psk = [0; 32];
    pbkdf2_hmac::<Sha1>(passphrase, ssid.as_bytes(), 4096, &mut psk);
    Ok(psk)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    // Test vectors from IEEE 802.11-2016, J.4.2.

    #[test]
    fn test_psk_computation_1() {
        let psk = compute(b"password", "IEEE").expect("computing PSK failed");
        let expected =
            from_hex("f42c6fc52df0ebef9ebb4b90b38a5f902e83fe1b135a70e23aed762e9710a12e");
        assert_eq!(&psk[..], &expected[..]);
    }

    #[test]
    fn test_psk_computation_2() {
        let psk = compute(b"ThisIsAPassword", "ThisIsASSID").expect("computing PSK failed");
        let expected =
            from_hex("0dc0d6eb90555ed6419756b9a15ec3e3209b63df707dd508d14581f8982721af");
        assert_eq!(&psk[..], &expected[..]);
    }

    #[test]
    fn test_boundary_lengths_accepted() {
        compute(&[b'a'; 8], "ssid").expect("8 character passphrase is valid");
        compute(&[b'a'; 63], &"Z".repeat(32)).expect("63 character passphrase is valid");
    }

    #[test]
    fn test_psk_too_short() {
        assert_eq!(compute(b"short", "ssid"), Err(Error::InvalidPassphraseLen(5)));
    }

    #[test]
    fn test_psk_too_long() {
        assert_eq!(compute(&[b'a'; 64], "ssid"), Err(Error::InvalidPassphraseLen(64)));
    }

    #[test]
    fn test_psk_invalid_character() {
        assert_eq!(compute(b"pass\nphrase", "ssid"), Err(Error::InvalidPassphraseChar(b'\n')));
    }
}
