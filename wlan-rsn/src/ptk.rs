// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::prf::prf;
use wlan_common::mac::MacAddr;

/// Pairwise transient key for a CCMP-128 association: 16 byte KCK, 16 byte
/// KEK and a 16 byte temporal key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ptk {
    bytes: Vec<u8>,
}

impl Ptk {
    pub fn kck(&self) -> &[u8] {
        &self.bytes[0..16]
    }

    pub fn kek(&self) -> &[u8] {
        &self.bytes[16..32]
    }

    pub fn tk(&self) -> &[u8] {
        &self.bytes[32..48]
    }
}

/// IEEE 802.11-2016, 12.7.1.3
pub fn derive(
    pmk: &[u8],
    a_addr: &MacAddr,
    s_addr: &MacAddr,
    anonce: &[u8; 32],
    snonce: &[u8; 32],
) -> Ptk {
    let mut data = Vec::with_capacity(2 * 6 + 2 * 32);
    data.extend_from_slice(&a_addr.min(s_addr)[..]);
    data.extend_from_slice(&a_addr.max(s_addr)[..]);
    data.extend_from_slice(&anonce.min(snonce)[..]);
    data.extend_from_slice(&anonce.max(snonce)[..]);
    Ptk { bytes: prf(pmk, "Pairwise key expansion", &data, 384) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A_ADDR: MacAddr = [0x1E, 0x52, 0x6E, 0x7A, 0x29, 0x63];
    const S_ADDR: MacAddr = [0x64, 0x0E, 0x36, 0x70, 0x4D, 0xE2];

    #[test]
    fn test_key_layout() {
        let ptk = derive(&[0xAB; 32], &A_ADDR, &S_ADDR, &[0x11; 32], &[0x22; 32]);
        assert_eq!(ptk.kck().len(), 16);
        assert_eq!(ptk.kek().len(), 16);
        assert_eq!(ptk.tk().len(), 16);
        assert_ne!(ptk.kck(), ptk.kek());
        assert_ne!(ptk.kek(), ptk.tk());
    }

    #[test]
    fn test_address_order_independent() {
        // The PRF input orders addresses and nonces numerically, so both
        // peers derive the same PTK.
        let a = derive(&[0xAB; 32], &A_ADDR, &S_ADDR, &[0x11; 32], &[0x22; 32]);
        let b = derive(&[0xAB; 32], &S_ADDR, &A_ADDR, &[0x22; 32], &[0x11; 32]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_nonces_change_key() {
        let a = derive(&[0xAB; 32], &A_ADDR, &S_ADDR, &[0x11; 32], &[0x22; 32]);
        let b = derive(&[0xAB; 32], &A_ADDR, &S_ADDR, &[0x11; 32], &[0x23; 32]);
        assert_ne!(a, b);
    }
}
