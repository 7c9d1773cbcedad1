// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// IEEE 802.11-2016, 12.7.1.2: PRF-n(K, A, B) based on HMAC-SHA-1.
pub fn prf(key: &[u8], label: &str, data: &[u8], bits: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(((bits + 159) / 160) * 20);
    let mut counter: u8 = 0;
    while out.len() * 8 < bits {
        let mut mac =
            HmacSha1::new_from_slice(key).expect("HMAC accepts keys of any length");
        mac.update(label.as_bytes());
        mac.update(&[0u8]);
        mac.update(data);
        mac.update(&[counter]);
        out.extend_from_slice(&mac.finalize().into_bytes());
        counter += 1;
    }
    out.truncate(bits / 8);
    out
}
