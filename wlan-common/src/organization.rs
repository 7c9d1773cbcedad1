// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::ops::Deref;

/// Organizationally Unique Identifier, the vendor prefix of suite selectors
/// and vendor-specific information elements.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oui([u8; 3]);

impl Oui {
    /// IEEE 802.11 default OUI. IEEE 802.11-2016, 9.4.2.25.2
    pub const DOT11: Self = Self([0x00, 0x0F, 0xAC]);

    pub const fn new(oui: [u8; 3]) -> Self {
        Self(oui)
    }
}

impl Deref for Oui {
    type Target = [u8; 3];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for Oui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}-{:02X}-{:02X}", self.0[0], self.0[1], self.0[2])
    }
}
