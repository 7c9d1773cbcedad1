// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::organization::Oui;

/// IEEE 802.11-2016, 9.4.2.25.2
pub const OUI: Oui = Oui::DOT11;

pub trait Factory {
    type Suite;

    fn new(oui: Oui, suite_type: u8) -> Self::Suite;
}
