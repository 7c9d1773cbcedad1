// Copyright 2021 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Asserts that an expression matches a pattern, and optionally evaluates a
/// block with the pattern's bindings in scope.
#[macro_export]
macro_rules! assert_variant {
    ($expr:expr, $pat:pat $(if $guard:expr)?) => {
        match $expr {
            $pat $(if $guard)? => {}
            other => panic!("unexpected variant: {:?}", other),
        }
    };
    ($expr:expr, $pat:pat $(if $guard:expr)? => $then:expr) => {
        match $expr {
            $pat $(if $guard)? => $then,
            other => panic!("unexpected variant: {:?}", other),
        }
    };
}
