// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Quantile sketches over doubles: a bounded-error rank/quantile summary
//! built on the Agarwal-Mishra-Munro buffer-compactor scheme.
//!
//! # Overview
//!
//! An update sequence is accumulated in an unsorted base buffer of `2k`
//! doubles. Once the buffer fills, it is sorted and *compacted* into a
//! bitmap-addressed stack of levels, each holding exactly `2k` items that
//! collectively represent a weighted sample of the whole stream seen so
//! far. Every compaction randomly discards every other item (with an
//! independently chosen odd/even parity), which is the source of the
//! scheme's `O(1/k)` rank error bound.
//!
//! - [`HeapDoublesSketch`]: the general-purpose, heap-allocated form.
//! - [`DirectDoublesSketch`]: operates in place over a caller-supplied
//!   byte region (see [`crate::memory`]).
//! - [`CompactDoublesSketch`]: an immutable, space-trimmed form produced
//!   by [`HeapDoublesSketch::compact`] / [`DirectDoublesSketch::compact`],
//!   suitable for serialization or as a merge source.

mod compact;
mod core;
mod direct;
mod heap;
mod serialization;

pub use compact::CompactDoublesSketch;
pub use direct::DirectDoublesSketch;
pub use heap::HeapDoublesSketch;
pub use heap::QuantilesSketchBuilder;

/// Smallest supported value of `k`.
pub const MIN_K: u16 = 2;
/// Largest supported value of `k`.
pub const MAX_K: u16 = 32768;
/// Default `k`, matching the teacher's default rank-error/space tradeoff.
pub const DEFAULT_K: u16 = 128;

pub(crate) fn validate_k(k: u16) -> Result<(), crate::error::Error> {
    if !(MIN_K..=MAX_K).contains(&k) || !k.is_power_of_two() {
        return Err(crate::error::Error::invalid_argument(format!(
            "k must be a power of two in [{MIN_K}, {MAX_K}], got {k}"
        )));
    }
    Ok(())
}

/// A value in [0, 1] addressing a normalized rank or a CDF/PMF query
/// point. Shared validation for `get_quantile`/`get_cdf`/`get_pmf`.
pub(crate) fn validate_phi(phi: f64) -> Result<(), crate::error::Error> {
    if !(0.0..=1.0).contains(&phi) || phi.is_nan() {
        return Err(crate::error::Error::invalid_argument(format!(
            "phi must be in [0.0, 1.0], got {phi}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_splits(splits: &[f64]) -> Result<(), crate::error::Error> {
    if splits.is_empty() {
        return Err(crate::error::Error::invalid_argument(
            "splits must be non-empty",
        ));
    }
    for pair in splits.windows(2) {
        if !(pair[0] < pair[1]) {
            return Err(crate::error::Error::invalid_argument(
                "splits must be finite and strictly increasing",
            ));
        }
    }
    if splits.iter().any(|v| !v.is_finite()) {
        return Err(crate::error::Error::invalid_argument(
            "splits must be finite and strictly increasing",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_k_rejects_non_power_of_two() {
        assert!(validate_k(100).is_err());
        assert!(validate_k(128).is_ok());
    }

    #[test]
    fn validate_k_rejects_out_of_range() {
        assert!(validate_k(1).is_err());
        assert!(validate_k(65536).is_err());
    }

    #[test]
    fn validate_splits_rejects_non_increasing() {
        assert!(validate_splits(&[1.0, 1.0]).is_err());
        assert!(validate_splits(&[2.0, 1.0]).is_err());
        assert!(validate_splits(&[1.0, 2.0]).is_ok());
    }
}
