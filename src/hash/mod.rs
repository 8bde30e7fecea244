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

//! MurmurHash3 128-bit (x64) primitive shared by the theta and HLL sketches.

mod murmurhash;

pub(crate) use murmurhash::MurmurHash3X64128;

/// Default update seed used across sketch families unless the caller picks
/// their own. Sketches built with different seeds can never be unioned or
/// intersected together, since their hash spaces are incomparable.
pub(crate) const DEFAULT_UPDATE_SEED: u64 = 9001;

/// Hashes `seed` itself to produce a short fingerprint stored alongside
/// every sketch, so two sketches built with different seeds are rejected
/// at set-operation time instead of silently comparing unrelated hash
/// spaces.
///
/// Mirrors the upstream algorithm: hash the little-endian bytes of `seed`
/// with seed `0`, and keep the low 16 bits of the first 64-bit lane.
pub(crate) fn compute_seed_hash(seed: u64) -> u16 {
    let (h0, _h1) = mur3::murmurhash3_x64_128(&seed.to_le_bytes(), 0);
    (h0 & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_hash_is_deterministic() {
        assert_eq!(compute_seed_hash(DEFAULT_UPDATE_SEED), compute_seed_hash(DEFAULT_UPDATE_SEED));
    }

    #[test]
    fn seed_hash_differs_across_seeds() {
        assert_ne!(compute_seed_hash(1), compute_seed_hash(2));
    }
}
