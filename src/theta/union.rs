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

//! Stateful union operator for Theta sketches.

use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::theta::CompactThetaSketch;
use crate::theta::ThetaSketchView;
use crate::theta::hash_table::DEFAULT_LG_K;
use crate::theta::hash_table::MAX_LG_K;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::MIN_LG_K;
use crate::theta::hash_table::ThetaHashTable;

/// Stateful union operator for Theta sketches.
///
/// Every [`update`](Self::update) folds another sketch's retained hashes
/// into the running union, keeping `theta = min(theta_so_far, theta_input)`
/// and dropping any already-retained hash that theta-screening now
/// excludes.
#[derive(Debug)]
pub struct ThetaUnion {
    table: ThetaHashTable,
}

impl ThetaUnion {
    /// Creates a new union operator with a gadget sized for `lg_max_k` and
    /// the given seed.
    ///
    /// # Panics
    ///
    /// Panics if `lg_max_k` is not in `[5, 26]`.
    pub fn new(lg_max_k: u8, seed: u64) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_max_k),
            "lg_max_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_max_k}"
        );
        Self {
            table: ThetaHashTable::new(lg_max_k, ResizeFactor::X8, 1.0, seed),
        }
    }

    /// Creates a new union operator using the default nominal size and seed.
    pub fn new_default() -> Self {
        Self::new(DEFAULT_LG_K, DEFAULT_UPDATE_SEED)
    }

    /// Folds another sketch's hashes into the running union.
    pub fn update<S: ThetaSketchView>(&mut self, sketch: &S) -> Result<(), Error> {
        if !sketch.is_empty() && sketch.seed_hash() != self.table.seed_hash() {
            return Err(Error::invalid_argument(format!(
                "incompatible seed hash: expected {}, got {}",
                self.table.seed_hash(),
                sketch.seed_hash()
            )));
        }

        let new_theta = self.table.theta().min(sketch.theta64());
        if new_theta < self.table.theta() {
            self.table.set_theta(new_theta);
        }

        for hash in sketch.iter() {
            if hash != 0 && hash < self.table.theta() {
                self.table.try_insert_hash(hash);
            }
        }
        self.table.trim();
        Ok(())
    }

    /// Returns the union result as an ordered compact theta sketch.
    pub fn result(&self) -> CompactThetaSketch {
        self.result_with_ordered(true)
    }

    /// Returns the union result as a compact theta sketch.
    pub fn result_with_ordered(&self, ordered: bool) -> CompactThetaSketch {
        let mut hashes: Vec<u64> = self.table.iter().collect();
        if ordered {
            hashes.sort_unstable();
        }
        let is_empty = self.table.is_empty() && self.table.theta() == MAX_THETA;
        CompactThetaSketch::from_parts(
            hashes,
            self.table.theta(),
            self.table.seed_hash(),
            ordered,
            is_empty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theta::ThetaSketch;

    #[test]
    fn union_of_disjoint_sets_is_additive() {
        let mut a = ThetaSketch::builder().lg_k(12).build();
        let mut b = ThetaSketch::builder().lg_k(12).build();
        for i in 0..200 {
            a.update(format!("a{i}"));
        }
        for i in 0..200 {
            b.update(format!("b{i}"));
        }

        let mut union = ThetaUnion::new_default();
        union.update(&a.compact()).unwrap();
        union.update(&b.compact()).unwrap();
        let result = union.result();

        assert!((result.estimate() - 400.0).abs() / 400.0 < 0.1);
    }

    #[test]
    fn union_with_empty_sketch_is_identity() {
        let mut a = ThetaSketch::builder().lg_k(12).build();
        for i in 0..50 {
            a.update(i);
        }
        let empty = ThetaSketch::builder().lg_k(12).build();

        let mut union = ThetaUnion::new_default();
        union.update(&a.compact()).unwrap();
        union.update(&empty.compact()).unwrap();

        assert_eq!(union.result().num_retained(), a.num_retained());
    }

    #[test]
    fn union_rejects_mismatched_seed() {
        let mut a = ThetaSketch::builder().seed(1).build();
        a.update("x");
        let mut union = ThetaUnion::new(12, 2);
        assert!(union.update(&a.compact()).is_err());
    }
}
