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

//! Direct quantiles sketch: the same buffer-compactor algorithm as
//! [`super::HeapDoublesSketch`], operating in place over a caller-supplied
//! byte region instead of a heap-allocated `Vec<f64>`.

use crate::common::random::RandomSource;
use crate::common::random::XorShift64;
use crate::error::Error;
use crate::memory::Direct as DirectMemory;
use crate::memory::WritableMemory;
use crate::quantiles::compact::CompactDoublesSketch;
use crate::quantiles::core::base_buffer_range;
use crate::quantiles::core::cdf_from_weighted;
use crate::quantiles::core::level_range;
use crate::quantiles::core::merge_same_k;
use crate::quantiles::core::pmf_from_weighted;
use crate::quantiles::core::quantile_from_weighted;
use crate::quantiles::core::update as core_update;
use crate::quantiles::core::weighted_items;
use crate::quantiles::core::QuantilesState;
use crate::quantiles::core::QuantilesStorage;
use crate::quantiles::validate_phi;
use crate::quantiles::validate_splits;

/// Adapts a borrowed byte region into the item-index addressing
/// [`QuantilesStorage`] expects: item `i` lives at byte offset `8*i`.
struct DirectItems<'a> {
    memory: DirectMemory<'a>,
}

impl<'a> QuantilesStorage for DirectItems<'a> {
    fn get(&self, idx: usize) -> f64 {
        self.memory.get_f64_le(idx * 8)
    }

    fn set(&mut self, idx: usize, v: f64) {
        self.memory.put_f64_le(idx * 8, v);
    }

    fn ensure_capacity(&mut self, k: u16, new_max_level: usize) -> Result<(), Error> {
        let needed_bytes = level_range(k, new_max_level).end * 8;
        if needed_bytes > self.memory.capacity() {
            return Err(Error::capacity_exceeded(format!(
                "need {needed_bytes} bytes, region holds {}",
                self.memory.capacity()
            )));
        }
        Ok(())
    }
}

/// A quantiles-over-doubles sketch operating in place over a caller-owned
/// byte region (see [`crate::memory`]). Unlike [`super::HeapDoublesSketch`],
/// growth beyond the region's capacity fails rather than reallocating.
pub struct DirectDoublesSketch<'a, R: RandomSource = XorShift64> {
    state: QuantilesState,
    items: DirectItems<'a>,
    rand: R,
}

impl<'a, R: RandomSource> DirectDoublesSketch<'a, R> {
    pub(crate) fn new(k: u16, rand: R, region: &'a mut [u8]) -> Self {
        Self {
            state: QuantilesState::new(k),
            items: DirectItems {
                memory: DirectMemory::new(region),
            },
            rand,
        }
    }

    pub fn k(&self) -> u16 {
        self.state.k
    }

    pub fn n(&self) -> u64 {
        self.state.n
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn min_value(&self) -> Option<f64> {
        self.state.min_value
    }

    pub fn max_value(&self) -> Option<f64> {
        self.state.max_value
    }

    /// True iff `region` is identical to (same data pointer, same length
    /// as) the byte region this sketch was built over — i.e. this is the
    /// exact resource backing the sketch, not a copy of it.
    pub fn is_same_resource(&self, region: &[u8]) -> bool {
        self.items.memory.identity() == (region.as_ptr() as usize, region.len())
    }

    /// Appends `x` to the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if the backing byte region is too small to hold
    /// the next compaction level.
    pub fn update(&mut self, x: f64) -> Result<(), Error> {
        core_update(&mut self.state, &mut self.items, &mut self.rand, x)
    }

    /// Merges `other` into `self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if the backing byte region is too small to hold
    /// the merged result.
    pub fn merge(&mut self, other: &DirectDoublesSketch<'_, R>) -> Result<(), Error> {
        if other.is_empty() {
            return Ok(());
        }
        if self.state.k == other.state.k {
            let src_items: Vec<f64> = (0..level_range(other.state.k, other.state.max_level()).end)
                .map(|i| other.items.get(i))
                .collect();
            merge_same_k(&mut self.state, &mut self.items, &mut self.rand, &other.state, &src_items)
        } else {
            for (value, weight) in weighted_items(&other.state, &other.items) {
                for _ in 0..weight {
                    self.update(value)?;
                }
            }
            Ok(())
        }
    }

    /// Returns the item at normalized rank `phi`.
    pub fn get_quantile(&self, phi: f64) -> Result<Option<f64>, Error> {
        validate_phi(phi)?;
        if self.is_empty() {
            return Ok(None);
        }
        if phi == 0.0 {
            return Ok(self.state.min_value);
        }
        if phi == 1.0 {
            return Ok(self.state.max_value);
        }
        let items = weighted_items(&self.state, &self.items);
        Ok(Some(quantile_from_weighted(items, self.state.n, phi)))
    }

    /// Approximate CDF at each of `splits`.
    pub fn get_cdf(&self, splits: &[f64]) -> Result<Option<Vec<f64>>, Error> {
        validate_splits(splits)?;
        if self.is_empty() {
            return Ok(None);
        }
        let items = weighted_items(&self.state, &self.items);
        Ok(Some(cdf_from_weighted(items, self.state.n, splits)))
    }

    /// Approximate PMF over the buckets induced by `splits`.
    pub fn get_pmf(&self, splits: &[f64]) -> Result<Option<Vec<f64>>, Error> {
        validate_splits(splits)?;
        if self.is_empty() {
            return Ok(None);
        }
        let items = weighted_items(&self.state, &self.items);
        Ok(Some(pmf_from_weighted(items, self.state.n, splits)))
    }

    /// Converts to the immutable, space-trimmed compact form.
    pub fn compact(&self) -> CompactDoublesSketch {
        let base_buffer = base_buffer_range(self.state.k)
            .take(self.state.bb_count())
            .map(|i| self.items.get(i))
            .collect();
        let mut levels = Vec::new();
        for level in 0..=self.state.max_level() {
            if (self.state.bit_pattern >> level) & 1 == 1 {
                let run: Vec<f64> = level_range(self.state.k, level)
                    .map(|i| self.items.get(i))
                    .collect();
                levels.push((level as u8, run));
            }
        }
        CompactDoublesSketch::from_parts(
            self.state.k,
            self.state.n,
            self.state.min_value,
            self.state.max_value,
            base_buffer,
            levels,
        )
    }

    /// Serializes in the shared wire format.
    pub fn serialize(&self) -> Vec<u8> {
        self.compact().serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_and_query_over_a_borrowed_region() {
        let mut region = vec![0u8; 64 * 1024];
        let mut sketch = super::super::HeapDoublesSketch::builder()
            .k(16)
            .build_direct(&mut region);
        for i in 0..2000 {
            sketch.update(i as f64).unwrap();
        }
        assert_eq!(sketch.n(), 2000);
        assert_eq!(sketch.min_value(), Some(0.0));
        assert_eq!(sketch.max_value(), Some(1999.0));
    }

    #[test]
    fn update_fails_once_region_is_exhausted() {
        let mut region = vec![0u8; 2 * 16 * 8]; // room for base buffer only
        let mut sketch = super::super::HeapDoublesSketch::builder()
            .k(16)
            .build_direct(&mut region);
        for i in 0..31 {
            sketch.update(i as f64).unwrap();
        }
        // The 32nd update fills the base buffer and triggers a compaction
        // that needs level-0 storage, which doesn't fit in a region sized
        // for the base buffer alone.
        assert!(sketch.update(31.0).is_err());
    }

    #[test]
    fn is_same_resource_rejects_an_unrelated_region() {
        let mut region = vec![0u8; 64 * 1024];
        let other = vec![0u8; 64 * 1024];
        let sketch = super::super::HeapDoublesSketch::builder()
            .k(16)
            .build_direct(&mut region);
        assert!(!sketch.is_same_resource(&other));
    }

    #[test]
    fn is_same_resource_matches_the_backing_region_s_identity() {
        // `build_direct` takes an exclusive borrow of `region` for the
        // sketch's whole lifetime, so the public API can't be exercised
        // against that very slice again here; this checks the same
        // identity comparison `is_same_resource` delegates to instead.
        let mut region = vec![0u8; 64 * 1024];
        let identity = (region.as_ptr() as usize, region.len());
        let sketch = super::super::HeapDoublesSketch::builder()
            .k(16)
            .build_direct(&mut region);
        assert_eq!(sketch.items.memory.identity(), identity);
    }

    #[test]
    fn direct_and_heap_quantiles_agree() {
        let mut region = vec![0u8; 64 * 1024];
        let mut direct = super::super::HeapDoublesSketch::builder()
            .k(16)
            .build_direct(&mut region);
        let mut heap = super::super::HeapDoublesSketch::builder().k(16).build();
        for i in 0..5000 {
            direct.update(i as f64).unwrap();
            heap.update(i as f64);
        }
        assert_eq!(direct.n(), heap.n());
        assert_eq!(direct.min_value(), heap.min_value());
        assert_eq!(direct.max_value(), heap.max_value());
    }
}
