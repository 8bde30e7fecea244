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

//! Heap-backed quantiles sketch: the general-purpose, updatable form.

use crate::common::random::RandomSource;
use crate::common::random::XorShift64;
use crate::error::Error;
use crate::quantiles::compact::CompactDoublesSketch;
use crate::quantiles::core::QuantilesState;
use crate::quantiles::core::QuantilesStorage;
use crate::quantiles::core::base_buffer_range;
use crate::quantiles::core::level_range;
use crate::quantiles::core::merge_same_k;
use crate::quantiles::core::pmf_from_weighted;
use crate::quantiles::core::cdf_from_weighted;
use crate::quantiles::core::quantile_from_weighted;
use crate::quantiles::core::weighted_items;
use crate::quantiles::core::update as core_update;
use crate::quantiles::validate_k;
use crate::quantiles::validate_phi;
use crate::quantiles::validate_splits;

struct HeapItems(Vec<f64>);

impl QuantilesStorage for HeapItems {
    fn get(&self, idx: usize) -> f64 {
        self.0[idx]
    }

    fn set(&mut self, idx: usize, v: f64) {
        if idx >= self.0.len() {
            self.0.resize(idx + 1, 0.0);
        }
        self.0[idx] = v;
    }

    fn ensure_capacity(&mut self, k: u16, new_max_level: usize) -> Result<(), Error> {
        let needed = level_range(k, new_max_level).end;
        if self.0.len() < needed {
            self.0.resize(needed, 0.0);
        }
        Ok(())
    }
}

/// A quantiles-over-doubles sketch backed by native heap arrays.
///
/// # Examples
///
/// ```
/// # use datasketches::quantiles::HeapDoublesSketch;
/// let mut sketch = HeapDoublesSketch::<>::builder().k(128).build();
/// for i in 0..1000 {
///     sketch.update(i as f64);
/// }
/// let median = sketch.get_quantile(0.5).unwrap().unwrap();
/// assert!(median > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HeapDoublesSketch<R: RandomSource = XorShift64> {
    state: QuantilesState,
    items: HeapItems,
    rand: R,
}

impl std::fmt::Debug for HeapItems {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapItems").field("len", &self.0.len()).finish()
    }
}

impl Clone for HeapItems {
    fn clone(&self) -> Self {
        HeapItems(self.0.clone())
    }
}

impl PartialEq for HeapItems {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl HeapDoublesSketch<XorShift64> {
    /// Starts a builder with the default random source.
    pub fn builder() -> QuantilesSketchBuilder<XorShift64> {
        QuantilesSketchBuilder::default()
    }
}

impl<R: RandomSource> HeapDoublesSketch<R> {
    pub(crate) fn new(k: u16, rand: R) -> Self {
        Self {
            state: QuantilesState::new(k),
            items: HeapItems(Vec::new()),
            rand,
        }
    }

    /// Parameter `k`, controlling the rank-error/space tradeoff.
    pub fn k(&self) -> u16 {
        self.state.k
    }

    /// Total number of updates seen so far.
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

    /// Appends `x` to the stream. `-0.0` and NaN are canonicalized before
    /// being stored, matching the reference implementation's double
    /// handling.
    pub fn update(&mut self, x: f64) {
        core_update(&mut self.state, &mut self.items, &mut self.rand, x)
            .expect("heap storage never fails to grow");
    }

    /// Merges `other` into `self`.
    ///
    /// # Panics
    ///
    /// Panics if the two sketches were built with different `k`. Merging
    /// across different `k` falls back to replaying `other`'s retained,
    /// weighted items through the normal update path (see
    /// [`CompactDoublesSketch`] for the read-only equivalent).
    pub fn merge(&mut self, other: &HeapDoublesSketch<R>) {
        if other.is_empty() {
            return;
        }
        if self.state.k == other.state.k {
            merge_same_k(
                &mut self.state,
                &mut self.items,
                &mut self.rand,
                &other.state,
                &other.items.0,
            )
            .expect("heap storage never fails to grow");
        } else {
            for (value, weight) in weighted_items(&other.state, &other.items) {
                for _ in 0..weight {
                    self.update(value);
                }
            }
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

    /// Approximate CDF at each of `splits` (finite, strictly increasing).
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

    /// Serializes in the updatable wire format (full `2k`-aligned slots).
    pub fn serialize(&self) -> Vec<u8> {
        self.compact().serialize()
    }
}

impl HeapDoublesSketch<XorShift64> {
    /// Parses a sketch previously produced by [`HeapDoublesSketch::serialize`]
    /// or [`CompactDoublesSketch::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<HeapDoublesSketch<XorShift64>, Error> {
        let compact = CompactDoublesSketch::deserialize(bytes)?;
        let mut sketch = HeapDoublesSketch::new(compact.k(), XorShift64::default());
        sketch.state.n = compact.n();
        sketch.state.min_value = compact.min_value();
        sketch.state.max_value = compact.max_value();
        for (level, run) in compact.levels() {
            sketch.items.ensure_capacity(compact.k(), *level as usize)?;
            let start = level_range(compact.k(), *level as usize).start;
            for (offset, v) in run.iter().enumerate() {
                sketch.items.set(start + offset, *v);
            }
            sketch.state.bit_pattern |= 1u64 << level;
        }
        for (i, v) in compact.base_buffer().iter().enumerate() {
            sketch.items.set(i, *v);
        }
        Ok(sketch)
    }
}

/// Builds a [`HeapDoublesSketch`] or [`super::DirectDoublesSketch`].
#[derive(Debug, Clone)]
pub struct QuantilesSketchBuilder<R: RandomSource = XorShift64> {
    k: u16,
    rand: R,
}

impl Default for QuantilesSketchBuilder<XorShift64> {
    fn default() -> Self {
        Self {
            k: super::DEFAULT_K,
            rand: XorShift64::default(),
        }
    }
}

impl<R: RandomSource> QuantilesSketchBuilder<R> {
    /// Sets `k`. Must be a power of two in `[MIN_K, MAX_K]`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is invalid.
    pub fn k(mut self, k: u16) -> Self {
        validate_k(k).expect("invalid k");
        self.k = k;
        self
    }

    /// Supplies a custom random source, replacing the default
    /// [`XorShift64`]. Primarily useful for deterministic tests.
    pub fn rand_source<R2: RandomSource>(self, rand: R2) -> QuantilesSketchBuilder<R2> {
        QuantilesSketchBuilder { k: self.k, rand }
    }

    pub fn build(self) -> HeapDoublesSketch<R> {
        HeapDoublesSketch::new(self.k, self.rand)
    }

    /// Builds a [`super::DirectDoublesSketch`] operating in place over
    /// `region`.
    pub fn build_direct(self, region: &mut [u8]) -> super::DirectDoublesSketch<'_, R> {
        super::DirectDoublesSketch::new(self.k, self.rand, region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sketch_is_empty() {
        let sketch = HeapDoublesSketch::builder().k(8).build();
        assert!(sketch.is_empty());
        assert_eq!(sketch.n(), 0);
    }

    #[test]
    fn min_max_track_extremes() {
        let mut sketch = HeapDoublesSketch::builder().k(8).build();
        for v in [5.0, 1.0, 9.0, 3.0] {
            sketch.update(v);
        }
        assert_eq!(sketch.min_value(), Some(1.0));
        assert_eq!(sketch.max_value(), Some(9.0));
    }

    #[test]
    fn negative_zero_canonicalizes_like_zero() {
        let mut sketch = HeapDoublesSketch::builder().k(8).build();
        sketch.update(-0.0);
        assert_eq!(sketch.min_value().unwrap().to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn get_quantile_at_extremes_matches_min_max() {
        let mut sketch = HeapDoublesSketch::builder().k(16).build();
        for i in 0..1000 {
            sketch.update(i as f64);
        }
        assert_eq!(sketch.get_quantile(0.0).unwrap(), sketch.min_value());
        assert_eq!(sketch.get_quantile(1.0).unwrap(), sketch.max_value());
    }

    #[test]
    fn get_quantile_rejects_out_of_range_phi() {
        let sketch = HeapDoublesSketch::builder().k(16).build();
        assert!(sketch.get_quantile(1.5).is_err());
    }

    #[test]
    fn empty_sketch_queries_return_none() {
        let sketch = HeapDoublesSketch::builder().k(16).build();
        assert_eq!(sketch.get_quantile(0.5).unwrap(), None);
        assert_eq!(sketch.get_cdf(&[1.0, 2.0]).unwrap(), None);
    }

    #[test]
    fn median_of_uniform_stream_is_near_the_middle() {
        let mut sketch = HeapDoublesSketch::builder().k(64).build();
        for i in 0..100_000 {
            sketch.update(i as f64);
        }
        let median = sketch.get_quantile(0.5).unwrap().unwrap();
        assert!((median - 50_000.0).abs() < 5_000.0);
    }

    #[test]
    fn cdf_is_monotonically_increasing_and_ends_at_one() {
        let mut sketch = HeapDoublesSketch::builder().k(32).build();
        for i in 0..10_000 {
            sketch.update(i as f64);
        }
        let cdf = sketch.get_cdf(&[1000.0, 5000.0, 9000.0]).unwrap().unwrap();
        assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*cdf.last().unwrap(), 1.0);
    }

    #[test]
    fn merge_same_k_preserves_total_count() {
        let mut a = HeapDoublesSketch::builder().k(16).build();
        let mut b = HeapDoublesSketch::builder().k(16).build();
        for i in 0..5000 {
            a.update(i as f64);
        }
        for i in 5000..10000 {
            b.update(i as f64);
        }
        a.merge(&b);
        assert_eq!(a.n(), 10000);
    }

    #[test]
    fn merge_different_k_falls_back_to_weighted_replay() {
        let mut a = HeapDoublesSketch::builder().k(16).build();
        let mut b = HeapDoublesSketch::builder().k(8).build();
        for i in 0..200 {
            a.update(i as f64);
        }
        for i in 200..260 {
            b.update(i as f64);
        }
        a.merge(&b);
        assert_eq!(a.n(), 260);
    }

    #[test]
    fn serialize_roundtrip_preserves_summary_statistics() {
        let mut sketch = HeapDoublesSketch::builder().k(32).build();
        for i in 0..2000 {
            sketch.update(i as f64);
        }
        let bytes = sketch.serialize();
        let restored = HeapDoublesSketch::deserialize(&bytes).unwrap();
        assert_eq!(restored.n(), sketch.n());
        assert_eq!(restored.min_value(), sketch.min_value());
        assert_eq!(restored.max_value(), sketch.max_value());
    }

    #[test]
    fn serialize_roundtrip_of_empty_sketch() {
        let sketch = HeapDoublesSketch::builder().k(16).build();
        let bytes = sketch.serialize();
        let restored = HeapDoublesSketch::deserialize(&bytes).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn default_k_stream_of_one_thousand_integers_bounds_the_median() {
        let mut sketch = HeapDoublesSketch::builder().k(super::DEFAULT_K).build();
        for i in 0..1000 {
            sketch.update(i as f64);
        }
        assert_eq!(sketch.min_value(), Some(0.0));
        assert_eq!(sketch.max_value(), Some(999.0));
        let median = sketch.get_quantile(0.5).unwrap().unwrap();
        assert!((median - 500.0).abs() <= 4.0);
    }

    #[test]
    fn direct_sketch_serialize_then_heapify_then_continue_updating() {
        let mut region = vec![0u8; 10_000];
        let mut direct = HeapDoublesSketch::builder().k(super::DEFAULT_K).build_direct(&mut region);
        for i in 0..1000 {
            direct.update(i as f64).unwrap();
        }
        let bytes = direct.serialize();

        let mut sketch = HeapDoublesSketch::deserialize(&bytes).unwrap();
        for i in 1000..2000 {
            sketch.update(i as f64);
        }

        assert_eq!(sketch.min_value(), Some(0.0));
        assert_eq!(sketch.max_value(), Some(1999.0));
        let median = sketch.get_quantile(0.5).unwrap().unwrap();
        assert!((median - 1000.0).abs() <= 10.0);
    }

    #[test]
    fn compact_serialized_length_matches_retained_item_count() {
        let mut sketch = HeapDoublesSketch::builder().k(16).build();
        sketch.update(1.0);
        sketch.update(2.0);

        let bytes = sketch.serialize();
        // preamble (1+1+1+2 bytes) + n (8) + min (8) + max (8) + bit_pattern (8)
        // + base_buffer_len (4) + 2 base buffer doubles (16); no levels yet.
        let expected_len = 5 + 8 + 8 + 8 + 8 + 4 + 2 * 8;
        assert_eq!(bytes.len(), expected_len);
    }
}
