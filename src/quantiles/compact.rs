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

//! Compact quantiles sketch: an immutable, space-trimmed form produced by
//! [`super::HeapDoublesSketch::compact`]/[`super::DirectDoublesSketch::compact`].
//!
//! Unlike the updatable forms, a compact sketch stores only the levels it
//! actually occupies (no `2k`-aligned spare capacity) and does not accept
//! further updates.

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::quantiles::core::cdf_from_weighted;
use crate::quantiles::core::pmf_from_weighted;
use crate::quantiles::core::quantile_from_weighted;
use crate::quantiles::serialization::read_preamble;
use crate::quantiles::serialization::write_preamble;
use crate::quantiles::validate_phi;
use crate::quantiles::validate_splits;

/// An immutable, serialization-ready quantiles-over-doubles sketch.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactDoublesSketch {
    k: u16,
    n: u64,
    min_value: Option<f64>,
    max_value: Option<f64>,
    base_buffer: Vec<f64>,
    /// `(level index, run)` pairs for every occupied level, ascending.
    levels: Vec<(u8, Vec<f64>)>,
}

impl CompactDoublesSketch {
    pub(crate) fn from_parts(
        k: u16,
        n: u64,
        min_value: Option<f64>,
        max_value: Option<f64>,
        base_buffer: Vec<f64>,
        levels: Vec<(u8, Vec<f64>)>,
    ) -> Self {
        Self {
            k,
            n,
            min_value,
            max_value,
            base_buffer,
            levels,
        }
    }

    pub fn k(&self) -> u16 {
        self.k
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn min_value(&self) -> Option<f64> {
        self.min_value
    }

    pub fn max_value(&self) -> Option<f64> {
        self.max_value
    }

    pub(crate) fn base_buffer(&self) -> &[f64] {
        &self.base_buffer
    }

    pub(crate) fn levels(&self) -> &[(u8, Vec<f64>)] {
        &self.levels
    }

    fn weighted_items(&self) -> Vec<(f64, u64)> {
        let mut out = Vec::with_capacity(self.base_buffer.len() + self.levels.iter().map(|(_, r)| r.len()).sum::<usize>());
        for &v in &self.base_buffer {
            out.push((v, 1));
        }
        for (level, run) in &self.levels {
            let weight = 1u64 << (level + 1);
            for &v in run {
                out.push((v, weight));
            }
        }
        out
    }

    /// Returns the item at normalized rank `phi`.
    pub fn get_quantile(&self, phi: f64) -> Result<Option<f64>, Error> {
        validate_phi(phi)?;
        if self.is_empty() {
            return Ok(None);
        }
        if phi == 0.0 {
            return Ok(self.min_value);
        }
        if phi == 1.0 {
            return Ok(self.max_value);
        }
        Ok(Some(quantile_from_weighted(self.weighted_items(), self.n, phi)))
    }

    /// Approximate CDF at each of `splits`.
    pub fn get_cdf(&self, splits: &[f64]) -> Result<Option<Vec<f64>>, Error> {
        validate_splits(splits)?;
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(cdf_from_weighted(self.weighted_items(), self.n, splits)))
    }

    /// Approximate PMF over the buckets induced by `splits`.
    pub fn get_pmf(&self, splits: &[f64]) -> Result<Option<Vec<f64>>, Error> {
        validate_splits(splits)?;
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(pmf_from_weighted(self.weighted_items(), self.n, splits)))
    }

    /// Serializes to the wire format shared by every backing.
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();

        let mut bytes = SketchBytes::new();
        write_preamble(&mut bytes, self.k, is_empty);
        if is_empty {
            return bytes.into_bytes();
        }

        bytes.write_u64_le(self.n);
        bytes.write_f64_le(self.min_value.expect("non-empty sketch has a min"));
        bytes.write_f64_le(self.max_value.expect("non-empty sketch has a max"));

        let mut bit_pattern = 0u64;
        for (level, _) in &self.levels {
            bit_pattern |= 1u64 << level;
        }
        bytes.write_u64_le(bit_pattern);

        bytes.write_u32_le(self.base_buffer.len() as u32);
        for &v in &self.base_buffer {
            bytes.write_f64_le(v);
        }
        for (_, run) in &self.levels {
            for &v in run {
                bytes.write_f64_le(v);
            }
        }

        bytes.into_bytes()
    }

    /// Parses a sketch previously produced by [`CompactDoublesSketch::serialize`]
    /// (or either updatable backing's `serialize`, which share this format).
    pub fn deserialize(data: &[u8]) -> Result<Self, Error> {
        let mut slice = SketchSlice::new(data);
        let (is_empty, k) = read_preamble(&mut slice)?;

        if is_empty {
            return Ok(Self::from_parts(k, 0, None, None, Vec::new(), Vec::new()));
        }

        let n = slice
            .read_u64_le()
            .map_err(|e| Error::insufficient_data_of("n", e))?;
        let min_value = slice
            .read_f64_le()
            .map_err(|e| Error::insufficient_data_of("min_value", e))?;
        let max_value = slice
            .read_f64_le()
            .map_err(|e| Error::insufficient_data_of("max_value", e))?;
        let bit_pattern = slice
            .read_u64_le()
            .map_err(|e| Error::insufficient_data_of("bit_pattern", e))?;
        let bb_len = slice
            .read_u32_le()
            .map_err(|e| Error::insufficient_data_of("base_buffer_len", e))? as usize;

        let mut base_buffer = Vec::with_capacity(bb_len);
        for _ in 0..bb_len {
            base_buffer.push(
                slice
                    .read_f64_le()
                    .map_err(|e| Error::insufficient_data_of("base_buffer item", e))?,
            );
        }

        let max_level = if bit_pattern == 0 {
            0
        } else {
            63 - bit_pattern.leading_zeros() as usize
        };
        let mut levels = Vec::new();
        for level in 0..=max_level {
            if (bit_pattern >> level) & 1 == 1 {
                let mut run = Vec::with_capacity(2 * k as usize);
                for _ in 0..2 * k as usize {
                    run.push(
                        slice
                            .read_f64_le()
                            .map_err(|e| Error::insufficient_data_of("level item", e))?,
                    );
                }
                levels.push((level as u8, run));
            }
        }

        Ok(Self::from_parts(
            k,
            n,
            Some(min_value),
            Some(max_value),
            base_buffer,
            levels,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::random::XorShift64;
    use crate::quantiles::HeapDoublesSketch;

    fn sample_sketch() -> HeapDoublesSketch<XorShift64> {
        let mut sketch = HeapDoublesSketch::builder().k(16).build();
        for i in 0..5000 {
            sketch.update(i as f64);
        }
        sketch
    }

    #[test]
    fn compact_preserves_summary_statistics() {
        let sketch = sample_sketch();
        let compact = sketch.compact();
        assert_eq!(compact.n(), sketch.n());
        assert_eq!(compact.min_value(), sketch.min_value());
        assert_eq!(compact.max_value(), sketch.max_value());
    }

    #[test]
    fn compact_serialize_roundtrip() {
        let sketch = sample_sketch();
        let compact = sketch.compact();
        let bytes = compact.serialize();
        let restored = CompactDoublesSketch::deserialize(&bytes).unwrap();
        assert_eq!(restored, compact);
    }

    #[test]
    fn compact_of_empty_sketch_roundtrips() {
        let sketch: HeapDoublesSketch<XorShift64> = HeapDoublesSketch::builder().k(16).build();
        let compact = sketch.compact();
        assert!(compact.is_empty());
        let bytes = compact.serialize();
        let restored = CompactDoublesSketch::deserialize(&bytes).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn compact_quantile_matches_heap_quantile() {
        let sketch = sample_sketch();
        let compact = sketch.compact();
        assert_eq!(sketch.get_quantile(0.5).unwrap(), compact.get_quantile(0.5).unwrap());
    }
}
