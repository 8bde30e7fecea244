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

//! Shared buffer-compactor algorithm driving both [`super::HeapDoublesSketch`]
//! and [`super::DirectDoublesSketch`]. Neither backing duplicates this logic;
//! they only implement [`QuantilesStorage`] over their own representation of
//! the flat `2k*(1+maxLevel+1)` item array.

use std::ops::Range;

use crate::common::canonical_double;
use crate::common::random::RandomSource;
use crate::error::Error;

/// Abstracts over the flat array of doubles backing a quantiles sketch, so
/// [`update`]/[`propagate_carry`]/[`merge_same_k`] run unmodified whether
/// the array lives in a `Vec<f64>` (heap) or a borrowed byte region
/// (direct). Indices are positions in the conceptual item array described
/// by [`base_buffer_range`]/[`level_range`].
pub(crate) trait QuantilesStorage {
    fn get(&self, idx: usize) -> f64;
    fn set(&mut self, idx: usize, v: f64);
    /// Ensures storage exists for levels `0..=new_max_level`. Heap backings
    /// always succeed (they reallocate); direct backings fail with
    /// [`Error`] if the borrowed region is too small to hold another level.
    fn ensure_capacity(&mut self, k: u16, new_max_level: usize) -> Result<(), Error>;
}

/// Bookkeeping shared by every backing: everything about a quantiles
/// sketch except the item storage itself.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuantilesState {
    pub k: u16,
    pub n: u64,
    pub bit_pattern: u64,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl QuantilesState {
    pub fn new(k: u16) -> Self {
        Self {
            k,
            n: 0,
            bit_pattern: 0,
            min_value: None,
            max_value: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Number of items currently held in the base buffer (`n mod 2k`).
    pub fn bb_count(&self) -> usize {
        (self.n % (2 * self.k as u64)) as usize
    }

    /// Index of the highest level that currently (or ever) held a run.
    pub fn max_level(&self) -> usize {
        if self.bit_pattern == 0 {
            0
        } else {
            63 - self.bit_pattern.leading_zeros() as usize
        }
    }

    fn update_min_max(&mut self, x: f64) {
        self.min_value = Some(self.min_value.map_or(x, |m| m.min(x)));
        self.max_value = Some(self.max_value.map_or(x, |m| m.max(x)));
    }
}

const fn level_start(k: u16, level: usize) -> usize {
    2 * k as usize * (level + 1)
}

/// Byte/item-index range of the base buffer within the flat item array.
pub(crate) fn base_buffer_range(k: u16) -> Range<usize> {
    0..2 * k as usize
}

/// Item-index range of level `level`'s `2k`-item run within the flat item
/// array, per the storage invariant in the data model: the base buffer
/// occupies `[0, 2k)` and level `i` occupies `[2k + i*2k, 2k + (i+1)*2k)`.
pub(crate) fn level_range(k: u16, level: usize) -> Range<usize> {
    let start = level_start(k, level);
    start..start + 2 * k as usize
}

/// Applies a single update: records the value, appends it to the base
/// buffer, and triggers compaction if the buffer just filled.
pub(crate) fn update<S: QuantilesStorage>(
    state: &mut QuantilesState,
    storage: &mut S,
    rand: &mut dyn RandomSource,
    x: f64,
) -> Result<(), Error> {
    let x = canonical_double(x);
    state.update_min_max(x);

    let bb_count = state.bb_count();
    storage.set(bb_count, x);
    state.n += 1;

    if bb_count + 1 == 2 * state.k as usize {
        let mut run: Vec<f64> = base_buffer_range(state.k).map(|i| storage.get(i)).collect();
        run.sort_by(|a, b| a.partial_cmp(b).unwrap());
        propagate_carry(state, storage, rand, 0, run)?;
    }
    Ok(())
}

/// Carries a sorted `2k`-item run into `level`, merging-and-compacting
/// with every already-occupied level above it until it lands in a free
/// one, exactly like a ripple-carry binary increment.
pub(crate) fn propagate_carry<S: QuantilesStorage>(
    state: &mut QuantilesState,
    storage: &mut S,
    rand: &mut dyn RandomSource,
    mut level: usize,
    mut run: Vec<f64>,
) -> Result<(), Error> {
    while (state.bit_pattern >> level) & 1 == 1 {
        let existing: Vec<f64> = level_range(state.k, level).map(|i| storage.get(i)).collect();
        let mut merged: Vec<f64> = run;
        merged.extend(existing);
        merged.sort_by(|a, b| a.partial_cmp(b).unwrap());

        // Independently chosen odd/even parity per compaction: the crux
        // of the scheme's error bound.
        let start_parity = usize::from(rand.next_bool());
        run = merged.into_iter().skip(start_parity).step_by(2).collect();

        state.bit_pattern &= !(1u64 << level);
        level += 1;
    }

    storage.ensure_capacity(state.k, level)?;
    let start = level_start(state.k, level);
    for (offset, v) in run.into_iter().enumerate() {
        storage.set(start + offset, v);
    }
    state.bit_pattern |= 1u64 << level;

    Ok(())
}

/// Merges `src` into `dest`, assuming both share the same `k`. Mirrors
/// propagate-carry: the source's base buffer is replayed item by item
/// (so it folds through the normal update path), and each occupied source
/// level is carry-propagated into the destination starting at that same
/// level index.
pub(crate) fn merge_same_k<S: QuantilesStorage>(
    dest_state: &mut QuantilesState,
    dest_storage: &mut S,
    rand: &mut dyn RandomSource,
    src_state: &QuantilesState,
    src_items: &[f64],
) -> Result<(), Error> {
    debug_assert_eq!(dest_state.k, src_state.k);

    let src_bb_count = src_state.bb_count();
    for &x in &src_items[0..src_bb_count] {
        update(dest_state, dest_storage, rand, x)?;
    }

    for level in 0..=src_state.max_level() {
        if (src_state.bit_pattern >> level) & 1 == 1 {
            let range = level_range(src_state.k, level);
            let run = src_items[range].to_vec();
            propagate_carry(dest_state, dest_storage, rand, level, run)?;
        }
    }

    // The base-buffer replay above already accounted for `src_bb_count`
    // updates; the remainder of `src.n` is represented by its occupied
    // levels, which the carry propagation just folded in structurally.
    dest_state.n += src_state.n - src_bb_count as u64;

    if let Some(min) = src_state.min_value {
        dest_state.min_value = Some(dest_state.min_value.map_or(min, |m| m.min(min)));
    }
    if let Some(max) = src_state.max_value {
        dest_state.max_value = Some(dest_state.max_value.map_or(max, |m| m.max(max)));
    }

    Ok(())
}

/// Gathers every retained `(value, weight)` pair: base-buffer items carry
/// weight 1, and items in occupied level `i` carry weight `2^(i+1)`.
pub(crate) fn weighted_items<S: QuantilesStorage>(
    state: &QuantilesState,
    storage: &S,
) -> Vec<(f64, u64)> {
    let mut out = Vec::with_capacity(state.bb_count() + 2 * state.k as usize * 4);
    for i in 0..state.bb_count() {
        out.push((storage.get(i), 1));
    }
    for level in 0..=state.max_level() {
        if (state.bit_pattern >> level) & 1 == 1 {
            let weight = 1u64 << (level + 1);
            for i in level_range(state.k, level) {
                out.push((storage.get(i), weight));
            }
        }
    }
    out
}

/// Resolves the item at normalized rank `phi` via a weighted sorted scan.
/// Callers are expected to have already handled the empty-sketch and
/// `phi` out-of-range cases.
pub(crate) fn quantile_from_weighted(mut items: Vec<(f64, u64)>, n: u64, phi: f64) -> f64 {
    items.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    let target_rank = (phi * n as f64).floor() as u64;
    let mut cumulative = 0u64;
    for (value, weight) in &items {
        cumulative += weight;
        if cumulative > target_rank {
            return *value;
        }
    }
    items.last().map(|(v, _)| *v).unwrap_or(f64::NAN)
}

/// Single weighted-merge pass computing the CDF at each split point:
/// the fraction of total weight at or below the split.
pub(crate) fn cdf_from_weighted(mut items: Vec<(f64, u64)>, n: u64, splits: &[f64]) -> Vec<f64> {
    items.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    let mut out = Vec::with_capacity(splits.len() + 1);
    let mut cumulative = 0u64;
    let mut iter = items.iter().peekable();
    for &split in splits {
        while let Some((value, weight)) = iter.peek() {
            if *value < split {
                cumulative += weight;
                iter.next();
            } else {
                break;
            }
        }
        out.push(cumulative as f64 / n as f64);
    }
    out.push(1.0);
    out
}

/// PMF derived from the CDF by taking successive differences.
pub(crate) fn pmf_from_weighted(items: Vec<(f64, u64)>, n: u64, splits: &[f64]) -> Vec<f64> {
    let cdf = cdf_from_weighted(items, n, splits);
    let mut out = Vec::with_capacity(cdf.len());
    let mut prev = 0.0;
    for v in cdf {
        out.push(v - prev);
        prev = v;
    }
    out
}
