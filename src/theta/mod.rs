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

//! Theta sketches: KMV-style set sketches with a threshold `theta`,
//! supporting cardinality estimation and set operations (union,
//! intersection, a-not-b).

mod compact;
mod hash_table;
mod intersection;
mod serialization;
mod sketch;
mod union;

pub use compact::CompactThetaSketch;
pub use intersection::ThetaAnotB;
pub use intersection::ThetaIntersection;
pub use sketch::ThetaSketch;
pub use sketch::ThetaSketchBuilder;
pub use union::ThetaUnion;

/// A read-only view over a theta sketch, implemented by both the mutable
/// [`ThetaSketch`] and the immutable [`CompactThetaSketch`] so set operators
/// can accept either.
pub trait ThetaSketchView {
    /// Whether the underlying source set is logically empty.
    fn is_empty(&self) -> bool;
    /// Current theta threshold as a raw 64-bit value.
    fn theta64(&self) -> u64;
    /// Hash of the seed used to produce this sketch's hashes.
    fn seed_hash(&self) -> u16;
    /// Number of retained hashes.
    fn num_retained(&self) -> usize;
    /// Whether the retained hashes are guaranteed sorted ascending.
    fn is_ordered(&self) -> bool;
    /// Iterates over the retained hashes.
    fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_>;
}

impl ThetaSketchView for ThetaSketch {
    fn is_empty(&self) -> bool {
        ThetaSketch::is_empty(self)
    }

    fn theta64(&self) -> u64 {
        ThetaSketch::theta64(self)
    }

    fn seed_hash(&self) -> u16 {
        ThetaSketch::seed_hash(self)
    }

    fn num_retained(&self) -> usize {
        ThetaSketch::num_retained(self)
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        Box::new(ThetaSketch::iter(self))
    }
}

impl ThetaSketchView for CompactThetaSketch {
    fn is_empty(&self) -> bool {
        CompactThetaSketch::is_empty(self)
    }

    fn theta64(&self) -> u64 {
        CompactThetaSketch::theta64(self)
    }

    fn seed_hash(&self) -> u16 {
        CompactThetaSketch::seed_hash(self)
    }

    fn num_retained(&self) -> usize {
        CompactThetaSketch::num_retained(self)
    }

    fn is_ordered(&self) -> bool {
        CompactThetaSketch::is_ordered(self)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        Box::new(CompactThetaSketch::iter(self))
    }
}
