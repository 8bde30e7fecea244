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

//! Byte-region abstraction shared by the heap and direct forms of the
//! quantiles sketch: a bounded, little-endian, randomly addressable range
//! of bytes that can be either heap-owned or borrowed from a caller.

mod direct;
mod heap;

pub use direct::Direct;
pub use heap::Heap;

use byteorder::{ByteOrder, LittleEndian};

/// Typed, offset-based read/write access to a bounded byte range.
///
/// Implementors only need to provide [`WritableMemory::capacity`],
/// [`WritableMemory::as_slice`]/[`WritableMemory::as_mut_slice`], and
/// [`WritableMemory::identity`]; every typed accessor is a default method
/// built on top of those. All accessors panic on out-of-bounds access,
/// the same contract the HLL arrays use for their register indexing: this
/// is a programming error, not a condition callers are expected to
/// recover from.
pub trait WritableMemory {
    /// Total number of addressable bytes.
    fn capacity(&self) -> usize;

    /// Borrows the full backing range for reading.
    fn as_slice(&self) -> &[u8];

    /// Borrows the full backing range for writing.
    fn as_mut_slice(&mut self) -> &mut [u8];

    /// An opaque identity for this memory's backing storage, used by
    /// [`WritableMemory::is_same_resource`]. Two memories are the same
    /// resource iff they alias the same bytes.
    fn identity(&self) -> (usize, usize);

    fn get_u8(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    fn put_u8(&mut self, offset: usize, v: u8) {
        self.as_mut_slice()[offset] = v;
    }

    fn get_u16_le(&self, offset: usize) -> u16 {
        LittleEndian::read_u16(&self.as_slice()[offset..offset + 2])
    }

    fn put_u16_le(&mut self, offset: usize, v: u16) {
        LittleEndian::write_u16(&mut self.as_mut_slice()[offset..offset + 2], v);
    }

    fn get_u32_le(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.as_slice()[offset..offset + 4])
    }

    fn put_u32_le(&mut self, offset: usize, v: u32) {
        LittleEndian::write_u32(&mut self.as_mut_slice()[offset..offset + 4], v);
    }

    fn get_u64_le(&self, offset: usize) -> u64 {
        LittleEndian::read_u64(&self.as_slice()[offset..offset + 8])
    }

    fn put_u64_le(&mut self, offset: usize, v: u64) {
        LittleEndian::write_u64(&mut self.as_mut_slice()[offset..offset + 8], v);
    }

    fn get_f64_le(&self, offset: usize) -> f64 {
        LittleEndian::read_f64(&self.as_slice()[offset..offset + 8])
    }

    fn put_f64_le(&mut self, offset: usize, v: f64) {
        LittleEndian::write_f64(&mut self.as_mut_slice()[offset..offset + 8], v);
    }

    fn get_bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.as_slice()[offset..offset + len]
    }

    fn put_bytes(&mut self, offset: usize, src: &[u8]) {
        self.as_mut_slice()[offset..offset + src.len()].copy_from_slice(src);
    }

    /// Whether `self` and `other` alias the same underlying storage.
    fn is_same_resource(&self, other: &dyn WritableMemory) -> bool {
        self.identity() == other.identity()
    }
}
