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

//! Heap-owned backing for [`super::WritableMemory`].

use super::WritableMemory;

/// A byte region owned by a `Vec<u8>`. Identity is the vector's data
/// pointer plus its length, so a resized `Heap` (which reallocates) is
/// never mistaken for the same resource as its former self.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heap {
    bytes: Vec<u8>,
}

impl Heap {
    /// Allocates a new zero-filled region of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity],
        }
    }

    /// Takes ownership of an existing byte vector as the backing region.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Consumes `self`, returning the backing vector.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl WritableMemory for Heap {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn identity(&self) -> (usize, usize) {
        (self.bytes.as_ptr() as usize, self.bytes.len())
    }
}
