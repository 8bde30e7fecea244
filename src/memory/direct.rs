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

//! Foreign-owned backing for [`super::WritableMemory`].

use super::WritableMemory;

/// A byte region borrowed from the caller for the lifetime `'a`. Dropping
/// a `Direct` does not release the underlying bytes; the caller retains
/// ownership. Identity is the slice's data pointer plus its length.
#[derive(Debug, PartialEq, Eq)]
pub struct Direct<'a> {
    bytes: &'a mut [u8],
}

impl<'a> Direct<'a> {
    /// Wraps an externally owned mutable byte slice.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }
}

impl WritableMemory for Direct<'_> {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn as_slice(&self) -> &[u8] {
        self.bytes
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.bytes
    }

    fn identity(&self) -> (usize, usize) {
        (self.bytes.as_ptr() as usize, self.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_visible_through_the_original_slice() {
        let mut buf = [0u8; 4];
        {
            let mut direct = Direct::new(&mut buf);
            direct.put_u8(0, 0xAB);
        }
        assert_eq!(buf[0], 0xAB);
    }

    #[test]
    fn identity_matches_same_backing_slice() {
        let mut buf = [0u8; 4];
        let direct = Direct::new(&mut buf);
        assert_eq!(direct.identity(), direct.identity());
    }
}
