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

//! Binary serialization format constants for quantiles-over-doubles
//! sketches, shared by the heap, direct, and compact forms so all three
//! round-trip through the same wire bytes.
//!
//! The preamble follows the same `preLongs`/`serVer`/`familyID`/`flags`
//! convention as [`crate::theta::serialization`] and
//! [`crate::hll::serialization`]: byte 0 is `preLongs`, byte 1 is
//! `serVer`, byte 2 is `familyID`, byte 5 is `flags`, and the trailing
//! two-byte family-specific slot (bytes 6-7, where theta stores its
//! `seedHash`) carries `k`. Bytes 3-4 are reserved and always zero.

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::quantiles::validate_k;

/// Family ID for quantiles-over-doubles sketches, per `codec::family::Family::QUANTILES`.
pub const QUANTILES_FAMILY_ID: u8 = 8;

/// Current serialization version.
pub const SERIAL_VERSION: u8 = 1;

/// Preamble size for an empty sketch (8 bytes = 1 long): header only.
pub const PREAMBLE_LONGS_EMPTY: u8 = 1;
/// Preamble size for a non-empty sketch (16 bytes = 2 longs): header
/// plus an `n` word.
pub const PREAMBLE_LONGS_NONEMPTY: u8 = 2;

// Flags (byte 5) - bit masks, matching theta's bit assignment for bit 0.
/// Flag: data is big-endian. Always clear; writers never set it and
/// readers reject it.
pub const FLAG_BIG_ENDIAN: u8 = 1 << 0;
/// Flag: sketch is empty (no further fields follow the preamble).
pub const FLAG_EMPTY: u8 = 1 << 1;
/// Flag: sketch is in the space-trimmed compact form (informational only;
/// both compact and updatable forms parse identically since the payload
/// already records exactly which levels are present).
pub const FLAG_COMPACT: u8 = 1 << 2;

pub(crate) fn write_preamble(bytes: &mut SketchBytes, k: u16, is_empty: bool) {
    let pre_longs = if is_empty {
        PREAMBLE_LONGS_EMPTY
    } else {
        PREAMBLE_LONGS_NONEMPTY
    };
    let flags = if is_empty { FLAG_EMPTY } else { FLAG_COMPACT };

    bytes.write_u8(pre_longs);
    bytes.write_u8(SERIAL_VERSION);
    bytes.write_u8(QUANTILES_FAMILY_ID);
    bytes.write_u8(0); // reserved
    bytes.write_u8(0); // reserved
    bytes.write_u8(flags);
    bytes.write_u16_le(k);
}

/// Reads and validates the 8-byte preamble header, returning `(is_empty, k)`.
///
/// Validates the family ID, the serial version, `preLongs` consistency
/// with the empty flag, the endianness bit, and that `k` is a
/// power-of-two within the supported range.
pub(crate) fn read_preamble(slice: &mut SketchSlice<'_>) -> Result<(bool, u16), Error> {
    let pre_longs = slice
        .read_u8()
        .map_err(|e| Error::insufficient_data_of("pre_longs", e))?;
    let serial_version = slice
        .read_u8()
        .map_err(|e| Error::insufficient_data_of("serial_version", e))?;
    if serial_version != SERIAL_VERSION {
        return Err(Error::unsupported_serial_version(
            SERIAL_VERSION,
            serial_version,
        ));
    }
    let family_id = slice
        .read_u8()
        .map_err(|e| Error::insufficient_data_of("family_id", e))?;
    crate::codec::family::Family::QUANTILES.validate_id(family_id)?;
    let _reserved_3 = slice
        .read_u8()
        .map_err(|e| Error::insufficient_data_of("reserved", e))?;
    let _reserved_4 = slice
        .read_u8()
        .map_err(|e| Error::insufficient_data_of("reserved", e))?;
    let flags = slice
        .read_u8()
        .map_err(|e| Error::insufficient_data_of("flags", e))?;
    if flags & FLAG_BIG_ENDIAN != 0 {
        return Err(Error::deserial("big-endian images are not supported"));
    }
    let k = slice
        .read_u16_le()
        .map_err(|e| Error::insufficient_data_of("k", e))?;
    validate_k(k)?;

    let is_empty = flags & FLAG_EMPTY != 0;
    let expected_pre_longs = if is_empty {
        PREAMBLE_LONGS_EMPTY
    } else {
        PREAMBLE_LONGS_NONEMPTY
    };
    if pre_longs != expected_pre_longs {
        return Err(Error::invalid_preamble_longs(expected_pre_longs, pre_longs));
    }

    Ok((is_empty, k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_roundtrips() {
        let mut bytes = SketchBytes::new();
        write_preamble(&mut bytes, 128, false);
        let raw = bytes.into_bytes();
        let mut slice = SketchSlice::new(&raw);
        let (is_empty, k) = read_preamble(&mut slice).unwrap();
        assert!(!is_empty);
        assert_eq!(k, 128);
    }

    #[test]
    fn empty_preamble_roundtrips() {
        let mut bytes = SketchBytes::new();
        write_preamble(&mut bytes, 64, true);
        let raw = bytes.into_bytes();
        let mut slice = SketchSlice::new(&raw);
        let (is_empty, k) = read_preamble(&mut slice).unwrap();
        assert!(is_empty);
        assert_eq!(k, 64);
    }

    #[test]
    fn read_preamble_rejects_wrong_family() {
        let mut bytes = SketchBytes::new();
        bytes.write_u8(PREAMBLE_LONGS_EMPTY);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(3); // theta's family id, not quantiles'
        bytes.write_u8(0);
        bytes.write_u8(0);
        bytes.write_u8(FLAG_EMPTY);
        bytes.write_u16_le(128);
        let raw = bytes.into_bytes();
        let mut slice = SketchSlice::new(&raw);
        assert!(read_preamble(&mut slice).is_err());
    }

    #[test]
    fn read_preamble_rejects_non_power_of_two_k() {
        let mut bytes = SketchBytes::new();
        bytes.write_u8(PREAMBLE_LONGS_EMPTY);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(QUANTILES_FAMILY_ID);
        bytes.write_u8(0);
        bytes.write_u8(0);
        bytes.write_u8(FLAG_EMPTY);
        bytes.write_u16_le(100);
        let raw = bytes.into_bytes();
        let mut slice = SketchSlice::new(&raw);
        assert!(read_preamble(&mut slice).is_err());
    }

    #[test]
    fn read_preamble_rejects_big_endian_flag() {
        let mut bytes = SketchBytes::new();
        bytes.write_u8(PREAMBLE_LONGS_EMPTY);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(QUANTILES_FAMILY_ID);
        bytes.write_u8(0);
        bytes.write_u8(0);
        bytes.write_u8(FLAG_EMPTY | FLAG_BIG_ENDIAN);
        bytes.write_u16_le(128);
        let raw = bytes.into_bytes();
        let mut slice = SketchSlice::new(&raw);
        assert!(read_preamble(&mut slice).is_err());
    }

    #[test]
    fn read_preamble_rejects_pre_longs_flags_mismatch() {
        let mut bytes = SketchBytes::new();
        bytes.write_u8(PREAMBLE_LONGS_NONEMPTY); // says non-empty...
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(QUANTILES_FAMILY_ID);
        bytes.write_u8(0);
        bytes.write_u8(0);
        bytes.write_u8(FLAG_EMPTY); // ...but flags say empty
        bytes.write_u16_le(128);
        let raw = bytes.into_bytes();
        let mut slice = SketchSlice::new(&raw);
        assert!(read_preamble(&mut slice).is_err());
    }
}
