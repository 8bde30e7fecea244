//! The public HLL sketch type and its List → Set → HLL mode promotion.

use std::hash::Hash;
use std::io;

use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::hash_set::HashSet;
use crate::hll::list::List;
use crate::hll::mode::Mode;
use crate::hll::serialization::{
    CUR_MODE_LIST, CUR_MODE_SET, FAMILY_BYTE, FLAGS_BYTE, FLAG_COMPACT, FLAG_EMPTY,
    HLL_CUR_MIN_BYTE, HLL_FAMILY_ID, HLL_PREINTS, LG_ARR_BYTE, LG_K_BYTE, MODE_BYTE,
    PREAMBLE_INTS_BYTE, PREAMBLE_LEN, SER_VER, SER_VER_BYTE, pack_mode_byte, unpack_cur_mode,
    unpack_hll_type,
};
use crate::hll::{HllType, coupon};

/// A HyperLogLog sketch, progressing through List, Set, and HLL array storage
/// as more distinct values are observed.
#[derive(Debug, Clone, PartialEq)]
pub struct HllSketch {
    lg_config_k: u8,
    mode: Mode,
}

impl HllSketch {
    /// Creates an empty sketch in List mode, targeting `hll_type` once it
    /// grows large enough to need an HLL array.
    ///
    /// # Panics
    ///
    /// Panics if `lg_config_k` is not in `[4, 21]`.
    pub fn new(lg_config_k: u8, hll_type: HllType) -> Self {
        assert!(
            (4..=21).contains(&lg_config_k),
            "lg_config_k must be in [4, 21], got {lg_config_k}"
        );
        Self {
            lg_config_k,
            mode: Mode::List {
                list: List::default(),
                hll_type,
            },
        }
    }

    /// Wraps an already-built mode (used by merges/conversions that
    /// construct a `Mode` directly).
    pub(crate) fn from_mode(lg_config_k: u8, mode: Mode) -> Self {
        Self { lg_config_k, mode }
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    pub(crate) fn mode(&self) -> &Mode {
        &self.mode
    }

    pub(crate) fn mode_mut(&mut self) -> &mut Mode {
        &mut self.mode
    }

    /// The HLL type this sketch will use (or already uses) once it reaches
    /// array mode.
    pub fn target_type(&self) -> HllType {
        match &self.mode {
            Mode::List { hll_type, .. } | Mode::Set { hll_type, .. } => *hll_type,
            Mode::Array4(_) => HllType::Hll4,
            Mode::Array6(_) => HllType::Hll6,
            Mode::Array8(_) => HllType::Hll8,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.mode {
            Mode::List { list, .. } => list.container().is_empty(),
            Mode::Set { set, .. } => set.container().is_empty(),
            Mode::Array4(a) => a.estimate() == 0.0,
            Mode::Array6(a) => a.estimate() == 0.0,
            Mode::Array8(a) => a.estimate() == 0.0,
        }
    }

    /// Hashes `value` and folds the resulting coupon into the sketch.
    pub fn update<T: Hash>(&mut self, value: T) {
        self.update_with_coupon(coupon(value));
    }

    /// Updates with a `f64`, canonicalizing `-0.0` to `0.0` and every NaN
    /// bit pattern to a single representative NaN first, so numerically
    /// equal (or equally "not a number") inputs always hash identically.
    pub fn update_f64(&mut self, value: f64) {
        let canonical = crate::common::canonical_double(value);
        self.update(canonical.to_bits());
    }

    /// Updates with a `f32`, via the same canonicalization as
    /// [`HllSketch::update_f64`].
    pub fn update_f32(&mut self, value: f32) {
        self.update_f64(value as f64);
    }

    /// Folds an already-computed coupon into the sketch, triggering a List →
    /// Set → HLL array promotion when the current mode fills up.
    pub(crate) fn update_with_coupon(&mut self, coupon: u32) {
        match &mut self.mode {
            Mode::List { list, .. } => {
                list.update(coupon);
                if list.is_full() {
                    self.promote_list_to_set();
                }
            }
            Mode::Set { set, .. } => {
                set.update(coupon);
                self.maybe_grow_or_promote_set();
            }
            Mode::Array4(a) => a.update(coupon),
            Mode::Array6(a) => a.update(coupon),
            Mode::Array8(a) => a.update(coupon),
        }
    }

    fn promote_list_to_set(&mut self) {
        let hll_type = self.target_type();
        let Mode::List { list, .. } = &self.mode else {
            unreachable!("promote_list_to_set called outside List mode")
        };
        let mut set = HashSet::default();
        for c in list.container().iter() {
            set.update(c);
        }
        self.mode = Mode::Set { set, hll_type };
    }

    fn maybe_grow_or_promote_set(&mut self) {
        use crate::hll::{RESIZE_DENOM, RESIZE_NUMER};

        let hll_type = self.target_type();
        let k = 1usize << self.lg_config_k;

        let (len, lg_size) = match &self.mode {
            Mode::Set { set, .. } => (set.container().len, set.container().lg_size),
            _ => return,
        };
        let cap = 1usize << lg_size;

        if len * RESIZE_DENOM as usize >= cap * RESIZE_NUMER as usize {
            let next_cap = cap * 2;
            if next_cap > k {
                self.promote_set_to_array(hll_type);
            } else {
                if let Mode::Set { set, .. } = &mut self.mode {
                    set.grow(lg_size + 1);
                }
            }
        }
    }

    fn promote_set_to_array(&mut self, hll_type: HllType) {
        let Mode::Set { set, .. } = &self.mode else {
            unreachable!("promote_set_to_array called outside Set mode")
        };
        let coupons: Vec<u32> = set.container().iter().collect();
        self.mode = build_array_from_coupons(self.lg_config_k, hll_type, &coupons);
    }

    /// Current cardinality estimate.
    pub fn estimate(&self) -> f64 {
        match &self.mode {
            Mode::List { list, .. } => list.estimate(),
            Mode::Set { set, .. } => set.estimate(),
            Mode::Array4(a) => a.estimate(),
            Mode::Array6(a) => a.estimate(),
            Mode::Array8(a) => a.estimate(),
        }
    }

    /// Resets this sketch back to an empty List, keeping its configuration.
    pub fn reset(&mut self) {
        let hll_type = self.target_type();
        self.mode = Mode::List {
            list: List::default(),
            hll_type,
        };
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        match &self.mode {
            Mode::Array4(a) => a.serialize(self.lg_config_k),
            Mode::Array6(a) => a.serialize(self.lg_config_k),
            Mode::Array8(a) => a.serialize(self.lg_config_k),
            Mode::List { list, hll_type } => {
                Ok(serialize_coupons(self.lg_config_k, CUR_MODE_LIST, *hll_type, list.container().iter().collect()))
            }
            Mode::Set { set, hll_type } => {
                Ok(serialize_coupons(self.lg_config_k, CUR_MODE_SET, *hll_type, set.container().iter().collect()))
            }
        }
    }

    pub fn deserialize(bytes: &[u8]) -> io::Result<HllSketch> {
        if bytes.len() < PREAMBLE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("sketch data too short: expected at least {PREAMBLE_LEN} bytes, got {}", bytes.len()),
            ));
        }

        let family_id = bytes[FAMILY_BYTE];
        let expected_family_id = crate::codec::family::Family::HLL.id;
        if family_id != expected_family_id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid family: expected {expected_family_id} (HLL), got {family_id}"),
            ));
        }

        let lg_config_k = bytes[LG_K_BYTE];
        if !(4..=21).contains(&lg_config_k) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid lg_k: {lg_config_k}, must be in [4, 21]"),
            ));
        }

        let flags = bytes[FLAGS_BYTE];
        let compact = flags & FLAG_COMPACT != 0;
        let empty = flags & FLAG_EMPTY != 0;
        let ooo = flags & crate::hll::serialization::FLAG_OUT_OF_ORDER != 0;

        let mode_byte = bytes[MODE_BYTE];
        let cur_mode = unpack_cur_mode(mode_byte);
        let hll_type_raw = unpack_hll_type(mode_byte);
        let hll_type = match hll_type_raw {
            0 => HllType::Hll4,
            1 => HllType::Hll6,
            _ => HllType::Hll8,
        };

        if empty {
            return Ok(HllSketch::new(lg_config_k, hll_type));
        }

        let mode = match cur_mode {
            CUR_MODE_LIST | CUR_MODE_SET => {
                let coupons = deserialize_coupons(bytes)?;
                if cur_mode == CUR_MODE_LIST {
                    let mut list = List::default();
                    for c in coupons {
                        list.update(c);
                    }
                    Mode::List { list, hll_type }
                } else {
                    let mut set = HashSet::default();
                    for c in coupons {
                        set.update(c);
                    }
                    Mode::Set { set, hll_type }
                }
            }
            _ => match hll_type {
                HllType::Hll4 => Mode::Array4(Array4::deserialize(bytes, lg_config_k, compact, ooo)?),
                HllType::Hll6 => Mode::Array6(Array6::deserialize(bytes, lg_config_k, compact, ooo)?),
                HllType::Hll8 => Mode::Array8(Array8::deserialize(bytes, lg_config_k, compact, ooo)?),
            },
        };

        Ok(HllSketch { lg_config_k, mode })
    }
}

fn build_array_from_coupons(lg_config_k: u8, hll_type: HllType, coupons: &[u32]) -> Mode {
    match hll_type {
        HllType::Hll4 => {
            let mut a = Array4::new(lg_config_k);
            for &c in coupons {
                a.update(c);
            }
            Mode::Array4(a)
        }
        HllType::Hll6 => {
            let mut a = Array6::new(lg_config_k);
            for &c in coupons {
                a.update(c);
            }
            Mode::Array6(a)
        }
        HllType::Hll8 => {
            let mut a = Array8::new(lg_config_k);
            for &c in coupons {
                a.update(c);
            }
            Mode::Array8(a)
        }
    }
}

fn serialize_coupons(lg_config_k: u8, cur_mode: u8, hll_type: HllType, coupons: Vec<u32>) -> Vec<u8> {
    let mut out = vec![0u8; PREAMBLE_LEN + 4 + coupons.len() * 4];
    out[PREAMBLE_INTS_BYTE] = HLL_PREINTS;
    out[SER_VER_BYTE] = SER_VER;
    out[FAMILY_BYTE] = HLL_FAMILY_ID;
    out[LG_K_BYTE] = lg_config_k;
    out[LG_ARR_BYTE] = 0;

    let mut flags = 0u8;
    if coupons.is_empty() {
        flags |= FLAG_EMPTY;
    }
    out[FLAGS_BYTE] = flags;
    out[HLL_CUR_MIN_BYTE] = 0;
    out[MODE_BYTE] = pack_mode_byte(cur_mode, hll_type as u8);

    out[PREAMBLE_LEN..PREAMBLE_LEN + 4].copy_from_slice(&(coupons.len() as u32).to_le_bytes());
    for (i, c) in coupons.iter().enumerate() {
        let offset = PREAMBLE_LEN + 4 + i * 4;
        out[offset..offset + 4].copy_from_slice(&c.to_le_bytes());
    }
    out
}

fn deserialize_coupons(bytes: &[u8]) -> io::Result<Vec<u32>> {
    if bytes.len() < PREAMBLE_LEN + 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "List/Set sketch data missing coupon count",
        ));
    }
    let count = u32::from_le_bytes(bytes[PREAMBLE_LEN..PREAMBLE_LEN + 4].try_into().unwrap()) as usize;
    let expected_len = PREAMBLE_LEN + 4 + count * 4;
    if bytes.len() < expected_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("List/Set sketch data too short: expected {expected_len}, got {}", bytes.len()),
        ));
    }
    let mut coupons = Vec::with_capacity(count);
    for i in 0..count {
        let offset = PREAMBLE_LEN + 4 + i * 4;
        coupons.push(u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()));
    }
    Ok(coupons)
}
