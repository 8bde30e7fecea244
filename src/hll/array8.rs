//! HyperLogLog Array8 mode - 8-bit (1 byte per slot) representation
//!
//! Array8 is the simplest HLL array implementation, storing one byte per slot.
//! This provides the maximum value range (0-255) with no bit-packing complexity.

use crate::hll::estimator::HipEstimator;
use crate::hll::{get_slot, get_value};

/// Core Array8 data structure - one byte per slot, no packing
#[derive(Debug, Clone, PartialEq)]
pub struct Array8 {
    lg_config_k: u8,
    /// Direct byte array: bytes[slot] = value
    bytes: Box<[u8]>,
    /// Count of slots with value 0
    num_zeros: u32,
    /// HIP estimator for cardinality estimation
    estimator: HipEstimator,
}

impl Array8 {
    pub fn new(lg_config_k: u8) -> Self {
        let k = 1 << lg_config_k;

        Self {
            lg_config_k,
            bytes: vec![0u8; k as usize].into_boxed_slice(),
            num_zeros: k,
            estimator: HipEstimator::new(lg_config_k),
        }
    }

    /// Get value from a slot
    ///
    /// Direct array access - no bit manipulation required.
    #[inline]
    pub fn get(&self, slot: u32) -> u8 {
        self.bytes[slot as usize]
    }

    /// Set value in a slot
    ///
    /// Direct array write - no bit manipulation required.
    #[inline]
    fn put(&mut self, slot: u32, value: u8) {
        self.bytes[slot as usize] = value;
    }

    /// Update with a coupon
    pub fn update(&mut self, coupon: u32) {
        let mask = (1 << self.lg_config_k) - 1;
        let slot = get_slot(coupon) & mask;
        let new_value = get_value(coupon);

        let old_value = self.get(slot);

        if new_value > old_value {
            // Update HIP and KxQ registers via estimator
            self.estimator
                .update(self.lg_config_k, old_value, new_value);

            // Update the slot
            self.put(slot, new_value);

            // Track num_zeros (count of slots with value 0)
            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
    }

    /// Get the current cardinality estimate using HIP estimator
    pub fn estimate(&self) -> f64 {
        // Array8 doesn't use cur_min (always 0), so num_at_cur_min = num_zeros
        self.estimator.estimate(self.lg_config_k, 0, self.num_zeros)
    }

    /// Get the number of zero-valued slots
    pub fn num_zeros(&self) -> u32 {
        self.num_zeros
    }

    /// Get the total number of bytes used
    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Direct register storage, one byte per slot.
    pub fn values(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of registers (slots) backing this array.
    pub fn num_registers(&self) -> usize {
        self.bytes.len()
    }

    pub fn hip_accum(&self) -> f64 {
        self.estimator.hip_accum()
    }

    pub fn set_hip_accum(&mut self, hip_accum: f64) {
        self.estimator.set_hip_accum(hip_accum);
    }

    /// Overwrites a register directly, bypassing HIP/KxQ bookkeeping.
    ///
    /// Callers must follow up with [`rebuild_estimator_from_registers`](Self::rebuild_estimator_from_registers)
    /// once all registers for a merge have been written.
    pub(crate) fn set_register(&mut self, slot: usize, value: u8) {
        if self.bytes[slot] == 0 && value != 0 {
            self.num_zeros -= 1;
        }
        self.bytes[slot] = value;
    }

    /// Recomputes `num_zeros` and the KxQ registers from the current register
    /// contents. The HIP accumulator cannot be reconstructed this way, so
    /// merges that call this must separately restore or invalidate it.
    pub(crate) fn rebuild_estimator_from_registers(&mut self) {
        self.num_zeros = self.bytes.iter().filter(|&&v| v == 0).count() as u32;
        self.estimator
            .rebuild_kxq_from_registers(self.lg_config_k, self.bytes.iter().copied());
    }

    /// Merges another same-lg_k Array8's registers into this one, taking the
    /// max of each corresponding slot. Invalidates the HIP accumulator.
    pub(crate) fn merge_array_same_lgk(&mut self, src_values: &[u8]) {
        debug_assert_eq!(src_values.len(), self.bytes.len());
        for slot in 0..self.bytes.len() {
            if src_values[slot] > self.bytes[slot] {
                self.set_register(slot, src_values[slot]);
            }
        }
        self.rebuild_estimator_from_registers();
    }

    /// Merges a higher-resolution array's registers into this one, mapping
    /// multiple source slots onto each destination slot via masking.
    /// Invalidates the HIP accumulator.
    pub(crate) fn merge_array_with_downsample(&mut self, src_values: &[u8], src_lg_k: u8) {
        let dst_mask = (1u32 << self.lg_config_k) - 1;
        for (src_slot, &val) in src_values.iter().enumerate() {
            if val > 0 {
                let dst_slot = (src_slot as u32 & dst_mask) as usize;
                if val > self.bytes[dst_slot] {
                    self.set_register(dst_slot, val);
                }
            }
        }
        let _ = src_lg_k;
        self.rebuild_estimator_from_registers();
    }

    /// Deserialize Array8 from HLL mode bytes.
    ///
    /// Expects the full HLL preamble (40 bytes) followed by one byte per
    /// register.
    pub(crate) fn deserialize(
        bytes: &[u8],
        lg_config_k: u8,
        compact: bool,
        ooo: bool,
    ) -> std::io::Result<Self> {
        use crate::hll::serialization::PREAMBLE_LEN;
        use std::io::{Error, ErrorKind};

        let k = 1usize << lg_config_k;
        let expected_len = if compact { PREAMBLE_LEN } else { PREAMBLE_LEN + k };
        if bytes.len() < expected_len {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "Array8 data too short: expected {}, got {}",
                    expected_len,
                    bytes.len()
                ),
            ));
        }

        let hip_accum = f64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let kxq0 = f64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let kxq1 = f64::from_le_bytes(bytes[24..32].try_into().unwrap());
        let num_zeros = u32::from_le_bytes(bytes[32..36].try_into().unwrap());

        let mut data = vec![0u8; k];
        if !compact {
            data.copy_from_slice(&bytes[PREAMBLE_LEN..PREAMBLE_LEN + k]);
        }

        let mut estimator = HipEstimator::new(lg_config_k);
        estimator.set_hip_accum(hip_accum);
        estimator.set_kxq0(kxq0);
        estimator.set_kxq1(kxq1);
        estimator.set_out_of_order(ooo);

        Ok(Self {
            lg_config_k,
            bytes: data.into_boxed_slice(),
            num_zeros,
            estimator,
        })
    }

    /// Serialize Array8 to bytes: the 40-byte HLL preamble followed by one
    /// byte per register.
    pub(crate) fn serialize(&self, lg_config_k: u8) -> std::io::Result<Vec<u8>> {
        use crate::hll::serialization::{
            FAMILY_BYTE, FLAGS_BYTE, FLAG_OUT_OF_ORDER, HLL_CUR_MIN_BYTE, HLL_FAMILY_ID,
            HLL_PREINTS, LG_ARR_BYTE, LG_K_BYTE, MODE_BYTE, PREAMBLE_INTS_BYTE, PREAMBLE_LEN,
            SER_VER, SER_VER_BYTE, pack_mode_byte,
        };
        use crate::hll::HllType;

        let mut out = vec![0u8; PREAMBLE_LEN + self.bytes.len()];

        out[PREAMBLE_INTS_BYTE] = HLL_PREINTS;
        out[SER_VER_BYTE] = SER_VER;
        out[FAMILY_BYTE] = HLL_FAMILY_ID;
        out[LG_K_BYTE] = lg_config_k;
        out[LG_ARR_BYTE] = 0;

        let mut flags = 0u8;
        if self.estimator.is_out_of_order() {
            flags |= FLAG_OUT_OF_ORDER;
        }
        out[FLAGS_BYTE] = flags;
        out[HLL_CUR_MIN_BYTE] = 0;
        out[MODE_BYTE] = pack_mode_byte(2, HllType::Hll8 as u8);

        out[8..16].copy_from_slice(&self.estimator.hip_accum().to_le_bytes());
        out[16..24].copy_from_slice(&self.estimator.kxq0().to_le_bytes());
        out[24..32].copy_from_slice(&self.estimator.kxq1().to_le_bytes());
        out[32..36].copy_from_slice(&self.num_zeros.to_le_bytes());
        out[36..40].copy_from_slice(&0u32.to_le_bytes());

        out[PREAMBLE_LEN..].copy_from_slice(&self.bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::{coupon, pack_coupon};

    #[test]
    fn test_array8_basic() {
        let arr = Array8::new(10); // 1024 buckets

        // Initially all slots should be 0
        assert_eq!(arr.get(0), 0);
        assert_eq!(arr.get(100), 0);
        assert_eq!(arr.get(1023), 0);
        assert_eq!(arr.num_zeros(), 1024);

        // Storage should be exactly k bytes
        assert_eq!(arr.size_bytes(), 1024);
    }

    #[test]
    fn test_storage_calculation() {
        // Array8 uses exactly k bytes
        assert_eq!(Array8::new(4).size_bytes(), 16);
        assert_eq!(Array8::new(8).size_bytes(), 256);
        assert_eq!(Array8::new(10).size_bytes(), 1024);
        assert_eq!(Array8::new(14).size_bytes(), 16384);
    }

    #[test]
    fn test_get_set() {
        let mut arr = Array8::new(4); // 16 slots

        // Test all possible 8-bit values
        for slot in 0..16 {
            arr.put(slot, (slot * 17) as u8); // Various values
        }

        for slot in 0..16 {
            assert_eq!(arr.get(slot), (slot * 17) as u8);
        }

        // Test full range (0-255)
        arr.put(0, 0);
        arr.put(1, 127);
        arr.put(2, 255);

        assert_eq!(arr.get(0), 0);
        assert_eq!(arr.get(1), 127);
        assert_eq!(arr.get(2), 255);
    }

    #[test]
    fn test_update_basic() {
        let mut arr = Array8::new(4);

        // Update slot 0 with value 5
        arr.update(pack_coupon(0, 5));
        assert_eq!(arr.get(0), 5);

        // Update with a smaller value (should be ignored)
        arr.update(pack_coupon(0, 3));
        assert_eq!(arr.get(0), 5);

        // Update with a larger value
        arr.update(pack_coupon(0, 42));
        assert_eq!(arr.get(0), 42);

        // Test value at max coupon range (63)
        // Note: pack_coupon only stores 6 bits (0-63)
        arr.update(pack_coupon(1, 63));
        assert_eq!(arr.get(1), 63);
    }

    #[test]
    fn test_num_zeros_tracking() {
        let mut arr = Array8::new(4); // 16 slots
        assert_eq!(arr.num_zeros(), 16);

        // Update one slot from 0 to non-zero
        arr.update(pack_coupon(0, 5));
        assert_eq!(arr.num_zeros(), 15);

        // Update same slot again (should not change num_zeros)
        arr.update(pack_coupon(0, 10));
        assert_eq!(arr.num_zeros(), 15);

        // Update another slot
        arr.update(pack_coupon(1, 3));
        assert_eq!(arr.num_zeros(), 14);

        // Update multiple slots to zero
        for i in 2..16 {
            arr.update(pack_coupon(i, 1));
        }
        assert_eq!(arr.num_zeros(), 0);
    }

    #[test]
    fn test_hip_estimator() {
        let mut arr = Array8::new(10); // 1024 buckets

        // Initially estimate should be 0
        assert_eq!(arr.estimate(), 0.0);

        // Add some unique values using real coupon hashing
        for i in 0..10_000u32 {
            let coupon = coupon(i);
            arr.update(coupon);
        }

        let estimate = arr.estimate();

        // Sanity checks
        assert!(estimate > 0.0, "Estimate should be positive");
        assert!(estimate.is_finite(), "Estimate should be finite");

        // Rough bounds for 10K unique items (very loose)
        assert!(estimate > 1_000.0, "Estimate seems too low");
        assert!(estimate < 100_000.0, "Estimate seems too high");
    }

    #[test]
    fn test_full_value_range() {
        let mut arr = Array8::new(8); // 256 slots

        // Test all possible 8-bit values (0-255)
        for val in 0..=255u8 {
            arr.put(val as u32, val);
        }

        for val in 0..=255u8 {
            assert_eq!(arr.get(val as u32), val);
        }
    }

    #[test]
    fn test_high_value_direct() {
        let mut arr = Array8::new(6); // 64 slots

        // Test that Array8 CAN store full range (0-255) directly
        // Even though coupons are limited to 6 bits (0-63)
        // Direct put/get bypasses coupon encoding
        let test_values = [16, 32, 64, 128, 200, 255];

        for (slot, &value) in test_values.iter().enumerate() {
            arr.put(slot as u32, value);
            assert_eq!(arr.get(slot as u32), value);
        }

        // Verify no cross-slot corruption
        for (slot, &value) in test_values.iter().enumerate() {
            assert_eq!(arr.get(slot as u32), value);
        }
    }

    #[test]
    fn test_kxq_register_split() {
        let mut arr = Array8::new(8); // 256 buckets

        // Test that values < 32 and >= 32 are handled correctly
        arr.update(pack_coupon(0, 10)); // value < 32, goes to kxq0
        arr.update(pack_coupon(1, 50)); // value >= 32, goes to kxq1

        // Initial kxq0 = 256 (all zeros = 1.0 each)
        assert!(arr.estimator.kxq0() < 256.0, "kxq0 should have decreased");

        // kxq1 should have a positive value (from 1/2^50)
        assert!(arr.estimator.kxq1() > 0.0, "kxq1 should be positive");
        assert!(
            arr.estimator.kxq1() < 1e-10,
            "kxq1 should be very small (1/2^50 â‰ˆ 8.9e-16)"
        );
    }

    #[test]
    fn test_memory_comparison() {
        let lg_k = 10; // 1024 slots

        // Array4: k/2 bytes
        let array4_size = 512;

        // Array6: (k*3)/4 + 1 bytes
        let array6_size = 769;

        // Array8: k bytes
        let array8 = Array8::new(lg_k);
        assert_eq!(array8.size_bytes(), 1024);

        // Verify Array8 is largest
        assert!(array8.size_bytes() > array4_size);
        assert!(array8.size_bytes() > array6_size);

        // Array8 is 2x Array4, ~1.33x Array6
        assert_eq!(array8.size_bytes(), 2 * array4_size);
        assert!((array8.size_bytes() as f64) / (array6_size as f64) > 1.3);
        assert!((array8.size_bytes() as f64) / (array6_size as f64) < 1.4);
    }
}
