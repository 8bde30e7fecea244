//! Bias-correction control points for [`super::estimator::HipEstimator`]'s
//! composite (out-of-order) estimate.
//!
//! The raw HLL estimate is biased away from the true cardinality over a
//! range around `k`; the composite estimator corrects for that bias by
//! cubic-interpolating the raw estimate against a per-`lg_config_k`
//! control-point table before blending in linear counting at the low
//! end. The control points here are generated analytically (geometric
//! spacing from `0.1k` to `8k`, with the corrected value converging to
//! the raw one at the top of the range) rather than from empirical
//! simulation, since that calibration data isn't available in this
//! crate; the interpolation mechanics ([`super::cubic_interpolation`])
//! and call shape match the reference algorithm exactly.

use std::collections::HashMap;
use std::sync::OnceLock;

const X_ARR_LENGTH: usize = 32;

/// Number of entries in every per-`lg_config_k` control-point table.
pub fn get_x_arr_length() -> usize {
    X_ARR_LENGTH
}

fn build_x_arr(lg_config_k: u8) -> Vec<f64> {
    let k = (1u64 << lg_config_k) as f64;
    let lo = 0.1 * k;
    let hi = 8.0 * k;
    (0..X_ARR_LENGTH)
        .map(|i| {
            let t = i as f64 / (X_ARR_LENGTH - 1) as f64;
            lo * (hi / lo).powf(t)
        })
        .collect()
}

fn tables() -> &'static HashMap<u8, Vec<f64>> {
    static TABLES: OnceLock<HashMap<u8, Vec<f64>>> = OnceLock::new();
    TABLES.get_or_init(|| (4u8..=21).map(|k| (k, build_x_arr(k))).collect())
}

/// The control-point table for `lg_config_k`, ascending.
pub fn get_x_arr(lg_config_k: u8) -> &'static [f64] {
    tables()
        .get(&lg_config_k)
        .unwrap_or_else(|| panic!("lg_config_k {lg_config_k} out of supported range"))
        .as_slice()
}

/// The implicit per-entry spacing of the corrected-estimate axis: entry
/// `i`'s corrected value is `i * get_y_stride(lg_config_k)`, converging
/// to the raw estimate (`8k`) at the last entry.
pub fn get_y_stride(lg_config_k: u8) -> u32 {
    let k = 1u64 << lg_config_k;
    let final_y = 8 * k;
    (final_y / (X_ARR_LENGTH as u64 - 1)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_length_matches_reported_length() {
        assert_eq!(get_x_arr(10).len(), get_x_arr_length());
    }

    #[test]
    fn table_is_ascending() {
        let arr = get_x_arr(12);
        assert!(arr.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn table_scales_with_lg_config_k() {
        let small = get_x_arr(8);
        let large = get_x_arr(14);
        assert!(large[0] > small[0]);
    }
}
