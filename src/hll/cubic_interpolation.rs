//! Cubic (Catmull-Rom) interpolation over a monotone `x` control-point
//! table, used by both the coupon-based estimator ([`super::container`])
//! and the composite HLL estimator ([`super::estimator`]).

/// Interpolates `y` at `x_val` given explicit, equal-length `x_arr`/`y_arr`
/// control points. `x_arr` must be sorted ascending. Values outside the
/// table are clamped to the nearest endpoint.
pub fn using_x_and_y_tables(x_arr: &[f64], y_arr: &[f64], x_val: f64) -> f64 {
    debug_assert_eq!(x_arr.len(), y_arr.len());
    let n = x_arr.len();
    if n == 0 {
        return 0.0;
    }
    if x_val <= x_arr[0] {
        return y_arr[0];
    }
    if x_val >= x_arr[n - 1] {
        return y_arr[n - 1];
    }
    let i = bracket(x_arr, x_val);
    catmull_rom(x_arr, y_arr, i, x_val)
}

/// Interpolates `y` at `x_val` given an `x_arr` control-point table whose
/// corresponding `y` values are implicit: `y[i] = i * y_stride`.
pub fn using_x_arr_and_y_stride(x_arr: &[f64], y_stride: f64, x_val: f64) -> f64 {
    let n = x_arr.len();
    if n == 0 {
        return 0.0;
    }
    if x_val <= x_arr[0] {
        return 0.0;
    }
    let last = (n - 1) as f64;
    if x_val >= x_arr[n - 1] {
        return last * y_stride;
    }
    let i = bracket(x_arr, x_val);
    let y = |idx: usize| idx as f64 * y_stride;
    catmull_rom_with(x_arr, y, i, x_val)
}

/// Returns the index `i` such that `x_arr[i] <= x_val < x_arr[i + 1]`.
fn bracket(x_arr: &[f64], x_val: f64) -> usize {
    match x_arr.binary_search_by(|probe| probe.partial_cmp(&x_val).unwrap()) {
        Ok(idx) => idx.min(x_arr.len() - 2),
        Err(idx) => (idx - 1).min(x_arr.len() - 2),
    }
}

fn catmull_rom(x_arr: &[f64], y_arr: &[f64], i: usize, x_val: f64) -> f64 {
    catmull_rom_with(x_arr, |idx| y_arr[idx], i, x_val)
}

/// Catmull-Rom interpolation between control points `i` and `i + 1`,
/// using `i - 1` and `i + 2` (clamped to the table bounds) as tangent
/// neighbors.
fn catmull_rom_with(x_arr: &[f64], y: impl Fn(usize) -> f64, i: usize, x_val: f64) -> f64 {
    let n = x_arr.len();
    let i0 = i.saturating_sub(1);
    let i1 = i;
    let i2 = (i + 1).min(n - 1);
    let i3 = (i + 2).min(n - 1);

    let (x1, x2) = (x_arr[i1], x_arr[i2]);
    let span = x2 - x1;
    if span <= 0.0 {
        return y(i1);
    }
    let t = (x_val - x1) / span;

    let (y0, y1, y2, y3) = (y(i0), y(i1), y(i2), y(i3));
    let t2 = t * t;
    let t3 = t2 * t;

    0.5 * ((2.0 * y1)
        + (-y0 + y2) * t
        + (2.0 * y0 - 5.0 * y1 + 4.0 * y2 - y3) * t2
        + (-y0 + 3.0 * y1 - 3.0 * y2 + y3) * t3)
}
