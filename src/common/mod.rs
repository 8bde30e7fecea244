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

//! Shared helpers used across the quantiles, theta, and HLL sketch families.

pub mod random;

use crate::error::Error;
use crate::error::ErrorKind;

/// Controls how aggressively a hash-table-backed sketch grows when it needs
/// more room.
///
/// `lg_value()` is the number of bits the current size's log2 grows by on
/// each resize step, so `X1` never grows past its starting size (useful for
/// intersection/a-not-b scratch tables sized once up front).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeFactor {
    /// No growth; table is allocated at its final size up front.
    X1,
    /// Double the table size (in elements) on each resize.
    X2,
    /// Quadruple the table size on each resize.
    X4,
    /// Grow the table eightfold on each resize.
    X8,
}

impl ResizeFactor {
    /// Log2 growth applied to `lg_cur_size` on each resize step.
    pub fn lg_value(self) -> u8 {
        match self {
            ResizeFactor::X1 => 0,
            ResizeFactor::X2 => 1,
            ResizeFactor::X4 => 2,
            ResizeFactor::X8 => 3,
        }
    }
}

/// Number of standard deviations to use for an approximate confidence
/// interval around a sketch's estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumStdDev {
    /// ~68% confidence.
    One,
    /// ~95% confidence.
    Two,
    /// ~99.7% confidence.
    Three,
}

impl NumStdDev {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            NumStdDev::One => 1.0,
            NumStdDev::Two => 2.0,
            NumStdDev::Three => 3.0,
        }
    }
}

/// Canonicalizes a `f64` the way the Java reference implementation does
/// before hashing it: negative zero collapses to positive zero, and every
/// NaN bit pattern collapses to the canonical NaN, so that semantically
/// equal doubles always hash identically.
pub fn canonical_double(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else if value.is_nan() {
        f64::NAN
    } else {
        value
    }
}

/// Normal-approximation binomial confidence bounds for KMV-style sketches
/// (theta, HLL-in-linear-counting-regime). Shared so each family doesn't
/// reimplement the same variance estimate.
pub mod binomial_bounds {
    use super::Error;
    use super::ErrorKind;
    use super::NumStdDev;

    fn estimate_and_std_dev(num_retained: u64, theta: f64) -> Result<(f64, f64), Error> {
        if !(theta > 0.0 && theta <= 1.0) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("theta must be in (0.0, 1.0], got {theta}"),
            ));
        }
        let n = num_retained as f64;
        let estimate = n / theta;
        // Variance of a binomial-thinning estimator: Var[n/theta] = n*(1-theta)/theta^2.
        let std_dev = if n == 0.0 {
            0.0
        } else {
            (estimate * (1.0 - theta) / theta).sqrt()
        };
        Ok((estimate, std_dev))
    }

    /// Approximate lower bound on the true cardinality.
    pub fn lower_bound(num_retained: u64, theta: f64, num_std_dev: NumStdDev) -> Result<f64, Error> {
        let (estimate, std_dev) = estimate_and_std_dev(num_retained, theta)?;
        Ok((estimate - num_std_dev.as_f64() * std_dev).max(0.0))
    }

    /// Approximate upper bound on the true cardinality.
    pub fn upper_bound(
        num_retained: u64,
        theta: f64,
        num_std_dev: NumStdDev,
        is_empty: bool,
    ) -> Result<f64, Error> {
        if is_empty {
            return Ok(0.0);
        }
        let (estimate, std_dev) = estimate_and_std_dev(num_retained, theta)?;
        Ok(estimate + num_std_dev.as_f64() * std_dev)
    }
}
