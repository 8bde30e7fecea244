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

//! A software library of stochastic streaming algorithms, commonly
//! called "sketches", for approximate analysis of very large data sets.
//!
//! - [`quantiles`]: rank and quantile estimation over a stream of doubles.
//! - [`theta`]: set-cardinality estimation with union/intersection/a-not-b.
//! - [`hll`]: HyperLogLog cardinality estimation.
//!
//! [`memory`] is the byte-region abstraction shared by every sketch
//! family's direct (in-place, non-heap-allocating) form.

mod codec;
mod hash;

pub mod common;
pub mod error;
pub mod hll;
pub mod memory;
pub mod quantiles;
pub mod theta;
