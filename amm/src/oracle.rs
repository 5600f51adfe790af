// Copyright 2025 Chainflip Labs GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Time weighted price oracle.
//!
//! The oracle keeps a ring buffer of cumulative values: the tick integrated over time and the
//! reciprocal of active liquidity integrated over time. The average of either over a window is the
//! difference of two readings divided by the window length, so a single trade cannot move it much.
//!
//! An observation records the state that was in effect *before* the operation that writes it,
//! and at most one is written per timestamp.

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};
use sp_core::U256;

use clamm_math::{mul_div_floor, MathError, FEE_GROWTH_FRACTIONAL_BITS};

use crate::common::{Liquidity, Tick};

/// Seconds, supplied by the caller and never decreasing.
pub type Timestamp = u64;

#[derive(
	Clone,
	Copy,
	Debug,
	Default,
	PartialEq,
	Eq,
	TypeInfo,
	Encode,
	Decode,
	MaxEncodedLen,
	Serialize,
	Deserialize,
)]
pub struct Observation {
	pub timestamp: Timestamp,
	/// Sum of the current tick over every second since the oracle was created.
	pub tick_cumulative: i64,
	/// Sum of `1 / max(liquidity, 1)` over every second, in Q128.128. Wraps.
	pub seconds_per_liquidity_cumulative: U256,
	/// Slots allocated by `grow` are uninitialized until the ring buffer reaches them.
	pub initialized: bool,
}

impl Observation {
	/// The observation at `timestamp`, given that `tick` and `liquidity` were in effect since
	/// `self`.
	fn transform(&self, timestamp: Timestamp, tick: Tick, liquidity: Liquidity) -> Observation {
		let elapsed = timestamp - self.timestamp;
		Observation {
			timestamp,
			tick_cumulative: self
				.tick_cumulative
				.wrapping_add((tick as i64).wrapping_mul(elapsed as i64)),
			seconds_per_liquidity_cumulative: self.seconds_per_liquidity_cumulative.overflowing_add(
				(U256::from(elapsed) << FEE_GROWTH_FRACTIONAL_BITS) / U256::from(liquidity.max(1)),
			)
			.0,
			initialized: true,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
	#[error("the averaging window must not be empty")]
	ZeroWindow,
	#[error("the requested time is before the oldest observation")]
	ObservationTooOld,
	#[error("time {now} is before the latest observation at {latest}")]
	TimestampInPast { now: Timestamp, latest: Timestamp },
	#[error(transparent)]
	Math(#[from] MathError),
}

/// A pending write, computed by `Oracle::pending_write` and applied with `Oracle::apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleWrite {
	index: u16,
	cardinality: u16,
	observation: Observation,
}

/// Averages over a window, as returned by `Oracle::consult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapObservation {
	pub arithmetic_mean_tick: Tick,
	pub harmonic_mean_liquidity: Liquidity,
}

#[derive(Clone, Debug, PartialEq, Eq, TypeInfo, Encode, Decode, Serialize, Deserialize)]
pub struct Oracle {
	observations: Vec<Observation>,
	/// Slot of the most recent observation.
	index: u16,
	/// Number of slots in use.
	cardinality: u16,
	/// Number of slots allocated, the ring grows to this once the write index wraps.
	cardinality_next: u16,
}

impl Oracle {
	/// An oracle with a single observation at `now`, with room for `capacity` observations.
	pub fn new(now: Timestamp, capacity: u16) -> Self {
		let mut oracle = Oracle {
			observations: vec![Observation {
				timestamp: now,
				tick_cumulative: 0,
				seconds_per_liquidity_cumulative: U256::zero(),
				initialized: true,
			}],
			index: 0,
			cardinality: 1,
			cardinality_next: 1,
		};
		oracle.grow(capacity);
		oracle
	}

	pub fn cardinality(&self) -> u16 {
		self.cardinality
	}

	pub fn cardinality_next(&self) -> u16 {
		self.cardinality_next
	}

	pub fn latest(&self) -> &Observation {
		&self.observations[self.index as usize]
	}

	/// Allocates slots so the ring can hold `next` observations, returning the new capacity.
	/// Capacity never shrinks.
	pub fn grow(&mut self, next: u16) -> u16 {
		if next > self.cardinality_next {
			self.observations.resize(next as usize, Observation::default());
			self.cardinality_next = next;
		}
		self.cardinality_next
	}

	pub fn check_time(&self, now: Timestamp) -> Result<(), OracleError> {
		let latest = self.latest().timestamp;
		if now < latest {
			Err(OracleError::TimestampInPast { now, latest })
		} else {
			Ok(())
		}
	}

	/// The write an operation at `now` would cause, where `tick` and `liquidity` are the values
	/// in effect before the operation. `None` if an observation already exists for `now`.
	pub fn pending_write(
		&self,
		now: Timestamp,
		tick: Tick,
		liquidity: Liquidity,
	) -> Result<Option<OracleWrite>, OracleError> {
		self.check_time(now)?;
		let latest = self.latest();
		if latest.timestamp == now {
			return Ok(None)
		}

		let cardinality = if self.cardinality_next > self.cardinality &&
			self.index == self.cardinality - 1
		{
			self.cardinality_next
		} else {
			self.cardinality
		};

		Ok(Some(OracleWrite {
			index: ((self.index as u32 + 1) % cardinality as u32) as u16,
			cardinality,
			observation: latest.transform(now, tick, liquidity),
		}))
	}

	pub fn apply(&mut self, write: OracleWrite) {
		self.observations[write.index as usize] = write.observation;
		self.index = write.index;
		self.cardinality = write.cardinality;
	}

	pub fn write(
		&mut self,
		now: Timestamp,
		tick: Tick,
		liquidity: Liquidity,
	) -> Result<(), OracleError> {
		if let Some(write) = self.pending_write(now, tick, liquidity)? {
			self.apply(write);
		}
		Ok(())
	}

	fn slot(&self, index: u32) -> &Observation {
		&self.observations[(index % self.cardinality as u32) as usize]
	}

	/// The observations at or immediately before and after `target`, which must lie within
	/// the ring.
	fn binary_search(&self, target: Timestamp) -> (Observation, Observation) {
		let oldest = self.index as u32 + 1;
		let mut low = oldest;
		let mut high = oldest + self.cardinality as u32 - 1;

		loop {
			let middle = (low + high) / 2;
			let before = *self.slot(middle);
			if !before.initialized {
				low = middle + 1;
				continue
			}
			let after = *self.slot(middle + 1);

			if before.timestamp <= target {
				if target <= after.timestamp {
					return (before, after)
				}
				low = middle + 1;
			} else {
				high = middle - 1;
			}
		}
	}

	fn surrounding_observations(
		&self,
		target: Timestamp,
		tick: Tick,
		liquidity: Liquidity,
	) -> Result<(Observation, Observation), OracleError> {
		let latest = *self.latest();
		if latest.timestamp <= target {
			return Ok(if latest.timestamp == target {
				(latest, latest)
			} else {
				(latest, latest.transform(target, tick, liquidity))
			})
		}

		let mut oldest = *self.slot(self.index as u32 + 1);
		if !oldest.initialized {
			oldest = self.observations[0];
		}
		if target < oldest.timestamp {
			return Err(OracleError::ObservationTooOld)
		}

		Ok(self.binary_search(target))
	}

	/// The cumulative values `seconds_ago` before `now`, interpolating between observations and
	/// extrapolating from the latest one with `tick` and `liquidity`.
	pub fn observe_single(
		&self,
		now: Timestamp,
		seconds_ago: u64,
		tick: Tick,
		liquidity: Liquidity,
	) -> Result<(i64, U256), OracleError> {
		self.check_time(now)?;
		let target = now.checked_sub(seconds_ago).ok_or(OracleError::ObservationTooOld)?;

		let (before, after) = self.surrounding_observations(target, tick, liquidity)?;

		Ok(if target == before.timestamp {
			(before.tick_cumulative, before.seconds_per_liquidity_cumulative)
		} else if target == after.timestamp {
			(after.tick_cumulative, after.seconds_per_liquidity_cumulative)
		} else {
			let span = after.timestamp - before.timestamp;
			let into_span = target - before.timestamp;
			(
				before.tick_cumulative.wrapping_add(
					after.tick_cumulative.wrapping_sub(before.tick_cumulative) / span as i64 *
						into_span as i64,
				),
				before.seconds_per_liquidity_cumulative.overflowing_add(mul_div_floor(
					after
						.seconds_per_liquidity_cumulative
						.overflowing_sub(before.seconds_per_liquidity_cumulative)
						.0,
					into_span.into(),
					U256::from(span),
				)?)
				.0,
			)
		})
	}

	pub fn observe(
		&self,
		now: Timestamp,
		seconds_agos: &[u64],
		tick: Tick,
		liquidity: Liquidity,
	) -> Result<Vec<(i64, U256)>, OracleError> {
		seconds_agos
			.iter()
			.map(|seconds_ago| self.observe_single(now, *seconds_ago, tick, liquidity))
			.collect()
	}

	/// The arithmetic mean tick and harmonic mean liquidity over the `window` seconds ending at
	/// `now`. The mean tick rounds towards negative infinity.
	pub fn consult(
		&self,
		now: Timestamp,
		window: u64,
		tick: Tick,
		liquidity: Liquidity,
	) -> Result<TwapObservation, OracleError> {
		if window == 0 {
			return Err(OracleError::ZeroWindow)
		}

		let (tick_cumulative_start, seconds_per_liquidity_start) =
			self.observe_single(now, window, tick, liquidity)?;
		let (tick_cumulative_end, seconds_per_liquidity_end) =
			self.observe_single(now, 0, tick, liquidity)?;

		let tick_cumulative_delta = tick_cumulative_end.wrapping_sub(tick_cumulative_start);
		let arithmetic_mean_tick = tick_cumulative_delta.div_euclid(window as i64);

		let seconds_per_liquidity_delta =
			seconds_per_liquidity_end.overflowing_sub(seconds_per_liquidity_start).0;
		let harmonic_mean_liquidity = if seconds_per_liquidity_delta.is_zero() {
			Liquidity::MAX
		} else {
			let mean = mul_div_floor(
				U256::from(window),
				U256::one() << FEE_GROWTH_FRACTIONAL_BITS,
				seconds_per_liquidity_delta,
			)?;
			if mean > U256::from(Liquidity::MAX) {
				Liquidity::MAX
			} else {
				mean.low_u128()
			}
		};

		Ok(TwapObservation {
			arithmetic_mean_tick: Tick::try_from(arithmetic_mean_tick)
				.map_err(|_| MathError::InvalidTick)?,
			harmonic_mean_liquidity,
		})
	}
}
