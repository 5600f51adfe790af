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

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

use clamm_math::{add_liquidity_delta, MathError};

use crate::common::{FeeGrowthQ128F128, Liquidity, SideMap, Tick, MAX_TICK, MIN_TICK};

/// The liquidity state at a single initialized tick.
#[derive(
	Clone,
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
pub struct TickInfo {
	/// Total liquidity of all positions using this tick as a bound. The tick is initialized iff
	/// this is non-zero.
	pub liquidity_gross: Liquidity,
	/// Change in active liquidity when the price moves up across this tick.
	pub liquidity_net: i128,
	/// Fee growth on the other side of this tick from the current tick, relative to an
	/// arbitrary origin chosen when the tick was initialized.
	pub fee_growth_outside: SideMap<FeeGrowthQ128F128>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TickUpdateError {
	/// The tick's gross liquidity would exceed `max_liquidity_per_tick`.
	#[error("gross liquidity at tick would exceed the per tick maximum")]
	MaximumGrossLiquidity,
	#[error(transparent)]
	Math(#[from] MathError),
}

/// The lowest and highest ticks that are multiples of `tick_spacing`.
pub fn usable_tick_bounds(tick_spacing: Tick) -> (Tick, Tick) {
	((MIN_TICK / tick_spacing) * tick_spacing, (MAX_TICK / tick_spacing) * tick_spacing)
}

/// The maximum gross liquidity any single tick may hold.
///
/// Chosen so that even if every usable tick held the maximum, the active liquidity could not
/// overflow.
pub fn max_liquidity_per_tick(tick_spacing: Tick) -> Liquidity {
	let (min_tick, max_tick) = usable_tick_bounds(tick_spacing);
	let number_of_ticks = ((max_tick - min_tick) / tick_spacing) as u128 + 1;
	Liquidity::MAX / number_of_ticks
}

impl TickInfo {
	/// Computes the record for `tick` after a position bounded by it changes by
	/// `liquidity_delta`, together with whether the tick's initialization state flipped.
	///
	/// `existing` must be the current record, if any. A newly initialized tick assumes all fee
	/// growth to date happened below it, which is what `fee_growth_outside = global` encodes when
	/// the tick is at or below the current tick.
	///
	/// If this function returns an `Err(_)` nothing has changed, it never mutates its inputs.
	pub fn updated(
		existing: Option<&TickInfo>,
		tick: Tick,
		current_tick: Tick,
		global_fee_growth: SideMap<FeeGrowthQ128F128>,
		liquidity_delta: i128,
		is_upper: bool,
		max_liquidity: Liquidity,
	) -> Result<(TickInfo, bool), TickUpdateError> {
		let mut info = existing.cloned().unwrap_or_default();
		let gross_before = info.liquidity_gross;

		info.liquidity_gross = add_liquidity_delta(gross_before, liquidity_delta)?;
		if info.liquidity_gross > max_liquidity {
			return Err(TickUpdateError::MaximumGrossLiquidity)
		}

		if gross_before == 0 {
			info.fee_growth_outside =
				if tick <= current_tick { global_fee_growth } else { Default::default() };
		}

		info.liquidity_net = if is_upper {
			info.liquidity_net.checked_sub(liquidity_delta)
		} else {
			info.liquidity_net.checked_add(liquidity_delta)
		}
		.ok_or(MathError::LiquidityOverflow)?;

		let flipped = (gross_before == 0) != (info.liquidity_gross == 0);

		Ok((info, flipped))
	}

	pub fn is_initialized(&self) -> bool {
		self.liquidity_gross != 0
	}
}
