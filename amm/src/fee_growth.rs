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

//! Fee growth accounting.
//!
//! Fees are tracked as cumulative fee per unit of liquidity in Q128.128. The pool keeps a global
//! accumulator per asset, every initialized tick keeps the part of it that accrued on the far
//! side of the tick from the current price, and positions snapshot the growth inside their range.
//! All of these are differences against arbitrary origins, so they are computed with wrapping
//! arithmetic and only ever interpreted as differences.

use clamm_math::{mul_div_floor, MathError, FEE_GROWTH_FRACTIONAL_BITS};
use sp_core::{U256, U512};

use crate::{
	common::{Amount, FeeGrowthQ128F128, Liquidity, Side, SideMap, Tick},
	ticks::TickInfo,
};

/// Adds `fee` spread over `liquidity` to a global accumulator. With no liquidity there is no one
/// to attribute the fee to, so nothing accrues.
pub fn accrue(
	fee_growth_global: FeeGrowthQ128F128,
	fee: Amount,
	liquidity: Liquidity,
) -> Result<FeeGrowthQ128F128, MathError> {
	if liquidity == 0 || fee.is_zero() {
		return Ok(fee_growth_global)
	}

	Ok(fee_growth_global.overflowing_add(mul_div_floor(
		fee,
		U256::one() << FEE_GROWTH_FRACTIONAL_BITS,
		liquidity,
	)?)
	.0)
}

/// The fee growth outside a tick after the price crosses it.
pub fn crossed_outside(
	fee_growth_global: SideMap<FeeGrowthQ128F128>,
	fee_growth_outside: SideMap<FeeGrowthQ128F128>,
) -> SideMap<FeeGrowthQ128F128> {
	fee_growth_global
		.zip(fee_growth_outside)
		.map(|_side, (global, outside)| global.overflowing_sub(outside).0)
}

/// The fee growth per unit of liquidity inside `[lower_tick, upper_tick)`.
///
/// Individual values may have wrapped, for example when a new lower tick initializes its outside
/// to the global growth while an existing upper tick carries older growth. Only the difference
/// between two readings for the same range is meaningful.
pub fn fee_growth_inside(
	lower_tick: Tick,
	lower_info: &TickInfo,
	upper_tick: Tick,
	upper_info: &TickInfo,
	current_tick: Tick,
	fee_growth_global: SideMap<FeeGrowthQ128F128>,
) -> SideMap<FeeGrowthQ128F128> {
	fee_growth_global.map(|side: Side, global| {
		let fee_growth_below = if current_tick < lower_tick {
			global.overflowing_sub(lower_info.fee_growth_outside[side]).0
		} else {
			lower_info.fee_growth_outside[side]
		};

		let fee_growth_above = if current_tick < upper_tick {
			upper_info.fee_growth_outside[side]
		} else {
			global.overflowing_sub(upper_info.fee_growth_outside[side]).0
		};

		global.overflowing_sub(fee_growth_below).0.overflowing_sub(fee_growth_above).0
	})
}

/// Fees earned by `liquidity` while the inside growth moved from `last` to `now`.
pub fn fees_earned(
	fee_growth_inside_now: FeeGrowthQ128F128,
	fee_growth_inside_last: FeeGrowthQ128F128,
	liquidity: Liquidity,
) -> Result<Amount, MathError> {
	// The growth difference is below 2^256 and liquidity below 2^128, so the quotient always fits.
	mul_div_floor(
		fee_growth_inside_now.overflowing_sub(fee_growth_inside_last).0,
		liquidity.into(),
		U512::one() << FEE_GROWTH_FRACTIONAL_BITS,
	)
}
