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

//! The swap executor.
//!
//! A swap walks the price curve from the current price towards a limit. Between two initialized
//! ticks the liquidity is constant, so each segment is priced in closed form by
//! `compute_swap_step`. Whenever the price lands exactly on an initialized tick, the tick is
//! crossed: its outside fee growth is flipped and its net liquidity applied.
//!
//! `compute_swap` never mutates the pool, it returns everything the pool needs to commit the
//! swap once settlement has succeeded.

use clamm_math::{
	add_liquidity_delta, amount0_delta_ceil, amount0_delta_floor, amount1_delta_ceil,
	amount1_delta_floor, mul_div_ceil, mul_div_floor, next_sqrt_price_from_amount0_rounding_up,
	next_sqrt_price_from_amount1_rounding_down, sqrt_price_at_tick, tick_at_sqrt_price, MathError,
};
use sp_core::U256;

use crate::{
	common::{
		Amount, FeeGrowthQ128F128, Liquidity, OneToZero, SideMap, SqrtPriceQ64F96, SwapAmount,
		Tick, ZeroToOne, MAX_SQRT_PRICE, MAX_TICK, MIN_SQRT_PRICE, MIN_TICK,
		ONE_IN_HUNDREDTH_PIPS,
	},
	fee_growth,
	ticks::TickInfo,
	PoolState,
};

pub(crate) trait SwapDirection: crate::common::SwapDirection {
	/// Whether the search for the next initialized tick includes the current tick. Moving down,
	/// the current tick's own price is still ahead of the current price.
	const SEARCH_LTE: bool;

	/// The furthest tick a swap in this direction could ever reach.
	const LAST_TICK: Tick;

	/// The price limit used when the caller gives none. One step short of the extreme price, so
	/// that the current tick always stays valid.
	fn default_sqrt_price_limit() -> SqrtPriceQ64F96;

	/// Whether `limit` lies strictly ahead of `current` in this direction and within the range of
	/// prices a swap may reach.
	fn sqrt_price_limit_is_valid(current: SqrtPriceQ64F96, limit: SqrtPriceQ64F96) -> bool;

	/// The input amount needed to move the price from `current` to `target`.
	fn input_amount_delta_ceil(
		current: SqrtPriceQ64F96,
		target: SqrtPriceQ64F96,
		liquidity: Liquidity,
	) -> Result<Amount, MathError>;

	/// The output amount produced by moving the price from `current` to `target`.
	fn output_amount_delta_floor(
		current: SqrtPriceQ64F96,
		target: SqrtPriceQ64F96,
		liquidity: Liquidity,
	) -> Result<Amount, MathError>;

	/// The price after `amount` of input is added at constant `liquidity`.
	fn next_sqrt_price_from_input_amount(
		current: SqrtPriceQ64F96,
		liquidity: Liquidity,
		amount: Amount,
	) -> Result<SqrtPriceQ64F96, MathError>;

	/// The price after `amount` of output is removed at constant `liquidity`.
	fn next_sqrt_price_from_output_amount(
		current: SqrtPriceQ64F96,
		liquidity: Liquidity,
		amount: Amount,
	) -> Result<SqrtPriceQ64F96, MathError>;

	/// The change in active liquidity when the price crosses `tick_info`'s tick.
	fn liquidity_delta_on_crossing_tick(tick_info: &TickInfo) -> Result<i128, MathError>;

	/// The current tick is always the greatest tick whose price is at or below the current price.
	fn current_tick_after_crossing_tick(tick: Tick) -> Tick;
}

impl SwapDirection for ZeroToOne {
	const SEARCH_LTE: bool = true;
	const LAST_TICK: Tick = MIN_TICK;

	fn default_sqrt_price_limit() -> SqrtPriceQ64F96 {
		MIN_SQRT_PRICE + 1
	}

	fn sqrt_price_limit_is_valid(current: SqrtPriceQ64F96, limit: SqrtPriceQ64F96) -> bool {
		MIN_SQRT_PRICE < limit && limit < current
	}

	fn input_amount_delta_ceil(
		current: SqrtPriceQ64F96,
		target: SqrtPriceQ64F96,
		liquidity: Liquidity,
	) -> Result<Amount, MathError> {
		amount0_delta_ceil(target, current, liquidity)
	}

	fn output_amount_delta_floor(
		current: SqrtPriceQ64F96,
		target: SqrtPriceQ64F96,
		liquidity: Liquidity,
	) -> Result<Amount, MathError> {
		amount1_delta_floor(target, current, liquidity)
	}

	fn next_sqrt_price_from_input_amount(
		current: SqrtPriceQ64F96,
		liquidity: Liquidity,
		amount: Amount,
	) -> Result<SqrtPriceQ64F96, MathError> {
		next_sqrt_price_from_amount0_rounding_up(current, liquidity, amount, true)
	}

	fn next_sqrt_price_from_output_amount(
		current: SqrtPriceQ64F96,
		liquidity: Liquidity,
		amount: Amount,
	) -> Result<SqrtPriceQ64F96, MathError> {
		next_sqrt_price_from_amount1_rounding_down(current, liquidity, amount, false)
	}

	fn liquidity_delta_on_crossing_tick(tick_info: &TickInfo) -> Result<i128, MathError> {
		tick_info.liquidity_net.checked_neg().ok_or(MathError::LiquidityOverflow)
	}

	fn current_tick_after_crossing_tick(tick: Tick) -> Tick {
		tick - 1
	}
}

impl SwapDirection for OneToZero {
	const SEARCH_LTE: bool = false;
	const LAST_TICK: Tick = MAX_TICK;

	fn default_sqrt_price_limit() -> SqrtPriceQ64F96 {
		MAX_SQRT_PRICE - 1
	}

	fn sqrt_price_limit_is_valid(current: SqrtPriceQ64F96, limit: SqrtPriceQ64F96) -> bool {
		current < limit && limit < MAX_SQRT_PRICE
	}

	fn input_amount_delta_ceil(
		current: SqrtPriceQ64F96,
		target: SqrtPriceQ64F96,
		liquidity: Liquidity,
	) -> Result<Amount, MathError> {
		amount1_delta_ceil(current, target, liquidity)
	}

	fn output_amount_delta_floor(
		current: SqrtPriceQ64F96,
		target: SqrtPriceQ64F96,
		liquidity: Liquidity,
	) -> Result<Amount, MathError> {
		amount0_delta_floor(current, target, liquidity)
	}

	fn next_sqrt_price_from_input_amount(
		current: SqrtPriceQ64F96,
		liquidity: Liquidity,
		amount: Amount,
	) -> Result<SqrtPriceQ64F96, MathError> {
		next_sqrt_price_from_amount1_rounding_down(current, liquidity, amount, true)
	}

	fn next_sqrt_price_from_output_amount(
		current: SqrtPriceQ64F96,
		liquidity: Liquidity,
		amount: Amount,
	) -> Result<SqrtPriceQ64F96, MathError> {
		next_sqrt_price_from_amount0_rounding_up(current, liquidity, amount, false)
	}

	fn liquidity_delta_on_crossing_tick(tick_info: &TickInfo) -> Result<i128, MathError> {
		Ok(tick_info.liquidity_net)
	}

	fn current_tick_after_crossing_tick(tick: Tick) -> Tick {
		tick
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SwapStepError {
	/// The step's rounding would have given out more than it took in.
	#[error("swap step does not conserve value")]
	ValueConservation,
	#[error(transparent)]
	Math(#[from] MathError),
}

/// One closed-form segment of a swap at constant liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
	pub sqrt_price_next: SqrtPriceQ64F96,
	/// Input consumed by the price movement, excluding the fee.
	pub amount_in: Amount,
	pub amount_out: Amount,
	/// Fee charged on top of `amount_in`.
	pub fee_amount: Amount,
}

/// Moves the price from `current` towards `target` as far as `remaining` allows.
///
/// For exact input the fee is reserved before pricing, and if the target is not reached every
/// remaining unit of input is either swapped or taken as fee. For exact output the produced
/// amount is capped at the remainder. With no liquidity the price jumps straight to the target and
/// nothing is swapped or charged.
pub(crate) fn compute_swap_step<SD: SwapDirection>(
	current: SqrtPriceQ64F96,
	target: SqrtPriceQ64F96,
	liquidity: Liquidity,
	remaining: SwapAmount,
	fee_hundredth_pips: u32,
) -> Result<SwapStep, SwapStepError> {
	if liquidity == 0 {
		return Ok(SwapStep {
			sqrt_price_next: target,
			amount_in: Amount::zero(),
			amount_out: Amount::zero(),
			fee_amount: Amount::zero(),
		})
	}

	let fee = U256::from(fee_hundredth_pips);
	let fee_complement = U256::from(ONE_IN_HUNDREDTH_PIPS - fee_hundredth_pips);

	let (sqrt_price_next, reached_target) = match remaining {
		SwapAmount::ExactInput(amount) => {
			let amount_less_fee =
				mul_div_floor(amount, fee_complement, U256::from(ONE_IN_HUNDREDTH_PIPS))?;
			if amount_less_fee >= SD::input_amount_delta_ceil(current, target, liquidity)? {
				(target, true)
			} else {
				(SD::next_sqrt_price_from_input_amount(current, liquidity, amount_less_fee)?, false)
			}
		},
		SwapAmount::ExactOutput(amount) => {
			if amount >= SD::output_amount_delta_floor(current, target, liquidity)? {
				(target, true)
			} else {
				(SD::next_sqrt_price_from_output_amount(current, liquidity, amount)?, false)
			}
		},
	};

	if SD::sqrt_price_op_more_than(sqrt_price_next, target) {
		return Err(SwapStepError::ValueConservation)
	}

	let amount_in = SD::input_amount_delta_ceil(current, sqrt_price_next, liquidity)?;
	let mut amount_out = SD::output_amount_delta_floor(current, sqrt_price_next, liquidity)?;

	if let SwapAmount::ExactOutput(amount) = remaining {
		amount_out = amount_out.min(amount);
	}

	let fee_amount = match remaining {
		SwapAmount::ExactInput(amount) if !reached_target =>
			amount.checked_sub(amount_in).ok_or(SwapStepError::ValueConservation)?,
		_ => mul_div_ceil(amount_in, fee, fee_complement)?,
	};

	Ok(SwapStep { sqrt_price_next, amount_in, amount_out, fee_amount })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SwapComputationError {
	#[error(transparent)]
	Step(#[from] SwapStepError),
	#[error(transparent)]
	Math(#[from] MathError),
	/// The bitmap and the tick records disagree about which ticks are initialized.
	#[error("initialized tick {0} has no record")]
	MissingTick(Tick),
	#[error("crossing tick {0} would make the active liquidity negative")]
	NegativeLiquidity(Tick),
}

/// Everything a swap changes, computed without touching the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapComputation {
	/// Total input including fees.
	pub amount_in: Amount,
	pub amount_out: Amount,
	pub fee: Amount,
	/// The part of the specified amount that was not used, because the limit was reached or
	/// liquidity ran out.
	pub unspent: Amount,
	pub sqrt_price: SqrtPriceQ64F96,
	pub tick: Tick,
	pub liquidity: Liquidity,
	/// Global fee growth of the input asset after the swap.
	pub fee_growth_global: FeeGrowthQ128F128,
	/// Every tick crossed, in order, with its new outside fee growth.
	pub crossed_ticks: Vec<(Tick, SideMap<FeeGrowthQ128F128>)>,
}

/// Runs a swap against `pool` up to `sqrt_price_limit`, which must already have been validated
/// with `SD::sqrt_price_limit_is_valid`.
pub(crate) fn compute_swap<SD: SwapDirection, LiquidityProvider: Ord>(
	pool: &PoolState<LiquidityProvider>,
	amount: SwapAmount,
	sqrt_price_limit: SqrtPriceQ64F96,
	fee_hundredth_pips: u32,
) -> Result<SwapComputation, SwapComputationError> {
	let mut remaining = amount.amount();
	let mut computation = SwapComputation {
		amount_in: Amount::zero(),
		amount_out: Amount::zero(),
		fee: Amount::zero(),
		unspent: Amount::zero(),
		sqrt_price: pool.sqrt_price,
		tick: pool.current_tick,
		liquidity: pool.liquidity,
		fee_growth_global: pool.fee_growth_global[SD::INPUT_SIDE],
		crossed_ticks: Vec::new(),
	};

	while !remaining.is_zero() && computation.sqrt_price != sqrt_price_limit {
		let (tick_next, initialized) = match pool.tick_bitmap.next_initialized(
			computation.tick,
			pool.tick_spacing,
			SD::SEARCH_LTE,
		) {
			Some(tick) => (tick.clamp(MIN_TICK, MAX_TICK), true),
			None => (SD::LAST_TICK, false),
		};

		let sqrt_price_at_tick_next = sqrt_price_at_tick(tick_next)?;
		let sqrt_price_target =
			if SD::sqrt_price_op_more_than(sqrt_price_at_tick_next, sqrt_price_limit) {
				sqrt_price_limit
			} else {
				sqrt_price_at_tick_next
			};

		let step = compute_swap_step::<SD>(
			computation.sqrt_price,
			sqrt_price_target,
			computation.liquidity,
			amount.with_amount(remaining),
			fee_hundredth_pips,
		)?;

		let step_input = step.amount_in.checked_add(step.fee_amount).ok_or(MathError::Overflow)?;
		remaining = match amount {
			SwapAmount::ExactInput(_) => remaining.checked_sub(step_input),
			SwapAmount::ExactOutput(_) => remaining.checked_sub(step.amount_out),
		}
		.ok_or(SwapStepError::ValueConservation)?;

		computation.amount_in =
			computation.amount_in.checked_add(step_input).ok_or(MathError::Overflow)?;
		computation.amount_out =
			computation.amount_out.checked_add(step.amount_out).ok_or(MathError::Overflow)?;
		computation.fee = computation.fee.checked_add(step.fee_amount).ok_or(MathError::Overflow)?;
		computation.fee_growth_global = fee_growth::accrue(
			computation.fee_growth_global,
			step.fee_amount,
			computation.liquidity,
		)?;

		if step.sqrt_price_next == sqrt_price_at_tick_next {
			if initialized {
				let tick_info =
					pool.ticks.get(&tick_next).ok_or(SwapComputationError::MissingTick(tick_next))?;

				let mut fee_growth_global = pool.fee_growth_global;
				fee_growth_global[SD::INPUT_SIDE] = computation.fee_growth_global;
				computation.crossed_ticks.push((
					tick_next,
					fee_growth::crossed_outside(fee_growth_global, tick_info.fee_growth_outside),
				));

				computation.liquidity = add_liquidity_delta(
					computation.liquidity,
					SD::liquidity_delta_on_crossing_tick(tick_info)?,
				)
				.map_err(|error| match error {
					MathError::LiquidityUnderflow =>
						SwapComputationError::NegativeLiquidity(tick_next),
					other => SwapComputationError::Math(other),
				})?;
			}
			computation.tick = SD::current_tick_after_crossing_tick(tick_next);
		} else if step.sqrt_price_next != computation.sqrt_price {
			computation.tick = tick_at_sqrt_price(step.sqrt_price_next)?;
		}
		computation.sqrt_price = step.sqrt_price_next;
	}

	computation.unspent = remaining;

	Ok(computation)
}
