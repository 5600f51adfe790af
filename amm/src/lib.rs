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

//! A concentrated liquidity pool of two assets.
//!
//! The pool never moves assets. Every mutating operation computes the balance changes it implies
//! and hands them to a `Settlement` before committing. Operations are all-or-nothing: they are
//! computed against the current state without modifying it, and the state is only written once
//! every check, hook and the settlement have succeeded.

pub mod common;
pub mod fee_growth;
pub mod hooks;
pub mod oracle;
pub mod positions;
pub mod settings;
pub mod swap;
pub mod tick_bitmap;
pub mod ticks;

#[cfg(test)]
mod tests;

use std::{collections::BTreeMap, fmt};

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

use clamm_math::{
	add_liquidity_delta, amounts_for_liquidity, liquidity_for_amounts, sqrt_price_at_tick,
	tick_at_sqrt_price, MathError, U256,
};
use common::{
	Amount, AmountDelta, FeeGrowthQ128F128, Liquidity, OneToZero, Side, SideMap, SqrtPriceQ64F96,
	SwapAmount, Tick, ZeroToOne, MAX_TICK, MIN_TICK,
};
use hooks::{
	HookError, HookFlags, HookRegistry, InitializeParams, ModifyLiquidityParams, SwapParams,
};
use oracle::{Oracle, OracleError, Timestamp, TwapObservation};
use positions::{Position, PositionError, PositionKey, PositionLedger, PositionTag};
use settings::PoolSettings;
use swap::{SwapComputationError, SwapDirection, SwapStepError};
use tick_bitmap::{BitPosition, TickBitmap, TickBitmapError};
use ticks::{TickInfo, TickUpdateError};

const LOG_TARGET: &str = "clamm";

/// Which class of failure an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// The request itself was invalid. Nothing was changed.
	CallerMisuse,
	/// A value would not fit its representation. Nothing was changed.
	NumericExhaustion,
	/// The pool's state was found to be inconsistent. Nothing was changed, but the pool needs
	/// attention.
	InvariantViolation,
	/// A hook or the settlement refused the operation. Nothing was changed.
	External,
}

pub trait ClassifiedError: fmt::Display {
	fn kind(&self) -> ErrorKind;
}

/// Executes the balance changes of an operation. The operation is only committed if this
/// succeeds.
pub trait Settlement {
	type Error;

	fn settle(&mut self, deltas: SideMap<AmountDelta>) -> Result<(), Self::Error>;
}

impl<E, F: FnMut(SideMap<AmountDelta>) -> Result<(), E>> Settlement for F {
	type Error = E;

	fn settle(&mut self, deltas: SideMap<AmountDelta>) -> Result<(), E> {
		self(deltas)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TickRangeError {
	#[error("the lower tick must be below the upper tick, and both within the tick bounds")]
	InvalidTickRange,
	#[error(transparent)]
	TickNotAligned(#[from] TickBitmapError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitializeError {
	#[error("the pool is already initialized")]
	AlreadyInitialized,
	#[error("fee {0} exceeds the maximum allowed")]
	InvalidFeeAmount(u32),
	#[error("tick spacing {0} is outside the allowed range")]
	InvalidTickSpacing(Tick),
	#[error("the initial price is outside the valid range")]
	InvalidInitialPrice,
	#[error(transparent)]
	Hook(#[from] HookError),
	#[error(transparent)]
	Math(#[from] MathError),
}

impl ClassifiedError for InitializeError {
	fn kind(&self) -> ErrorKind {
		match self {
			InitializeError::Hook(_) => ErrorKind::External,
			InitializeError::Math(_) => ErrorKind::NumericExhaustion,
			_ => ErrorKind::CallerMisuse,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModifyLiquidityError<E> {
	#[error("the pool is not initialized")]
	PoolNotInitialized,
	#[error(transparent)]
	Range(#[from] TickRangeError),
	#[error(transparent)]
	Oracle(#[from] OracleError),
	#[error(transparent)]
	Position(#[from] PositionError),
	#[error(transparent)]
	Tick(#[from] TickUpdateError),
	#[error(transparent)]
	Math(#[from] MathError),
	#[error("invariant violated: {0}")]
	InvariantViolation(&'static str),
	#[error(transparent)]
	Hook(#[from] HookError),
	#[error("settlement failed: {0:?}")]
	SettlementFailed(E),
}

impl<E: fmt::Debug> ClassifiedError for ModifyLiquidityError<E> {
	fn kind(&self) -> ErrorKind {
		match self {
			ModifyLiquidityError::Oracle(OracleError::Math(_)) |
			ModifyLiquidityError::Position(PositionError::Math(_)) |
			ModifyLiquidityError::Tick(_) |
			ModifyLiquidityError::Math(_) => ErrorKind::NumericExhaustion,
			ModifyLiquidityError::InvariantViolation(_) => ErrorKind::InvariantViolation,
			ModifyLiquidityError::Hook(_) | ModifyLiquidityError::SettlementFailed(_) =>
				ErrorKind::External,
			_ => ErrorKind::CallerMisuse,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError<E> {
	#[error("the pool is not initialized")]
	PoolNotInitialized,
	/// The limit is on the wrong side of the current price or beyond the tradable range.
	#[error("invalid price limit")]
	InvalidPriceLimit,
	/// An exact output swap without a price limit could not be filled completely.
	#[error("insufficient liquidity to produce the requested output")]
	InsufficientLiquidity,
	#[error("hook returned the fee {0}, which it may not")]
	InvalidFeeOverride(u32),
	#[error(transparent)]
	Oracle(#[from] OracleError),
	#[error(transparent)]
	Math(#[from] MathError),
	#[error("invariant violated: {0}")]
	InvariantViolation(&'static str),
	#[error(transparent)]
	Hook(#[from] HookError),
	#[error("settlement failed: {0:?}")]
	SettlementFailed(E),
}

impl<E> From<SwapComputationError> for SwapError<E> {
	fn from(error: SwapComputationError) -> Self {
		match error {
			SwapComputationError::Math(error) |
			SwapComputationError::Step(SwapStepError::Math(error)) => SwapError::Math(error),
			SwapComputationError::Step(SwapStepError::ValueConservation) =>
				SwapError::InvariantViolation("swap step does not conserve value"),
			SwapComputationError::MissingTick(_) =>
				SwapError::InvariantViolation("initialized tick has no record"),
			SwapComputationError::NegativeLiquidity(_) =>
				SwapError::InvariantViolation("crossing a tick made the active liquidity negative"),
		}
	}
}

impl<E: fmt::Debug> ClassifiedError for SwapError<E> {
	fn kind(&self) -> ErrorKind {
		match self {
			SwapError::Oracle(OracleError::Math(_)) | SwapError::Math(_) =>
				ErrorKind::NumericExhaustion,
			SwapError::InvariantViolation(_) => ErrorKind::InvariantViolation,
			SwapError::InvalidFeeOverride(_) |
			SwapError::Hook(_) |
			SwapError::SettlementFailed(_) => ErrorKind::External,
			_ => ErrorKind::CallerMisuse,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectError<E> {
	#[error("the pool is not initialized")]
	PoolNotInitialized,
	#[error(transparent)]
	Range(#[from] TickRangeError),
	#[error(transparent)]
	Math(#[from] MathError),
	#[error("invariant violated: {0}")]
	InvariantViolation(&'static str),
	#[error("settlement failed: {0:?}")]
	SettlementFailed(E),
}

impl<E: fmt::Debug> ClassifiedError for CollectError<E> {
	fn kind(&self) -> ErrorKind {
		match self {
			CollectError::Math(_) => ErrorKind::NumericExhaustion,
			CollectError::InvariantViolation(_) => ErrorKind::InvariantViolation,
			CollectError::SettlementFailed(_) => ErrorKind::External,
			_ => ErrorKind::CallerMisuse,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
	#[error("the pool is not initialized")]
	PoolNotInitialized,
	#[error(transparent)]
	Range(#[from] TickRangeError),
	#[error("position does not exist")]
	PositionNonExistent,
	#[error(transparent)]
	Oracle(#[from] OracleError),
	#[error(transparent)]
	Math(#[from] MathError),
}

/// The result of `Pool::modify_liquidity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyLiquidityOutcome {
	/// Principal paid in by a mint (rounded up) or paid out by a burn (rounded down).
	pub amounts: SideMap<AmountDelta>,
	/// Fees credited to the position by this operation. They stay in `tokens_owed` until
	/// collected.
	pub fees_accrued: SideMap<Amount>,
	/// The position after the operation.
	pub position: Position,
}

/// The result of `Pool::swap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
	/// Input paid by the swapper, fees included.
	pub amount_in: Amount,
	pub amount_out: Amount,
	pub fee: Amount,
	/// The part of the specified amount left over, when the limit was reached first.
	pub unspent: Amount,
	pub sqrt_price: SqrtPriceQ64F96,
	pub tick: Tick,
}

/// The durable state of a pool.
#[derive(Clone, Debug, PartialEq, Eq, TypeInfo, Encode, Decode, Serialize, Deserialize)]
#[serde(bound(
	serialize = "LiquidityProvider: Serialize",
	deserialize = "LiquidityProvider: Deserialize<'de>"
))]
pub struct PoolState<LiquidityProvider: Ord> {
	pub(crate) fee_hundredth_pips: u32,
	pub(crate) tick_spacing: Tick,
	pub(crate) max_liquidity_per_tick: Liquidity,
	/// Always in `[MIN_SQRT_PRICE, MAX_SQRT_PRICE)`.
	pub(crate) sqrt_price: SqrtPriceQ64F96,
	/// The tick the price is in, with `sqrt_price_at_tick(current_tick) <= sqrt_price`. Usually
	/// the next tick's price is above `sqrt_price`, except after moving down onto the exact price
	/// of a tick `t`: `t` is crossed, so `current_tick` is `t - 1` while `sqrt_price` stays at
	/// `sqrt_price_at_tick(t)`.
	pub(crate) current_tick: Tick,
	/// Total liquidity of all positions whose range contains `current_tick`.
	pub(crate) liquidity: Liquidity,
	pub(crate) fee_growth_global: SideMap<FeeGrowthQ128F128>,
	pub(crate) ticks: BTreeMap<Tick, TickInfo>,
	pub(crate) tick_bitmap: TickBitmap,
	pub(crate) positions: PositionLedger<LiquidityProvider>,
	pub(crate) oracle: Oracle,
	/// The pool's balance of each asset, the sum of every settled delta.
	pub(crate) reserves: SideMap<Amount>,
}

fn apply_deltas(
	reserves: SideMap<Amount>,
	deltas: SideMap<AmountDelta>,
) -> Option<SideMap<Amount>> {
	reserves
		.zip(deltas)
		.try_map(|_side, (reserve, delta)| match delta {
			AmountDelta::Inflow(amount) => reserve.checked_add(amount).ok_or(()),
			AmountDelta::Outflow(amount) => reserve.checked_sub(amount).ok_or(()),
		})
		.ok()
}

fn is_zero(deltas: &SideMap<AmountDelta>) -> bool {
	deltas.into_array().iter().all(AmountDelta::is_zero)
}

impl<LiquidityProvider: Clone + Ord> PoolState<LiquidityProvider> {
	pub fn fee_hundredth_pips(&self) -> u32 {
		self.fee_hundredth_pips
	}

	pub fn tick_spacing(&self) -> Tick {
		self.tick_spacing
	}

	pub fn max_liquidity_per_tick(&self) -> Liquidity {
		self.max_liquidity_per_tick
	}

	pub fn current_tick(&self) -> Tick {
		self.current_tick
	}

	/// The current price, as of the last operation.
	///
	/// This can be moved arbitrarily within a single block of operations by anyone willing to
	/// trade, and so must not be used to value assets. Use `observe` for that.
	pub fn instantaneous_sqrt_price(&self) -> SqrtPriceQ64F96 {
		self.sqrt_price
	}

	pub fn active_liquidity(&self) -> Liquidity {
		self.liquidity
	}

	pub fn fee_growth_global(&self) -> SideMap<FeeGrowthQ128F128> {
		self.fee_growth_global
	}

	pub fn reserves(&self) -> SideMap<Amount> {
		self.reserves
	}

	pub fn tick(&self, tick: Tick) -> Option<&TickInfo> {
		self.ticks.get(&tick)
	}

	pub fn tick_bitmap(&self) -> &TickBitmap {
		&self.tick_bitmap
	}

	pub fn oracle(&self) -> &Oracle {
		&self.oracle
	}

	pub fn positions(
		&self,
	) -> impl '_ + Iterator<Item = (&PositionKey<LiquidityProvider>, &Position)> {
		self.positions.iter()
	}

	/// Checks a position range, returning the bitmap positions of both ends.
	pub fn validate_range(
		&self,
		lower_tick: Tick,
		upper_tick: Tick,
	) -> Result<(BitPosition, BitPosition), TickRangeError> {
		if !(MIN_TICK <= lower_tick && lower_tick < upper_tick && upper_tick <= MAX_TICK) {
			return Err(TickRangeError::InvalidTickRange)
		}
		Ok((
			TickBitmap::position(lower_tick, self.tick_spacing)?,
			TickBitmap::position(upper_tick, self.tick_spacing)?,
		))
	}

	/// Fee growth per unit of liquidity inside `[lower_tick, upper_tick)`. Uninitialized ticks
	/// count as having no growth outside.
	pub fn fee_growth_inside(
		&self,
		lower_tick: Tick,
		upper_tick: Tick,
	) -> SideMap<FeeGrowthQ128F128> {
		let lower_info = self.ticks.get(&lower_tick).cloned().unwrap_or_default();
		let upper_info = self.ticks.get(&upper_tick).cloned().unwrap_or_default();
		fee_growth::fee_growth_inside(
			lower_tick,
			&lower_info,
			upper_tick,
			&upper_info,
			self.current_tick,
			self.fee_growth_global,
		)
	}

	/// The position at `key`, with every fee earned so far included in `tokens_owed`.
	pub fn position(&self, key: &PositionKey<LiquidityProvider>) -> Result<Position, QueryError> {
		let mut position = self.positions.get(key).cloned().ok_or(QueryError::PositionNonExistent)?;
		if position.liquidity > 0 {
			position.accrue_fees(self.fee_growth_inside(key.lower_tick, key.upper_tick))?;
		}
		Ok(position)
	}

	/// The arithmetic mean tick and harmonic mean liquidity over the last `window` seconds.
	pub fn observe(&self, now: Timestamp, window: u64) -> Result<TwapObservation, QueryError> {
		Ok(self.oracle.consult(now, window, self.current_tick, self.liquidity)?)
	}

	/// The oracle's tick and seconds per liquidity cumulatives at each of `seconds_agos` before
	/// `now`.
	pub fn observe_cumulatives(
		&self,
		now: Timestamp,
		seconds_agos: &[u64],
	) -> Result<Vec<(i64, U256)>, QueryError> {
		Ok(self.oracle.observe(now, seconds_agos, self.current_tick, self.liquidity)?)
	}

	/// Every initialized tick with the liquidity active from it up to the next initialized tick.
	pub fn liquidity_histogram(&self) -> Vec<(Tick, Liquidity)> {
		self.ticks
			.iter()
			.scan(0u128, |liquidity, (tick, info)| {
				*liquidity = liquidity.saturating_add_signed(info.liquidity_net);
				Some((*tick, *liquidity))
			})
			.collect()
	}

	/// The amounts `liquidity` over the range is worth at the current price, rounded up when
	/// `ROUND_UP`.
	pub fn liquidity_to_amounts<const ROUND_UP: bool>(
		&self,
		lower_tick: Tick,
		upper_tick: Tick,
		liquidity: Liquidity,
	) -> Result<SideMap<Amount>, QueryError> {
		self.validate_range(lower_tick, upper_tick)?;
		let (amount_0, amount_1) = amounts_for_liquidity::<ROUND_UP>(
			self.sqrt_price,
			sqrt_price_at_tick(lower_tick)?,
			sqrt_price_at_tick(upper_tick)?,
			liquidity,
		)?;
		Ok(SideMap::from_array([amount_0, amount_1]))
	}

	/// The most liquidity over the range that `amounts` can pay for at the current price, capped
	/// at the per tick maximum.
	pub fn liquidity_for_amounts(
		&self,
		lower_tick: Tick,
		upper_tick: Tick,
		amounts: SideMap<Amount>,
	) -> Result<Liquidity, QueryError> {
		self.validate_range(lower_tick, upper_tick)?;
		let [amount_0, amount_1] = amounts.into_array();
		Ok(liquidity_for_amounts(
			self.sqrt_price,
			sqrt_price_at_tick(lower_tick)?,
			sqrt_price_at_tick(upper_tick)?,
			(amount_0, amount_1),
		)?
		.min(self.max_liquidity_per_tick))
	}
}

fn logged<T, E: ClassifiedError>(operation: &'static str, result: Result<T, E>) -> Result<T, E> {
	if let Err(error) = &result {
		match error.kind() {
			ErrorKind::CallerMisuse => {
				log::debug!(target: LOG_TARGET, "{operation} rejected: {error}")
			},
			ErrorKind::NumericExhaustion => {
				log::warn!(target: LOG_TARGET, "{operation} rejected on numeric limits: {error}")
			},
			ErrorKind::InvariantViolation => {
				log::error!(target: LOG_TARGET, "{operation} aborted, invariant violated: {error}")
			},
			ErrorKind::External => {
				log::error!(target: LOG_TARGET, "{operation} aborted externally: {error}")
			},
		}
	}
	result
}

/// A pool, its bounds and optionally its hooks. Uninitialized until `initialize` is called.
#[derive(Debug)]
pub struct Pool<LiquidityProvider: Ord> {
	settings: PoolSettings,
	state: Option<PoolState<LiquidityProvider>>,
	hooks: Option<HookRegistry<LiquidityProvider>>,
}

impl<LiquidityProvider: Clone + Ord + fmt::Debug> Pool<LiquidityProvider> {
	/// `settings` are expected to have been validated, see `settings::Settings`.
	pub fn new(settings: PoolSettings) -> Self {
		Self { settings, state: None, hooks: None }
	}

	pub fn with_hooks(settings: PoolSettings, hooks: HookRegistry<LiquidityProvider>) -> Self {
		Self { settings, state: None, hooks: Some(hooks) }
	}

	/// Restores a pool from persisted state.
	pub fn from_state(settings: PoolSettings, state: PoolState<LiquidityProvider>) -> Self {
		Self { settings, state: Some(state), hooks: None }
	}

	pub fn settings(&self) -> &PoolSettings {
		&self.settings
	}

	pub fn state(&self) -> Option<&PoolState<LiquidityProvider>> {
		self.state.as_ref()
	}

	pub fn into_state(self) -> Option<PoolState<LiquidityProvider>> {
		self.state
	}

	/// The time weighted averages over the last `window` seconds.
	pub fn observe(&self, now: Timestamp, window: u64) -> Result<TwapObservation, QueryError> {
		self.state.as_ref().ok_or(QueryError::PoolNotInitialized)?.observe(now, window)
	}

	/// Allocates room for `next` oracle observations, returning the resulting capacity.
	pub fn increase_observation_capacity(&mut self, next: u16) -> Result<u16, QueryError> {
		let state = self.state.as_mut().ok_or(QueryError::PoolNotInitialized)?;
		let capacity = state.oracle.grow(next);
		log::debug!(target: LOG_TARGET, "observation capacity is now {capacity}");
		Ok(capacity)
	}

	/// Creates the pool at `initial_sqrt_price`, returning the initial tick.
	pub fn initialize(
		&mut self,
		now: Timestamp,
		initial_sqrt_price: SqrtPriceQ64F96,
		fee_hundredth_pips: u32,
		tick_spacing: Tick,
	) -> Result<Tick, InitializeError> {
		logged(
			"initialize",
			self.try_initialize(now, initial_sqrt_price, fee_hundredth_pips, tick_spacing),
		)
	}

	fn try_initialize(
		&mut self,
		now: Timestamp,
		initial_sqrt_price: SqrtPriceQ64F96,
		fee_hundredth_pips: u32,
		tick_spacing: Tick,
	) -> Result<Tick, InitializeError> {
		if self.state.is_some() {
			return Err(InitializeError::AlreadyInitialized)
		}
		if fee_hundredth_pips > self.settings.max_fee_hundredth_pips {
			return Err(InitializeError::InvalidFeeAmount(fee_hundredth_pips))
		}
		if !(1..=self.settings.max_tick_spacing).contains(&tick_spacing) {
			return Err(InitializeError::InvalidTickSpacing(tick_spacing))
		}
		if !clamm_math::is_sqrt_price_valid(initial_sqrt_price) {
			return Err(InitializeError::InvalidInitialPrice)
		}

		let params =
			InitializeParams { sqrt_price: initial_sqrt_price, fee_hundredth_pips, tick_spacing };
		if let Some(hooks) = self.hooks.as_mut() {
			hooks.before_initialize(&params)?;
		}

		let current_tick = tick_at_sqrt_price(initial_sqrt_price)?;
		let state = PoolState {
			fee_hundredth_pips,
			tick_spacing,
			max_liquidity_per_tick: ticks::max_liquidity_per_tick(tick_spacing),
			sqrt_price: initial_sqrt_price,
			current_tick,
			liquidity: 0,
			fee_growth_global: Default::default(),
			ticks: Default::default(),
			tick_bitmap: Default::default(),
			positions: Default::default(),
			oracle: Oracle::new(now, self.settings.initial_observation_capacity),
			reserves: Default::default(),
		};

		if let Some(hooks) = self.hooks.as_mut() {
			hooks.after_initialize(&state, &params)?;
		}

		self.state = Some(state);
		log::debug!(
			target: LOG_TARGET,
			"initialized at tick {current_tick} with fee {fee_hundredth_pips} and tick spacing \
			{tick_spacing}"
		);

		Ok(current_tick)
	}

	/// Mints (`liquidity_delta > 0`), burns (`< 0`) or pokes (`== 0`) the position of `owner`
	/// over `[lower_tick, upper_tick)` identified by `tag`.
	///
	/// Fees earned since the position was last touched are credited to its `tokens_owed`. Burnt
	/// principal is paid out immediately through `settlement`.
	#[allow(clippy::too_many_arguments)]
	pub fn modify_liquidity<S: Settlement>(
		&mut self,
		now: Timestamp,
		owner: LiquidityProvider,
		lower_tick: Tick,
		upper_tick: Tick,
		tag: PositionTag,
		liquidity_delta: i128,
		mut settlement: S,
	) -> Result<ModifyLiquidityOutcome, ModifyLiquidityError<S::Error>>
	where
		S::Error: fmt::Debug,
	{
		logged(
			"modify_liquidity",
			self.try_modify_liquidity(
				now,
				owner,
				lower_tick,
				upper_tick,
				tag,
				liquidity_delta,
				&mut settlement,
			),
		)
	}

	#[allow(clippy::too_many_arguments)]
	fn try_modify_liquidity<S: Settlement>(
		&mut self,
		now: Timestamp,
		owner: LiquidityProvider,
		lower_tick: Tick,
		upper_tick: Tick,
		tag: PositionTag,
		liquidity_delta: i128,
		settlement: &mut S,
	) -> Result<ModifyLiquidityOutcome, ModifyLiquidityError<S::Error>> {
		let state = self.state.as_mut().ok_or(ModifyLiquidityError::PoolNotInitialized)?;
		let (lower_position, upper_position) = state.validate_range(lower_tick, upper_tick)?;
		let oracle_write = state.oracle.pending_write(now, state.current_tick, state.liquidity)?;

		let key = PositionKey { owner: owner.clone(), lower_tick, upper_tick, tag };
		if liquidity_delta < 0 {
			match state.positions.get(&key) {
				None => return Err(PositionError::NonExistent.into()),
				Some(position) if position.liquidity < liquidity_delta.unsigned_abs() =>
					return Err(PositionError::InsufficientLiquidity.into()),
				Some(_) => {},
			}
		}

		let params =
			ModifyLiquidityParams { owner: &owner, lower_tick, upper_tick, tag, liquidity_delta };
		if let Some(hooks) = self.hooks.as_mut() {
			hooks.before_modify_liquidity(state, &params)?;
		}

		let update_tick =
			|tick: Tick, is_upper: bool| -> Result<(TickInfo, bool), TickUpdateError> {
				let existing = state.ticks.get(&tick);
				if liquidity_delta == 0 {
					Ok((existing.cloned().unwrap_or_default(), false))
				} else {
					TickInfo::updated(
						existing,
						tick,
						state.current_tick,
						state.fee_growth_global,
						liquidity_delta,
						is_upper,
						state.max_liquidity_per_tick,
					)
				}
			};
		let (lower_info, lower_flipped) = update_tick(lower_tick, false)?;
		let (upper_info, upper_flipped) = update_tick(upper_tick, true)?;

		let (position, fees_accrued) = state.positions.update(
			&key,
			liquidity_delta,
			fee_growth::fee_growth_inside(
				lower_tick,
				&lower_info,
				upper_tick,
				&upper_info,
				state.current_tick,
				state.fee_growth_global,
			),
		)?;

		let sqrt_price_lower = sqrt_price_at_tick(lower_tick)?;
		let sqrt_price_upper = sqrt_price_at_tick(upper_tick)?;
		let amounts = if liquidity_delta >= 0 {
			let (amount_0, amount_1) = amounts_for_liquidity::<true>(
				state.sqrt_price,
				sqrt_price_lower,
				sqrt_price_upper,
				liquidity_delta.unsigned_abs(),
			)?;
			SideMap::from_array([AmountDelta::Inflow(amount_0), AmountDelta::Inflow(amount_1)])
		} else {
			let (amount_0, amount_1) = amounts_for_liquidity::<false>(
				state.sqrt_price,
				sqrt_price_lower,
				sqrt_price_upper,
				liquidity_delta.unsigned_abs(),
			)?;
			SideMap::from_array([AmountDelta::Outflow(amount_0), AmountDelta::Outflow(amount_1)])
		};

		let liquidity = if lower_tick <= state.current_tick && state.current_tick < upper_tick {
			add_liquidity_delta(state.liquidity, liquidity_delta).map_err(|error| match error {
				MathError::LiquidityUnderflow => ModifyLiquidityError::InvariantViolation(
					"burnt liquidity exceeds the active liquidity",
				),
				other => ModifyLiquidityError::Math(other),
			})?
		} else {
			state.liquidity
		};

		let reserves = apply_deltas(state.reserves, amounts).ok_or(
			ModifyLiquidityError::InvariantViolation("reserves cannot cover the amounts owed"),
		)?;

		let outcome = ModifyLiquidityOutcome { amounts, fees_accrued, position: position.clone() };

		if let Some(hooks) = self.hooks.as_mut() {
			hooks.after_modify_liquidity(state, &params, &outcome)?;
		}

		if !is_zero(&amounts) {
			settlement.settle(amounts).map_err(ModifyLiquidityError::SettlementFailed)?;
		}

		if let Some(write) = oracle_write {
			state.oracle.apply(write);
		}
		if liquidity_delta != 0 {
			for (tick, info, flipped, bit_position) in [
				(lower_tick, lower_info, lower_flipped, lower_position),
				(upper_tick, upper_info, upper_flipped, upper_position),
			] {
				if flipped {
					state.tick_bitmap.toggle(bit_position);
				}
				if info.is_initialized() {
					state.ticks.insert(tick, info);
				} else {
					state.ticks.remove(&tick);
				}
			}
		}
		state.positions.commit(key, position);
		state.liquidity = liquidity;
		state.reserves = reserves;

		log::debug!(
			target: LOG_TARGET,
			"modified liquidity of {owner:?} over [{lower_tick}, {upper_tick}) by \
			{liquidity_delta}: {amounts:?}"
		);

		Ok(outcome)
	}

	/// Swaps `amount` of `input_side` for the other asset, moving the price no further than
	/// `sqrt_price_limit`.
	///
	/// Without a limit the swap may move the price to the edge of the valid range, and an exact
	/// output swap that cannot be filled completely fails. With a limit, whatever part of the
	/// amount is left when the limit is reached is returned as `unspent`. A limit equal to the
	/// current price swaps nothing.
	pub fn swap<S: Settlement>(
		&mut self,
		now: Timestamp,
		input_side: Side,
		amount: SwapAmount,
		sqrt_price_limit: Option<SqrtPriceQ64F96>,
		mut settlement: S,
	) -> Result<SwapOutcome, SwapError<S::Error>>
	where
		S::Error: fmt::Debug,
	{
		logged("swap", match input_side {
			Side::Zero =>
				self.try_swap::<ZeroToOne, S>(now, amount, sqrt_price_limit, &mut settlement),
			Side::One =>
				self.try_swap::<OneToZero, S>(now, amount, sqrt_price_limit, &mut settlement),
		})
	}

	fn try_swap<SD: SwapDirection, S: Settlement>(
		&mut self,
		now: Timestamp,
		amount: SwapAmount,
		sqrt_price_limit: Option<SqrtPriceQ64F96>,
		settlement: &mut S,
	) -> Result<SwapOutcome, SwapError<S::Error>> {
		let state = self.state.as_mut().ok_or(SwapError::PoolNotInitialized)?;

		let limit = sqrt_price_limit.unwrap_or_else(SD::default_sqrt_price_limit);
		let nothing_swapped = SwapOutcome {
			amount_in: Amount::zero(),
			amount_out: Amount::zero(),
			fee: Amount::zero(),
			unspent: amount.amount(),
			sqrt_price: state.sqrt_price,
			tick: state.current_tick,
		};
		if limit == state.sqrt_price {
			return Ok(nothing_swapped)
		}
		if !SD::sqrt_price_limit_is_valid(state.sqrt_price, limit) {
			return Err(SwapError::InvalidPriceLimit)
		}
		if amount.amount().is_zero() {
			return Ok(nothing_swapped)
		}
		let oracle_write = state.oracle.pending_write(now, state.current_tick, state.liquidity)?;

		let params = SwapParams { input_side: SD::INPUT_SIDE, amount, sqrt_price_limit };
		let fee_hundredth_pips = match self.hooks.as_mut() {
			Some(hooks) => match hooks.before_swap(state, &params)? {
				Some(fee) =>
					if hooks.capabilities().contains(HookFlags::OVERRIDES_SWAP_FEE) &&
						fee <= self.settings.max_fee_hundredth_pips
					{
						fee
					} else {
						return Err(SwapError::InvalidFeeOverride(fee))
					},
				None => state.fee_hundredth_pips,
			},
			None => state.fee_hundredth_pips,
		};

		let computation = swap::compute_swap::<SD, _>(&*state, amount, limit, fee_hundredth_pips)?;

		if matches!(amount, SwapAmount::ExactOutput(_)) &&
			!computation.unspent.is_zero() &&
			sqrt_price_limit.is_none()
		{
			return Err(SwapError::InsufficientLiquidity)
		}
		if !clamm_math::is_sqrt_price_valid(computation.sqrt_price) {
			return Err(SwapError::InvariantViolation("swap left the valid price range"))
		}

		let mut deltas = SideMap::<AmountDelta>::default();
		deltas[SD::INPUT_SIDE] = AmountDelta::Inflow(computation.amount_in);
		deltas[!SD::INPUT_SIDE] = AmountDelta::Outflow(computation.amount_out);

		let reserves = apply_deltas(state.reserves, deltas)
			.ok_or(SwapError::InvariantViolation("reserves cannot cover the swap output"))?;

		let outcome = SwapOutcome {
			amount_in: computation.amount_in,
			amount_out: computation.amount_out,
			fee: computation.fee,
			unspent: computation.unspent,
			sqrt_price: computation.sqrt_price,
			tick: computation.tick,
		};

		if let Some(hooks) = self.hooks.as_mut() {
			hooks.after_swap(state, &params, &outcome)?;
		}

		if !is_zero(&deltas) {
			settlement.settle(deltas).map_err(SwapError::SettlementFailed)?;
		}

		if let Some(write) = oracle_write {
			state.oracle.apply(write);
		}
		for (tick, fee_growth_outside) in computation.crossed_ticks {
			if let Some(info) = state.ticks.get_mut(&tick) {
				info.fee_growth_outside = fee_growth_outside;
			}
		}
		state.sqrt_price = computation.sqrt_price;
		state.current_tick = computation.tick;
		state.liquidity = computation.liquidity;
		state.fee_growth_global[SD::INPUT_SIDE] = computation.fee_growth_global;
		state.reserves = reserves;

		log::debug!(
			target: LOG_TARGET,
			"swapped {} in for {} out with fee {}, now at tick {}",
			outcome.amount_in,
			outcome.amount_out,
			outcome.fee,
			outcome.tick
		);

		Ok(outcome)
	}

	/// Pays out up to `maximum` of the fees owed to a position, returning what was paid. The
	/// position is removed once it holds nothing, after which collecting from it pays nothing.
	pub fn collect<S: Settlement>(
		&mut self,
		owner: LiquidityProvider,
		lower_tick: Tick,
		upper_tick: Tick,
		tag: PositionTag,
		maximum: SideMap<Amount>,
		mut settlement: S,
	) -> Result<SideMap<Amount>, CollectError<S::Error>>
	where
		S::Error: fmt::Debug,
	{
		logged(
			"collect",
			self.try_collect(owner, lower_tick, upper_tick, tag, maximum, &mut settlement),
		)
	}

	fn try_collect<S: Settlement>(
		&mut self,
		owner: LiquidityProvider,
		lower_tick: Tick,
		upper_tick: Tick,
		tag: PositionTag,
		maximum: SideMap<Amount>,
		settlement: &mut S,
	) -> Result<SideMap<Amount>, CollectError<S::Error>> {
		let state = self.state.as_mut().ok_or(CollectError::PoolNotInitialized)?;
		state.validate_range(lower_tick, upper_tick)?;

		let key = PositionKey { owner, lower_tick, upper_tick, tag };
		let Some(mut position) = state.positions.get(&key).cloned() else {
			log::debug!(
				target: LOG_TARGET,
				"nothing to collect for {:?} over [{lower_tick}, {upper_tick})",
				key.owner
			);
			return Ok(SideMap::default())
		};
		if position.liquidity > 0 {
			position.accrue_fees(state.fee_growth_inside(lower_tick, upper_tick))?;
		}

		let collected = position.withdraw(maximum);
		let deltas = collected.map(|_side, amount| AmountDelta::Outflow(amount));
		let reserves = apply_deltas(state.reserves, deltas)
			.ok_or(CollectError::InvariantViolation("reserves cannot cover the amounts owed"))?;

		if !is_zero(&deltas) {
			settlement.settle(deltas).map_err(CollectError::SettlementFailed)?;
		}

		log::debug!(
			target: LOG_TARGET,
			"collected {collected:?} for {:?} over [{lower_tick}, {upper_tick})",
			key.owner
		);
		state.positions.commit(key, position);
		state.reserves = reserves;

		Ok(collected)
	}
}
