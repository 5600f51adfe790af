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

use core::convert::Infallible;
use std::sync::{Arc, Mutex};

use clamm_math::{MAX_SQRT_PRICE, MIN_SQRT_PRICE};
use proptest::prelude::*;
use sp_core::U256;
use utilities::{assert_err, assert_ok};

use super::*;
use crate::common::{MAX_LP_FEE, MAX_TICK_SPACING};

type LiquidityProvider = u64;
type PoolState = super::PoolState<LiquidityProvider>;
type Pool = super::Pool<LiquidityProvider>;

const NOW: Timestamp = 1_000;

const ALICE: LiquidityProvider = 1;
const BOB: LiquidityProvider = 2;
const CHARLIE: LiquidityProvider = 3;

fn settled(_deltas: SideMap<AmountDelta>) -> Result<(), Infallible> {
	Ok(())
}

/// A settlement that must never be reached.
fn unreachable_settlement(_deltas: SideMap<AmountDelta>) -> Result<(), &'static str> {
	Err("settlement should not have been called")
}

fn amounts(zero: u64, one: u64) -> SideMap<Amount> {
	SideMap::from_array([zero.into(), one.into()])
}

fn inflow(zero: u64, one: u64) -> SideMap<AmountDelta> {
	amounts(zero, one).map(|_side, amount| AmountDelta::Inflow(amount))
}

fn outflow(zero: u64, one: u64) -> SideMap<AmountDelta> {
	amounts(zero, one).map(|_side, amount| AmountDelta::Outflow(amount))
}

fn key(
	owner: LiquidityProvider,
	lower_tick: Tick,
	upper_tick: Tick,
) -> PositionKey<LiquidityProvider> {
	PositionKey { owner, lower_tick, upper_tick, tag: 0 }
}

/// A pool at price one, so tick zero.
fn new_pool(fee_hundredth_pips: u32, tick_spacing: Tick) -> Pool {
	utilities::init_test_logger();
	let mut pool = Pool::new(PoolSettings::default());
	assert_eq!(
		assert_ok!(pool.initialize(NOW, U256::one() << 96, fee_hundredth_pips, tick_spacing)),
		0
	);
	pool
}

fn state(pool: &Pool) -> &PoolState {
	pool.state().unwrap()
}

#[track_caller]
fn mint(
	pool: &mut Pool,
	owner: LiquidityProvider,
	lower_tick: Tick,
	upper_tick: Tick,
	liquidity: Liquidity,
) -> ModifyLiquidityOutcome {
	assert_ok!(pool.modify_liquidity(
		NOW,
		owner,
		lower_tick,
		upper_tick,
		0,
		liquidity as i128,
		settled
	))
}

#[track_caller]
fn burn(
	pool: &mut Pool,
	owner: LiquidityProvider,
	lower_tick: Tick,
	upper_tick: Tick,
	liquidity: Liquidity,
) -> ModifyLiquidityOutcome {
	assert_ok!(pool.modify_liquidity(
		NOW,
		owner,
		lower_tick,
		upper_tick,
		0,
		-(liquidity as i128),
		settled
	))
}

#[track_caller]
fn collect_all(
	pool: &mut Pool,
	owner: LiquidityProvider,
	lower_tick: Tick,
	upper_tick: Tick,
) -> SideMap<Amount> {
	assert_ok!(pool.collect(
		owner,
		lower_tick,
		upper_tick,
		0,
		SideMap::from_array([U256::MAX, U256::MAX]),
		settled
	))
}

#[test]
fn initialize_validates_parameters() {
	let mut pool = Pool::new(PoolSettings::default());
	let price = U256::one() << 96;

	assert_eq!(
		assert_err!(pool.initialize(NOW, price, MAX_LP_FEE + 1, 1)),
		InitializeError::InvalidFeeAmount(MAX_LP_FEE + 1)
	);
	assert_eq!(
		assert_err!(pool.initialize(NOW, price, 3000, 0)),
		InitializeError::InvalidTickSpacing(0)
	);
	assert_eq!(
		assert_err!(pool.initialize(NOW, price, 3000, MAX_TICK_SPACING + 1)),
		InitializeError::InvalidTickSpacing(MAX_TICK_SPACING + 1)
	);
	assert_eq!(
		assert_err!(pool.initialize(NOW, MIN_SQRT_PRICE - 1, 3000, 1)),
		InitializeError::InvalidInitialPrice
	);
	assert_eq!(
		assert_err!(pool.initialize(NOW, MAX_SQRT_PRICE, 3000, 1)),
		InitializeError::InvalidInitialPrice
	);
	assert!(pool.state().is_none());

	let price = assert_ok!(sqrt_price_at_tick(-20));
	assert_eq!(assert_ok!(pool.initialize(NOW, price, 3000, 10)), -20);
	assert_eq!(state(&pool).current_tick(), -20);
	assert_eq!(state(&pool).instantaneous_sqrt_price(), price);
	assert_eq!(state(&pool).active_liquidity(), 0);
	assert_eq!(state(&pool).oracle().cardinality_next(), 1);

	assert_eq!(
		assert_err!(pool.initialize(NOW, price, 3000, 10)),
		InitializeError::AlreadyInitialized
	);
}

#[test]
fn uninitialized_pool_rejects_every_operation() {
	let mut pool = Pool::new(PoolSettings::default());

	assert!(matches!(
		assert_err!(pool.modify_liquidity(NOW, ALICE, -600, 600, 0, 1000, settled)),
		ModifyLiquidityError::PoolNotInitialized
	));
	assert!(matches!(
		assert_err!(pool.swap(NOW, Side::Zero, SwapAmount::ExactInput(1000.into()), None, settled)),
		SwapError::PoolNotInitialized
	));
	assert!(matches!(
		assert_err!(pool.collect(ALICE, -600, 600, 0, amounts(1, 1), settled)),
		CollectError::PoolNotInitialized
	));
	assert_eq!(assert_err!(pool.observe(NOW, 10)), QueryError::PoolNotInitialized);
	assert_eq!(assert_err!(pool.increase_observation_capacity(8)), QueryError::PoolNotInitialized);
}

#[test]
fn mint_rounds_up_and_burn_rounds_down() {
	let mut pool = new_pool(3000, 60);

	let minted = mint(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_eq!(minted.amounts, inflow(29554, 29554));
	assert_eq!(minted.fees_accrued, Default::default());
	assert_eq!(minted.position.liquidity, 1_000_000);
	assert_eq!(state(&pool).reserves(), amounts(29554, 29554));
	assert_eq!(state(&pool).active_liquidity(), 1_000_000);
	assert_eq!(state(&pool).tick(-600).unwrap().liquidity_net, 1_000_000);
	assert_eq!(state(&pool).tick(600).unwrap().liquidity_net, -1_000_000);
	assert!(state(&pool).tick_bitmap().is_initialized(-600, 60));

	let burnt = burn(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_eq!(burnt.amounts, outflow(29553, 29553));
	assert_eq!(burnt.position.liquidity, 0);

	// Rounding leaves the pool with dust, never a deficit.
	assert_eq!(state(&pool).reserves(), amounts(1, 1));
	assert_eq!(state(&pool).active_liquidity(), 0);
	assert!(state(&pool).tick(-600).is_none());
	assert!(state(&pool).tick(600).is_none());
	assert!(!state(&pool).tick_bitmap().is_initialized(-600, 60));
	assert!(!state(&pool).tick_bitmap().is_initialized(600, 60));
	assert_eq!(state(&pool).positions().count(), 0);
}

#[test]
fn out_of_range_positions_hold_a_single_asset() {
	let mut pool = new_pool(3000, 60);

	let above = mint(&mut pool, ALICE, 600, 1200, 1_000_000);
	assert!(above.amounts[Side::One].is_zero());
	assert!(!above.amounts[Side::Zero].is_zero());

	let below = mint(&mut pool, BOB, -1200, -600, 1_000_000);
	assert!(below.amounts[Side::Zero].is_zero());
	assert!(!below.amounts[Side::One].is_zero());

	assert_eq!(state(&pool).active_liquidity(), 0);
}

#[test]
fn invalid_liquidity_changes_are_rejected() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000);
	let before = state(&pool).clone();

	for (lower_tick, upper_tick) in
		[(600, 600), (600, -600), (MIN_TICK - 60, 600), (-600, MAX_TICK + 1)]
	{
		assert!(matches!(
			assert_err!(pool.modify_liquidity(NOW, ALICE, lower_tick, upper_tick, 0, 1, settled)),
			ModifyLiquidityError::Range(TickRangeError::InvalidTickRange)
		));
	}
	assert!(matches!(
		assert_err!(pool.modify_liquidity(NOW, ALICE, -610, 600, 0, 1, settled)),
		ModifyLiquidityError::Range(TickRangeError::TickNotAligned(TickBitmapError::TickNotAligned {
			tick: -610,
			tick_spacing: 60
		}))
	));
	assert!(matches!(
		assert_err!(pool.modify_liquidity(NOW, BOB, -600, 600, 0, -1, settled)),
		ModifyLiquidityError::Position(PositionError::NonExistent)
	));
	assert!(matches!(
		assert_err!(pool.modify_liquidity(NOW, BOB, -600, 600, 0, 0, settled)),
		ModifyLiquidityError::Position(PositionError::PokeEmptyPosition)
	));
	assert!(matches!(
		assert_err!(pool.modify_liquidity(NOW, ALICE, -600, 600, 0, -1_001, settled)),
		ModifyLiquidityError::Position(PositionError::InsufficientLiquidity)
	));
	assert!(matches!(
		assert_err!(pool.modify_liquidity(
			NOW,
			BOB,
			-600,
			600,
			0,
			(state(&pool).max_liquidity_per_tick() + 1) as i128,
			settled
		)),
		ModifyLiquidityError::Tick(TickUpdateError::MaximumGrossLiquidity)
	));

	assert_eq!(state(&pool), &before);
}

#[test]
fn tagged_positions_are_independent() {
	let mut pool = new_pool(3000, 60);
	assert_ok!(pool.modify_liquidity(NOW, ALICE, -600, 600, 0, 1_000, settled));
	assert_ok!(pool.modify_liquidity(NOW, ALICE, -600, 600, 1, 3_000, settled));

	assert_eq!(state(&pool).positions().count(), 2);
	assert_eq!(state(&pool).tick(-600).unwrap().liquidity_gross, 4_000);
	assert_eq!(
		assert_ok!(state(&pool).position(&PositionKey { tag: 1, ..key(ALICE, -600, 600) }))
			.liquidity,
		3_000
	);
}

#[test]
fn exact_input_swap_within_one_range() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);

	let mut settled_deltas = None;
	let outcome = assert_ok!(pool.swap(
		NOW,
		Side::Zero,
		SwapAmount::ExactInput(1000.into()),
		None,
		|deltas: SideMap<AmountDelta>| {
			settled_deltas = Some(deltas);
			Ok::<_, Infallible>(())
		}
	));

	assert_eq!(
		outcome,
		SwapOutcome {
			amount_in: 1000.into(),
			amount_out: 996.into(),
			fee: 3.into(),
			unspent: 0.into(),
			sqrt_price: U256::from_dec_str("79149250711305166342700278159").unwrap(),
			tick: -20,
		}
	);
	assert_eq!(
		settled_deltas,
		Some(SideMap::from_array([
			AmountDelta::Inflow(1000.into()),
			AmountDelta::Outflow(996.into())
		]))
	);
	assert_eq!(state(&pool).current_tick(), -20);
	assert_eq!(state(&pool).reserves(), amounts(29554 + 1000, 29554 - 996));
	assert_eq!(
		state(&pool).fee_growth_global(),
		SideMap::from_array([
			U256::from_dec_str("1020847100762815390390123822295304").unwrap(),
			U256::zero()
		])
	);
	assert_eq!(
		assert_ok!(state(&pool).position(&key(ALICE, -600, 600))).tokens_owed,
		amounts(2, 0)
	);
}

#[test]
fn exact_output_swap_within_one_range() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);

	let outcome = assert_ok!(pool.swap(
		NOW,
		Side::One,
		SwapAmount::ExactOutput(1000.into()),
		None,
		settled
	));

	assert_eq!(
		outcome,
		SwapOutcome {
			amount_in: 1006.into(),
			amount_out: 1000.into(),
			fee: 4.into(),
			unspent: 0.into(),
			sqrt_price: U256::from_dec_str("79307469984248586179723674011").unwrap(),
			tick: 20,
		}
	);
	assert_eq!(state(&pool).fee_growth_global()[Side::Zero], U256::zero());
	assert!(!state(&pool).fee_growth_global()[Side::One].is_zero());
}

#[test]
fn swap_past_the_last_range_leaves_the_rest_unspent() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	let before = state(&pool).clone();

	// An exact output swap without a limit must be filled completely.
	assert!(matches!(
		assert_err!(pool.swap(
			NOW,
			Side::One,
			SwapAmount::ExactOutput(1_000_000.into()),
			None,
			unreachable_settlement
		)),
		SwapError::InsufficientLiquidity
	));
	assert_eq!(state(&pool), &before);

	let outcome = assert_ok!(pool.swap(
		NOW,
		Side::Zero,
		SwapAmount::ExactInput(1_000_000.into()),
		None,
		settled
	));
	assert_eq!(
		outcome,
		SwapOutcome {
			amount_in: 30545.into(),
			amount_out: 29553.into(),
			fee: 92.into(),
			unspent: 969455.into(),
			sqrt_price: MIN_SQRT_PRICE + 1,
			tick: MIN_TICK,
		}
	);
	assert_eq!(state(&pool).active_liquidity(), 0);
	assert_eq!(state(&pool).reserves(), amounts(29554 + 30545, 1));

	// The crossed tick's outside growth now holds everything earned below the current price.
	assert_eq!(
		state(&pool).tick(-600).unwrap().fee_growth_outside,
		state(&pool).fee_growth_global()
	);
}

#[test]
fn price_limit_bounds_the_swap() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);

	let limit = assert_ok!(sqrt_price_at_tick(300));
	let outcome = assert_ok!(pool.swap(
		NOW,
		Side::One,
		SwapAmount::ExactInput(1_000_000.into()),
		Some(limit),
		settled
	));
	assert_eq!(
		outcome,
		SwapOutcome {
			amount_in: 15159.into(),
			amount_out: 14887.into(),
			fee: 46.into(),
			unspent: 984841.into(),
			sqrt_price: limit,
			tick: 300,
		}
	);

	// With a limit, an exact output swap that cannot be filled returns the remainder.
	let outcome = assert_ok!(pool.swap(
		NOW,
		Side::One,
		SwapAmount::ExactOutput(1_000_000.into()),
		Some(assert_ok!(sqrt_price_at_tick(600))),
		settled
	));
	assert_eq!(outcome.tick, 600);
	assert!(!outcome.unspent.is_zero());
	assert_eq!(outcome.amount_out + outcome.unspent, 1_000_000.into());
}

#[test]
fn degenerate_swaps_do_nothing() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	let before = state(&pool).clone();
	let price = before.instantaneous_sqrt_price();

	for (side, limit) in [(Side::Zero, Some(price)), (Side::One, Some(price))] {
		let outcome = assert_ok!(pool.swap(
			NOW,
			side,
			SwapAmount::ExactInput(1000.into()),
			limit,
			unreachable_settlement
		));
		assert_eq!(
			outcome,
			SwapOutcome {
				amount_in: 0.into(),
				amount_out: 0.into(),
				fee: 0.into(),
				unspent: 1000.into(),
				sqrt_price: price,
				tick: 0,
			}
		);
	}

	let outcome = assert_ok!(pool.swap(
		NOW,
		Side::Zero,
		SwapAmount::ExactOutput(0.into()),
		None,
		unreachable_settlement
	));
	assert!(outcome.amount_in.is_zero() && outcome.unspent.is_zero());

	assert_eq!(state(&pool), &before);
}

#[test]
fn invalid_price_limits_are_rejected() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	let above = assert_ok!(sqrt_price_at_tick(10));
	let below = assert_ok!(sqrt_price_at_tick(-10));

	for (side, limit) in [
		(Side::Zero, above),
		(Side::Zero, MIN_SQRT_PRICE),
		(Side::One, below),
		(Side::One, MAX_SQRT_PRICE),
	] {
		assert!(matches!(
			assert_err!(pool.swap(
				NOW,
				side,
				SwapAmount::ExactInput(1000.into()),
				Some(limit),
				unreachable_settlement
			)),
			SwapError::InvalidPriceLimit
		));
	}
}

#[test]
fn fees_are_shared_in_proportion_to_liquidity() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	mint(&mut pool, BOB, -600, 600, 3_000_000);

	let outcome = assert_ok!(pool.swap(
		NOW,
		Side::Zero,
		SwapAmount::ExactInput(10_000.into()),
		None,
		settled
	));
	assert_eq!(outcome.fee, 30.into());
	assert_eq!(outcome.tick, -50);

	assert_eq!(
		assert_ok!(state(&pool).position(&key(ALICE, -600, 600))).tokens_owed,
		amounts(7, 0)
	);
	assert_eq!(assert_ok!(state(&pool).position(&key(BOB, -600, 600))).tokens_owed, amounts(22, 0));

	let mut paid = None;
	assert_eq!(
		assert_ok!(pool.collect(ALICE, -600, 600, 0, amounts(5, 5), |deltas: SideMap<AmountDelta>| {
			paid = Some(deltas);
			Ok::<_, Infallible>(())
		})),
		amounts(5, 0)
	);
	assert_eq!(paid, Some(outflow(5, 0)));
	assert_eq!(collect_all(&mut pool, ALICE, -600, 600), amounts(2, 0));

	// Nothing is left, so there is nothing to settle.
	assert_eq!(
		assert_ok!(pool.collect(
			ALICE,
			-600,
			600,
			0,
			SideMap::from_array([U256::MAX, U256::MAX]),
			unreachable_settlement
		)),
		amounts(0, 0)
	);
	assert_eq!(collect_all(&mut pool, BOB, -600, 600), amounts(22, 0));
}

#[test]
fn late_positions_do_not_earn_earlier_fees() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_ok!(pool.swap(NOW, Side::Zero, SwapAmount::ExactInput(10_000.into()), None, settled));

	let minted = mint(&mut pool, BOB, -600, 600, 1_000_000);
	assert_eq!(minted.fees_accrued, Default::default());
	assert_eq!(assert_ok!(state(&pool).position(&key(BOB, -600, 600))).tokens_owed, amounts(0, 0));
}

#[test]
fn burnt_position_keeps_owed_fees_until_collected() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_ok!(pool.swap(NOW, Side::Zero, SwapAmount::ExactInput(1000.into()), None, settled));

	let burnt = burn(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_eq!(burnt.amounts, outflow(30550, 28557));
	assert_eq!(burnt.fees_accrued, amounts(2, 0));
	assert_eq!(burnt.position.liquidity, 0);
	assert_eq!(burnt.position.tokens_owed, amounts(2, 0));

	// The ticks are gone, the position record is not.
	assert!(state(&pool).tick(-600).is_none());
	assert_eq!(state(&pool).positions().count(), 1);

	assert_eq!(collect_all(&mut pool, ALICE, -600, 600), amounts(2, 0));
	assert_eq!(state(&pool).positions().count(), 0);
	assert_eq!(
		assert_err!(state(&pool).position(&key(ALICE, -600, 600))),
		QueryError::PositionNonExistent
	);
	// Collecting again pays nothing and settles nothing.
	let before = state(&pool).clone();
	assert_eq!(
		assert_ok!(pool.collect(ALICE, -600, 600, 0, amounts(1, 1), unreachable_settlement)),
		amounts(0, 0)
	);
	assert_eq!(state(&pool), &before);
}

#[test]
fn collect_after_burning_everything_pays_nothing() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	burn(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_eq!(state(&pool).positions().count(), 0);

	assert_eq!(
		assert_ok!(pool.collect(
			ALICE,
			-600,
			600,
			0,
			SideMap::from_array([U256::MAX, U256::MAX]),
			unreachable_settlement
		)),
		amounts(0, 0)
	);
	// Never minted at all.
	assert_eq!(
		assert_ok!(pool.collect(BOB, -60, 60, 7, amounts(1, 1), unreachable_settlement)),
		amounts(0, 0)
	);
	// The range is still checked.
	assert_eq!(
		assert_err!(pool.collect(BOB, -61, 60, 0, amounts(1, 1), unreachable_settlement)),
		CollectError::Range(TickRangeError::TickNotAligned(TickBitmapError::TickNotAligned {
			tick: -61,
			tick_spacing: 60
		}))
	);
}

#[test]
fn pools_can_move_between_threads() {
	fn assert_send<T: Send>(_: &T) {}

	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_send(&pool);

	let outcome = std::thread::scope(|scope| {
		scope
			.spawn(|| {
				pool.swap(NOW, Side::Zero, SwapAmount::ExactInput(1000.into()), None, settled)
			})
			.join()
			.unwrap()
	});
	assert_eq!(assert_ok!(outcome).amount_out, 996.into());
}

#[test]
fn moving_down_onto_a_tick_price_leaves_the_tick_below() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	let lower_price = assert_ok!(sqrt_price_at_tick(-600));

	let outcome = assert_ok!(pool.swap(
		NOW,
		Side::Zero,
		SwapAmount::ExactInput(1_000_000.into()),
		Some(lower_price),
		settled
	));
	assert_eq!(outcome.sqrt_price, lower_price);
	assert_eq!(outcome.tick, -601);
	assert!(!outcome.unspent.is_zero());

	let state = state(&pool);
	assert_eq!(state.instantaneous_sqrt_price(), lower_price);
	assert_eq!(state.current_tick(), -601);
	assert_eq!(state.active_liquidity(), 0);
	assert!(
		assert_ok!(sqrt_price_at_tick(state.current_tick())) <= state.instantaneous_sqrt_price()
	);
}

#[test]
fn poke_accrues_fees_without_moving_assets() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_ok!(pool.swap(NOW, Side::Zero, SwapAmount::ExactInput(1000.into()), None, settled));

	let poked = assert_ok!(pool.modify_liquidity(
		NOW,
		ALICE,
		-600,
		600,
		0,
		0,
		unreachable_settlement
	));
	assert_eq!(poked.amounts, inflow(0, 0));
	assert_eq!(poked.fees_accrued, amounts(2, 0));
	assert_eq!(
		state(&pool).positions.get(&key(ALICE, -600, 600)).unwrap().tokens_owed,
		amounts(2, 0)
	);
}

#[test]
fn failed_settlement_leaves_the_pool_unchanged() {
	fn refuse(_deltas: SideMap<AmountDelta>) -> Result<(), &'static str> {
		Err("insufficient balance")
	}

	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_ok!(pool.swap(NOW, Side::Zero, SwapAmount::ExactInput(1000.into()), None, settled));
	let before = state(&pool).clone();

	assert_eq!(
		assert_err!(pool.modify_liquidity(NOW, BOB, -1200, 1200, 0, 1_000, refuse)),
		ModifyLiquidityError::SettlementFailed("insufficient balance")
	);
	assert_eq!(
		assert_err!(pool.modify_liquidity(NOW, ALICE, -600, 600, 0, -1_000, refuse)),
		ModifyLiquidityError::SettlementFailed("insufficient balance")
	);
	assert_eq!(
		assert_err!(pool.swap(NOW, Side::One, SwapAmount::ExactInput(5000.into()), None, refuse)),
		SwapError::SettlementFailed("insufficient balance")
	);
	assert_eq!(
		assert_err!(pool.collect(ALICE, -600, 600, 0, amounts(10, 10), refuse)),
		CollectError::SettlementFailed("insufficient balance")
	);

	assert_eq!(state(&pool), &before);
}

#[test]
fn error_kinds() {
	assert_eq!(SwapError::<Infallible>::InvalidPriceLimit.kind(), ErrorKind::CallerMisuse);
	assert_eq!(
		SwapError::<Infallible>::Math(MathError::Overflow).kind(),
		ErrorKind::NumericExhaustion
	);
	assert_eq!(SwapError::<()>::SettlementFailed(()).kind(), ErrorKind::External);
	assert_eq!(
		ModifyLiquidityError::<Infallible>::InvariantViolation("reserves").kind(),
		ErrorKind::InvariantViolation
	);
	assert_eq!(
		ModifyLiquidityError::<Infallible>::Position(PositionError::Math(MathError::Overflow))
			.kind(),
		ErrorKind::NumericExhaustion
	);
	assert_eq!(
		SwapError::<Infallible>::from(SwapComputationError::MissingTick(60)).kind(),
		ErrorKind::InvariantViolation
	);
	assert_eq!(InitializeError::Hook(HookError("no".into())).kind(), ErrorKind::External);
	assert_eq!(CollectError::<Infallible>::PoolNotInitialized.kind(), ErrorKind::CallerMisuse);
}

mod with_hooks {
	use super::*;
	use crate::hooks::{
		AfterSwap, BeforeInitialize, BeforeModifyLiquidity, BeforeSwap, HookRegistry, Hooks,
	};

	/// Rejects mints above a size and records every swap.
	struct Gate {
		max_mint: i128,
		swaps: Arc<Mutex<Vec<SwapOutcome>>>,
	}

	impl BeforeModifyLiquidity<LiquidityProvider> for Gate {
		fn before_modify_liquidity(
			&mut self,
			_pool: &PoolState,
			params: &ModifyLiquidityParams<'_, LiquidityProvider>,
		) -> Result<(), HookError> {
			if params.liquidity_delta > self.max_mint {
				Err(HookError(format!("mint of {} is too large", params.liquidity_delta)))
			} else {
				Ok(())
			}
		}
	}

	impl AfterSwap<LiquidityProvider> for Gate {
		fn after_swap(
			&mut self,
			pool: &PoolState,
			_params: &SwapParams,
			outcome: &SwapOutcome,
		) -> Result<(), HookError> {
			// Hooks see the state as it was before the operation.
			assert_ne!(pool.current_tick(), outcome.tick);
			self.swaps.lock().unwrap().push(outcome.clone());
			Ok(())
		}
	}

	impl Hooks<LiquidityProvider> for Gate {
		fn declared_capabilities(&self) -> HookFlags {
			HookFlags::BEFORE_MODIFY_LIQUIDITY | HookFlags::AFTER_SWAP
		}

		fn as_before_modify_liquidity(
			&mut self,
		) -> Option<&mut dyn BeforeModifyLiquidity<LiquidityProvider>> {
			Some(self)
		}

		fn as_after_swap(&mut self) -> Option<&mut dyn AfterSwap<LiquidityProvider>> {
			Some(self)
		}
	}

	struct FeeSetter {
		declared: HookFlags,
		fee: Option<u32>,
	}

	impl BeforeSwap<LiquidityProvider> for FeeSetter {
		fn before_swap(
			&mut self,
			_pool: &PoolState,
			_params: &SwapParams,
		) -> Result<Option<u32>, HookError> {
			Ok(self.fee)
		}
	}

	impl Hooks<LiquidityProvider> for FeeSetter {
		fn declared_capabilities(&self) -> HookFlags {
			self.declared
		}

		fn as_before_swap(&mut self) -> Option<&mut dyn BeforeSwap<LiquidityProvider>> {
			Some(self)
		}
	}

	fn pool_with_hooks(hooks: impl Hooks<LiquidityProvider> + Send + 'static) -> Pool {
		utilities::init_test_logger();
		let mut pool = Pool::with_hooks(
			PoolSettings::default(),
			assert_ok!(HookRegistry::register(Box::new(hooks))),
		);
		assert_ok!(pool.initialize(NOW, U256::one() << 96, 3000, 60));
		pool
	}

	#[test]
	fn hooks_gate_and_observe_operations() {
		let swaps = Arc::new(Mutex::new(Vec::new()));
		let mut pool = pool_with_hooks(Gate { max_mint: 1_000_000, swaps: swaps.clone() });

		assert_eq!(
			assert_err!(pool.modify_liquidity(NOW, ALICE, -600, 600, 0, 1_000_001, settled)),
			ModifyLiquidityError::Hook(HookError("mint of 1000001 is too large".into()))
		);
		assert_eq!(state(&pool).positions().count(), 0);

		mint(&mut pool, ALICE, -600, 600, 1_000_000);
		let outcome = assert_ok!(pool.swap(
			NOW,
			Side::Zero,
			SwapAmount::ExactInput(1000.into()),
			None,
			settled
		));
		assert_eq!(*swaps.lock().unwrap(), vec![outcome]);
	}

	#[test]
	fn hooks_may_reject_initialization() {
		struct Closed;
		impl BeforeInitialize for Closed {
			fn before_initialize(&mut self, params: &InitializeParams) -> Result<(), HookError> {
				Err(HookError(format!("fee {} not allowed", params.fee_hundredth_pips)))
			}
		}
		impl Hooks<LiquidityProvider> for Closed {
			fn declared_capabilities(&self) -> HookFlags {
				HookFlags::BEFORE_INITIALIZE
			}
			fn as_before_initialize(&mut self) -> Option<&mut dyn BeforeInitialize> {
				Some(self)
			}
		}

		let mut pool = Pool::with_hooks(
			PoolSettings::default(),
			assert_ok!(HookRegistry::register(Box::new(Closed))),
		);
		assert_eq!(
			assert_err!(pool.initialize(NOW, U256::one() << 96, 3000, 60)),
			InitializeError::Hook(HookError("fee 3000 not allowed".into()))
		);
		assert!(pool.state().is_none());
	}

	#[test]
	fn declared_fee_override_replaces_the_pool_fee() {
		let mut pool = pool_with_hooks(FeeSetter {
			declared: HookFlags::BEFORE_SWAP | HookFlags::OVERRIDES_SWAP_FEE,
			fee: Some(0),
		});
		mint(&mut pool, ALICE, -600, 600, 1_000_000);

		let outcome = assert_ok!(pool.swap(
			NOW,
			Side::Zero,
			SwapAmount::ExactInput(1000.into()),
			None,
			settled
		));
		assert_eq!(outcome.fee, 0.into());
		assert_eq!(outcome.amount_out, 999.into());
		assert_eq!(outcome.tick, -20);
		assert_eq!(state(&pool).fee_growth_global(), Default::default());
		// The pool's own fee is untouched.
		assert_eq!(state(&pool).fee_hundredth_pips(), 3000);
	}

	#[test]
	fn undeclared_or_excessive_fee_overrides_are_rejected() {
		for (declared, fee) in [
			(HookFlags::BEFORE_SWAP, 0),
			(HookFlags::BEFORE_SWAP | HookFlags::OVERRIDES_SWAP_FEE, MAX_LP_FEE + 1),
		] {
			let mut pool = pool_with_hooks(FeeSetter { declared, fee: Some(fee) });
			mint(&mut pool, ALICE, -600, 600, 1_000_000);
			let before = state(&pool).clone();

			assert_eq!(
				assert_err!(pool.swap(
					NOW,
					Side::Zero,
					SwapAmount::ExactInput(1000.into()),
					None,
					unreachable_settlement
				)),
				SwapError::InvalidFeeOverride(fee)
			);
			assert_eq!(state(&pool), &before);
		}
	}
}

#[test]
fn oracle_averages_over_time() {
	let mut pool = new_pool(3000, 60);
	assert_eq!(assert_ok!(pool.increase_observation_capacity(8)), 8);
	// Capacity never shrinks.
	assert_eq!(assert_ok!(pool.increase_observation_capacity(4)), 8);

	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	assert_ok!(pool.swap(NOW, Side::Zero, SwapAmount::ExactInput(1000.into()), None, settled));

	// Tick -20 is in effect from NOW onwards, whether or not an observation was written since.
	let observation = assert_ok!(pool.observe(NOW + 100, 100));
	assert_eq!(observation.arithmetic_mean_tick, -20);
	assert_eq!(observation.harmonic_mean_liquidity, 1_000_000);

	assert_ok!(pool.modify_liquidity(NOW + 100, ALICE, -600, 600, 0, 0, settled));
	// The ring grows into the allocated capacity on the first wrap of the write index.
	assert_eq!(state(&pool).oracle().cardinality(), 8);
	assert_eq!(
		assert_ok!(state(&pool).observe_cumulatives(NOW + 100, &[100, 50, 0])),
		vec![
			(0, U256::zero()),
			(-1000, (U256::from(50) << 128) / U256::from(1_000_000)),
			(-2000, (U256::from(100) << 128) / U256::from(1_000_000)),
		]
	);

	assert_eq!(
		assert_err!(pool.observe(NOW + 100, 101)),
		QueryError::Oracle(OracleError::ObservationTooOld)
	);
	assert_eq!(
		assert_err!(pool.observe(NOW + 100, 0)),
		QueryError::Oracle(OracleError::ZeroWindow)
	);
	assert!(matches!(
		assert_err!(pool.swap(
			NOW + 99,
			Side::Zero,
			SwapAmount::ExactInput(1.into()),
			None,
			settled
		)),
		SwapError::Oracle(OracleError::TimestampInPast { now: 1099, latest: 1100 })
	));
}

#[test]
fn liquidity_queries() {
	let mut pool = new_pool(3000, 60);
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	mint(&mut pool, BOB, 0, 1200, 3_000_000);
	mint(&mut pool, CHARLIE, -1200, -600, 500_000);

	assert_eq!(
		state(&pool).liquidity_histogram(),
		vec![(-1200, 500_000), (-600, 1_000_000), (0, 4_000_000), (600, 3_000_000), (1200, 0)]
	);
	assert_eq!(state(&pool).active_liquidity(), 4_000_000);

	assert_eq!(
		assert_ok!(state(&pool).liquidity_to_amounts::<true>(-600, 600, 1_000_000)),
		amounts(29554, 29554)
	);
	assert_eq!(
		assert_ok!(state(&pool).liquidity_to_amounts::<false>(-600, 600, 1_000_000)),
		amounts(29553, 29553)
	);
	assert_eq!(
		assert_ok!(state(&pool).liquidity_for_amounts(-600, 600, amounts(29553, 29553))),
		999_999
	);
	assert_eq!(
		assert_ok!(state(&pool).liquidity_for_amounts(
			-600,
			600,
			SideMap::from_array([U256::MAX, U256::MAX])
		)),
		state(&pool).max_liquidity_per_tick()
	);
	assert_eq!(
		assert_err!(state(&pool).liquidity_for_amounts(600, -600, amounts(1, 1))),
		QueryError::Range(TickRangeError::InvalidTickRange)
	);

	// Inside growth is zero for every range before any swap.
	assert_eq!(state(&pool).fee_growth_inside(-600, 600), Default::default());
	assert_eq!(state(&pool).fee_growth_inside(-6000, 6000), Default::default());
}

#[test]
fn persisted_state_behaves_identically() {
	let mut pool = new_pool(3000, 60);
	assert_ok!(pool.increase_observation_capacity(4));
	mint(&mut pool, ALICE, -600, 600, 1_000_000);
	mint(&mut pool, BOB, 0, 1200, 3_000_000);
	assert_ok!(pool.swap(
		NOW + 10,
		Side::Zero,
		SwapAmount::ExactInput(10_000.into()),
		None,
		settled
	));
	assert_ok!(pool.modify_liquidity(NOW + 10, BOB, 0, 1200, 0, -1_000_000, settled));

	let original = state(&pool).clone();
	let from_codec = assert_ok!(PoolState::decode(&mut &original.encode()[..]));
	let json = assert_ok!(serde_json::to_string(&original));
	let from_json = assert_ok!(serde_json::from_str::<PoolState>(&json));
	assert_eq!(from_codec, original);
	assert_eq!(from_json, original);

	let mut restored = [
		Pool::from_state(PoolSettings::default(), from_codec),
		Pool::from_state(PoolSettings::default(), from_json),
	];
	let expected = assert_ok!(pool.swap(
		NOW + 20,
		Side::One,
		SwapAmount::ExactInput(100_000.into()),
		None,
		settled
	));
	for pool_copy in &mut restored {
		assert_eq!(
			assert_ok!(pool_copy.swap(
				NOW + 20,
				Side::One,
				SwapAmount::ExactInput(100_000.into()),
				None,
				settled
			)),
			expected
		);
		assert_eq!(pool_copy.state(), pool.state());
	}
}

// A position whose lower tick is new while its upper tick already carries fee growth starts with
// an inside growth that has wrapped. Fees must still come out right.
mod fee_growth_wrapping {
	use super::*;

	const LIQUIDITY: Liquidity = 1_000_000_000_000;

	/// Fees are expected to be a small fraction of the liquidity provided.
	const MAX_EXPECTED_FEES: u64 = 1_000_000_000;

	#[track_caller]
	fn swap_until_tick(pool: &mut Pool, tick: Tick) {
		let price = assert_ok!(sqrt_price_at_tick(tick));
		let side = if state(pool).current_tick() < tick { Side::One } else { Side::Zero };

		let outcome = assert_ok!(pool.swap(
			NOW,
			side,
			SwapAmount::ExactInput(U256::MAX),
			Some(price),
			settled
		));

		assert!(!outcome.amount_out.is_zero(), "Swap should produce output");
		assert_eq!(state(pool).instantaneous_sqrt_price(), price);
	}

	#[track_caller]
	fn create_new_position(
		pool: &mut Pool,
		lp: LiquidityProvider,
		lower_tick: Tick,
		upper_tick: Tick,
	) {
		let minted = mint(pool, lp, lower_tick, upper_tick, LIQUIDITY);
		assert_eq!(minted.fees_accrued, Default::default());
	}

	#[track_caller]
	fn collect_with_checks(
		pool: &mut Pool,
		lp: LiquidityProvider,
		lower_tick: Tick,
		upper_tick: Tick,
	) {
		let collected = collect_all(pool, lp, lower_tick, upper_tick);
		assert!(collected[Side::Zero] < MAX_EXPECTED_FEES.into());
		assert!(collected[Side::One] < MAX_EXPECTED_FEES.into());
	}

	#[track_caller]
	fn close_with_checks(
		pool: &mut Pool,
		lp: LiquidityProvider,
		lower_tick: Tick,
		upper_tick: Tick,
	) {
		burn(pool, lp, lower_tick, upper_tick, LIQUIDITY);
		collect_with_checks(pool, lp, lower_tick, upper_tick);
	}

	fn last_fee_growth_inside(
		pool: &Pool,
		lp: LiquidityProvider,
		lower_tick: Tick,
		upper_tick: Tick,
	) -> SideMap<FeeGrowthQ128F128> {
		state(pool).positions.get(&key(lp, lower_tick, upper_tick)).unwrap().last_fee_growth_inside
	}

	/// Much closer to `U256::MAX` than to zero on both sides.
	#[track_caller]
	fn ensure_wrapped(x: SideMap<FeeGrowthQ128F128>) {
		for side in [Side::Zero, Side::One] {
			assert!(x[side] > (U256::MAX / 100) * 99);
		}
	}

	/// Much closer to zero than to `U256::MAX` on both sides.
	#[track_caller]
	fn ensure_closer_to_zero(x: SideMap<FeeGrowthQ128F128>) {
		for side in [Side::Zero, Side::One] {
			assert!(x[side] < U256::MAX / 1_000_000);
		}
	}

	#[test]
	fn new_lower_tick_below_current() {
		let mut pool = new_pool(1000, 1);

		create_new_position(&mut pool, ALICE, 0, 100);
		create_new_position(&mut pool, BOB, 0, 200);

		swap_until_tick(&mut pool, 150);
		swap_until_tick(&mut pool, 30);

		let tick_100_outside = state(&pool).tick(100).unwrap().fee_growth_outside;
		assert!(!tick_100_outside[Side::Zero].is_zero());
		assert!(!tick_100_outside[Side::One].is_zero());

		// Tick 25 is new and at or below the current tick, so its outside is the global growth,
		// while tick 100 already carries growth from above it.
		create_new_position(&mut pool, CHARLIE, 25, 100);
		assert_eq!(
			state(&pool).tick(25).unwrap().fee_growth_outside,
			state(&pool).fee_growth_global()
		);
		ensure_wrapped(last_fee_growth_inside(&pool, CHARLIE, 25, 100));

		close_with_checks(&mut pool, ALICE, 0, 100);
		close_with_checks(&mut pool, BOB, 0, 200);

		// Fees inside [25, 100] without crossing either tick.
		swap_until_tick(&mut pool, 75);
		swap_until_tick(&mut pool, 30);

		collect_with_checks(&mut pool, CHARLIE, 25, 100);
		ensure_wrapped(last_fee_growth_inside(&pool, CHARLIE, 25, 100));

		create_new_position(&mut pool, ALICE, 0, 25);
		ensure_wrapped(last_fee_growth_inside(&pool, ALICE, 0, 25));

		swap_until_tick(&mut pool, 100);
		swap_until_tick(&mut pool, 10);

		collect_with_checks(&mut pool, CHARLIE, 25, 100);
		collect_with_checks(&mut pool, ALICE, 0, 25);

		// Enough fees have accrued inside [25, 100] to undo the initial wrap.
		ensure_closer_to_zero(last_fee_growth_inside(&pool, CHARLIE, 25, 100));
		ensure_wrapped(last_fee_growth_inside(&pool, ALICE, 0, 25));

		close_with_checks(&mut pool, CHARLIE, 25, 100);
		close_with_checks(&mut pool, ALICE, 0, 25);
		assert_eq!(state(&pool).positions().count(), 0);
	}
}

fn positions_liquidity_at(state: &PoolState, tick: Tick) -> Liquidity {
	state
		.positions()
		.filter(|(key, _)| key.lower_tick <= tick && tick < key.upper_tick)
		.map(|(_, position)| position.liquidity)
		.sum()
}

const POSITIONS: [(LiquidityProvider, Tick, Tick, Liquidity); 4] = [
	(ALICE, -600, 600, 1_000_000_000_000),
	(BOB, -1200, 0, 500_000_000_000),
	(CHARLIE, 0, 3000, 2_000_000_000_000),
	(CHARLIE, -60, 60, 7_000_000_000_000),
];

fn swap_strategy() -> impl Strategy<Value = (Side, bool, u128, Option<Tick>)> {
	(
		prop_oneof![Just(Side::Zero), Just(Side::One)],
		any::<bool>(),
		1u128..100_000_000_000,
		prop::option::of(-2000i32..2000),
	)
}

proptest! {
	#![proptest_config(ProptestConfig {
		cases: 64, .. ProptestConfig::default()
	})]

	#[test]
	fn pool_stays_consistent_and_solvent(swaps in prop::collection::vec(swap_strategy(), 1..24)) {
		let mut pool = new_pool(3000, 60);

		let mut paid_in = SideMap::<Amount>::default();
		let mut paid_out = SideMap::<Amount>::default();
		let mut record = |deltas: SideMap<AmountDelta>| {
			for side in [Side::Zero, Side::One] {
				match deltas[side] {
					AmountDelta::Inflow(amount) => paid_in[side] += amount,
					AmountDelta::Outflow(amount) => paid_out[side] += amount,
				}
			}
			Ok::<_, Infallible>(())
		};

		for (owner, lower_tick, upper_tick, liquidity) in POSITIONS {
			prop_assert!(pool
				.modify_liquidity(
					NOW,
					owner,
					lower_tick,
					upper_tick,
					0,
					liquidity as i128,
					&mut record
				)
				.is_ok());
		}

		for (side, exact_input, amount, limit_tick) in swaps {
			let fee_growth_before = state(&pool).fee_growth_global();
			let amount = if exact_input {
				SwapAmount::ExactInput(amount.into())
			} else {
				SwapAmount::ExactOutput(amount.into())
			};
			let limit = limit_tick.map(|tick| sqrt_price_at_tick(tick).unwrap());

			match pool.swap(NOW, side, amount, limit, &mut record) {
				Ok(outcome) => {
					prop_assert!(outcome.fee <= outcome.amount_in);
					prop_assert_eq!(outcome.tick, state(&pool).current_tick());
				},
				Err(error) => {
					prop_assert_eq!(error.kind(), ErrorKind::CallerMisuse);
				},
			}

			let state = state(&pool);
			prop_assert_eq!(
				state.active_liquidity(),
				positions_liquidity_at(state, state.current_tick())
			);
			for side in [Side::Zero, Side::One] {
				prop_assert!(state.fee_growth_global()[side] >= fee_growth_before[side]);
			}
		}

		for (owner, lower_tick, upper_tick, liquidity) in POSITIONS {
			prop_assert!(pool
				.modify_liquidity(
					NOW,
					owner,
					lower_tick,
					upper_tick,
					0,
					-(liquidity as i128),
					&mut record
				)
				.is_ok());
			prop_assert!(pool
				.collect(
					owner,
					lower_tick,
					upper_tick,
					0,
					SideMap::from_array([U256::MAX, U256::MAX]),
					&mut record
				)
				.is_ok());
		}

		let state = state(&pool).clone();
		prop_assert_eq!(state.positions().count(), 0);
		prop_assert_eq!(state.active_liquidity(), 0);
		for side in [Side::Zero, Side::One] {
			prop_assert_eq!(state.reserves()[side] + paid_out[side], paid_in[side]);
		}
	}

	#[test]
	fn swapping_back_restores_the_crossed_ticks(
		amount in 1u128..50_000_000_000_000,
		exact_input in any::<bool>()
	) {
		let mut pool = new_pool(3000, 60);
		for (owner, lower_tick, upper_tick, liquidity) in POSITIONS {
			mint(&mut pool, owner, lower_tick, upper_tick, liquidity);
		}
		let before = state(&pool).clone();

		let amount = if exact_input {
			SwapAmount::ExactInput(amount.into())
		} else {
			SwapAmount::ExactOutput(amount.into())
		};
		prop_assert!(pool
			.swap(NOW, Side::Zero, amount, Some(sqrt_price_at_tick(-3000).unwrap()), settled)
			.is_ok());
		// A swap too small to move the price may still cross the tick it sits on, there is no
		// way back from that.
		if state(&pool).instantaneous_sqrt_price() == before.instantaneous_sqrt_price() {
			return Ok(())
		}
		prop_assert!(pool
			.swap(
				NOW,
				Side::One,
				SwapAmount::ExactInput(U256::MAX),
				Some(before.instantaneous_sqrt_price()),
				settled
			)
			.is_ok());

		let after = state(&pool);
		prop_assert_eq!(after.instantaneous_sqrt_price(), before.instantaneous_sqrt_price());
		prop_assert_eq!(after.current_tick(), before.current_tick());
		prop_assert_eq!(after.active_liquidity(), before.active_liquidity());
		for (tick, info) in &before.ticks {
			let info_after = after.tick(*tick).unwrap();
			prop_assert_eq!(info_after.liquidity_net, info.liquidity_net);
			prop_assert_eq!(info_after.liquidity_gross, info.liquidity_gross);
		}
		// Every position earned at most what the swaps charged.
		for side in [Side::Zero, Side::One] {
			let owed: Amount = POSITIONS
				.iter()
				.map(|(owner, lower_tick, upper_tick, _)| {
					after
						.position(&key(*owner, *lower_tick, *upper_tick))
						.unwrap()
						.tokens_owed[side]
				})
				.fold(Amount::zero(), |total, owed| total + owed);
			prop_assert!(owed <= after.reserves()[side] - before.reserves()[side]);
		}
	}
}
