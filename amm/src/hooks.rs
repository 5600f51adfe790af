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

//! Extension points around the pool operations.
//!
//! Each extension point is its own trait. An implementation declares up front which points it
//! provides, and registration checks the declaration against the accessors it actually
//! implements, so a pool never calls a hook it was not told about and never skips one it was.
//!
//! Before-hooks see the pool as it was before the operation, after-hooks see it together with the
//! computed (but not yet committed) outcome. Any hook error aborts the operation with the pool
//! unchanged.

use core::{fmt, ops::BitOr};

use crate::{
	common::{Side, SqrtPriceQ64F96, SwapAmount, Tick},
	positions::PositionTag,
	ModifyLiquidityOutcome, PoolState, SwapOutcome,
};

/// A set of extension points.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HookFlags(u16);

impl HookFlags {
	pub const NONE: Self = Self(0);
	pub const BEFORE_INITIALIZE: Self = Self(1 << 0);
	pub const AFTER_INITIALIZE: Self = Self(1 << 1);
	pub const BEFORE_MODIFY_LIQUIDITY: Self = Self(1 << 2);
	pub const AFTER_MODIFY_LIQUIDITY: Self = Self(1 << 3);
	pub const BEFORE_SWAP: Self = Self(1 << 4);
	pub const AFTER_SWAP: Self = Self(1 << 5);
	/// The `BeforeSwap` hook may replace the pool's fee for the swap.
	pub const OVERRIDES_SWAP_FEE: Self = Self(1 << 6);

	const NAMES: [(Self, &'static str); 7] = [
		(Self::BEFORE_INITIALIZE, "BEFORE_INITIALIZE"),
		(Self::AFTER_INITIALIZE, "AFTER_INITIALIZE"),
		(Self::BEFORE_MODIFY_LIQUIDITY, "BEFORE_MODIFY_LIQUIDITY"),
		(Self::AFTER_MODIFY_LIQUIDITY, "AFTER_MODIFY_LIQUIDITY"),
		(Self::BEFORE_SWAP, "BEFORE_SWAP"),
		(Self::AFTER_SWAP, "AFTER_SWAP"),
		(Self::OVERRIDES_SWAP_FEE, "OVERRIDES_SWAP_FEE"),
	];

	pub const fn bits(self) -> u16 {
		self.0
	}

	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}
}

impl BitOr for HookFlags {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self {
		Self(self.0 | rhs.0)
	}
}

impl fmt::Debug for HookFlags {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let names = Self::NAMES
			.iter()
			.filter(|(flag, _)| self.contains(*flag))
			.map(|(_, name)| *name)
			.collect::<Vec<_>>();
		if names.is_empty() {
			write!(f, "NONE")
		} else {
			write!(f, "{}", names.join(" | "))
		}
	}
}

/// A hook refused the operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("hook rejected the operation: {0}")]
pub struct HookError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HookRegistrationError {
	#[error("{flag:?} is declared but no implementation is provided")]
	DeclaredButNotProvided { flag: HookFlags },
	#[error("an implementation for {flag:?} is provided but not declared")]
	ProvidedButNotDeclared { flag: HookFlags },
	#[error("OVERRIDES_SWAP_FEE requires BEFORE_SWAP")]
	FeeOverrideWithoutBeforeSwap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeParams {
	pub sqrt_price: SqrtPriceQ64F96,
	pub fee_hundredth_pips: u32,
	pub tick_spacing: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyLiquidityParams<'a, LiquidityProvider> {
	pub owner: &'a LiquidityProvider,
	pub lower_tick: Tick,
	pub upper_tick: Tick,
	pub tag: PositionTag,
	pub liquidity_delta: i128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
	pub input_side: Side,
	pub amount: SwapAmount,
	pub sqrt_price_limit: Option<SqrtPriceQ64F96>,
}

pub trait BeforeInitialize {
	fn before_initialize(&mut self, params: &InitializeParams) -> Result<(), HookError>;
}

pub trait AfterInitialize<LiquidityProvider: Ord> {
	fn after_initialize(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &InitializeParams,
	) -> Result<(), HookError>;
}

pub trait BeforeModifyLiquidity<LiquidityProvider: Ord> {
	fn before_modify_liquidity(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &ModifyLiquidityParams<'_, LiquidityProvider>,
	) -> Result<(), HookError>;
}

pub trait AfterModifyLiquidity<LiquidityProvider: Ord> {
	fn after_modify_liquidity(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &ModifyLiquidityParams<'_, LiquidityProvider>,
		outcome: &ModifyLiquidityOutcome,
	) -> Result<(), HookError>;
}

pub trait BeforeSwap<LiquidityProvider: Ord> {
	/// May return a fee in hundredth pips to use instead of the pool's fee for this swap. The
	/// override is only accepted from hooks declaring `OVERRIDES_SWAP_FEE`.
	fn before_swap(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &SwapParams,
	) -> Result<Option<u32>, HookError>;
}

pub trait AfterSwap<LiquidityProvider: Ord> {
	fn after_swap(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &SwapParams,
		outcome: &SwapOutcome,
	) -> Result<(), HookError>;
}

/// A hook implementation. Every accessor defaults to `None`, an implementation overrides the
/// ones for the points it provides, typically by returning `Some(self)`.
pub trait Hooks<LiquidityProvider: Ord> {
	fn declared_capabilities(&self) -> HookFlags;

	fn as_before_initialize(&mut self) -> Option<&mut dyn BeforeInitialize> {
		None
	}
	fn as_after_initialize(&mut self) -> Option<&mut dyn AfterInitialize<LiquidityProvider>> {
		None
	}
	fn as_before_modify_liquidity(
		&mut self,
	) -> Option<&mut dyn BeforeModifyLiquidity<LiquidityProvider>> {
		None
	}
	fn as_after_modify_liquidity(
		&mut self,
	) -> Option<&mut dyn AfterModifyLiquidity<LiquidityProvider>> {
		None
	}
	fn as_before_swap(&mut self) -> Option<&mut dyn BeforeSwap<LiquidityProvider>> {
		None
	}
	fn as_after_swap(&mut self) -> Option<&mut dyn AfterSwap<LiquidityProvider>> {
		None
	}
}

/// A validated hook implementation, see `HookRegistry::register`.
pub struct HookRegistry<LiquidityProvider: Ord> {
	hooks: Box<dyn Hooks<LiquidityProvider> + Send>,
	capabilities: HookFlags,
}

impl<LiquidityProvider: Ord> fmt::Debug for HookRegistry<LiquidityProvider> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HookRegistry").field("capabilities", &self.capabilities).finish()
	}
}

impl<LiquidityProvider: Ord> HookRegistry<LiquidityProvider> {
	pub fn register(
		mut hooks: Box<dyn Hooks<LiquidityProvider> + Send>,
	) -> Result<Self, HookRegistrationError> {
		let capabilities = hooks.declared_capabilities();

		let provided = [
			(HookFlags::BEFORE_INITIALIZE, hooks.as_before_initialize().is_some()),
			(HookFlags::AFTER_INITIALIZE, hooks.as_after_initialize().is_some()),
			(HookFlags::BEFORE_MODIFY_LIQUIDITY, hooks.as_before_modify_liquidity().is_some()),
			(HookFlags::AFTER_MODIFY_LIQUIDITY, hooks.as_after_modify_liquidity().is_some()),
			(HookFlags::BEFORE_SWAP, hooks.as_before_swap().is_some()),
			(HookFlags::AFTER_SWAP, hooks.as_after_swap().is_some()),
		];

		for (flag, is_provided) in provided {
			match (capabilities.contains(flag), is_provided) {
				(true, false) => return Err(HookRegistrationError::DeclaredButNotProvided { flag }),
				(false, true) => return Err(HookRegistrationError::ProvidedButNotDeclared { flag }),
				_ => {},
			}
		}

		if capabilities.contains(HookFlags::OVERRIDES_SWAP_FEE) &&
			!capabilities.contains(HookFlags::BEFORE_SWAP)
		{
			return Err(HookRegistrationError::FeeOverrideWithoutBeforeSwap)
		}

		Ok(Self { hooks, capabilities })
	}

	pub fn capabilities(&self) -> HookFlags {
		self.capabilities
	}

	pub(crate) fn before_initialize(&mut self, params: &InitializeParams) -> Result<(), HookError> {
		match self.hooks.as_before_initialize() {
			Some(hook) => hook.before_initialize(params),
			None => Ok(()),
		}
	}

	pub(crate) fn after_initialize(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &InitializeParams,
	) -> Result<(), HookError> {
		match self.hooks.as_after_initialize() {
			Some(hook) => hook.after_initialize(pool, params),
			None => Ok(()),
		}
	}

	pub(crate) fn before_modify_liquidity(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &ModifyLiquidityParams<'_, LiquidityProvider>,
	) -> Result<(), HookError> {
		match self.hooks.as_before_modify_liquidity() {
			Some(hook) => hook.before_modify_liquidity(pool, params),
			None => Ok(()),
		}
	}

	pub(crate) fn after_modify_liquidity(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &ModifyLiquidityParams<'_, LiquidityProvider>,
		outcome: &ModifyLiquidityOutcome,
	) -> Result<(), HookError> {
		match self.hooks.as_after_modify_liquidity() {
			Some(hook) => hook.after_modify_liquidity(pool, params, outcome),
			None => Ok(()),
		}
	}

	/// Runs the `BeforeSwap` hook, returning its fee override if it made one.
	pub(crate) fn before_swap(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &SwapParams,
	) -> Result<Option<u32>, HookError> {
		match self.hooks.as_before_swap() {
			Some(hook) => hook.before_swap(pool, params),
			None => Ok(None),
		}
	}

	pub(crate) fn after_swap(
		&mut self,
		pool: &PoolState<LiquidityProvider>,
		params: &SwapParams,
		outcome: &SwapOutcome,
	) -> Result<(), HookError> {
		match self.hooks.as_after_swap() {
			Some(hook) => hook.after_swap(pool, params, outcome),
			None => Ok(()),
		}
	}
}
