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

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::common::{Tick, MAX_LP_FEE, MAX_TICK_SPACING};

/// Bounds applied to every pool.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PoolSettings {
	/// Highest fee a pool may be initialized with or a hook may set, in hundredth pips.
	pub max_fee_hundredth_pips: u32,
	pub max_tick_spacing: Tick,
	/// Number of oracle observations a new pool has room for.
	pub initial_observation_capacity: u16,
}

impl Default for PoolSettings {
	fn default() -> Self {
		Self {
			max_fee_hundredth_pips: MAX_LP_FEE,
			max_tick_spacing: MAX_TICK_SPACING,
			initial_observation_capacity: 1,
		}
	}
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
	pub pool: PoolSettings,
}

impl Settings {
	/// Load settings from a TOML file, with `CLAMM__<SECTION>__<KEY>` environment variables taking
	/// precedence. Keys missing from both take their default values.
	pub fn from_file(file: &str) -> Result<Self, ConfigError> {
		Self::build(Config::builder().add_source(File::with_name(file)).add_source(
			Environment::with_prefix("CLAMM").prefix_separator("__").separator("__"),
		))
	}

	/// Load settings from TOML text.
	pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
		Self::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
	}

	fn build(
		builder: config::ConfigBuilder<config::builder::DefaultState>,
	) -> Result<Self, ConfigError> {
		let settings: Settings = Config::builder()
			.add_source(Config::try_from(&Settings::default())?)
			.add_source(builder.build()?)
			.build()?
			.try_deserialize()?;

		// make sure the settings are clean
		settings.validate_settings()?;

		Ok(settings)
	}

	pub fn validate_settings(&self) -> Result<(), ConfigError> {
		self.pool.validate().map_err(ConfigError::Message)
	}
}

impl PoolSettings {
	pub fn validate(&self) -> Result<(), String> {
		if self.max_fee_hundredth_pips > MAX_LP_FEE {
			return Err(format!(
				"max_fee_hundredth_pips must be at most {MAX_LP_FEE}, got {}",
				self.max_fee_hundredth_pips
			))
		}
		if !(1..=MAX_TICK_SPACING).contains(&self.max_tick_spacing) {
			return Err(format!(
				"max_tick_spacing must be between 1 and {MAX_TICK_SPACING}, got {}",
				self.max_tick_spacing
			))
		}
		if self.initial_observation_capacity == 0 {
			return Err("initial_observation_capacity must be at least 1".to_owned())
		}
		Ok(())
	}
}
