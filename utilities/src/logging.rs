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

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs an `env_logger` backend for the `log` facade, honouring `RUST_LOG`.
///
/// Safe to call from every test, the logger is only installed once per process.
pub fn init_test_logger() {
	INIT.call_once(|| {
		let _ = env_logger::builder()
			.is_test(true)
			.format_timestamp(None)
			.format_module_path(false)
			.try_init();
		log::debug!("test logger initialised");
	})
}
