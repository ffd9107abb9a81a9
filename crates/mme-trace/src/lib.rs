//
// Copyright (c) 2024 Elide Technologies, Inc.
//
// Licensed under the MIT license (the "License"); you may not use this file except in compliance
// with the License. You may obtain a copy of the License at
//
// https://opensource.org/license/mit/
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on
// an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under the License.
//

//! Logging bootstrap.
//!
//! `MME_LOGLEVEL` follows spec.md §6: an integer 1..7, default `INFO`. The
//! numbering mirrors syslog severity, not `tracing::Level` ordering, so we
//! map it explicitly rather than trying to reuse a derived `FromStr`.

use tracing_subscriber::EnvFilter;

/// Map spec.md's 1..7 `MME_LOGLEVEL` scale onto a `tracing` filter directive.
fn level_for(n: u8) -> &'static str {
  match n {
    0..=3 => "error",
    4 => "warn",
    5 => "info",
    6 => "debug",
    _ => "trace",
  }
}

/// Initialize the global `tracing` subscriber from `MME_LOGLEVEL`.
///
/// Safe to call once at process startup; panics if a subscriber is already
/// installed (that would indicate a programming error, not a runtime one).
pub fn init() {
  let level = std::env::var("MME_LOGLEVEL")
    .ok()
    .and_then(|s| s.parse::<u8>().ok())
    .map(level_for)
    .unwrap_or("info");

  let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .init();
}
