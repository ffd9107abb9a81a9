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

//! Authentication vectors and the HSS subscription data carried over S6a.

/// One E-UTRAN authentication vector (TS 33.401 §6.1.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthVector {
  pub rand: [u8; 16],
  pub autn: [u8; 16],
  pub xres: Vec<u8>,
  pub k_asme: [u8; 32],
}

/// Subscription data returned by Update-Location-Answer; only the fields
/// the ESM/EMM attach path actually consumes are modeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionData {
  pub msisdn: Option<String>,
  pub default_apn: String,
  pub ambr_dl_kbps: u32,
  pub ambr_ul_kbps: u32,
}
