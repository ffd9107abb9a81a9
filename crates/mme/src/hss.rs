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

//! S6a transport placeholder.
//!
//! The Diameter wire stack behind `mme_s6a::HssClient` is an external
//! collaborator (spec.md §1 Non-goals), the same way the S1AP/GTPv2-C wire
//! codecs are: this is the seam a real Diameter peer (or DB-backed test
//! double) plugs into without touching the EMM FSM that calls it.

use async_trait::async_trait;
use mme_s6a::{AuthVector, HssClient, S6aError, SubscriptionData};
use mme_types::Imsi;

pub struct UnimplementedHssClient;

#[async_trait]
impl HssClient for UnimplementedHssClient {
  async fn authentication_information_request(
    &self,
    _imsi: Imsi,
    _count: u32,
  ) -> Result<Vec<AuthVector>, S6aError> {
    Err(S6aError::Unreachable("no S6a/Diameter client configured".to_string()))
  }

  async fn update_location_request(&self, _imsi: Imsi) -> Result<SubscriptionData, S6aError> {
    Err(S6aError::Unreachable("no S6a/Diameter client configured".to_string()))
  }
}
