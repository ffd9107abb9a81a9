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

//! The S6a transport boundary.
//!
//! The Diameter wire encoding and the HSS database adapter behind it are
//! external collaborators (spec.md §1 Non-goals); this trait is the seam
//! the attach path programs against, and is what the binary wires up to a
//! concrete Diameter stack or DB shim.

use crate::vector::{AuthVector, SubscriptionData};
use mme_types::Imsi;

#[derive(Debug, thiserror::Error)]
pub enum S6aError {
  #[error("HSS unreachable: {0}")]
  Unreachable(String),
  #[error("HSS rejected the request: {0}")]
  Rejected(String),
  #[error("malformed HSS response: {0}")]
  Malformed(String),
}

#[async_trait::async_trait]
pub trait HssClient: Send + Sync {
  async fn authentication_information_request(
    &self,
    imsi: Imsi,
    count: u32,
  ) -> Result<Vec<AuthVector>, S6aError>;

  async fn update_location_request(&self, imsi: Imsi) -> Result<SubscriptionData, S6aError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
  use super::*;
  use std::sync::Mutex;

  /// In-memory `HssClient` used by the EMM/ESM attach-path tests so they
  /// never need a real HSS.
  pub struct FakeHss {
    pub vectors: Mutex<Vec<AuthVector>>,
    pub subscription: SubscriptionData,
  }

  #[async_trait::async_trait]
  impl HssClient for FakeHss {
    async fn authentication_information_request(
      &self,
      _imsi: Imsi,
      count: u32,
    ) -> Result<Vec<AuthVector>, S6aError> {
      let mut stock = self.vectors.lock().unwrap();
      let take = (count as usize).min(stock.len());
      Ok(stock.drain(..take).collect())
    }

    async fn update_location_request(&self, _imsi: Imsi) -> Result<SubscriptionData, S6aError> {
      Ok(self.subscription.clone())
    }
  }
}
