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

//! S6a subscription fetch: auth-vector queueing and the HSS client seam
//! (spec.md §4.4 steps 2/6).

pub mod client;
pub mod queue;
pub mod vector;

pub use client::{HssClient, S6aError};
pub use queue::{AuthVectorQueue, REQUESTED_VECTOR_COUNT};
pub use vector::{AuthVector, SubscriptionData};

#[cfg(test)]
mod tests {
  use super::client::test_support::FakeHss;
  use super::*;
  use std::sync::Mutex;

  fn vector(seed: u8) -> AuthVector {
    AuthVector {
      rand: [seed; 16],
      autn: [seed; 16],
      xres: vec![seed; 8],
      k_asme: [seed; 32],
    }
  }

  #[tokio::test]
  async fn fetch_refills_queue_from_hss() {
    let hss = FakeHss {
      vectors: Mutex::new(vec![vector(1), vector(2), vector(3)]),
      subscription: SubscriptionData {
        msisdn: Some("15550100".to_string()),
        default_apn: "internet".to_string(),
        ambr_dl_kbps: 100_000,
        ambr_ul_kbps: 50_000,
      },
    };
    let mut queue = AuthVectorQueue::new();
    assert!(queue.is_empty());

    let fetched = hss
      .authentication_information_request(mme_types::Imsi(1), REQUESTED_VECTOR_COUNT)
      .await
      .unwrap();
    queue.extend(fetched);
    assert_eq!(queue.len(), 3);

    let sub = hss.update_location_request(mme_types::Imsi(1)).await.unwrap();
    assert_eq!(sub.default_apn, "internet");
  }
}
