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

//! EMM and ESM NAS state machines, and the coordination between them,
//! S6a and the S11 user FSM that together drive an Attach (spec.md §4.4,
//! §4.5).

pub mod emm;
pub mod esm;

pub use emm::{EmmAction, EmmContext, EmmState};
pub use esm::{BearerState, EsmAction, EsmContext, PdnConnectivityRequest};

#[cfg(test)]
mod attach_flow_tests {
  use super::*;
  use mme_gtp::s11::{S11Action, S11State, S11UserSession, CAUSE_REQUEST_ACCEPTED};
  use mme_s6a::client::test_support::FakeHss;
  use mme_s6a::{AuthVector, AuthVectorQueue, HssClient, SubscriptionData};
  use mme_types::{Ebi, FTeid, Imsi, InterfaceType, Paa, PdnType, Teid};
  use std::net::Ipv4Addr;
  use std::sync::Mutex;

  fn mme_fteid() -> FTeid {
    FTeid {
      interface_type: InterfaceType::S11Mme,
      teid: Teid(1),
      addr: Ipv4Addr::new(10, 0, 0, 1),
    }
  }

  /// Scenario 4 (spec.md §8): scripted attach, one HSS vector, canned S11
  /// responses; expect Attach Accept, EMM Registered, S11 UlCtx, one
  /// EBI=5 bearer.
  #[tokio::test]
  async fn attach_happy_path_reaches_registered_with_one_bearer() {
    let imsi = Imsi(1010101010101);
    let hss = FakeHss {
      vectors: Mutex::new(vec![AuthVector {
        rand: [0x11; 16],
        autn: [0x22; 16],
        xres: vec![0x33; 8],
        k_asme: [0x44; 32],
      }]),
      subscription: SubscriptionData {
        msisdn: Some("15550100".to_string()),
        default_apn: "internet".to_string(),
        ambr_dl_kbps: 10_000,
        ambr_ul_kbps: 5_000,
      },
    };
    let mut queue = AuthVectorQueue::new();
    let mut emm = EmmContext::new(imsi);
    let mut esm = EsmContext::new();
    let mut s11 = S11UserSession::new();

    let pdn_request = PdnConnectivityRequest {
      esm_info_transfer_flag: false,
      apn: None,
    };
    let action = emm.on_attach_request(vec![0xAB], pdn_request, &queue);
    assert_eq!(action, EmmAction::RequestAuthVectors);

    let vectors = hss
      .authentication_information_request(imsi, mme_s6a::REQUESTED_VECTOR_COUNT)
      .await
      .unwrap();
    let action = emm.on_auth_vectors_received(vectors, &mut queue);
    let EmmAction::SendAuthenticationRequest { .. } = action else {
      panic!("expected an authentication request, got {action:?}");
    };

    let action = emm.on_authentication_response(&[0x33; 8], &mut queue);
    assert_eq!(action, EmmAction::SendSecurityModeCommand);

    let action = emm.on_security_mode_complete();
    assert_eq!(action, EmmAction::RequestUpdateLocation);

    let subscription = hss.update_location_request(imsi).await.unwrap();
    let action = emm.on_update_location_response(subscription);
    let EmmAction::InvokePdnConnectivity { request } = action else {
      panic!("expected a PDN connectivity invocation, got {action:?}");
    };

    let action = esm.on_pdn_connectivity_request(request);
    let EsmAction::RequestCreateSession { ebi, .. } = action else {
      panic!("expected a create-session request, got {action:?}");
    };
    assert_eq!(ebi, Ebi(5));

    let action = s11.attach(1, imsi, mme_fteid());
    assert!(matches!(action, S11Action::SendCreateSessionRequest { .. }));

    let paa = Paa {
      pdn_type: PdnType::Ipv4,
      ipv4: Ipv4Addr::new(172, 16, 0, 10),
    };
    let sgw = FTeid {
      interface_type: InterfaceType::S11S4Sgw,
      teid: Teid(2),
      addr: Ipv4Addr::new(10, 0, 0, 2),
    };
    let pgw = FTeid {
      interface_type: InterfaceType::S5S8PgwGtpC,
      teid: Teid(3),
      addr: Ipv4Addr::new(10, 0, 0, 3),
    };
    let action = s11.on_create_session_response(1, CAUSE_REQUEST_ACCEPTED, sgw, pgw, paa);
    assert!(matches!(action, S11Action::NotifyAttachAccepted { .. }));
    assert_eq!(s11.state, S11State::UlCtx);

    let action = esm.on_session_created(ebi, paa);
    assert_eq!(action, EsmAction::SendActivateDefaultBearer { ebi, paa });

    let action = emm.on_bearer_established(ebi);
    assert_eq!(action, EmmAction::SendAttachAccept { ebi });

    emm.on_attach_complete();
    assert_eq!(emm.state, EmmState::Registered);
    assert_eq!(esm.active_bearer_count(), 1);
    assert_eq!(esm.bearer_state(Ebi(5)), Some(BearerState::Active));
  }
}
