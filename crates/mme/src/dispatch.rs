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

//! NAS/ESM/S11 coordinator: the glue that drives an EMM action to
//! completion by calling whichever collaborator (S6a, ESM, S11) it names,
//! and feeding the result back in (spec.md §4.4, §4.5, §4.6).
//!
//! Every `mme_nas`/`mme_gtp` FSM only returns an action; nothing in those
//! crates calls out to another component. This module is that caller, and
//! mirrors `mme-nas`'s own `attach_flow_tests` step for step — the
//! difference is that here the S6a and S11 steps are real async I/O instead
//! of scripted fixtures.

use crate::codec::{Gtpv2Inbound, NasInbound, NasOutbound, S1apOutbound};
use crate::context::UeContext;
use crate::mme::Mme;
use crate::s11_transport::{self, S11Transport, DEFAULT_BEARER_EBI};
use crate::sdn::{BearerChangeNotice, SdnClient};
use mme_gtp::S11Action;
use mme_nas::{EmmAction, EsmAction};
use mme_reactor::Reactor;
use mme_registry::Handle;
use mme_s6a::HssClient;
use mme_types::{FTeid, InterfaceType};
use std::net::Ipv4Addr;
use std::rc::Rc;
use tracing::warn;

/// Everything a coordinator step needs that isn't already reachable through
/// `mme.registry`: the collaborators with an external I/O boundary.
pub struct Collaborators<'a> {
  pub reactor: &'a Rc<Reactor>,
  pub s11: &'a Rc<S11Transport>,
  pub hss: &'a dyn HssClient,
  pub sdn: &'a SdnClient,
  pub local_addr: Ipv4Addr,
}

fn downlink_nas(mme: &Rc<Mme>, ue: Handle<UeContext>, msg: NasOutbound) {
  let mme_ue_id = {
    let reg = mme.registry.borrow();
    reg.emm(ue).and_then(|c| c.mme_ue_id)
  };
  let Some(mme_ue_id) = mme_ue_id else {
    warn!("dropping downlink NAS message: UE has no MME-UE-S1AP-ID yet");
    return;
  };
  let enb_ue_id = {
    let reg = mme.registry.borrow();
    reg.ecm_by_ueid(mme_ue_id)
      .and_then(|h| reg.ecm(h))
      .and_then(|ecm| ecm.enb_ue_id)
  };
  let Some(enb_ue_id) = enb_ue_id else {
    warn!(?mme_ue_id, "dropping downlink NAS message: UE is ECM-Idle");
    return;
  };
  let nas_pdu = mme.nas_codec.encode(&msg);
  let out = match &msg {
    NasOutbound::AttachAccept { ebi } => S1apOutbound::InitialContextSetupRequest {
      enb_ue_id,
      nas_pdu,
      ebi: *ebi,
    },
    _ => S1apOutbound::DownlinkNasTransport { enb_ue_id, nas_pdu },
  };
  mme.send_s1ap(mme_ue_id, out);
}

/// Entry point for a freshly decoded `AttachRequest` (spec.md §4.4 step 1).
pub async fn handle_attach_request(
  mme: &Rc<Mme>,
  c: &Collaborators<'_>,
  ue: Handle<UeContext>,
  ue_security_capabilities: Vec<u8>,
  pdn_request: mme_nas::PdnConnectivityRequest,
) {
  let action = {
    let mut reg = mme.registry.borrow_mut();
    let Some(ctx) = reg.emm_mut(ue) else { return };
    ctx.emm
      .on_attach_request(ue_security_capabilities, pdn_request, &ctx.auth_vectors)
  };
  continue_emm(mme, c, ue, action).await;
}

/// The eNB accepted `InitialContextSetupRequest` and handed back the F-TEID
/// its radio side will use; this is the trigger for the Modify-Bearer-Request
/// that tells the SGW where to send downlink user-plane traffic (spec.md
/// §4.6).
pub async fn handle_initial_context_setup_response(
  mme: &Rc<Mme>,
  c: &Collaborators<'_>,
  ue: Handle<UeContext>,
  enb_fteid: FTeid,
) {
  let s11_action = {
    let mut reg = mme.registry.borrow_mut();
    let Some(ctx) = reg.emm_mut(ue) else { return };
    let Some(mme_fteid) = ctx.mme_s11_fteid else {
      warn!(?ue, "InitialContextSetupResponse with no prior S11 session F-TEID");
      return;
    };
    let seq = c.s11.next_seq();
    ctx.s11.mod_bearer(seq, mme_fteid, enb_fteid)
  };
  s11_transport::send_action(mme, c.s11, c.reactor, ue, s11_action);
}

pub async fn handle_nas_inbound(mme: &Rc<Mme>, c: &Collaborators<'_>, ue: Handle<UeContext>, inbound: NasInbound) {
  match inbound {
    NasInbound::AttachRequest { ue_security_capabilities, pdn_request, .. } => {
      // `imsi` only matters for routing a fresh InitialUE to a UE
      // context (`s1ap::create_ue_and_route`); a re-Attach on an
      // already-anchored `ue` handle keeps using that handle.
      handle_attach_request(mme, c, ue, ue_security_capabilities, pdn_request).await;
    }
    NasInbound::AuthenticationResponse { res } => {
      let action = {
        let mut reg = mme.registry.borrow_mut();
        let Some(ctx) = reg.emm_mut(ue) else { return };
        ctx.emm.on_authentication_response(&res, &mut ctx.auth_vectors)
      };
      continue_emm(mme, c, ue, action).await;
    }
    NasInbound::SecurityModeComplete => {
      let action = {
        let mut reg = mme.registry.borrow_mut();
        let Some(ctx) = reg.emm_mut(ue) else { return };
        ctx.emm.on_security_mode_complete()
      };
      continue_emm(mme, c, ue, action).await;
    }
    NasInbound::AttachComplete => {
      let mut reg = mme.registry.borrow_mut();
      if let Some(ctx) = reg.emm_mut(ue) {
        ctx.emm.on_attach_complete();
      }
    }
    NasInbound::EsmInformationResponse { ebi, apn } => {
      let action = {
        let mut reg = mme.registry.borrow_mut();
        let Some(ctx) = reg.emm_mut(ue) else { return };
        ctx.esm.on_esm_information_response(ebi, apn)
      };
      continue_esm(mme, c, ue, action).await;
    }
    NasInbound::TrackingAreaUpdateRequest { tai } => {
      let action = {
        let mut reg = mme.registry.borrow_mut();
        let Some(ctx) = reg.emm_mut(ue) else { return };
        ctx.emm.on_tracking_area_update_request(tai)
      };
      continue_emm(mme, c, ue, action).await;
    }
    NasInbound::DetachRequest => {
      let mut reg = mme.registry.borrow_mut();
      if let Some(ctx) = reg.emm_mut(ue) {
        ctx.emm.on_detach_request();
      }
    }
  }
}

fn continue_emm<'a>(
  mme: &'a Rc<Mme>,
  c: &'a Collaborators<'a>,
  ue: Handle<UeContext>,
  action: EmmAction,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
  Box::pin(async move {
    match action {
      EmmAction::None | EmmAction::TreatAsFreshAttach => {}
      EmmAction::RequestAuthVectors => {
        let imsi = {
          let reg = mme.registry.borrow();
          reg.emm(ue).map(|ctx| ctx.emm.imsi)
        };
        let Some(imsi) = imsi else { return };
        match c
          .hss
          .authentication_information_request(imsi, mme_s6a::REQUESTED_VECTOR_COUNT)
          .await
        {
          Ok(vectors) => {
            let next = {
              let mut reg = mme.registry.borrow_mut();
              let Some(ctx) = reg.emm_mut(ue) else { return };
              ctx.emm.on_auth_vectors_received(vectors, &mut ctx.auth_vectors)
            };
            continue_emm(mme, c, ue, next).await;
          }
          Err(e) => {
            warn!(error = %e, "S6a authentication-information-request failed");
            downlink_nas(mme, ue, NasOutbound::AuthenticationReject);
          }
        }
      }
      EmmAction::SendAuthenticationRequest { ksi, rand, autn } => {
        downlink_nas(mme, ue, NasOutbound::AuthenticationRequest { ksi, rand, autn });
      }
      EmmAction::SendAuthenticationReject => {
        downlink_nas(mme, ue, NasOutbound::AuthenticationReject);
      }
      EmmAction::SendSecurityModeCommand => {
        downlink_nas(mme, ue, NasOutbound::SecurityModeCommand);
      }
      EmmAction::RequestUpdateLocation => {
        let imsi = {
          let reg = mme.registry.borrow();
          reg.emm(ue).map(|ctx| ctx.emm.imsi)
        };
        let Some(imsi) = imsi else { return };
        match c.hss.update_location_request(imsi).await {
          Ok(subscription) => {
            let next = {
              let mut reg = mme.registry.borrow_mut();
              let Some(ctx) = reg.emm_mut(ue) else { return };
              ctx.emm.on_update_location_response(subscription)
            };
            continue_emm(mme, c, ue, next).await;
          }
          Err(e) => warn!(error = %e, "S6a update-location-request failed"),
        }
      }
      EmmAction::InvokePdnConnectivity { request } => {
        let esm_action = {
          let mut reg = mme.registry.borrow_mut();
          let Some(ctx) = reg.emm_mut(ue) else { return };
          ctx.esm.on_pdn_connectivity_request(request)
        };
        continue_esm(mme, c, ue, esm_action).await;
      }
      EmmAction::SendAttachAccept { ebi } => {
        downlink_nas(mme, ue, NasOutbound::AttachAccept { ebi });
      }
      EmmAction::Deregister { cause } => {
        downlink_nas(mme, ue, NasOutbound::Detach { cause });
      }
      EmmAction::SendTrackingAreaUpdateAccept => {
        downlink_nas(mme, ue, NasOutbound::TrackingAreaUpdateAccept);
      }
    }
  })
}

fn continue_esm<'a>(
  mme: &'a Rc<Mme>,
  c: &'a Collaborators<'a>,
  ue: Handle<UeContext>,
  action: EsmAction,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
  Box::pin(async move {
    match action {
      EsmAction::None => {}
      EsmAction::SendEsmInformationRequest { ebi } => {
        downlink_nas(mme, ue, NasOutbound::EsmInformationRequest { ebi });
      }
      EsmAction::RequestCreateSession { ebi, .. } => {
        let _ = ebi; // always Ebi::MIN for the first default bearer
        let teid = mme.teid_alloc.borrow_mut().allocate();
        let mme_fteid = FTeid {
          interface_type: InterfaceType::S11Mme,
          teid,
          addr: c.local_addr,
        };
        let s11_action = {
          let mut reg = mme.registry.borrow_mut();
          let Some(ctx) = reg.emm_mut(ue) else { return };
          let imsi = ctx.emm.imsi;
          let seq = c.s11.next_seq();
          ctx.mme_s11_fteid = Some(mme_fteid);
          ctx.s11.attach(seq, imsi, mme_fteid)
        };
        s11_transport::send_action(mme, c.s11, c.reactor, ue, s11_action);
      }
      EsmAction::SendActivateDefaultBearer { ebi, paa } => {
        downlink_nas(mme, ue, NasOutbound::ActivateDefaultBearer { ebi, paa });
        let next = {
          let mut reg = mme.registry.borrow_mut();
          let Some(ctx) = reg.emm_mut(ue) else { return };
          ctx.emm.on_bearer_established(ebi)
        };
        continue_emm(mme, c, ue, next).await;
      }
      EsmAction::SendEsmStatus => {
        downlink_nas(mme, ue, NasOutbound::EsmStatus);
      }
    }
  })
}

/// Entry point for a decoded inbound GTPv2-C message off the S11 socket
/// (spec.md §4.6). Routes by sequence number back to the UE that sent the
/// matching request, then drives any follow-on ESM/EMM transition.
pub async fn handle_gtpv2_inbound(mme: &Rc<Mme>, c: &Collaborators<'_>, inbound: Gtpv2Inbound) {
  let seq = match &inbound {
    Gtpv2Inbound::CreateSessionResponse { seq, .. } => *seq,
    Gtpv2Inbound::ModifyBearerResponse { seq, .. } => *seq,
    Gtpv2Inbound::DeleteSessionResponse { seq } => *seq,
  };
  let Some(ue) = mme.take_s11_seq(seq) else {
    warn!(seq, "S11 response for an unknown/expired sequence number");
    return;
  };
  match inbound {
    Gtpv2Inbound::CreateSessionResponse { seq, cause, sgw_fteid, pgw_fteid, paa } => {
      let action = {
        let mut reg = mme.registry.borrow_mut();
        let Some(ctx) = reg.emm_mut(ue) else { return };
        ctx.s11.on_create_session_response(seq, cause, sgw_fteid, pgw_fteid, paa)
      };
      match action {
        S11Action::NotifyAttachAccepted { paa, .. } => {
          let esm_action = {
            let mut reg = mme.registry.borrow_mut();
            let Some(ctx) = reg.emm_mut(ue) else { return };
            ctx.esm.on_session_created(DEFAULT_BEARER_EBI, paa)
          };
          continue_esm(mme, c, ue, esm_action).await;
        }
        S11Action::NotifyAttachRejected => {
          let next = {
            let mut reg = mme.registry.borrow_mut();
            let Some(ctx) = reg.emm_mut(ue) else { return };
            ctx.emm.on_s11_unreachable()
          };
          continue_emm(mme, c, ue, next).await;
        }
        _ => {}
      }
    }
    Gtpv2Inbound::ModifyBearerResponse { seq, ebi_matches, fteid_matches } => {
      let (action, notice) = {
        let mut reg = mme.registry.borrow_mut();
        let Some(ctx) = reg.emm_mut(ue) else { return };
        let action = ctx.s11.on_modify_bearer_response(seq, ebi_matches, fteid_matches);
        let notice = if action == S11Action::NotifyModifyComplete {
          match (ctx.s11.enb_fteid, ctx.s11.sgw_fteid) {
            (Some(enb_fteid), Some(sgw_fteid)) => Some(BearerChangeNotice::new(
              ctx.emm.imsi,
              DEFAULT_BEARER_EBI,
              enb_fteid,
              sgw_fteid,
            )),
            _ => None,
          }
        } else {
          None
        };
        (action, notice)
      };
      let _ = action;
      if let Some(notice) = notice {
        c.sdn.notify_bearer(&notice).await;
      }
    }
    Gtpv2Inbound::DeleteSessionResponse { seq } => {
      let mut reg = mme.registry.borrow_mut();
      if let Some(ctx) = reg.emm_mut(ue) {
        let _ = ctx.s11.on_delete_session_response(seq);
      }
    }
  }
}
