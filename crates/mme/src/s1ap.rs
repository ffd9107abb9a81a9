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

//! S1-MME transport: one TCP connection per eNB stands in for the SCTP
//! association spec.md §6 names (no verified SCTP crate surfaced in this
//! workspace's dependency pool; TCP gives the same one-stream-per-eNB
//! framing without bringing in an unaudited crate).
//!
//! Each connection owns a reader loop (decode -> route into `mme-s1`'s
//! association/ECM FSMs, or `dispatch` once a PDU is NAS-bearing) and a
//! writer task fed by an `mpsc` channel, so a downlink PDU queued from
//! anywhere in the daemon (a timer callback, an S11 response handler) never
//! has to block on the socket itself.

use crate::codec::{NasInbound, S1apInbound, S1apOutbound};
use crate::context::UeContext;
use crate::dispatch::{self, Collaborators};
use crate::mme::Mme;
use mme_registry::Handle;
use mme_s1::{EcmAction, S1AssocAction, S1Association};
use mme_types::{EnbUeS1apId, GlobalEnbId, MmeUeS1apId};
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Length-prefixed framing: a 4-byte big-endian length followed by the PDU
/// bytes, since TCP has no message boundaries of its own.
async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
  let mut len_buf = [0u8; 4];
  if stream.read_exact(&mut len_buf).await.is_err() {
    return Ok(None);
  }
  let len = u32::from_be_bytes(len_buf) as usize;
  let mut buf = vec![0u8; len];
  stream.read_exact(&mut buf).await?;
  Ok(Some(buf))
}

async fn write_frame(stream: &mut TcpStream, bytes: &[u8]) -> std::io::Result<()> {
  stream.write_all(&(bytes.len() as u32).to_be_bytes()).await?;
  stream.write_all(bytes).await?;
  Ok(())
}

pub async fn listen(mme: Rc<Mme>, collaborators: Rc<CollaboratorsOwned>, addr: SocketAddr) -> std::io::Result<()> {
  let listener = TcpListener::bind(addr).await?;
  info!(%addr, "S1-MME listener bound");
  loop {
    let (stream, peer) = listener.accept().await?;
    info!(%peer, "eNB connected");
    let mme = mme.clone();
    let collaborators = collaborators.clone();
    tokio::task::spawn_local(handle_connection(mme, collaborators, stream, peer));
  }
}

/// Owns everything `dispatch::Collaborators` borrows, so one value can be
/// cloned into each connection task and a `Collaborators<'_>` borrowed from
/// it for the duration of a single dispatch call.
pub struct CollaboratorsOwned {
  pub reactor: Rc<mme_reactor::Reactor>,
  pub s11: Rc<crate::s11_transport::S11Transport>,
  pub hss: Rc<dyn mme_s6a::HssClient>,
  pub sdn: Rc<crate::sdn::SdnClient>,
  pub local_addr: std::net::Ipv4Addr,
}

impl CollaboratorsOwned {
  /// Not named `borrow`: that would collide with the blanket
  /// `Borrow<CollaboratorsOwned> for Rc<CollaboratorsOwned>` impl and
  /// silently resolve to the wrong method on an `Rc`-typed receiver.
  pub(crate) fn view(&self) -> Collaborators<'_> {
    Collaborators {
      reactor: &self.reactor,
      s11: &self.s11,
      hss: self.hss.as_ref(),
      sdn: &self.sdn,
      local_addr: self.local_addr,
    }
  }
}

/// Where this connection's `S1Association` FSM lives. Before `S1SetupRequest`
/// succeeds it has no `GlobalEnbId` to key the registry's `assoc_by_enb`
/// index with, so it starts out owned locally; once Active it moves into
/// `mme.registry` so the paging engine can reach every live association
/// through the handle table like everything else (mme-registry's own
/// "FSMs store handles, never owning references" rule).
enum AssocRef {
  Local(S1Association),
  Registered(GlobalEnbId, Handle<S1Association>),
}

impl AssocRef {
  fn with_mut<R>(&mut self, mme: &Mme, f: impl FnOnce(&mut S1Association) -> R) -> R {
    match self {
      AssocRef::Local(a) => f(a),
      AssocRef::Registered(_, h) => {
        let mut reg = mme.registry.borrow_mut();
        let a = reg.assoc_mut(*h).expect("registered association handle always valid");
        f(a)
      }
    }
  }

  fn global_enb_id(&self) -> Option<GlobalEnbId> {
    match self {
      AssocRef::Local(_) => None,
      AssocRef::Registered(id, _) => Some(*id),
    }
  }
}

async fn handle_connection(mme: Rc<Mme>, c: Rc<CollaboratorsOwned>, mut stream: TcpStream, peer: SocketAddr) {
  let (tx, mut rx) = mpsc::unbounded_channel::<S1apOutbound>();
  let mut assoc = AssocRef::Local(S1Association::new());

  loop {
    tokio::select! {
      frame = read_frame(&mut stream) => {
        match frame {
          Ok(Some(bytes)) => {
            if !dispatch_inbound(&mme, &c, &mut assoc, &tx, peer, &bytes).await {
              break;
            }
          }
          Ok(None) | Err(_) => break,
        }
      }
      Some(out) = rx.recv() => {
        let bytes = mme.s1ap_codec.encode(&out);
        if write_frame(&mut stream, &bytes).await.is_err() {
          break;
        }
      }
    }
  }

  info!(%peer, "eNB connection closed");
  let action = assoc.with_mut(&mme, |a| a.on_disconnect());
  if let S1AssocAction::ReleaseAllUes { mme_ue_ids } = action {
    for id in mme_ue_ids {
      mme.deregister_downlink(id);
      mme.forget_ue_handle(id);
      let mut reg = mme.registry.borrow_mut();
      reg.remove_ecm(id);
    }
  }
  if let Some(enb_id) = assoc.global_enb_id() {
    let mut reg = mme.registry.borrow_mut();
    reg.remove_assoc(enb_id);
  }
}

/// Decode and route one inbound frame; returns `false` if the connection
/// should be torn down (decode failure or an `S1SetupFailure` with no
/// sensible retry path left to the caller).
async fn dispatch_inbound(
  mme: &Rc<Mme>,
  c: &Rc<CollaboratorsOwned>,
  assoc: &mut AssocRef,
  downlink_tx: &mpsc::UnboundedSender<S1apOutbound>,
  peer: SocketAddr,
  bytes: &[u8],
) -> bool {
  let decoded = match mme.s1ap_codec.decode(peer, bytes) {
    Ok(d) => d,
    Err(e) => {
      warn!(%peer, error = %e, "malformed S1AP PDU");
      let _ = downlink_tx.send(S1apOutbound::ErrorIndication);
      return true;
    }
  };

  match decoded {
    S1apInbound::SetupRequest(req) => {
      let served_plmns = mme.config.served_plmns();
      let action = assoc.with_mut(mme, |a| {
        a.on_s1_setup_request(
          req,
          &served_plmns,
          &mme.config.served_gummeis,
          mme.config.mme_name.as_deref(),
          mme.config.relative_capacity,
        )
      });
      match action {
        S1AssocAction::SendSetupResponse { mme_name, served_gummeis, relative_capacity } => {
          let _ = downlink_tx.send(S1apOutbound::SetupResponse {
            mme_name,
            served_gummeis,
            relative_capacity,
          });
          if let AssocRef::Local(a) = assoc {
            if let Some(enb_id) = a.global_enb_id {
              debug!(?enb_id, "eNB association active");
              let registered = std::mem::replace(a, S1Association::new());
              let mut reg = mme.registry.borrow_mut();
              let h = reg.insert_assoc(enb_id, registered);
              drop(reg);
              *assoc = AssocRef::Registered(enb_id, h);
            }
          }
        }
        S1AssocAction::SendSetupFailure { cause } => {
          let _ = downlink_tx.send(S1apOutbound::SetupFailure { cause });
        }
        _ => {
          let _ = downlink_tx.send(S1apOutbound::ErrorIndication);
        }
      }
      true
    }
    S1apInbound::InitialUe { enb_ue_id, nas_pdu } => {
      let action = assoc.with_mut(mme, |a| a.on_initial_ue(enb_ue_id, nas_pdu));
      match action {
        S1AssocAction::CreateEcmSession { enb_ue_id, nas_pdu } => {
          create_ue_and_route(mme, c, assoc, downlink_tx, enb_ue_id, nas_pdu).await;
        }
        S1AssocAction::SendErrorIndication => {
          let _ = downlink_tx.send(S1apOutbound::ErrorIndication);
        }
        _ => {}
      }
      true
    }
    S1apInbound::UeAssociated { enb_ue_id, nas_pdu } => {
      let action = assoc.with_mut(mme, |a| a.on_ue_associated(enb_ue_id, nas_pdu));
      match action {
        S1AssocAction::RouteToEcm { mme_ue_id, nas_pdu } => {
          route_uplink(mme, c, mme_ue_id, nas_pdu).await;
        }
        S1AssocAction::SendErrorIndication => {
          let _ = downlink_tx.send(S1apOutbound::ErrorIndication);
        }
        _ => {}
      }
      true
    }
    S1apInbound::InitialContextSetupResponse { enb_ue_id, enb_fteid } => {
      let Some(mme_ue_id) = lookup_mme_ue_id(mme, assoc, enb_ue_id) else {
        warn!(?enb_ue_id, "InitialContextSetupResponse from an unanchored eNB-UE-S1AP-ID");
        return true;
      };
      if let Some(ue) = mme.ue_by_mme_ue_id(mme_ue_id) {
        dispatch::handle_initial_context_setup_response(mme, &c.view(), ue, enb_fteid).await;
      }
      true
    }
  }
}

/// `S1Association` doesn't expose its `enb_ue_id -> mme_ue_id` map directly;
/// `on_ue_associated` is the only public lookup path, so reuse it here
/// rather than widening the FSM's API for one extra caller. Passing an empty
/// NAS PDU is safe: a successful lookup only returns the id, the PDU itself
/// is discarded by the caller.
fn lookup_mme_ue_id(mme: &Mme, assoc: &mut AssocRef, enb_ue_id: EnbUeS1apId) -> Option<MmeUeS1apId> {
  match assoc.with_mut(mme, |a| a.on_ue_associated(enb_ue_id, Vec::new())) {
    S1AssocAction::RouteToEcm { mme_ue_id, .. } => Some(mme_ue_id),
    _ => None,
  }
}

async fn create_ue_and_route(
  mme: &Rc<Mme>,
  c: &Rc<CollaboratorsOwned>,
  assoc: &mut AssocRef,
  downlink_tx: &mpsc::UnboundedSender<S1apOutbound>,
  enb_ue_id: EnbUeS1apId,
  nas_pdu: Vec<u8>,
) {
  let decoded = match mme.nas_codec.decode(&nas_pdu) {
    Ok(NasInbound::AttachRequest { imsi, ue_security_capabilities, pdn_request }) => {
      (imsi, ue_security_capabilities, pdn_request)
    }
    Ok(_) => {
      warn!("InitialUE NAS PDU was not an AttachRequest");
      let _ = downlink_tx.send(S1apOutbound::ErrorIndication);
      return;
    }
    Err(e) => {
      warn!(error = %e, "failed to decode InitialUE NAS PDU");
      let _ = downlink_tx.send(S1apOutbound::ErrorIndication);
      return;
    }
  };
  let (imsi, ue_security_capabilities, pdn_request) = decoded;

  let ue = {
    let mut reg = mme.registry.borrow_mut();
    match reg.emm_by_imsi(imsi) {
      Some(h) => h,
      None => {
        let h = reg.insert_emm(UeContext::new(imsi));
        let _ = reg.bind_imsi(imsi, h);
        h
      }
    }
  };

  let mme_ue_id = {
    let mut reg = mme.registry.borrow_mut();
    let (_ecm_handle, mme_ue_id) = match reg.insert_ecm(mme_s1::EcmSession::new()) {
      Ok(v) => v,
      Err(e) => {
        warn!(error = %e, "failed to allocate MME-UE-S1AP-ID");
        let _ = downlink_tx.send(S1apOutbound::ErrorIndication);
        return;
      }
    };
    mme_ue_id
  };
  assoc.with_mut(mme, |a| a.bind_ue(enb_ue_id, mme_ue_id));

  {
    let mut reg = mme.registry.borrow_mut();
    if let Some(ecm_handle) = reg.ecm_by_ueid(mme_ue_id) {
      if let Some(ecm) = reg.ecm_mut(ecm_handle) {
        ecm.on_initial_ue(enb_ue_id, Vec::new());
      }
    }
    if let Some(ctx) = reg.emm_mut(ue) {
      ctx.mme_ue_id = Some(mme_ue_id);
    }
  }
  mme.bind_ue_handle(mme_ue_id, ue);
  mme.register_downlink(mme_ue_id, downlink_tx.clone());

  dispatch::handle_attach_request(mme, &c.view(), ue, ue_security_capabilities, pdn_request).await;
}

async fn route_uplink(mme: &Rc<Mme>, c: &Rc<CollaboratorsOwned>, mme_ue_id: MmeUeS1apId, nas_pdu: Vec<u8>) {
  {
    let mut reg = mme.registry.borrow_mut();
    if let Some(ecm_handle) = reg.ecm_by_ueid(mme_ue_id) {
      if let Some(ecm) = reg.ecm_mut(ecm_handle) {
        if !matches!(ecm.on_uplink(Vec::new()), EcmAction::ForwardToEmm { .. }) {
          return;
        }
      }
    }
  }
  let Some(ue) = mme.ue_by_mme_ue_id(mme_ue_id) else {
    warn!(?mme_ue_id, "uplink NAS for an MME-UE-S1AP-ID with no bound UE context");
    return;
  };
  match mme.nas_codec.decode(&nas_pdu) {
    Ok(inbound) => dispatch::handle_nas_inbound(mme, &c.view(), ue, inbound).await,
    Err(e) => warn!(error = %e, "failed to decode uplink NAS PDU"),
  }
}
