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

//! Top-level MME object (spec.md §3 supplementary, grounded on
//! `original_source/mme/MME.c` and `nodemgr.c`).
//!
//! The original's `nodemgr` owns every long-lived collaborator and is
//! threaded by reference into each transport module; here that is an `Rc`
//! shared across the reactor's spawned tasks, since everything still runs on
//! one thread (spec.md §5).

use crate::codec::{Gtpv2Codec, NasCodec, S1apCodec, S1apOutbound};
use crate::context::UeContext;
use mme_config::Config;
use mme_gtp::TeidAllocator;
use mme_registry::{Handle, Registry};
use mme_s1::{EcmSession, S1Association};
use mme_types::MmeUeS1apId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc;

/// The registry keyed on this daemon's three anchored object kinds.
pub type MmeRegistry = Registry<UeContext, EcmSession, S1Association>;

/// Shared daemon state: configuration, the UE/ECM/association registry, the
/// wire-codec pair, and the GTPv2-C sequence-number index the S11 transport
/// needs to route a response back to the UE that sent the request (spec.md
/// §4.6 carries the sequence on the FSM; nothing upstream of the transport
/// needs to know the mapping exists).
pub struct Mme {
  pub config: Config,
  pub registry: RefCell<MmeRegistry>,
  pub s1ap_codec: Box<dyn S1apCodec>,
  pub gtpv2_codec: Box<dyn Gtpv2Codec>,
  pub nas_codec: Box<dyn NasCodec>,
  s11_seq_index: RefCell<HashMap<u32, Handle<UeContext>>>,
  /// Per-UE downlink queue into its eNB connection's writer task, keyed by
  /// MME-UE-S1AP-ID; registered once `s1ap::handle_connection` anchors the
  /// UE and removed when the association tears it down.
  downlink_tx: RefCell<HashMap<MmeUeS1apId, mpsc::UnboundedSender<S1apOutbound>>>,
  /// MME-UE-S1AP-ID -> the UE's arena handle. The registry itself only
  /// indexes EMM contexts by IMSI/M-TMSI (`mme_registry::Registry`); the
  /// S1AP/S11 transports only ever see the MME-UE-S1AP-ID, so this is the
  /// bridge back to the handle every other lookup needs.
  ue_by_mme_ue_id: RefCell<HashMap<MmeUeS1apId, Handle<UeContext>>>,
  /// Local TEID pool for the S11-MME F-TEID of every session this node
  /// originates (spec.md §4.6, §9 Q5). One pool per node, not per UE: a
  /// TEID only needs to be unique within this MME's own address space.
  pub teid_alloc: RefCell<TeidAllocator>,
}

impl Mme {
  pub fn new(
    config: Config,
    s1ap_codec: Box<dyn S1apCodec>,
    gtpv2_codec: Box<dyn Gtpv2Codec>,
    nas_codec: Box<dyn NasCodec>,
  ) -> Rc<Self> {
    Rc::new(Self {
      config,
      registry: RefCell::new(MmeRegistry::new()),
      s1ap_codec,
      gtpv2_codec,
      nas_codec,
      s11_seq_index: RefCell::new(HashMap::new()),
      downlink_tx: RefCell::new(HashMap::new()),
      ue_by_mme_ue_id: RefCell::new(HashMap::new()),
      teid_alloc: RefCell::new(TeidAllocator::new()),
    })
  }

  pub fn bind_ue_handle(&self, mme_ue_id: MmeUeS1apId, ue: Handle<UeContext>) {
    self.ue_by_mme_ue_id.borrow_mut().insert(mme_ue_id, ue);
  }

  pub fn ue_by_mme_ue_id(&self, mme_ue_id: MmeUeS1apId) -> Option<Handle<UeContext>> {
    self.ue_by_mme_ue_id.borrow().get(&mme_ue_id).copied()
  }

  pub fn forget_ue_handle(&self, mme_ue_id: MmeUeS1apId) {
    self.ue_by_mme_ue_id.borrow_mut().remove(&mme_ue_id);
  }

  /// Record which UE a freshly allocated S11 sequence number belongs to,
  /// so an inbound GTPv2-C response can be routed back without carrying
  /// the IMSI on the wire.
  pub fn track_s11_seq(&self, seq: u32, ue: Handle<UeContext>) {
    self.s11_seq_index.borrow_mut().insert(seq, ue);
  }

  pub fn take_s11_seq(&self, seq: u32) -> Option<Handle<UeContext>> {
    self.s11_seq_index.borrow_mut().remove(&seq)
  }

  pub fn register_downlink(&self, mme_ue_id: MmeUeS1apId, tx: mpsc::UnboundedSender<S1apOutbound>) {
    self.downlink_tx.borrow_mut().insert(mme_ue_id, tx);
  }

  pub fn deregister_downlink(&self, mme_ue_id: MmeUeS1apId) {
    self.downlink_tx.borrow_mut().remove(&mme_ue_id);
  }

  /// Queue an S1AP PDU for delivery down the eNB connection currently
  /// anchoring `mme_ue_id`. A no-op (logged) if the UE has no live
  /// connection, e.g. it disconnected between the coordinator deciding to
  /// send and this call.
  pub fn send_s1ap(&self, mme_ue_id: MmeUeS1apId, msg: S1apOutbound) {
    let sent = self
      .downlink_tx
      .borrow()
      .get(&mme_ue_id)
      .map(|tx| tx.send(msg.clone()).is_ok())
      .unwrap_or(false);
    if !sent {
      tracing::warn!(?mme_ue_id, ?msg, "no live eNB connection to deliver downlink S1AP PDU");
    }
  }
}
