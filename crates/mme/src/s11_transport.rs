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

//! S11 GTPv2-C transport: the UDP socket towards the SGW, sequence-number
//! bookkeeping, and T3 retransmission (spec.md §4.6, §4.1).
//!
//! The S11 user FSM (`mme_gtp::S11UserSession`) never touches a socket: it
//! only says what to send and when a retransmission is due. This module is
//! the collaborator that actually owns the UDP socket and the reactor timer
//! that drives `on_t3_expiry`.

use crate::context::UeContext;
use crate::mme::Mme;
use mme_gtp::{S11Action, SeqAllocator};
use mme_reactor::Reactor;
use mme_registry::Handle;
use mme_types::Ebi;
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// GTPv2-C retransmission timer (3GPP TS 29.274 recommends ~3s; this is the
/// same order of magnitude used for NAS T3 timers elsewhere in this stack).
pub const T3_TIMEOUT: Duration = Duration::from_secs(3);

pub struct S11Transport {
  socket: UdpSocket,
  sgw_addr: SocketAddr,
  seq_alloc: RefCell<SeqAllocator>,
}

impl S11Transport {
  pub async fn bind(local_addr: SocketAddr, sgw_addr: SocketAddr) -> std::io::Result<Self> {
    let socket = UdpSocket::bind(local_addr).await?;
    Ok(Self {
      socket,
      sgw_addr,
      seq_alloc: RefCell::new(SeqAllocator::new()),
    })
  }

  pub fn next_seq(&self) -> u32 {
    self.seq_alloc.borrow_mut().next()
  }

  /// Receive one datagram off the S11 socket for `main`'s receive loop to
  /// decode and hand to `dispatch::handle_gtpv2_inbound`.
  ///
  /// Datagrams whose source address doesn't match `sgw_addr` are dropped
  /// here rather than surfaced to the caller (spec.md §4.6): the SGW peer
  /// address is fixed at bind time, so a mismatch can only be a spoofed or
  /// misrouted packet, never a legitimate retry from a different source.
  pub async fn recv(&self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
    let mut buf = [0u8; 2048];
    loop {
      let (len, from) = self.socket.recv_from(&mut buf).await?;
      if !mme_gtp::validate_source_addr(self.sgw_addr.ip(), from.ip()) {
        warn!(%from, expected = %self.sgw_addr, "dropping S11 datagram from unexpected source");
        continue;
      }
      return Ok((buf[..len].to_vec(), from));
    }
  }
}

/// Send the wire bytes for one outbound S11 action and arm its T3
/// retransmission timer, tracking which UE owns `seq` so the response and
/// any retransmission can be routed back.
pub fn send_action(
  mme: &Rc<Mme>,
  transport: &Rc<S11Transport>,
  reactor: &Rc<Reactor>,
  ue: Handle<UeContext>,
  action: S11Action,
) {
  let Some((seq, bytes)) = encode_action(mme, &action) else {
    return;
  };
  mme.track_s11_seq(seq, ue);
  let sock_bytes = bytes.clone();
  let transport2 = transport.clone();
  let sgw_addr = transport.sgw_addr;
  // The socket send itself is fire-and-forget from the FSM's perspective;
  // `tokio::spawn_local` via the reactor keeps this non-blocking without
  // requiring every caller of `send_action` to be async.
  reactor.spawn(async move {
    if let Err(e) = transport2.socket.send_to(&sock_bytes, sgw_addr).await {
      warn!(error = %e, "S11 send failed");
    }
  });
  arm_t3(mme.clone(), transport.clone(), reactor.clone(), seq, bytes);
}

fn encode_action(mme: &Rc<Mme>, action: &S11Action) -> Option<(u32, Vec<u8>)> {
  use crate::codec::Gtpv2Outbound;
  match action {
    S11Action::SendCreateSessionRequest { seq, mme_fteid, ebi, .. } => Some((
      *seq,
      mme.gtpv2_codec.encode(&Gtpv2Outbound::CreateSessionRequest {
        seq: *seq,
        mme_fteid: *mme_fteid,
        ebi: *ebi,
      }),
    )),
    S11Action::SendModifyBearerRequest { seq, mme_fteid, enb_fteid } => Some((
      *seq,
      mme.gtpv2_codec.encode(&Gtpv2Outbound::ModifyBearerRequest {
        seq: *seq,
        mme_fteid: *mme_fteid,
        enb_fteid: *enb_fteid,
      }),
    )),
    S11Action::SendDeleteSessionRequest { seq, ebi } => Some((
      *seq,
      mme.gtpv2_codec
        .encode(&Gtpv2Outbound::DeleteSessionRequest { seq: *seq, ebi: *ebi }),
    )),
    _ => None,
  }
}

fn arm_t3(mme: Rc<Mme>, transport: Rc<S11Transport>, reactor: Rc<Reactor>, seq: u32, _bytes: Vec<u8>) {
  let reactor2 = reactor.clone();
  reactor.arm_timer(T3_TIMEOUT, move || {
    let Some(ue) = mme.take_s11_seq(seq) else {
      return;
    };
    let action = {
      let mut reg = mme.registry.borrow_mut();
      let Some(ctx) = reg.emm_mut(ue) else {
        return;
      };
      ctx.s11.on_t3_expiry()
    };
    match action {
      S11Action::NotifyPathFailure => {
        warn!(?ue, "S11 path failure after exhausting retransmissions");
        let mut reg = mme.registry.borrow_mut();
        if let Some(ctx) = reg.emm_mut(ue) {
          let _ = ctx.emm.on_s11_unreachable();
        }
      }
      S11Action::None => {}
      resend => {
        debug!(?ue, seq, "retransmitting S11 request");
        mme.track_s11_seq(seq, ue);
        if let Some((seq, bytes)) = encode_action(&mme, &resend) {
          let _ = transport.socket.try_send_to(&bytes, transport.sgw_addr);
          arm_t3(mme.clone(), transport.clone(), reactor2.clone(), seq, bytes);
        }
      }
    }
  });
}

/// Bearer identity EBI is always `Ebi::MIN` for the first default bearer of
/// an Attach; named here so `dispatch.rs` doesn't repeat the magic constant.
pub const DEFAULT_BEARER_EBI: Ebi = Ebi(Ebi::MIN);
