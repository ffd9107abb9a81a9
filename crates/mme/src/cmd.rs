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

//! Operator command socket (spec.md §6; SPEC_FULL.md §4.12).
//!
//! A localhost UDP socket, read-only by construction: every handler here
//! only ever borrows the registry immutably, so there is no risk of an
//! operator command perturbing a live FSM. Grounded the same way
//! `s11_transport.rs` grounds the S11 socket: bind once, then loop
//! `recv_from`/`send_to` on the reactor thread.

use crate::mme::Mme;
use mme_types::Imsi;
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::net::UdpSocket;
use tracing::{info, warn};

/// One datagram's worth of command text; commands longer than this are
/// truncated rather than rejected, since garbage input just yields a
/// garbage (but harmless) reply.
const MAX_DATAGRAM: usize = 1024;

pub async fn listen(mme: Rc<Mme>, addr: SocketAddr) -> std::io::Result<()> {
  let socket = UdpSocket::bind(addr).await?;
  info!(%addr, "command socket bound");
  let mut buf = [0u8; MAX_DATAGRAM];
  loop {
    let (len, peer) = socket.recv_from(&mut buf).await?;
    let reply = handle(&mme, &buf[..len]);
    if let Err(e) = socket.send_to(reply.as_bytes(), peer).await {
      warn!(%peer, error = %e, "failed to send command reply");
    }
  }
}

fn handle(mme: &Mme, bytes: &[u8]) -> String {
  let text = String::from_utf8_lossy(bytes);
  let mut reply = match text.trim().split_whitespace().collect::<Vec<_>>().as_slice() {
    ["status"] => status(mme),
    ["ue", imsi] => ue_status(mme, imsi),
    ["enb", "list"] => enb_list(mme),
    [] => "ERR empty command".to_string(),
    _ => format!("ERR unrecognized command: {}", text.trim()),
  };
  reply.push('\n');
  reply
}

fn status(mme: &Mme) -> String {
  let reg = mme.registry.borrow();
  format!(
    "OK ues={} ecm_sessions={} enb_associations={}",
    reg.emm_count(),
    reg.ecm_count(),
    reg.assoc_count(),
  )
}

fn ue_status(mme: &Mme, imsi_text: &str) -> String {
  let Ok(raw) = imsi_text.parse::<u64>() else {
    return format!("ERR invalid IMSI: {imsi_text}");
  };
  let imsi = Imsi(raw);
  let reg = mme.registry.borrow();
  let Some(h) = reg.emm_by_imsi(imsi) else {
    return format!("ERR no such UE: {imsi_text}");
  };
  let Some(ctx) = reg.emm(h) else {
    return format!("ERR no such UE: {imsi_text}");
  };
  format!("OK imsi={} emm_state={:?}", raw, ctx.emm.state)
}

fn enb_list(mme: &Mme) -> String {
  let reg = mme.registry.borrow();
  let entries: Vec<String> = reg
    .assoc_entries()
    .map(|(id, _)| format!("{:?}-{}", id.plmn, id.enb_id))
    .collect();
  if entries.is_empty() {
    "OK (no associations)".to_string()
  } else {
    format!("OK {}", entries.join(","))
  }
}
