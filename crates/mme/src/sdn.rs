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

//! SDN controller side-channel (spec.md §6, SPEC_FULL.md §4.11).
//!
//! An opaque, line-delimited JSON RPC over TCP to an external SDN
//! controller, so it can observe user-plane endpoint changes without being
//! wired into the attach path itself. Unreachable or misconfigured is never
//! fatal: every send failure is logged and swallowed, the same posture the
//! S6a/S1AP/GTPv2-C seams take towards their own externally-supplied peers.

use mme_types::{Ebi, FTeid, Imsi};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::warn;

/// One line of the bearer-change notification sent to the controller.
/// F-TEIDs are flattened to `addr:teid` strings rather than embedding
/// `mme_types::FTeid` directly, since that type lives in a crate this one
/// cannot add a foreign `Serialize` impl for.
#[derive(Debug, Serialize)]
pub struct BearerChangeNotice {
  pub imsi: Imsi,
  pub ebi: u8,
  pub enb_fteid: String,
  pub sgw_fteid: String,
}

impl BearerChangeNotice {
  pub fn new(imsi: Imsi, ebi: Ebi, enb_fteid: FTeid, sgw_fteid: FTeid) -> Self {
    Self {
      imsi,
      ebi: ebi.0,
      enb_fteid: format!("{}:{}", enb_fteid.addr, enb_fteid.teid.0),
      sgw_fteid: format!("{}:{}", sgw_fteid.addr, sgw_fteid.teid.0),
    }
  }
}

/// A handle to the configured SDN controller; `None` when `sdn_controller`
/// is unset in `Config`, in which case every notification is a silent no-op
/// rather than an error (spec.md §4.11: disables the side-channel entirely).
pub struct SdnClient {
  controller: Option<SocketAddr>,
}

impl SdnClient {
  pub fn new(controller: Option<SocketAddr>) -> Self {
    Self { controller }
  }

  /// Fire a bearer-change notice after a successful Modify-Bearer-Response
  /// (spec.md §4.11). Opens a fresh connection per call: this is a
  /// low-frequency control-plane signal, not a data-plane path, so paying
  /// a connect per notice keeps the client free of its own reconnect
  /// state machine.
  pub async fn notify_bearer(&self, notice: &BearerChangeNotice) {
    let Some(addr) = self.controller else {
      return;
    };
    if let Err(e) = self.send(addr, notice).await {
      warn!(error = %e, %addr, "SDN controller notification failed");
    }
  }

  async fn send(&self, addr: SocketAddr, notice: &BearerChangeNotice) -> std::io::Result<()> {
    let mut line = serde_json::to_string(notice)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    line.push('\n');
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(line.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
  }
}
