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

//! Aalto MME control-plane daemon entry point (spec.md §4.1, §6).
//!
//! Boot order: load config, stand up the reactor, wire every transport's
//! collaborators, then spawn each transport's accept/receive loop before
//! handing control to `reactor.run` alongside the shutdown signal.

mod cmd;
mod codec;
mod context;
mod dispatch;
mod hss;
mod mme;
mod s11_transport;
mod s1ap;
mod sdn;

use codec::UnimplementedCodec;
use hss::UnimplementedHssClient;
use mme::Mme;
use mme_reactor::{Reactor, Shutdown};
use s11_transport::S11Transport;
use sdn::SdnClient;
use std::net::{SocketAddr, SocketAddrV4};
use std::rc::Rc;

/// S11 is UDP/2123 per spec.md §6; the S1-MME binding has no equivalent
/// well-known TCP port since this daemon stands a TCP framing in for SCTP,
/// so this mirrors SCTP PPID 18's conventional port (36412) instead.
const S11_PORT: u16 = 2123;
const S1AP_DEFAULT_PORT: u16 = 36412;

/// Neither the SGW's address nor the command socket's bind address has a
/// config field (spec.md §6 names the S11/command bindings but leaves their
/// concrete values to a schema the distilled spec never specifies) — both
/// are resolved from environment variables with a loopback default,
/// recorded as an open-question resolution in DESIGN.md.
fn sgw_addr() -> SocketAddr {
  std::env::var("MME_SGW_ADDR")
    .ok()
    .and_then(|s| s.parse().ok())
    .unwrap_or_else(|| SocketAddr::V4(SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, S11_PORT)))
}

fn cmd_addr() -> SocketAddr {
  std::env::var("MME_CMD_ADDR")
    .ok()
    .and_then(|s| s.parse().ok())
    .unwrap_or_else(|| SocketAddr::V4(SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, 6000)))
}

fn s1ap_port() -> u16 {
  std::env::var("MME_S1AP_PORT")
    .ok()
    .and_then(|s| s.parse().ok())
    .unwrap_or(S1AP_DEFAULT_PORT)
}

fn main() -> anyhow::Result<()> {
  mme_trace::init();

  let config = mme_config::Config::load(mme_config::Config::resolve_path())?;
  let local_ip = config.ipv4;
  let s1ap_addr = SocketAddr::V4(SocketAddrV4::new(local_ip, s1ap_port()));
  let s11_local_addr = SocketAddr::V4(SocketAddrV4::new(local_ip, S11_PORT));
  let sgw_addr = sgw_addr();
  let cmd_addr = cmd_addr();

  let reactor = Rc::new(Reactor::new()?);
  let mme_obj = Mme::new(
    config,
    Box::new(UnimplementedCodec),
    Box::new(UnimplementedCodec),
    Box::new(UnimplementedCodec),
  );

  let (shutdown, mut shutdown_signal) = Shutdown::new();
  let reactor_for_run = reactor.clone();

  reactor.run(async move {
    let reactor = reactor_for_run;
    let s11 = match S11Transport::bind(s11_local_addr, sgw_addr).await {
      Ok(t) => Rc::new(t),
      Err(e) => {
        tracing::error!(error = %e, %s11_local_addr, "failed to bind S11 socket");
        shutdown.trigger();
        return;
      }
    };
    let hss: Rc<dyn mme_s6a::HssClient> = Rc::new(UnimplementedHssClient);
    let sdn = Rc::new(SdnClient::new(mme_obj.config.sdn_controller));

    let collaborators = Rc::new(s1ap::CollaboratorsOwned {
      reactor: reactor.clone(),
      s11: s11.clone(),
      hss,
      sdn,
      local_addr: local_ip,
    });

    let s1ap_mme = mme_obj.clone();
    let s1ap_collaborators = collaborators.clone();
    reactor.spawn(async move {
      if let Err(e) = s1ap::listen(s1ap_mme, s1ap_collaborators, s1ap_addr).await {
        tracing::error!(error = %e, %s1ap_addr, "S1-MME listener exited");
      }
    });

    let s11_recv_mme = mme_obj.clone();
    let s11_recv_collaborators = collaborators.clone();
    let s11_recv_socket = s11.clone();
    reactor.spawn(async move {
      s11_receive_loop(s11_recv_mme, s11_recv_collaborators, s11_recv_socket).await;
    });

    let cmd_mme = mme_obj.clone();
    reactor.spawn(async move {
      if let Err(e) = cmd::listen(cmd_mme, cmd_addr).await {
        tracing::error!(error = %e, %cmd_addr, "command socket listener exited");
      }
    });

    let signal_shutdown = shutdown.clone();
    reactor.spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown requested");
        signal_shutdown.trigger();
      }
    });

    shutdown_signal.triggered().await;
  });

  Ok(())
}

async fn s11_receive_loop(mme: Rc<Mme>, c: Rc<s1ap::CollaboratorsOwned>, s11: Rc<S11Transport>) {
  loop {
    match s11.recv().await {
      Ok((bytes, from)) => match mme.gtpv2_codec.decode(from, &bytes) {
        Ok(inbound) => dispatch::handle_gtpv2_inbound(&mme, &c.view(), inbound).await,
        Err(e) => tracing::warn!(error = %e, %from, "malformed GTPv2-C PDU"),
      },
      Err(e) => {
        tracing::warn!(error = %e, "S11 socket receive failed");
        break;
      }
    }
  }
}
