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

//! Source-address validation for inbound S11 datagrams (spec.md §4.6, §9).
//!
//! The rewrite gives this a declared boolean return and handles both
//! address families explicitly, where the original left the return type
//! implicit and had no IPv6 path. S11 in this MME is IPv4-only (spec.md
//! Non-goals), so an IPv6 peer address is always rejected rather than
//! silently accepted or causing undefined behavior.

use std::net::IpAddr;

pub fn validate_source_addr(expected: IpAddr, actual: IpAddr) -> bool {
  match (expected, actual) {
    (IpAddr::V4(e), IpAddr::V4(a)) => e == a,
    (IpAddr::V6(_), _) | (_, IpAddr::V6(_)) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::{Ipv4Addr, Ipv6Addr};

  #[test]
  fn matching_v4_addresses_validate() {
    let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    assert!(validate_source_addr(a, a));
  }

  #[test]
  fn mismatched_v4_addresses_are_rejected() {
    let expected = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    let actual = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
    assert!(!validate_source_addr(expected, actual));
  }

  #[test]
  fn v6_is_always_rejected() {
    let expected = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    let actual = IpAddr::V6(Ipv6Addr::LOCALHOST);
    assert!(!validate_source_addr(expected, actual));
    assert!(!validate_source_addr(actual, expected));
  }
}
