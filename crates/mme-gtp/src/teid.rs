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

//! Local TEID allocation (spec.md §4.6): monotonically increasing 32-bit
//! counter, never zero. Wrap policy (open question in spec.md §9): skip
//! zero and keep counting, on the (reasonable for a control-plane MME)
//! assumption that 2^32 - 1 concurrently live TEIDs never occurs in
//! practice; a wrapped allocator simply resumes from 1.

use mme_types::Teid;

#[derive(Debug)]
pub struct TeidAllocator {
  next: u32,
}

impl Default for TeidAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl TeidAllocator {
  pub fn new() -> Self {
    Self { next: 1 }
  }

  pub fn allocate(&mut self) -> Teid {
    let teid = self.next;
    self.next = if self.next == u32::MAX { 1 } else { self.next + 1 };
    Teid(teid)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn never_allocates_zero() {
    let mut a = TeidAllocator::new();
    for _ in 0..1000 {
      assert_ne!(a.allocate(), Teid(0));
    }
  }

  #[test]
  fn wraps_past_u32_max_skipping_zero() {
    let mut a = TeidAllocator { next: u32::MAX };
    assert_eq!(a.allocate(), Teid(u32::MAX));
    assert_eq!(a.allocate(), Teid(1));
  }
}
