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

//! MME-UE-S1AP-ID allocation (spec.md §4.8): scan 1..MAX_UE for the first
//! free slot, reject once every slot is in use.

use mme_types::MmeUeS1apId;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("MME-UE-S1AP-ID space exhausted")]
pub struct Overload;

#[derive(Debug, Default)]
pub struct S1apIdAllocator {
  allocated: BTreeSet<u32>,
}

impl S1apIdAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the lowest unused id in `1..=MAX_UE`.
  pub fn allocate(&mut self) -> Result<MmeUeS1apId, Overload> {
    let mut candidate = 1u32;
    for &id in &self.allocated {
      if id != candidate {
        break;
      }
      candidate += 1;
    }
    if candidate > mme_types::MAX_UE {
      return Err(Overload);
    }
    self.allocated.insert(candidate);
    Ok(MmeUeS1apId(candidate))
  }

  pub fn release(&mut self, id: MmeUeS1apId) {
    self.allocated.remove(&id.0);
  }

  pub fn in_use(&self) -> usize {
    self.allocated.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn allocates_lowest_free_slot() {
    let mut a = S1apIdAllocator::new();
    assert_eq!(a.allocate().unwrap(), MmeUeS1apId(1));
    assert_eq!(a.allocate().unwrap(), MmeUeS1apId(2));
    assert_eq!(a.allocate().unwrap(), MmeUeS1apId(3));
  }

  #[test]
  fn freed_ids_are_reused_before_higher_ones() {
    let mut a = S1apIdAllocator::new();
    let id1 = a.allocate().unwrap();
    let _id2 = a.allocate().unwrap();
    let id3 = a.allocate().unwrap();
    a.release(id1);
    a.release(id3);
    assert_eq!(a.allocate().unwrap(), MmeUeS1apId(1));
    assert_eq!(a.allocate().unwrap(), MmeUeS1apId(3));
    assert_eq!(a.allocate().unwrap(), MmeUeS1apId(4));
  }

  #[test]
  fn saturation_is_overload() {
    let mut a = S1apIdAllocator {
      allocated: (1..=mme_types::MAX_UE).collect(),
    };
    assert_eq!(a.allocate(), Err(Overload));
  }
}
