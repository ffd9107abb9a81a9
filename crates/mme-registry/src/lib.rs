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

//! The MME registry: arena storage and identity indices for every EMM
//! context, ECM session and S1 association, plus the paging engine
//! (spec.md §4.8, §4.9).
//!
//! Cross-component references (EMM ↔ ECM ↔ S1-assoc) are cyclic in the
//! original pointer-based design. Here every FSM holds an opaque handle into
//! one of these arenas instead of an owning reference; the registry is the
//! sole owner, and destruction is two-phase (quiesce on the reactor thread,
//! then free) rather than relying on reference counting.

pub mod s1ap_id;

pub use s1ap_id::{Overload, S1apIdAllocator};

use generational_arena::{Arena, Index};
use mme_types::{GlobalEnbId, Imsi, MTmsi, MmeUeS1apId};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Opaque handle into one of the registry's arenas. `T` is a zero-sized tag
/// (e.g. the stored context type) used only to keep handle kinds from being
/// mixed up at compile time; it carries no data and imposes no trait bounds.
pub struct Handle<T>(Index, PhantomData<fn() -> T>);

impl<T> Handle<T> {
  fn new(index: Index) -> Self {
    Self(index, PhantomData)
  }
}

impl<T> Clone for Handle<T> {
  fn clone(&self) -> Self {
    *self
  }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
  fn eq(&self, other: &Self) -> bool {
    self.0 == other.0
  }
}
impl<T> Eq for Handle<T> {}
impl<T> std::hash::Hash for Handle<T> {
  fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
    self.0.hash(state)
  }
}
impl<T> std::fmt::Debug for Handle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Handle({:?})", self.0)
  }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
  #[error("MME-UE-S1AP-ID space exhausted")]
  Overload,
  #[error("handle already mapped to a different identity")]
  DuplicateMapping,
  #[error("handle not found")]
  NotFound,
}

impl From<Overload> for RegistryError {
  fn from(_: Overload) -> Self {
    RegistryError::Overload
  }
}

/// `Emm`, `Ecm` and `Assoc` are the caller's own context types (defined in
/// `mme-nas` and `mme-s1` respectively); the registry only needs to store
/// and index them, never to interpret their fields.
pub struct Registry<Emm, Ecm, Assoc> {
  emm_arena: Arena<Emm>,
  ecm_arena: Arena<Ecm>,
  assoc_arena: Arena<Assoc>,

  emm_by_mtmsi: HashMap<MTmsi, Handle<Emm>>,
  emm_by_imsi: HashMap<Imsi, Handle<Emm>>,
  ecm_by_ueid: HashMap<MmeUeS1apId, Handle<Ecm>>,
  assoc_by_enb: HashMap<GlobalEnbId, Handle<Assoc>>,

  s1_ids: S1apIdAllocator,
}

impl<Emm, Ecm, Assoc> Default for Registry<Emm, Ecm, Assoc> {
  fn default() -> Self {
    Self::new()
  }
}

impl<Emm, Ecm, Assoc> Registry<Emm, Ecm, Assoc> {
  pub fn new() -> Self {
    Self {
      emm_arena: Arena::new(),
      ecm_arena: Arena::new(),
      assoc_arena: Arena::new(),
      emm_by_mtmsi: HashMap::new(),
      emm_by_imsi: HashMap::new(),
      ecm_by_ueid: HashMap::new(),
      assoc_by_enb: HashMap::new(),
      s1_ids: S1apIdAllocator::new(),
    }
  }

  // --- EMM contexts ---------------------------------------------------

  pub fn insert_emm(&mut self, ctx: Emm) -> Handle<Emm> {
    Handle::new(self.emm_arena.insert(ctx))
  }

  pub fn emm(&self, h: Handle<Emm>) -> Option<&Emm> {
    self.emm_arena.get(h.0)
  }

  pub fn emm_mut(&mut self, h: Handle<Emm>) -> Option<&mut Emm> {
    self.emm_arena.get_mut(h.0)
  }

  /// Removes the context and every index entry pointing at it. Cascading
  /// into ESM bearers and anchored ECM sessions is the caller's
  /// responsibility (spec.md §4.8: "destruction cascades").
  pub fn remove_emm(&mut self, h: Handle<Emm>) -> Option<Emm> {
    self.emm_by_mtmsi.retain(|_, v| *v != h);
    self.emm_by_imsi.retain(|_, v| *v != h);
    self.emm_arena.remove(h.0)
  }

  pub fn bind_mtmsi(&mut self, mtmsi: MTmsi, h: Handle<Emm>) -> Result<(), RegistryError> {
    match self.emm_by_mtmsi.get(&mtmsi) {
      Some(existing) if *existing != h => Err(RegistryError::DuplicateMapping),
      _ => {
        self.emm_by_mtmsi.insert(mtmsi, h);
        Ok(())
      }
    }
  }

  pub fn bind_imsi(&mut self, imsi: Imsi, h: Handle<Emm>) -> Result<(), RegistryError> {
    match self.emm_by_imsi.get(&imsi) {
      Some(existing) if *existing != h => Err(RegistryError::DuplicateMapping),
      _ => {
        self.emm_by_imsi.insert(imsi, h);
        Ok(())
      }
    }
  }

  pub fn emm_by_mtmsi(&self, mtmsi: MTmsi) -> Option<Handle<Emm>> {
    self.emm_by_mtmsi.get(&mtmsi).copied()
  }

  pub fn emm_by_imsi(&self, imsi: Imsi) -> Option<Handle<Emm>> {
    self.emm_by_imsi.get(&imsi).copied()
  }

  // --- ECM sessions -----------------------------------------------------

  pub fn insert_ecm(&mut self, ctx: Ecm) -> Result<(Handle<Ecm>, MmeUeS1apId), RegistryError> {
    let id = self.s1_ids.allocate()?;
    let h = Handle::new(self.ecm_arena.insert(ctx));
    self.ecm_by_ueid.insert(id, h);
    Ok((h, id))
  }

  pub fn ecm(&self, h: Handle<Ecm>) -> Option<&Ecm> {
    self.ecm_arena.get(h.0)
  }

  pub fn ecm_mut(&mut self, h: Handle<Ecm>) -> Option<&mut Ecm> {
    self.ecm_arena.get_mut(h.0)
  }

  pub fn ecm_by_ueid(&self, id: MmeUeS1apId) -> Option<Handle<Ecm>> {
    self.ecm_by_ueid.get(&id).copied()
  }

  pub fn remove_ecm(&mut self, id: MmeUeS1apId) -> Option<Ecm> {
    let h = self.ecm_by_ueid.remove(&id)?;
    self.s1_ids.release(id);
    self.ecm_arena.remove(h.0)
  }

  // --- S1 associations --------------------------------------------------

  pub fn insert_assoc(&mut self, enb_id: GlobalEnbId, ctx: Assoc) -> Handle<Assoc> {
    let h = Handle::new(self.assoc_arena.insert(ctx));
    self.assoc_by_enb.insert(enb_id, h);
    h
  }

  pub fn assoc(&self, h: Handle<Assoc>) -> Option<&Assoc> {
    self.assoc_arena.get(h.0)
  }

  pub fn assoc_mut(&mut self, h: Handle<Assoc>) -> Option<&mut Assoc> {
    self.assoc_arena.get_mut(h.0)
  }

  pub fn assoc_by_enb(&self, enb_id: GlobalEnbId) -> Option<Handle<Assoc>> {
    self.assoc_by_enb.get(&enb_id).copied()
  }

  pub fn remove_assoc(&mut self, enb_id: GlobalEnbId) -> Option<Assoc> {
    let h = self.assoc_by_enb.remove(&enb_id)?;
    self.assoc_arena.remove(h.0)
  }

  /// Every currently registered association, for the paging engine and
  /// for shutdown's "disconnect all" sweep.
  pub fn associations(&self) -> impl Iterator<Item = Handle<Assoc>> + '_ {
    self.assoc_arena
      .iter()
      .map(|(idx, _)| Handle::new(idx))
  }

  /// Every registered association keyed by its Global eNB ID, for
  /// operator inspection (`mme::cmd`'s `enb list`).
  pub fn assoc_entries(&self) -> impl Iterator<Item = (GlobalEnbId, Handle<Assoc>)> + '_ {
    self.assoc_by_enb.iter().map(|(id, h)| (*id, *h))
  }

  pub fn emm_count(&self) -> usize {
    self.emm_arena.len()
  }

  pub fn ecm_count(&self) -> usize {
    self.ecm_arena.len()
  }

  pub fn assoc_count(&self) -> usize {
    self.assoc_arena.len()
  }

  /// Broadcast-to-all paging policy (spec.md §4.9, §9 open question):
  /// TAI-list intersection is left undone, so every live association is
  /// paged on every call.
  pub fn page_all<F: FnMut(Handle<Assoc>)>(&self, mut notify: F) {
    for h in self.associations() {
      notify(h);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mme_types::Plmn;

  #[test]
  fn emm_indices_enforce_one_to_one() {
    let mut reg: Registry<&'static str, &'static str, &'static str> = Registry::new();
    let h = reg.insert_emm("ue-a");
    reg.bind_mtmsi(MTmsi(1), h).unwrap();
    reg.bind_imsi(Imsi(208930000000001), h).unwrap();
    assert_eq!(reg.emm_by_mtmsi(MTmsi(1)), Some(h));
    assert_eq!(reg.emm_by_imsi(Imsi(208930000000001)), Some(h));

    let other = reg.insert_emm("ue-b");
    let err = reg.bind_mtmsi(MTmsi(1), other).unwrap_err();
    assert_eq!(err, RegistryError::DuplicateMapping);
  }

  #[test]
  fn removing_emm_clears_indices() {
    let mut reg: Registry<&'static str, &'static str, &'static str> = Registry::new();
    let h = reg.insert_emm("ue-a");
    reg.bind_mtmsi(MTmsi(7), h).unwrap();
    reg.remove_emm(h);
    assert_eq!(reg.emm_by_mtmsi(MTmsi(7)), None);
    assert!(reg.emm(h).is_none());
  }

  #[test]
  fn ecm_insert_allocates_s1ap_id() {
    let mut reg: Registry<&'static str, &'static str, &'static str> = Registry::new();
    let (h1, id1) = reg.insert_ecm("sess-a").unwrap();
    let (_h2, id2) = reg.insert_ecm("sess-b").unwrap();
    assert_eq!(id1, MmeUeS1apId(1));
    assert_eq!(id2, MmeUeS1apId(2));
    assert_eq!(reg.ecm_by_ueid(id1), Some(h1));
    reg.remove_ecm(id1);
    let (_h3, id3) = reg.insert_ecm("sess-c").unwrap();
    assert_eq!(id3, MmeUeS1apId(1));
  }

  #[test]
  fn paging_broadcasts_to_every_association() {
    let mut reg: Registry<&'static str, &'static str, &'static str> = Registry::new();
    let enb1 = GlobalEnbId {
      plmn: Plmn::from_digits("310", "410").unwrap(),
      enb_id: 1,
    };
    let enb2 = GlobalEnbId {
      plmn: Plmn::from_digits("310", "410").unwrap(),
      enb_id: 2,
    };
    reg.insert_assoc(enb1, "assoc-1");
    reg.insert_assoc(enb2, "assoc-2");
    let mut paged = 0;
    reg.page_all(|_h| paged += 1);
    assert_eq!(paged, 2);
  }
}
