// This module defines the set-associative storage each processor owns. It only
// tracks coherence metadata; the protocol engines decide what goes in it.

use std::fmt::Debug;

use crate::commons::{Addr, AddrLayout};

/// A per-block coherence state. Protocols without an invalid state report
/// every state as valid.
pub trait CoherenceState: Copy + PartialEq + Debug {
    fn is_valid(&self) -> bool;
}

/// A cached block. Transitions build a new value instead of editing fields.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct CacheBlock<S> {
    pub tag: u32,
    pub state: S,
    pub last_used: u64,
}

impl<S: CoherenceState> CacheBlock<S> {
    pub fn new(tag: u32, state: S, cycle: u64) -> Self {
        CacheBlock { tag, state, last_used: cycle }
    }
    pub fn with_state(self, state: S) -> Self {
        CacheBlock { state, ..self }
    }
    pub fn touched(self, cycle: u64) -> Self {
        CacheBlock { last_used: cycle, ..self }
    }
    pub fn is_valid(&self) -> bool {
        self.state.is_valid()
    }
}

#[derive(Clone, Debug)]
pub struct CacheSet<S> {
    blocks: Vec<Option<CacheBlock<S>>>,
}

impl<S: CoherenceState> CacheSet<S> {
    pub fn new(assoc: usize) -> Self {
        CacheSet { blocks: vec![None; assoc] }
    }

    /// first slot holding a valid block with this tag
    pub fn hit_index(&self, tag: u32) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| matches!(b, Some(b) if b.tag == tag && b.is_valid()))
    }

    /// first slot that was never filled or holds an invalid block
    pub fn empty_slot(&self) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.map_or(true, |b| !b.is_valid()))
    }

    /// least recently used slot, lowest index on ties
    pub fn lru_victim(&self) -> usize {
        self.blocks
            .iter()
            .enumerate()
            .min_by_key(|(_, b)| b.map_or(0, |b| b.last_used))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn get(&self, slot: usize) -> Option<&CacheBlock<S>> {
        self.blocks.get(slot).and_then(Option::as_ref)
    }

    pub fn replace(&mut self, slot: usize, block: CacheBlock<S>) {
        self.blocks[slot] = Some(block);
    }
}

#[derive(Clone, Debug)]
pub struct Cache<S> {
    layout: AddrLayout,
    sets: Vec<CacheSet<S>>,
    hits: u64,
    misses: u64,
}

impl<S: CoherenceState> Cache<S> {
    pub fn new(layout: AddrLayout, assoc: usize) -> Self {
        Cache {
            layout,
            sets: vec![CacheSet::new(assoc); layout.num_sets()],
            hits: 0,
            misses: 0,
        }
    }

    pub fn layout(&self) -> &AddrLayout {
        &self.layout
    }

    pub fn set(&self, index: usize) -> &CacheSet<S> {
        &self.sets[index]
    }

    /// Looks `addr` up on behalf of the processor and counts the outcome.
    /// Returns `(index, tag, slot)`; the slot is `None` on a miss.
    pub fn probe(&mut self, addr: Addr) -> (usize, u32, Option<usize>) {
        let (index, tag) = addr.pos(&self.layout);
        let slot = self.sets[index].hit_index(tag);
        match slot {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        (index, tag, slot)
    }

    /// Looks `addr` up without touching the hit/miss counters (used by snoops).
    pub fn find(&self, addr: Addr) -> Option<(usize, usize, CacheBlock<S>)> {
        let (index, tag) = addr.pos(&self.layout);
        let set = &self.sets[index];
        set.hit_index(tag)
            .and_then(|slot| set.get(slot).map(|b| (index, slot, *b)))
    }

    /// Picks the slot a new block goes into: an empty one if there is one,
    /// otherwise the LRU victim, which is returned alongside.
    pub fn allocate(&self, index: usize) -> (usize, Option<CacheBlock<S>>) {
        let set = &self.sets[index];
        match set.empty_slot() {
            Some(slot) => (slot, None),
            None => {
                let slot = set.lru_victim();
                (slot, set.get(slot).copied())
            }
        }
    }

    pub fn fill(&mut self, index: usize, slot: usize, block: CacheBlock<S>) {
        self.sets[index].replace(slot, block);
    }

    /// Replaces the block in `slot` with `f(block)`; empty slots are left alone.
    pub fn update(&mut self, index: usize, slot: usize, f: impl FnOnce(CacheBlock<S>) -> CacheBlock<S>) {
        if let Some(b) = self.sets[index].get(slot).copied() {
            self.sets[index].replace(slot, f(b));
        }
    }

    /// state of the valid block holding `addr`, if any
    pub fn state_of(&self, addr: Addr) -> Option<S> {
        self.find(addr).map(|(_, _, b)| b.state)
    }

    /// all valid blocks, with the address of their first byte
    pub fn valid_blocks(&self) -> impl Iterator<Item = (Addr, &CacheBlock<S>)> + '_ {
        self.sets.iter().enumerate().flat_map(move |(index, set)| {
            set.blocks
                .iter()
                .flatten()
                .filter(|b| b.is_valid())
                .map(move |b| (self.layout.reassemble(b.tag, index as u32), b))
        })
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Debug)]
    enum St {
        Valid,
        Invalid,
    }

    impl CoherenceState for St {
        fn is_valid(&self) -> bool {
            *self == St::Valid
        }
    }

    fn direct(index_bits: u32, assoc: usize) -> Cache<St> {
        // 4-byte blocks
        Cache::new(AddrLayout { offset_bits: 2, index_bits }, assoc)
    }

    #[test]
    fn hit_ignores_invalid_blocks() {
        let mut set = CacheSet::<St>::new(2);
        set.replace(0, CacheBlock::new(7, St::Invalid, 3));
        assert_eq!(set.hit_index(7), None);
        assert_eq!(set.empty_slot(), Some(0));

        set.replace(1, CacheBlock::new(7, St::Valid, 4));
        assert_eq!(set.hit_index(7), Some(1));
    }

    #[test]
    fn lru_prefers_lowest_slot_on_ties() {
        let mut set = CacheSet::<St>::new(4);
        for (slot, cycle) in [(0, 5), (1, 2), (2, 2), (3, 9)] {
            set.replace(slot, CacheBlock::new(slot as u32, St::Valid, cycle));
        }
        assert_eq!(set.empty_slot(), None);
        assert_eq!(set.lru_victim(), 1);
    }

    #[test]
    fn lru_evicts_least_recent_over_a_sequence() {
        // two-way, single set: every address maps to set 0
        let mut cache = direct(0, 2);
        let mut cycle = 0;
        let mut access = |cache: &mut Cache<St>, addr: u32| {
            cycle += 1;
            let (index, tag, slot) = cache.probe(Addr(addr));
            match slot {
                Some(slot) => {
                    let b = *cache.set(index).get(slot).unwrap();
                    cache.fill(index, slot, b.touched(cycle));
                    None
                }
                None => {
                    let (slot, victim) = cache.allocate(index);
                    cache.fill(index, slot, CacheBlock::new(tag, St::Valid, cycle));
                    victim.map(|v| v.tag)
                }
            }
        };

        assert_eq!(access(&mut cache, 0x00), None);
        assert_eq!(access(&mut cache, 0x04), None);
        // refresh 0x00 so 0x04 becomes the victim
        assert_eq!(access(&mut cache, 0x00), None);
        assert_eq!(access(&mut cache, 0x08), Some(1));
        assert_eq!(access(&mut cache, 0x0c), Some(0));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 4);
    }

    #[test]
    fn find_does_not_count() {
        let mut cache = direct(2, 1);
        let (index, tag, slot) = cache.probe(Addr(0x24));
        assert_eq!((index, tag, slot), (1, 2, None));
        cache.fill(index, 0, CacheBlock::new(tag, St::Valid, 0));

        assert_eq!(cache.state_of(Addr(0x25)), Some(St::Valid));
        assert!(cache.find(Addr(0x14)).is_none());
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);

        let blocks: Vec<_> = cache.valid_blocks().map(|(a, _)| a).collect();
        assert_eq!(blocks, vec![Addr(0x24)]);
    }
}
