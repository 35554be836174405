use log::{debug, trace};

use super::{make_room, snooped, Protocol};
use crate::bus::{Bus, Transaction, TransactionKind};
use crate::cache::{Cache, CacheBlock, CoherenceState};
use crate::commons::{Addr, SystemSpec};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MesiState {
    Modified,
    Exclusive,
    Shared,
    Invalid,
}

impl CoherenceState for MesiState {
    fn is_valid(&self) -> bool {
        *self != MesiState::Invalid
    }
}

/// Invalidation-based MESI.
#[derive(Debug)]
pub struct Mesi {
    core_id: usize,
    specs: SystemSpec,
}

impl Mesi {
    fn send(&self, bus: &mut Bus, kind: TransactionKind, addr: Addr) {
        bus.enqueue(Transaction::new(self.core_id, kind, addr));
    }

    /// Installs `addr` in `state` after a miss and returns the cycles spent
    /// beyond the miss itself: an optional write-back plus the memory fill.
    fn install(
        &self,
        cache: &mut Cache<MesiState>,
        bus: &mut Bus,
        (index, tag): (usize, u32),
        block: Addr,
        state: MesiState,
        cycle: u64,
    ) -> u64 {
        let mut t = 0;
        let (slot, victim) = make_room(cache, bus, index);
        if let Some((victim_addr, victim_state)) = victim {
            trace!("core {}: evicting {} ({:?})", self.core_id, victim_addr, victim_state);
            if victim_state == MesiState::Modified {
                self.send(bus, TransactionKind::Flush, victim_addr);
                t += self.specs.t_flush();
            }
        }
        bus.register(block);
        cache.fill(index, slot, CacheBlock::new(tag, state, cycle));
        t + self.specs.t_mem_fetch()
    }
}

impl Protocol for Mesi {
    type State = MesiState;

    fn new(core_id: usize, specs: SystemSpec) -> Self {
        Mesi { core_id, specs }
    }

    fn pr_rd(&self, cache: &mut Cache<MesiState>, bus: &mut Bus, addr: Addr, cycle: u64) -> u64 {
        let block = cache.layout().block_addr(addr);
        let (index, tag, slot) = cache.probe(addr);
        if let Some(slot) = slot {
            cache.update(index, slot, |b| b.touched(cycle));
            return self.specs.t_cache_hit();
        }

        // read miss
        let state = if bus.is_shared(block) {
            MesiState::Shared
        } else {
            MesiState::Exclusive
        };
        debug!("core {}: read miss {} -> {:?}", self.core_id, addr, state);
        let t = self.specs.t_cache_to_cache_msg()
            + self.install(cache, bus, (index, tag), block, state, cycle);
        self.send(bus, TransactionKind::BusRd, block);
        t
    }

    fn pr_wr(&self, cache: &mut Cache<MesiState>, bus: &mut Bus, addr: Addr, cycle: u64) -> u64 {
        let block = cache.layout().block_addr(addr);
        let (index, tag, slot) = cache.probe(addr);
        if let Some(slot) = slot {
            let mut upgraded_from_shared = false;
            cache.update(index, slot, |b| {
                upgraded_from_shared = b.state == MesiState::Shared;
                b.with_state(MesiState::Modified).touched(cycle)
            });
            if upgraded_from_shared {
                debug!("core {}: write hit {} S -> M", self.core_id, addr);
                self.send(bus, TransactionKind::BusRdX, block);
            }
            return self.specs.t_cache_hit();
        }

        // write miss
        debug!("core {}: write miss {} -> M", self.core_id, addr);
        let t = self.specs.t_cache_to_cache_msg()
            + self.install(cache, bus, (index, tag), block, MesiState::Modified, cycle);
        self.send(bus, TransactionKind::BusRdX, block);
        t
    }

    fn snoop(&self, cache: &mut Cache<MesiState>, bus: &mut Bus, t: &Transaction) {
        let Some((index, slot, b)) = snooped(self.core_id, &self.specs, cache, bus, t) else {
            return;
        };
        match (t.kind, b.state) {
            (TransactionKind::BusRd, MesiState::Modified | MesiState::Exclusive) => {
                debug!("core {}: {} {:?} -> S on BusRd", self.core_id, t.addr, b.state);
                cache.update(index, slot, |b| b.with_state(MesiState::Shared));
                self.send(bus, TransactionKind::Flush, t.addr);
            }
            (TransactionKind::BusRdX, state) => {
                debug!("core {}: {} {:?} -> I on BusRdX", self.core_id, t.addr, state);
                cache.update(index, slot, |b| b.with_state(MesiState::Invalid));
                bus.record_invalidation();
                bus.deregister(t.addr);
                if state != MesiState::Shared {
                    self.send(bus, TransactionKind::Flush, t.addr);
                }
            }
            _ => (),
        }
    }
}
