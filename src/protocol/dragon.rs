use log::{debug, trace};

use super::{make_room, snooped, Protocol};
use crate::bus::{Bus, Transaction, TransactionKind};
use crate::cache::{Cache, CacheBlock, CoherenceState};
use crate::commons::{Addr, SystemSpec};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DragonState {
    Modified,
    Exclusive,
    SharedClean,
    SharedModified,
}

impl CoherenceState for DragonState {
    // dragon updates instead of invalidating: a held block is always valid
    fn is_valid(&self) -> bool {
        true
    }
}

/// Update-based Dragon protocol. Never invalidates.
#[derive(Debug)]
pub struct Dragon {
    core_id: usize,
    specs: SystemSpec,
}

impl Dragon {
    fn send(&self, bus: &mut Bus, kind: TransactionKind, addr: Addr) {
        bus.enqueue(Transaction::new(self.core_id, kind, addr));
    }

    /// Installs `block` in `state` after a miss. A shared state means another
    /// cache supplies the data; otherwise it comes from memory.
    fn install(
        &self,
        cache: &mut Cache<DragonState>,
        bus: &mut Bus,
        (index, tag): (usize, u32),
        block: Addr,
        state: DragonState,
        cycle: u64,
    ) -> u64 {
        let mut t = 0;
        let (slot, victim) = make_room(cache, bus, index);
        if let Some((victim_addr, victim_state)) = victim {
            trace!("core {}: evicting {} ({:?})", self.core_id, victim_addr, victim_state);
            if matches!(victim_state, DragonState::Modified | DragonState::SharedModified) {
                self.send(bus, TransactionKind::Flush, victim_addr);
                t += self.specs.t_flush();
            }
            if victim_state == DragonState::SharedModified {
                self.send(bus, TransactionKind::BusUpd, victim_addr);
            }
        }
        bus.register(block);
        cache.fill(index, slot, CacheBlock::new(tag, state, cycle));
        let shared = matches!(state, DragonState::SharedClean | DragonState::SharedModified);
        t + if shared {
            self.specs.t_cache_to_cache_transfer()
        } else {
            self.specs.t_mem_fetch()
        }
    }
}

impl Protocol for Dragon {
    type State = DragonState;

    fn new(core_id: usize, specs: SystemSpec) -> Self {
        Dragon { core_id, specs }
    }

    fn pr_rd(&self, cache: &mut Cache<DragonState>, bus: &mut Bus, addr: Addr, cycle: u64) -> u64 {
        let block = cache.layout().block_addr(addr);
        let (index, tag, slot) = cache.probe(addr);
        if let Some(slot) = slot {
            cache.update(index, slot, |b| b.touched(cycle));
            return self.specs.t_cache_hit();
        }

        // read miss
        let shared = bus.is_shared(block);
        let state = if shared {
            DragonState::SharedClean
        } else {
            DragonState::Exclusive
        };
        debug!("core {}: read miss {} -> {:?}", self.core_id, addr, state);
        let t = self.specs.t_cache_to_cache_msg()
            + self.install(cache, bus, (index, tag), block, state, cycle);
        self.send(bus, TransactionKind::BusRd, block);
        t
    }

    fn pr_wr(&self, cache: &mut Cache<DragonState>, bus: &mut Bus, addr: Addr, cycle: u64) -> u64 {
        let block = cache.layout().block_addr(addr);
        let (index, tag, slot) = cache.probe(addr);
        if let Some(slot) = slot {
            // we are one of the sharers ourselves
            let shared_elsewhere = bus.sharers(block) > 1;
            let mut update = false;
            cache.update(index, slot, |b| {
                let next = match b.state {
                    DragonState::Modified | DragonState::Exclusive => DragonState::Modified,
                    DragonState::SharedClean | DragonState::SharedModified if shared_elsewhere => {
                        update = true;
                        DragonState::SharedModified
                    }
                    DragonState::SharedClean | DragonState::SharedModified => DragonState::Modified,
                };
                if next != b.state {
                    debug!("core {}: write hit {} {:?} -> {:?}", self.core_id, addr, b.state, next);
                }
                b.with_state(next).touched(cycle)
            });
            if update {
                self.send(bus, TransactionKind::BusUpd, block);
            }
            return self.specs.t_cache_hit();
        }

        // write miss
        let shared = bus.is_shared(block);
        let state = if shared {
            DragonState::SharedModified
        } else {
            DragonState::Modified
        };
        debug!("core {}: write miss {} -> {:?}", self.core_id, addr, state);
        let t = self.specs.t_cache_to_cache_msg()
            + self.install(cache, bus, (index, tag), block, state, cycle);
        self.send(bus, TransactionKind::BusRd, block);
        if shared {
            self.send(bus, TransactionKind::BusUpd, block);
        }
        t
    }

    fn snoop(&self, cache: &mut Cache<DragonState>, bus: &mut Bus, t: &Transaction) {
        let Some((index, slot, b)) = snooped(self.core_id, &self.specs, cache, bus, t) else {
            return;
        };
        let next = match (t.kind, b.state) {
            (TransactionKind::BusRd, DragonState::Modified | DragonState::SharedModified) => {
                self.send(bus, TransactionKind::Flush, t.addr);
                DragonState::SharedModified
            }
            (TransactionKind::BusRd, DragonState::Exclusive | DragonState::SharedClean) => {
                DragonState::SharedClean
            }
            (TransactionKind::BusUpd, DragonState::SharedModified | DragonState::SharedClean) => {
                DragonState::SharedClean
            }
            _ => return,
        };
        if next != b.state {
            debug!("core {}: {} {:?} -> {:?} on {:?}", self.core_id, t.addr, b.state, next, t.kind);
            cache.update(index, slot, |b| b.with_state(next));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::Rig;
    use DragonState::*;

    // 32-byte blocks, direct-mapped, 4 sets; 0x80 conflicts with 0x00
    fn specs(num_procs: usize) -> SystemSpec {
        SystemSpec {
            protocol: crate::commons::Protocol::Dragon,
            block_size: 32,
            cache_size: 128,
            cache_assoc: 1,
            num_procs,
            ..Default::default()
        }
    }

    #[test]
    fn shared_read_is_a_cache_to_cache_transfer() {
        let mut rig = Rig::<Dragon>::new(2, specs(2));
        assert_eq!(rig.read(0, 0x04), 102);
        assert_eq!(rig.state(0, 0x00), Some(Exclusive));

        assert_eq!(rig.read(1, 0x08), 2 + 16);
        assert_eq!(rig.state(0, 0x00), Some(SharedClean));
        assert_eq!(rig.state(1, 0x00), Some(SharedClean));
        assert_eq!(rig.sharers(0x00), 2);
        assert_eq!(rig.read(1, 0x00), 1);
    }

    #[test]
    fn writes_to_shared_blocks_keep_one_owner() {
        let mut rig = Rig::<Dragon>::new(2, specs(2));
        rig.read(0, 0x00);
        rig.read(1, 0x00);

        assert_eq!(rig.write(0, 0x00), 1);
        assert_eq!(rig.state(0, 0x00), Some(SharedModified));
        assert_eq!(rig.state(1, 0x00), Some(SharedClean));

        assert_eq!(rig.write(1, 0x00), 1);
        assert_eq!(rig.state(0, 0x00), Some(SharedClean));
        assert_eq!(rig.state(1, 0x00), Some(SharedModified));
        assert_eq!(rig.bus.stats().bus_upd, 2);
        assert_eq!(rig.bus.stats().invalidations, 0);
    }

    #[test]
    fn reading_a_modified_block_makes_the_owner_shared_modified() {
        let mut rig = Rig::<Dragon>::new(2, specs(2));
        assert_eq!(rig.write(0, 0x20), 102);
        assert_eq!(rig.state(0, 0x20), Some(Modified));

        rig.read(1, 0x20);
        assert_eq!(rig.state(0, 0x20), Some(SharedModified));
        assert_eq!(rig.state(1, 0x20), Some(SharedClean));
        assert_eq!(rig.bus.stats().flushes, 1);
    }

    #[test]
    fn sole_sharer_upgrades_silently() {
        let mut rig = Rig::<Dragon>::new(2, specs(2));
        rig.read(0, 0x00);
        rig.read(1, 0x00);
        // core 1 drops its copy
        rig.read(1, 0x80);
        assert_eq!(rig.state(1, 0x00), None);
        assert_eq!(rig.sharers(0x00), 1);

        let upd = rig.bus.stats().bus_upd;
        assert_eq!(rig.write(0, 0x00), 1);
        assert_eq!(rig.state(0, 0x00), Some(Modified));
        assert_eq!(rig.bus.stats().bus_upd, upd);
    }

    #[test]
    fn write_miss_on_shared_block_takes_ownership() {
        let mut rig = Rig::<Dragon>::new(2, specs(2));
        rig.write(0, 0x00);
        assert_eq!(rig.write(1, 0x00), 2 + 16);
        assert_eq!(rig.state(0, 0x00), Some(SharedClean));
        assert_eq!(rig.state(1, 0x00), Some(SharedModified));
        assert_eq!(rig.sharers(0x00), 2);
    }

    #[test]
    fn shared_modified_victim_flushes_and_updates() {
        let mut rig = Rig::<Dragon>::new(2, specs(2));
        rig.write(0, 0x00);
        rig.write(1, 0x00);
        let before = rig.bus.stats();

        assert_eq!(rig.read(1, 0x80), 2 + 100 + 100);
        let after = rig.bus.stats();
        assert_eq!(after.flushes, before.flushes + 1);
        assert_eq!(after.bus_upd, before.bus_upd + 1);
        assert_eq!(rig.state(0, 0x00), Some(SharedClean));
        assert_eq!(rig.sharers(0x00), 1);
        assert_eq!(after.invalidations, 0);
    }
}
