//! Coherence protocols.
//!
//! A protocol engine belongs to one processor. It keeps no state of its own:
//! the processor lends it its cache and the shared bus on every call, and the
//! engine returns the number of cycles the access costs the processor.

mod dragon;
mod mesi;

pub use dragon::{Dragon, DragonState};
pub use mesi::{Mesi, MesiState};

use crate::bus::{Bus, Transaction};
use crate::cache::{Cache, CacheBlock, CoherenceState};
use crate::commons::{Addr, SystemSpec};

pub trait Protocol {
    type State: CoherenceState;

    fn new(core_id: usize, specs: SystemSpec) -> Self;

    /// processor read; returns the cycles charged to the processor
    fn pr_rd(&self, cache: &mut Cache<Self::State>, bus: &mut Bus, addr: Addr, cycle: u64) -> u64;

    /// processor write; returns the cycles charged to the processor
    fn pr_wr(&self, cache: &mut Cache<Self::State>, bus: &mut Bus, addr: Addr, cycle: u64) -> u64;

    /// reaction to a transaction issued by another processor
    fn snoop(&self, cache: &mut Cache<Self::State>, bus: &mut Bus, t: &Transaction);
}

/// Frees a slot in set `index` for an incoming block. A displaced valid block
/// leaves the shared registry; its address and state are returned so the
/// protocol can write it back.
pub(crate) fn make_room<S: CoherenceState>(
    cache: &Cache<S>,
    bus: &mut Bus,
    index: usize,
) -> (usize, Option<(Addr, S)>) {
    let (slot, victim) = cache.allocate(index);
    let victim = victim.filter(CacheBlock::is_valid).map(|v| {
        let addr = cache.layout().reassemble(v.tag, index as u32);
        bus.deregister(addr);
        (addr, v.state)
    });
    (slot, victim)
}

/// Locates the block a foreign transaction refers to and accounts its
/// traffic. `None` for own transactions and for blocks we do not hold.
pub(crate) fn snooped<S: CoherenceState>(
    core_id: usize,
    specs: &SystemSpec,
    cache: &Cache<S>,
    bus: &mut Bus,
    t: &Transaction,
) -> Option<(usize, usize, CacheBlock<S>)> {
    if t.core_id == core_id {
        return None;
    }
    let found = cache.find(t.addr)?;
    bus.add_traffic(specs.block_size.into());
    Some(found)
}
