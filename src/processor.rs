use log::trace;

use crate::bus::{Bus, Snooper, Transaction};
use crate::cache::Cache;
use crate::commons::{AddrLayout, Instr, Instructions, SystemSpec};
use crate::protocol::Protocol;
use crate::stats::ProcStats;

/// One core: an instruction stream, its private cache and the protocol
/// engine that keeps the cache coherent.
pub struct Processor<P: Protocol> {
    id: usize,
    protocol: P,
    cache: Cache<P::State>,
    instructions: Instructions,

    // cycle counters
    cycles: u64,
    compute_cycles: u64,

    // instruction counters
    loads: u64,
    stores: u64,
}

impl<P: Protocol> Processor<P> {
    pub fn new(id: usize, specs: SystemSpec, layout: AddrLayout, instructions: Instructions) -> Self {
        Processor {
            id,
            protocol: P::new(id, specs),
            cache: Cache::new(layout, specs.cache_assoc as usize),
            instructions,
            cycles: 0,
            compute_cycles: 0,
            loads: 0,
            stores: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.instructions.is_empty()
    }

    /// the first global cycle at which this processor may issue again
    pub fn ready_at(&self) -> u64 {
        self.cycles
    }

    pub fn cache(&self) -> &Cache<P::State> {
        &self.cache
    }

    // execute the next instruction, if the processor is not still busy
    // with the previous one; returns whether an instruction was issued
    pub fn execute(&mut self, cycle: u64, bus: &mut Bus) -> bool {
        if cycle < self.cycles {
            return false;
        }
        let Some(instr) = self.instructions.pop_front() else {
            return false;
        };
        trace!("core {} @ {}: {:?}", self.id, cycle, instr);
        match instr {
            Instr::Read(addr) => {
                self.loads += 1;
                self.cycles += self.protocol.pr_rd(&mut self.cache, bus, addr, cycle);
            }
            Instr::Write(addr) => {
                self.stores += 1;
                self.cycles += self.protocol.pr_wr(&mut self.cache, bus, addr, cycle);
            }
            Instr::Other(t) => {
                self.cycles += u64::from(t);
                self.compute_cycles += u64::from(t);
            }
        }
        true
    }

    pub fn stats(&self) -> ProcStats {
        ProcStats {
            id: self.id,
            cycles: self.cycles,
            compute_cycles: self.compute_cycles,
            loads: self.loads,
            stores: self.stores,
            hits: self.cache.hits(),
            misses: self.cache.misses(),
        }
    }
}

impl<P: Protocol> Snooper for Processor<P> {
    fn id(&self) -> usize {
        self.id
    }
    fn snoop(&mut self, t: &Transaction, bus: &mut Bus) {
        self.protocol.snoop(&mut self.cache, bus, t);
    }
}
