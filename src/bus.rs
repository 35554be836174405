use std::collections::{HashMap, VecDeque};

use log::trace;

use crate::commons::Addr;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransactionKind {
    BusRd,
    BusRdX,
    BusUpd,
    Flush,
}

/// A bus transaction. Issued once, delivered once to every other cache.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Transaction {
    pub core_id: usize,
    pub kind: TransactionKind,
    pub addr: Addr,
}

impl Transaction {
    pub fn new(core_id: usize, kind: TransactionKind, addr: Addr) -> Self {
        Transaction { core_id, kind, addr }
    }
}

/// Anything attached to the bus that reacts to other caches' transactions.
pub trait Snooper {
    fn id(&self) -> usize;
    fn snoop(&mut self, t: &Transaction, bus: &mut Bus);
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct BusStats {
    pub traffic_bytes: u64,
    pub invalidations: u64,
    pub bus_rd: u64,
    pub bus_rdx: u64,
    pub bus_upd: u64,
    pub flushes: u64,
}

#[derive(Default, Debug)]
pub struct Bus {
    // block address -> number of caches holding a valid copy
    shared: HashMap<Addr, u32>,
    queue: VecDeque<Transaction>,
    stats: BusStats,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    // shared-block registry

    pub fn register(&mut self, addr: Addr) {
        *self.shared.entry(addr).or_insert(0) += 1;
    }

    pub fn deregister(&mut self, addr: Addr) {
        if let Some(count) = self.shared.get_mut(&addr) {
            *count -= 1;
            if *count == 0 {
                self.shared.remove(&addr);
            }
        }
    }

    pub fn sharers(&self, addr: Addr) -> u32 {
        self.shared.get(&addr).copied().unwrap_or(0)
    }

    pub fn is_shared(&self, addr: Addr) -> bool {
        self.sharers(addr) > 0
    }

    pub fn registry(&self) -> &HashMap<Addr, u32> {
        &self.shared
    }

    // transactions

    pub fn enqueue(&mut self, t: Transaction) {
        trace!("core {} enqueues {:?} {}", t.core_id, t.kind, t.addr);
        self.queue.push_back(t);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Delivers every queued transaction to all snoopers except its issuer,
    /// in issue order. Transactions issued while snooping are delivered in the
    /// same call, so the queue is empty on return.
    pub fn broadcast<S: Snooper>(&mut self, snoopers: &mut [S]) {
        while let Some(t) = self.queue.pop_front() {
            match t.kind {
                TransactionKind::BusRd => self.stats.bus_rd += 1,
                TransactionKind::BusRdX => self.stats.bus_rdx += 1,
                TransactionKind::BusUpd => self.stats.bus_upd += 1,
                TransactionKind::Flush => self.stats.flushes += 1,
            }
            for s in snoopers.iter_mut().filter(|s| s.id() != t.core_id) {
                s.snoop(&t, self);
            }
        }
    }

    // counters

    pub fn add_traffic(&mut self, bytes: u64) {
        self.stats.traffic_bytes += bytes;
    }

    pub fn record_invalidation(&mut self) {
        self.stats.invalidations += 1;
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }
}
