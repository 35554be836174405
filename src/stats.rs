//! Statistics collected over a run and the text report built from them.

use std::fmt;

use crate::bus::BusStats;
use crate::commons::SystemSpec;

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct ProcStats {
    pub id: usize,
    pub cycles: u64,
    pub compute_cycles: u64,
    pub loads: u64,
    pub stores: u64,
    pub hits: u64,
    pub misses: u64,
}

impl ProcStats {
    /// cycles not spent computing, i.e. waiting on the memory system
    pub fn idle_cycles(&self) -> u64 {
        self.cycles - self.compute_cycles
    }

    /// misses over all cache accesses; 0 for a processor that never accessed memory
    pub fn miss_rate(&self) -> f64 {
        let accesses = self.hits + self.misses;
        if accesses == 0 {
            0.0
        } else {
            self.misses as f64 / accesses as f64
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Report {
    pub specs: SystemSpec,
    pub procs: Vec<ProcStats>,
    pub bus: BusStats,
}

impl Report {
    /// overall execution time: the slowest processor
    pub fn total_cycles(&self) -> u64 {
        self.procs.iter().map(|p| p.cycles).max().unwrap_or(0)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.specs;
        writeln!(
            f,
            "{} | {} processors | cache {} B, {}-way, {} B blocks",
            s.protocol, s.num_procs, s.cache_size, s.cache_assoc, s.block_size
        )?;
        writeln!(f, "overall execution cycles: {}", self.total_cycles())?;
        for p in &self.procs {
            writeln!(f, "core {}", p.id)?;
            writeln!(f, "  execution cycles: {}", p.cycles)?;
            writeln!(f, "  compute cycles:   {}", p.compute_cycles)?;
            writeln!(f, "  loads / stores:   {} / {}", p.loads, p.stores)?;
            writeln!(f, "  idle cycles:      {}", p.idle_cycles())?;
            writeln!(
                f,
                "  cache miss rate:  {:.2}% ({} hits, {} misses)",
                p.miss_rate() * 100.0,
                p.hits,
                p.misses
            )?;
        }
        writeln!(f, "bus")?;
        writeln!(f, "  data traffic:     {} B", self.bus.traffic_bytes)?;
        writeln!(f, "  invalidations:    {}", self.bus.invalidations)?;
        write!(
            f,
            "  transactions:     {} BusRd, {} BusRdX, {} BusUpd, {} Flush",
            self.bus.bus_rd, self.bus.bus_rdx, self.bus.bus_upd, self.bus.flushes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_counters() {
        let p = ProcStats {
            cycles: 250,
            compute_cycles: 50,
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(p.idle_cycles(), 200);
        assert_eq!(p.miss_rate(), 0.25);
        assert_eq!(ProcStats::default().miss_rate(), 0.0);
    }

    #[test]
    fn report_mentions_every_core() {
        let report = Report {
            specs: SystemSpec { num_procs: 2, ..Default::default() },
            procs: vec![
                ProcStats { id: 0, cycles: 10, ..Default::default() },
                ProcStats { id: 1, cycles: 42, ..Default::default() },
            ],
            bus: BusStats { invalidations: 3, ..Default::default() },
        };
        assert_eq!(report.total_cycles(), 42);
        let text = report.to_string();
        assert!(text.contains("overall execution cycles: 42"));
        assert!(text.contains("core 0"));
        assert!(text.contains("core 1"));
        assert!(text.contains("invalidations:    3"));
    }
}
