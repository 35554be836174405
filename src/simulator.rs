use log::{debug, info};

use crate::bus::Bus;
use crate::commons::{Instructions, Protocol as ProtocolKind, SystemSpec};
use crate::error::{ConfigError, SimError};
use crate::processor::Processor;
use crate::protocol::{Dragon, Mesi, Protocol};
use crate::stats::Report;

/// Round-robin, cycle-stepped scheduler over all processors and the bus.
///
/// Within one cycle processors are visited in ascending id order and every
/// transaction a processor issues is broadcast before the next one runs, so a
/// given set of traces always produces the same schedule.
pub struct Simulator<P: Protocol> {
    specs: SystemSpec,
    procs: Vec<Processor<P>>,
    bus: Bus,
    cycle: u64,
}

impl<P: Protocol> Simulator<P> {
    pub fn new(specs: SystemSpec, insts: Vec<Instructions>) -> Result<Self, SimError> {
        let layout = specs.layout()?;
        if insts.len() != specs.num_procs {
            return Err(ConfigError::TraceCount {
                traces: insts.len(),
                procs: specs.num_procs,
            }
            .into());
        }
        let procs = insts
            .into_iter()
            .enumerate()
            .map(|(id, insts)| Processor::new(id, specs, layout, insts))
            .collect();
        Ok(Simulator {
            specs,
            procs,
            bus: Bus::new(),
            cycle: 0,
        })
    }

    pub fn procs(&self) -> &[Processor<P>] {
        &self.procs
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn is_done(&self) -> bool {
        self.procs.iter().all(Processor::is_done)
    }

    /// Runs one global cycle. Returns whether any processor issued.
    pub fn step(&mut self) -> bool {
        let mut issued = false;
        for i in 0..self.procs.len() {
            if self.procs[i].execute(self.cycle, &mut self.bus) {
                issued = true;
                self.bus.broadcast(&mut self.procs);
            }
        }
        self.cycle += 1;
        issued
    }

    pub fn run(mut self) -> Report {
        info!(
            "simulating {} processors under {}",
            self.procs.len(),
            self.specs.protocol
        );
        while !self.is_done() {
            if !self.step() {
                // nobody could issue: skip ahead to the next processor that can
                let next = self
                    .procs
                    .iter()
                    .filter(|p| !p.is_done())
                    .map(Processor::ready_at)
                    .min();
                if let Some(next) = next.filter(|&next| next > self.cycle) {
                    debug!("idle until cycle {}", next);
                    self.cycle = next;
                }
            }
        }
        let report = self.report();
        info!("finished simulation in {} cycles", report.total_cycles());
        report
    }

    pub fn report(&self) -> Report {
        Report {
            specs: self.specs,
            procs: self.procs.iter().map(Processor::stats).collect(),
            bus: self.bus.stats(),
        }
    }
}

/// Runs the traces to completion under the protocol `specs` names.
pub fn simulate(specs: SystemSpec, insts: Vec<Instructions>) -> Result<Report, SimError> {
    Ok(match specs.protocol {
        ProtocolKind::MESI => Simulator::<Mesi>::new(specs, insts)?.run(),
        ProtocolKind::Dragon => Simulator::<Dragon>::new(specs, insts)?.run(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commons::{Addr, Instr};

    #[test]
    fn skips_idle_stretches_without_changing_the_result() {
        let specs = SystemSpec { num_procs: 2, ..Default::default() };
        let insts = vec![
            Instructions::from(vec![Instr::Other(0x10000), Instr::Read(Addr(0x40))]),
            Instructions::from(vec![Instr::Write(Addr(0x40)), Instr::Other(0x20000)]),
        ];

        let report = simulate(specs, insts.clone()).unwrap();

        // step one cycle at a time by hand
        let mut sim = Simulator::<Mesi>::new(specs, insts).unwrap();
        while !sim.is_done() {
            sim.step();
        }
        assert_eq!(sim.report(), report);
        assert_eq!(report.procs[0].cycles, 0x10000 + 102);
        assert_eq!(report.procs[1].cycles, 102 + 0x20000);
    }

    #[test]
    fn rejects_wrong_trace_count() {
        let specs = SystemSpec::default();
        assert!(matches!(
            Simulator::<Dragon>::new(specs, vec![Instructions::new()]),
            Err(SimError::Config(ConfigError::TraceCount { traces: 1, procs: 4 }))
        ));
    }

    #[test]
    fn empty_traces_finish_immediately() {
        let specs = SystemSpec { num_procs: 2, ..Default::default() };
        let report = simulate(specs, vec![Instructions::new(), Instructions::new()]).unwrap();
        assert_eq!(report.total_cycles(), 0);
    }
}
