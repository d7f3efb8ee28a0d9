// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The loopback environment shared by all scenarios:
//!
//!      driver -> tx -> StreamFifo -> rx -> monitor
//!                                    ^
//!                          ready controller
//!
//! with a passthrough predictor feeding the comparator's expected port.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::cell::RefCell;
use std::rc::Rc;

use rvstream::{AxisBinding, AxisInterface, Comparator, Error, Failure, Packet, Predictor};
use rvstream::{DelaySpec, KeepEncoding, LaneOrder, LanePacking, Pattern, SizeSpec};
use rvstream::{ReadyController, ReadyValidConfig, ReadyValidDriver, ReadyValidMonitor};
use rvstream::{SimulatedBus, Testbench, VcdTracer, Watchdog};

use crate::fifo::StreamFifo;

pub struct LoopbackOptions {
    /// bytes per beat
    pub width: usize,
    pub packing: LanePacking,
    pub keep: KeepEncoding,
    pub lane_order: LaneOrder,
    pub driver: ReadyValidConfig,
    pub ready: ReadyValidConfig,
    pub fifo_depth: usize,
    pub drop_every: Option<usize>,
    /// dump a waveform to the temp directory
    pub trace: bool,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        Self {
            width: 8,
            packing: LanePacking::Packed,
            keep: KeepEncoding::Packed,
            lane_order: LaneOrder::FirstByteLowest,
            driver: ReadyValidConfig::default(),
            ready: ReadyValidConfig::default(),
            fifo_depth: 4,
            drop_every: None,
            trace: false,
        }
    }
}

pub struct Loopback {
    pub testbench: Testbench,
    pub driver: Rc<RefCell<ReadyValidDriver<AxisBinding>>>,
    pub monitor: Rc<RefCell<ReadyValidMonitor<AxisBinding>>>,
    pub comparator: Comparator,
    pub predictor: Predictor,
}

fn port(name: &str, options: &LoopbackOptions) -> Result<AxisInterface, Error> {
    Ok(AxisInterface::full(name, options.width)?
        .with_packing(options.packing)
        .with_keep(options.keep)
        .with_user(8))
}

fn binding(port: &AxisInterface, options: &LoopbackOptions) -> AxisBinding {
    AxisBinding::builder(port.clone())
        .lane_order(options.lane_order)
        .build()
}

impl Loopback {
    pub fn build(options: &LoopbackOptions) -> Result<Self, Error> {
        let tx = port("tx", options)?;
        let rx = port("rx", options)?;
        let mut bus = SimulatedBus::with_signals(&tx.signals());
        for signal in rx.signals() {
            bus.declare(&signal);
        }
        if options.trace {
            match VcdTracer::in_temp_dir() {
                Ok(tracer) => bus.attach_tracer(tracer),
                Err(err) => log::warn!("VCD tracing disabled: {}", err),
            }
        }

        let mut testbench = Testbench::new(bus);
        let driver = testbench.add(ReadyValidDriver::new(
            "drv",
            binding(&tx, options),
            &options.driver,
        )?)?;
        let mut fifo = StreamFifo::new("fifo", tx, rx.clone(), options.fifo_depth)?;
        if let Some(n) = options.drop_every {
            fifo = fifo.drop_every(n);
        }
        testbench.add(fifo)?;
        let monitor = testbench.add(ReadyValidMonitor::new("mon", binding(&rx, options))?)?;
        testbench.add(ReadyController::new("rdy", rx.tready().cloned(), &options.ready)?)?;

        let comparator = Comparator::with_ports("sb", Default::default(), monitor.borrow().port());
        let predictor = Predictor::passthrough("prd").with_port(comparator.expected());
        Ok(Self {
            testbench,
            driver,
            monitor,
            comparator,
            predictor,
        })
    }

    /// `count` generated packets, named `pkt<i>` and tagged with `i` on the
    /// side channel.
    pub fn stimulus(
        count: usize,
        size: SizeSpec,
        delay: DelaySpec,
        seed: u64,
    ) -> Result<Vec<Packet>, Error> {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        (0..count)
            .map(|i| -> Result<Packet, Error> {
                Ok(Packet::generate(format!("pkt{}", i), size, Pattern::Random, delay, &mut rng)?
                    .with_user(vec![(i % 256) as u64]))
            })
            .collect()
    }

    /// Queues `packet` on the driver only; the predictor does not see it.
    pub fn send(&self, packet: Packet) {
        self.driver.borrow_mut().send(packet);
    }

    /// Queues `packet` on the driver and the predictor.
    pub fn send_expected(&mut self, packet: Packet) {
        self.predictor.push(packet.clone());
        self.send(packet);
    }

    /// Predicts, runs until every expected packet was observed, and compares.
    /// Returns the number of ticks the run took.
    pub fn check(&mut self, watchdog: Watchdog, ordered: bool) -> Result<usize, Failure> {
        self.predictor.predict();
        let ticks = watchdog.guard(&mut self.testbench, &self.comparator)?;
        log::info!(
            "{} of {} packets observed after {} ticks",
            self.monitor.borrow().count(),
            self.driver.borrow().sent(),
            ticks
        );
        self.comparator.compare(ordered)?;
        Ok(ticks)
    }
}
