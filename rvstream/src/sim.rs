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

//! Tick-synchronous scheduling of cooperative components.
//!
//! Every tick the testbench steps each registered component once, in
//! registration order, and then advances the bus. Components read the values
//! committed at the last edge and schedule writes for the next one, so the
//! stepping order within a tick does not matter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::binding::LaneOrder;
use crate::scoreboard::Comparator;
use crate::signal::{Signal, SignalBus, SimulatedBus};
use crate::{Error, Failure, Tick};

/// A state machine stepped once per tick.
///
/// `step` runs the work between two clock edges: it may read the bus and
/// schedule writes, but must not block.
pub trait Component {
    fn name(&self) -> &str;

    fn step(&mut self, bus: &mut dyn SignalBus) -> Result<(), Error>;

    /// The interface this component attaches to, if any.
    fn endpoint(&self) -> Option<Endpoint> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub interface: String,
    pub lane_order: LaneOrder,
}

pub struct Testbench<B: SignalBus = SimulatedBus> {
    bus: B,
    components: Vec<Rc<RefCell<dyn Component>>>,
    /// interface name -> (first registered component, its lane order)
    endpoints: HashMap<String, (String, LaneOrder)>,
}

impl<B: SignalBus> Testbench<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            components: vec![],
            endpoints: HashMap::new(),
        }
    }

    /// Registers a component and returns a handle for inspecting it later.
    ///
    /// Fails when the component attaches to an interface another component
    /// already uses with a different lane order.
    pub fn add<C: Component + 'static>(&mut self, component: C) -> Result<Rc<RefCell<C>>, Error> {
        if let Some(endpoint) = component.endpoint() {
            match self.endpoints.get(&endpoint.interface) {
                Some((other, lane_order)) if *lane_order != endpoint.lane_order => {
                    let err = Error::LaneOrderConflict(format!(
                        "{} ({} uses {:?}, {} uses {:?})",
                        endpoint.interface,
                        other,
                        lane_order,
                        component.name(),
                        endpoint.lane_order
                    ));
                    log::error!("{}", err);
                    return Err(err);
                }
                Some(_) => {}
                None => {
                    self.endpoints.insert(
                        endpoint.interface,
                        (component.name().to_owned(), endpoint.lane_order),
                    );
                }
            }
        }
        log::debug!("added component {}", component.name());
        let component = Rc::new(RefCell::new(component));
        self.components.push(component.clone());
        Ok(component)
    }

    /// Stops stepping `component`. Returns false if it was not registered.
    pub fn cancel<C: Component + 'static>(&mut self, component: &Rc<RefCell<C>>) -> bool {
        let target = Rc::as_ptr(component) as *const u8;
        let before = self.components.len();
        self.components
            .retain(|registered| Rc::as_ptr(registered) as *const u8 != target);
        before != self.components.len()
    }

    /// Steps every component once, then moves to the next tick.
    pub fn step(&mut self) -> Result<(), Error> {
        for component in self.components.iter() {
            let mut component = component.borrow_mut();
            if let Err(err) = component.step(&mut self.bus) {
                log::error!(
                    "{} failed @tick {}: {}",
                    component.name(),
                    self.bus.now(),
                    err
                );
                return Err(err);
            }
        }
        self.bus.advance();
        Ok(())
    }

    pub fn run(&mut self, ticks: usize) -> Result<(), Error> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Steps until `done` holds or `limit` ticks have passed; returns whether
    /// `done` was reached.
    pub fn run_until<F>(&mut self, limit: usize, mut done: F) -> Result<bool, Error>
    where
        F: FnMut(&Self) -> bool,
    {
        for _ in 0..limit {
            if done(self) {
                return Ok(true);
            }
            self.step()?;
        }
        Ok(done(self))
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn now(&self) -> Tick {
        self.bus.now()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

pub const DEFAULT_WATCHDOG_LIMIT: usize = 100000;

/// Runs a testbench until a comparator has as many observed packets as
/// expected ones, giving up after `limit` ticks.
#[derive(Clone, Copy, Debug)]
pub struct Watchdog {
    limit: usize,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self {
            limit: DEFAULT_WATCHDOG_LIMIT,
        }
    }
}

impl Watchdog {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Returns the number of ticks it took for the counts to converge.
    pub fn guard<B: SignalBus>(
        &self,
        testbench: &mut Testbench<B>,
        comparator: &Comparator,
    ) -> Result<usize, Failure> {
        let expected = comparator.expected();
        let observed = comparator.observed();
        let mut ticks = 0;
        while expected.len() != observed.len() {
            if ticks == self.limit {
                log::warn!("Watchdog has triggered.");
                return Err(Failure::WatchdogExpired {
                    limit: self.limit,
                    expected: expected.len(),
                    observed: observed.len(),
                });
            }
            testbench.step()?;
            ticks += 1;
        }
        Ok(ticks)
    }
}

/// Holds a reset line asserted for a number of ticks, then releases it.
pub struct ResetDriver {
    name: String,
    reset: Signal,
    active_high: bool,
    remaining: usize,
    released: bool,
}

impl ResetDriver {
    pub fn new(name: &str, reset: Signal, active_high: bool, ticks: usize) -> Self {
        Self {
            name: name.to_owned(),
            reset,
            active_high,
            remaining: ticks,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Component for ResetDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, bus: &mut dyn SignalBus) -> Result<(), Error> {
        if self.released {
            return Ok(());
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return bus.write_bool(&self.reset, self.active_high);
        }
        bus.write_bool(&self.reset, !self.active_high)?;
        self.released = true;
        log::debug!("{}: reset complete", self.name);
        Ok(())
    }
}

/// Fails the run when a signal leaves its expected value while the design is
/// out of reset.
pub struct SignalAssertion {
    name: String,
    signal: Signal,
    expected: u64,
    reset: Option<(Signal, bool)>,
}

impl SignalAssertion {
    pub fn new(name: &str, signal: Signal, expected: u64) -> Self {
        Self {
            name: name.to_owned(),
            signal,
            expected,
            reset: None,
        }
    }

    /// Ignores the signal while `reset` is at its active level.
    pub fn with_reset(mut self, reset: Signal, active_high: bool) -> Self {
        self.reset = Some((reset, active_high));
        self
    }
}

impl Component for SignalAssertion {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, bus: &mut dyn SignalBus) -> Result<(), Error> {
        if let Some((reset, active_high)) = &self.reset {
            if bus.read_bool(reset)? == *active_high {
                return Ok(());
            }
        }
        if bus.read_u64(&self.signal)? != self.expected {
            return Err(Error::SignalAsserted {
                signal: self.signal.name().to_owned(),
                tick: bus.now(),
            });
        }
        Ok(())
    }
}
