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

use rand::Rng;
use rand_core::RngCore;

use crate::config::{FlowControlMode, ReadyValidConfig};
use crate::signal::{Signal, SignalBus};
use crate::sim::Component;
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    /// READY goes high and a burst length is drawn
    Start,
    /// ticks left with READY high
    Active(usize),
    /// ticks left with READY low
    Backpressure(usize),
}

/// Drives the READY line of a sink.
pub struct ReadyController {
    name: String,
    ready: Option<Signal>,
    config: ReadyValidConfig,
    rng: Box<dyn RngCore>,
    phase: Phase,
    level: bool,
}

impl ReadyController {
    /// `ready` is `None` for interfaces without backpressure; the controller
    /// then does nothing.
    pub fn new(name: &str, ready: Option<Signal>, config: &ReadyValidConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            name: name.to_owned(),
            ready,
            config: config.clone(),
            rng: config.rng(),
            phase: Phase::Start,
            level: false,
        })
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore>) -> Self {
        self.rng = rng;
        self
    }

    /// The level most recently driven.
    pub fn level(&self) -> bool {
        self.level
    }

    fn drive(&mut self, bus: &mut dyn SignalBus, ready: &Signal, level: bool) -> Result<(), Error> {
        self.level = level;
        bus.write_bool(ready, level)
    }

    fn step_random(&mut self, bus: &mut dyn SignalBus, ready: &Signal) -> Result<(), Error> {
        loop {
            match self.phase {
                Phase::Start => {
                    self.drive(bus, ready, true)?;
                    let burst = self
                        .rng
                        .gen_range(self.config.ready_burst_min..=self.config.ready_burst_max);
                    self.phase = Phase::Active(burst);
                }
                Phase::Active(remaining) if remaining > 0 => {
                    self.phase = Phase::Active(remaining - 1);
                    return Ok(());
                }
                Phase::Active(_) => {
                    self.drive(bus, ready, false)?;
                    let wait = self.rng.gen_range(
                        self.config.backpressure_min_delay..=self.config.backpressure_max_delay,
                    );
                    self.phase = Phase::Backpressure(wait);
                }
                Phase::Backpressure(remaining) if remaining > 0 => {
                    self.phase = Phase::Backpressure(remaining - 1);
                    return Ok(());
                }
                Phase::Backpressure(_) => self.phase = Phase::Start,
            }
        }
    }
}

impl Component for ReadyController {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, bus: &mut dyn SignalBus) -> Result<(), Error> {
        let ready = match self.ready.clone() {
            Some(ready) => ready,
            None => return Ok(()),
        };
        match self.config.flow_ctrl_mode {
            FlowControlMode::AlwaysOn => self.drive(bus, &ready, true),
            FlowControlMode::OneValidOneNonvalid => {
                let level = !self.level;
                self.drive(bus, &ready, level)
            }
            FlowControlMode::Random => self.step_random(bus, &ready),
        }
    }
}
