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

use rand_core::RngCore;
use std::collections::VecDeque;

use crate::binding::ProtocolBinding;
use crate::config::ReadyValidConfig;
use crate::flow::ValidFlow;
use crate::packet::Packet;
use crate::signal::SignalBus;
use crate::sim::{Component, Endpoint};
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
enum DriverState {
    Idle,
    /// idle ticks left before VALID goes high
    Delaying { remaining: usize },
    /// beat `index` of `count` is on the bus
    InFlight { index: usize, count: usize },
}

/// Streams queued packets over a ready-valid interface, one beat per
/// handshake.
///
/// With READY always high and `AlwaysOn` flow control a packet of N beats
/// with delay d has its last beat accepted d + N ticks after the step that
/// picked it up.
pub struct ReadyValidDriver<B: ProtocolBinding> {
    name: String,
    binding: B,
    config: ReadyValidConfig,
    flow: ValidFlow,
    queue: VecDeque<Packet>,
    current: Option<Packet>,
    state: DriverState,
    sent: usize,
}

impl<B: ProtocolBinding> ReadyValidDriver<B> {
    pub fn new(name: &str, binding: B, config: &ReadyValidConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            name: name.to_owned(),
            binding,
            config: config.clone(),
            flow: ValidFlow::new(config),
            queue: VecDeque::new(),
            current: None,
            state: DriverState::Idle,
            sent: 0,
        })
    }

    /// Replaces the generator behind random flow control.
    pub fn with_rng(mut self, rng: Box<dyn RngCore>) -> Self {
        self.flow = ValidFlow::with_rng(&self.config, rng);
        self
    }

    /// Queues `packet`; packets go out in the order they were sent.
    pub fn send(&mut self, packet: Packet) {
        log::debug!("{}: queued {}", self.name, packet);
        self.queue.push_back(packet);
    }

    pub fn is_idle(&self) -> bool {
        self.state == DriverState::Idle && self.queue.is_empty()
    }

    /// Packets fully transferred so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Packets queued or in flight.
    pub fn pending(&self) -> usize {
        self.queue.len() + self.current.iter().count()
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn config(&self) -> &ReadyValidConfig {
        &self.config
    }
}

impl<B: ProtocolBinding> Component for ReadyValidDriver<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> Option<Endpoint> {
        Some(Endpoint {
            interface: self.binding.interface().to_owned(),
            lane_order: self.binding.lane_order(),
        })
    }

    fn step(&mut self, bus: &mut dyn SignalBus) -> Result<(), Error> {
        loop {
            match self.state {
                DriverState::Idle => match self.queue.pop_front() {
                    Some(packet) => {
                        log::info!(
                            "{}: sending packet {}, size={}",
                            self.name,
                            packet.name,
                            packet.size()
                        );
                        self.state = DriverState::Delaying {
                            remaining: packet.delay,
                        };
                        self.current = Some(packet);
                    }
                    None => return Ok(()),
                },
                DriverState::Delaying { remaining } if remaining > 0 => {
                    self.state = DriverState::Delaying {
                        remaining: remaining - 1,
                    };
                    return Ok(());
                }
                DriverState::Delaying { .. } => {
                    let packet = match &self.current {
                        Some(packet) => packet,
                        None => {
                            self.state = DriverState::Idle;
                            continue;
                        }
                    };
                    self.flow.assert_valid();
                    let count = self.binding.beat_count(packet);
                    self.binding.drive_beat(bus, packet, count == 1, 0)?;
                    let level = self.flow.next_valid(false);
                    bus.write_bool(&self.binding.handshake().valid, level)?;
                    self.state = DriverState::InFlight { index: 0, count };
                    return Ok(());
                }
                DriverState::InFlight { index, count } => {
                    let packet = match &self.current {
                        Some(packet) => packet,
                        None => {
                            self.state = DriverState::Idle;
                            continue;
                        }
                    };
                    let completed = self.binding.handshake().completed(bus)?;
                    let index = if completed { index + 1 } else { index };
                    if index < count {
                        self.binding
                            .drive_beat(bus, packet, index == count - 1, index)?;
                        let level = self.flow.next_valid(completed);
                        bus.write_bool(&self.binding.handshake().valid, level)?;
                        self.state = DriverState::InFlight { index, count };
                        return Ok(());
                    }

                    bus.write_bool(&self.binding.handshake().valid, false)?;
                    self.flow.deassert();
                    self.binding.drive_idle(bus)?;
                    log::debug!("{}: finished sending packet {}", self.name, packet.name);
                    self.sent += 1;
                    self.current = None;
                    self.state = DriverState::Idle;
                    // the next packet may start on this very tick
                }
            }
        }
    }
}
