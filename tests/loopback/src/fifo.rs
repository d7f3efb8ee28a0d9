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

//! A stream FIFO standing in for the design under test: it sinks beats from
//! one AXI-Stream port and sources them, unchanged, on another.

use std::collections::VecDeque;

use rvstream::{AxisInterface, Component, Error, Signal, SignalBus, SignalValue};

pub struct StreamFifo {
    name: String,
    tx: AxisInterface,
    rx: AxisInterface,
    depth: usize,
    beats: VecDeque<Vec<SignalValue>>,
    /// every n-th packet is swallowed
    drop_every: Option<usize>,
    packets_in: usize,
    in_packet: bool,
    dropping: bool,
}

// Lines that travel with a beat: everything except the handshake.
fn payload(port: &AxisInterface) -> Vec<Signal> {
    port.signals()
        .into_iter()
        .filter(|signal| signal != port.tvalid() && Some(signal) != port.tready())
        .collect()
}

impl StreamFifo {
    /// `tx` is the port the FIFO sinks, `rx` the one it sources; both must
    /// have the same shape.
    pub fn new(name: &str, tx: AxisInterface, rx: AxisInterface, depth: usize) -> Result<Self, Error> {
        if payload(&tx).len() != payload(&rx).len() || tx.width() != rx.width() {
            return Err(Error::InvalidArgument(format!(
                "{}: ports {} and {} differ",
                name, tx, rx
            )));
        }
        if depth == 0 {
            return Err(Error::InvalidArgument(format!("{}: depth must be positive", name)));
        }
        Ok(Self {
            name: name.to_owned(),
            tx,
            rx,
            depth,
            beats: VecDeque::new(),
            drop_every: None,
            packets_in: 0,
            in_packet: false,
            dropping: false,
        })
    }

    pub fn drop_every(mut self, n: usize) -> Self {
        self.drop_every = Some(n).filter(|&n| n > 0);
        self
    }

    fn accept(&mut self, bus: &dyn SignalBus) -> Result<(), Error> {
        if !self.in_packet {
            self.dropping = matches!(self.drop_every, Some(n) if self.packets_in % n == n - 1);
            self.in_packet = true;
        }
        let last = match self.tx.tlast() {
            Some(tlast) => bus.read_bool(tlast)?,
            None => true,
        };
        if !self.dropping {
            let beat = payload(&self.tx)
                .iter()
                .map(|signal| bus.read(signal))
                .collect::<Result<Vec<_>, Error>>()?;
            self.beats.push_back(beat);
        }
        if last {
            if self.dropping {
                log::info!("{}: dropped packet {}", self.name, self.packets_in);
            }
            self.packets_in += 1;
            self.in_packet = false;
        }
        Ok(())
    }
}

impl Component for StreamFifo {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, bus: &mut dyn SignalBus) -> Result<(), Error> {
        let rx_ready = match self.rx.tready() {
            Some(tready) => bus.read_bool(tready)?,
            None => true,
        };
        if bus.read_bool(self.rx.tvalid())? && rx_ready {
            self.beats.pop_front();
        }

        let tx_ready = match self.tx.tready() {
            Some(tready) => bus.read_bool(tready)?,
            None => true,
        };
        if bus.read_bool(self.tx.tvalid())? && tx_ready {
            self.accept(bus)?;
        }

        match self.beats.front() {
            Some(beat) => {
                for (signal, value) in payload(&self.rx).iter().zip(beat.iter()) {
                    bus.write(signal, value.clone())?;
                }
                bus.write_bool(self.rx.tvalid(), true)?;
            }
            None => bus.write_bool(self.rx.tvalid(), false)?,
        }
        if let Some(tready) = self.tx.tready() {
            bus.write_bool(tready, self.beats.len() < self.depth)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvstream::{AxisBinding, Packet, ProtocolBinding, SimulatedBus, Testbench};
    use rvstream::{ReadyController, ReadyValidConfig, ReadyValidDriver, ReadyValidMonitor};

    #[test]
    fn test_fifo_forwards_packets() {
        let _ = env_logger::try_init();
        let tx = AxisInterface::full("tx", 4).unwrap();
        let rx = AxisInterface::full("rx", 4).unwrap();
        let mut bus = SimulatedBus::with_signals(&tx.signals());
        for signal in rx.signals() {
            bus.declare(&signal);
        }
        let mut testbench = Testbench::new(bus);
        let config = ReadyValidConfig::default();
        let driver = testbench
            .add(ReadyValidDriver::new("drv", AxisBinding::new(tx.clone()), &config).unwrap())
            .unwrap();
        testbench
            .add(StreamFifo::new("fifo", tx.clone(), rx.clone(), 2).unwrap())
            .unwrap();
        let monitor = testbench
            .add(ReadyValidMonitor::new("mon", AxisBinding::new(rx.clone())).unwrap())
            .unwrap();
        testbench
            .add(ReadyController::new("rdy", rx.tready().cloned(), &config).unwrap())
            .unwrap();

        let packets = vec![
            Packet::from_bytes("a", (0u8..9).collect::<Vec<_>>()),
            Packet::from_bytes("b", vec![0xee; 4]),
        ];
        for packet in &packets {
            driver.borrow_mut().send(packet.clone());
        }
        let port = monitor.borrow().port();
        assert!(testbench.run_until(100, |_| port.len() == 2).unwrap());
        assert_eq!(port.snapshot(), packets);
        assert_eq!(monitor.borrow().binding().interface(), "rx");
    }

    #[test]
    fn test_mismatched_ports() {
        let tx = AxisInterface::full("tx", 4).unwrap();
        let rx = AxisInterface::full("rx", 8).unwrap();
        assert!(StreamFifo::new("fifo", tx, rx, 2).is_err());
    }
}
