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

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::binding::{Beat, HandshakeLines, ProtocolBinding};
use crate::packet::{DumpFormat, Packet};
use crate::signal::{Signal, SignalBus};
use crate::sim::{Component, Endpoint};
use crate::Error;

/// A shared, append-only list of transactions.
///
/// Clones share the same list: a monitor keeps one handle and writes to it,
/// a comparator keeps another and reads from it.
#[derive(Debug)]
pub struct AnalysisPort<T = Packet>(Rc<RefCell<Vec<T>>>);

impl<T> Clone for AnalysisPort<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Default for AnalysisPort<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(vec![])))
    }
}

impl<T: Clone> AnalysisPort<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, item: T) {
        self.0.borrow_mut().push(item);
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// A copy of everything written so far.
    pub fn snapshot(&self) -> Vec<T> {
        self.0.borrow().clone()
    }

    /// Drains the port.
    pub fn take(&self) -> Vec<T> {
        self.0.borrow_mut().drain(..).collect()
    }
}

/// Rebuilds packets from the beats accepted on an interface.
///
/// Packets are written to the analysis port in completion order and named
/// `<monitor>-<n>`.
pub struct ReadyValidMonitor<B: ProtocolBinding> {
    name: String,
    binding: B,
    port: AnalysisPort,
    beats: Vec<Beat>,
    size: usize,
    count: usize,
    started: bool,
    verbose: Option<DumpFormat>,
}

impl<B: ProtocolBinding> ReadyValidMonitor<B> {
    /// Fails when the binding cannot find packet boundaries or valid lanes.
    pub fn new(name: &str, binding: B) -> Result<Self, Error> {
        binding.check_monitor_hooks()?;
        Ok(Self {
            name: name.to_owned(),
            binding,
            port: AnalysisPort::new(),
            beats: vec![],
            size: 0,
            count: 0,
            started: false,
            verbose: None,
        })
    }

    /// Writes into an existing port instead of a fresh one.
    pub fn with_port(mut self, port: AnalysisPort) -> Self {
        self.port = port;
        self
    }

    /// Logs a dump of every captured packet.
    pub fn verbose(mut self, format: DumpFormat) -> Self {
        self.verbose = Some(format);
        self
    }

    pub fn port(&self) -> AnalysisPort {
        self.port.clone()
    }

    /// Packets captured so far.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    fn write_port(&mut self) -> Result<(), Error> {
        let name = format!("{}-{}", self.name, self.count);
        let packet = self.binding.assemble(name, &self.beats, self.size)?;
        match &self.verbose {
            Some(format) => log::info!(
                "Monitor {} pkt_num: {}\n{}",
                self.name,
                self.count,
                packet.dump(format)
            ),
            None => log::debug!("{}: captured {}", self.name, packet),
        }
        self.port.write(packet);
        self.beats.clear();
        self.size = 0;
        self.count += 1;
        Ok(())
    }
}

impl<B: ProtocolBinding> Component for ReadyValidMonitor<B> {
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
        // sampling starts on the first tick edge
        if !self.started {
            log::info!("Starting {} monitor", self.name);
            self.started = true;
            return Ok(());
        }
        if !self.binding.handshake().completed(bus)? {
            return Ok(());
        }
        let beat = self.binding.decode_beat(bus)?;
        self.size += beat.valid_bytes;
        self.beats.push(beat);
        if self.binding.is_end_of_packet(bus)? {
            self.write_port()?;
        }
        Ok(())
    }
}

/// One handshake of a single-cycle interface: field name to sampled value.
pub type FieldRecord = BTreeMap<String, u64>;

/// Monitor for interfaces where every handshake is a whole transaction.
pub struct FieldMonitor {
    name: String,
    handshake: HandshakeLines,
    fields: Vec<Signal>,
    port: AnalysisPort<FieldRecord>,
    count: usize,
    started: bool,
    verbose: bool,
}

impl FieldMonitor {
    pub fn new(name: &str, handshake: HandshakeLines, fields: Vec<Signal>) -> Self {
        Self {
            name: name.to_owned(),
            handshake,
            fields,
            port: AnalysisPort::new(),
            count: 0,
            started: false,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn port(&self) -> AnalysisPort<FieldRecord> {
        self.port.clone()
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl Component for FieldMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, bus: &mut dyn SignalBus) -> Result<(), Error> {
        if !self.started {
            log::info!("Starting {} single-cycle monitor", self.name);
            self.started = true;
            return Ok(());
        }
        if !self.handshake.completed(bus)? {
            return Ok(());
        }
        let record = self
            .fields
            .iter()
            .map(|field| -> Result<(String, u64), Error> {
                Ok((field.name().to_owned(), bus.read_u64(field)?))
            })
            .collect::<Result<FieldRecord, Error>>()?;
        if self.verbose {
            log::info!("[{}] tnx {}: {:?}", self.name, self.count, record);
        }
        self.port.write(record);
        self.count += 1;
        Ok(())
    }
}
