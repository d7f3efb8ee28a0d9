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

use chrono;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path;
use vcd;

use crate::signal::SignalValue;
use crate::Tick;

const DEFAULT_VCD_FILE: &str = "rvstream.vcd";
pub const DEFAULT_TOP_MODULE: &str = "testbench";
const DEFAULT_VCD_HEADER: &str = "rvstream VCD";

/// Dumps bus activity as a value change dump.
///
/// IO errors are logged once and then tracing goes quiet; a broken waveform
/// never fails the simulation.
pub struct VcdTracer {
    writer: vcd::Writer<Box<dyn io::Write>>,
    is_error_state: bool,
    id_map: HashMap<String, vcd::IdCode>,
    last_value_map: HashMap<vcd::IdCode, SignalValue>,
    timestamp: Option<u64>,
}

impl VcdTracer {
    pub fn new<W: io::Write + 'static>(sink: W) -> Self {
        Self {
            writer: vcd::Writer::new(Box::new(sink)),
            is_error_state: false,
            id_map: HashMap::new(),
            last_value_map: HashMap::new(),
            timestamp: None,
        }
    }

    pub fn create(dst: path::PathBuf) -> io::Result<Self> {
        let dst_file = fs::File::create(&dst)?;
        log::debug!("VCD file: {}", dst.display());
        Ok(Self::new(io::BufWriter::new(dst_file)))
    }

    /// A tracer writing to `rvstream.vcd` in the temp directory.
    pub fn in_temp_dir() -> io::Result<Self> {
        let mut vcd_path = std::env::temp_dir();
        vcd_path.push(DEFAULT_VCD_FILE);
        Self::create(vcd_path)
    }

    fn vcd_error_handler(&mut self, err: io::Error) {
        if !self.is_error_state {
            self.is_error_state = true;
            log::error!("VCD writing failed with error {:?}", err)
        }
    }

    /// Declares one wire per `(name, width)` under the top module.
    pub fn write_header<'a, I>(&mut self, signals: I)
    where
        I: Iterator<Item = (&'a str, usize)>,
    {
        if self.is_error_state {
            return;
        }
        self._write_header(signals)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _write_header<'a, I>(&mut self, signals: I) -> io::Result<()>
    where
        I: Iterator<Item = (&'a str, usize)>,
    {
        self.writer.comment(DEFAULT_VCD_HEADER)?;
        self.writer.date(chrono::Utc::now().to_string().as_str())?;
        self.writer.add_module(DEFAULT_TOP_MODULE)?;
        for (name, width) in signals {
            let reference = Self::reference(name);
            let id_code =
                self.writer
                    .add_var(vcd::VarType::Wire, width as u32, reference.as_str(), None)?;
            if self.id_map.insert(name.to_owned(), id_code).is_some() {
                log::warn!("Signal {} was redefined for VCD dumps.", name);
            }
        }
        self.writer.upscope()?;
        self.writer.enddefinitions()
    }

    // Indexed lane names need escaping to survive as a single identifier.
    fn reference(name: &str) -> String {
        if name.contains('[') {
            format!("\\{}", name)
        } else {
            name.to_owned()
        }
    }

    /// Records the lines that changed on `tick`.
    pub fn record_cycle(&mut self, tick: Tick, changes: &[(String, SignalValue)]) {
        if self.is_error_state || changes.is_empty() {
            return;
        }
        self._record_cycle(tick, changes)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _record_cycle(&mut self, tick: Tick, changes: &[(String, SignalValue)]) -> io::Result<()> {
        let timestamp = tick as u64;
        if self.timestamp != Some(timestamp) {
            self.writer.timestamp(timestamp)?;
            self.timestamp = Some(timestamp);
        }
        for (name, value) in changes {
            match self.id_map.get(name.as_str()) {
                Some(id_code) => {
                    let id_code = *id_code;
                    self._record_change(id_code, value)?
                }
                None => log::warn!("No such signal {} was defined for VCD dumps.", name),
            }
        }
        Ok(())
    }

    fn _record_change(&mut self, id_code: vcd::IdCode, value: &SignalValue) -> io::Result<()> {
        if let Some(last_value) = self.last_value_map.get(&id_code) {
            if last_value == value {
                return Ok(());
            }
        }
        self.writer.change_vector(
            id_code,
            value
                .bits()
                .iter()
                .rev()
                .map(|b| (*b).into())
                .collect::<Vec<_>>()
                .as_slice(),
        )?;
        self.last_value_map.insert(id_code, value.clone());
        Ok(())
    }
}
