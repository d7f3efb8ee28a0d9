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

//! Signals and the environment boundary.
//!
//! Everything the engine knows about the outside world goes through the
//! `SignalBus` trait: read a line, schedule a write for the next tick, and
//! advance the clock. `SimulatedBus` is the in-memory environment used by the
//! testbench; a binding to a real simulator would implement the same trait.

use bitvec::prelude::*;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;

use crate::vcd::VcdTracer;
use crate::Error;
use crate::Tick;

/// The value of a line: a little-endian bit vector, bit 0 is the LSB.
///
/// Multi-byte lanes keep byte `i` in bits `[8i, 8i + 8)`.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct SignalValue(BitVec<u8, Lsb0>);

impl SignalValue {
    pub fn zero(width: usize) -> Self {
        Self(BitVec::repeat(false, width))
    }

    pub fn from_bool(level: bool) -> Self {
        Self(BitVec::repeat(level, 1))
    }

    /// Builds a `width` bit value from the low bits of `value`.
    pub fn from_u64(value: u64, width: usize) -> Self {
        let mut bits = BitVec::<u8, Lsb0>::repeat(false, width);
        let low = width.min(64);
        if low > 0 {
            bits[..low].store_le(value);
        }
        Self(bits)
    }

    /// Builds a `width` bit value from bytes, truncating or zero extending.
    pub fn from_bytes(bytes: &[u8], width: usize) -> Self {
        let mut bits = BitVec::<u8, Lsb0>::from_slice(bytes);
        bits.resize(width, false);
        Self(bits)
    }

    pub fn from_bits(bits: BitVec<u8, Lsb0>) -> Self {
        Self(bits)
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn bits(&self) -> &BitSlice<u8, Lsb0> {
        self.0.as_bitslice()
    }

    /// Any bit set.
    pub fn is_high(&self) -> bool {
        self.0.any()
    }

    pub fn bit(&self, index: usize) -> bool {
        self.0.get(index).map(|b| *b).unwrap_or(false)
    }

    pub fn count_ones(&self) -> usize {
        self.0.count_ones()
    }

    /// The low 64 bits as an integer.
    pub fn to_u64(&self) -> u64 {
        let low = self.0.len().min(64);
        if low == 0 {
            0
        } else {
            self.0[..low].load_le::<u64>()
        }
    }

    /// Bytes in lane order; a partial top byte is zero extended.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.chunks(8).map(|chunk| chunk.load_le::<u8>()).collect()
    }

    pub fn byte(&self, lane: usize) -> u8 {
        self.0
            .chunks(8)
            .nth(lane)
            .map(|chunk| chunk.load_le::<u8>())
            .unwrap_or(0)
    }
}

impl fmt::LowerHex for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "0x");
        }
        write!(
            f,
            "0x{}",
            self.to_bytes()
                .iter()
                .rev()
                .map(|byte| format!("{:02x}", byte))
                .join("")
        )
    }
}

impl fmt::Debug for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'{:x}", self.width(), self)
    }
}

impl From<bool> for SignalValue {
    fn from(level: bool) -> Self {
        Self::from_bool(level)
    }
}

/// A handle to a named line of a given width (in bits).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signal {
    name: String,
    width: usize,
}

impl Signal {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }

    /// A single bit line.
    pub fn bit(name: impl Into<String>) -> Self {
        Self::new(name, 1)
    }

    /// An array of `count` lines named `base[0]` .. `base[count - 1]`.
    pub fn lanes(base: &str, count: usize, width: usize) -> Vec<Signal> {
        (0..count)
            .map(|lane| Signal::new(format!("{}[{}]", base, lane), width))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

/// The environment boundary consumed by every component.
///
/// Reads return the value committed at the last tick edge. Writes are
/// scheduled and become visible after the next `advance`.
pub trait SignalBus {
    fn read(&self, signal: &Signal) -> Result<SignalValue, Error>;

    fn write(&mut self, signal: &Signal, value: SignalValue) -> Result<(), Error>;

    /// Moves to the next clock edge, committing all scheduled writes.
    fn advance(&mut self);

    /// Current simulation time, for diagnostics only.
    fn now(&self) -> Tick;

    fn read_bool(&self, signal: &Signal) -> Result<bool, Error> {
        Ok(self.read(signal)?.is_high())
    }

    fn read_u64(&self, signal: &Signal) -> Result<u64, Error> {
        Ok(self.read(signal)?.to_u64())
    }

    fn write_bool(&mut self, signal: &Signal, level: bool) -> Result<(), Error> {
        self.write(signal, SignalValue::from_u64(level as u64, signal.width()))
    }

    fn write_u64(&mut self, signal: &Signal, value: u64) -> Result<(), Error> {
        self.write(signal, SignalValue::from_u64(value, signal.width()))
    }
}

#[derive(Clone, Debug)]
struct Line {
    width: usize,
    current: SignalValue,
    pending: Option<SignalValue>,
}

/// An in-memory bus with next-tick write semantics.
///
/// Lines must be declared before use; every line starts at zero.
#[derive(Default)]
pub struct SimulatedBus {
    lines: BTreeMap<String, Line>,
    tick: Tick,
    tracer: Option<VcdTracer>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signals<'a, I>(signals: I) -> Self
    where
        I: IntoIterator<Item = &'a Signal>,
    {
        let mut bus = Self::new();
        for signal in signals {
            bus.declare(signal);
        }
        bus
    }

    pub fn declare(&mut self, signal: &Signal) {
        if let Some(line) = self.lines.get(signal.name()) {
            if line.width != signal.width() {
                log::warn!(
                    "Signal {} redeclared with width {} (was {}); keeping the first declaration.",
                    signal.name(),
                    signal.width(),
                    line.width
                );
            }
            return;
        }
        self.lines.insert(
            signal.name().to_owned(),
            Line {
                width: signal.width(),
                current: SignalValue::zero(signal.width()),
                pending: None,
            },
        );
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.lines.contains_key(name)
    }

    /// Sets a line immediately, bypassing the next-tick schedule. Meant for
    /// initial values.
    pub fn force(&mut self, signal: &Signal, value: SignalValue) -> Result<(), Error> {
        let line = self.line_mut(signal)?;
        line.current = value;
        line.pending = None;
        Ok(())
    }

    /// Starts dumping every declared line to `tracer`, one timestamp per tick.
    pub fn attach_tracer(&mut self, mut tracer: VcdTracer) {
        tracer.write_header(self.lines.iter().map(|(name, line)| (name.as_str(), line.width)));
        let initial = self
            .lines
            .iter()
            .map(|(name, line)| (name.clone(), line.current.clone()))
            .collect::<Vec<_>>();
        tracer.record_cycle(self.tick, &initial);
        self.tracer = Some(tracer);
    }

    pub fn detach_tracer(&mut self) -> Option<VcdTracer> {
        self.tracer.take()
    }

    fn line_mut(&mut self, signal: &Signal) -> Result<&mut Line, Error> {
        let line = self
            .lines
            .get_mut(signal.name())
            .ok_or_else(|| Error::UnknownSignal(signal.name().to_owned()))?;
        Ok(line)
    }
}

impl SignalBus for SimulatedBus {
    fn read(&self, signal: &Signal) -> Result<SignalValue, Error> {
        self.lines
            .get(signal.name())
            .map(|line| line.current.clone())
            .ok_or_else(|| Error::UnknownSignal(signal.name().to_owned()))
    }

    fn write(&mut self, signal: &Signal, value: SignalValue) -> Result<(), Error> {
        let line = self.line_mut(signal)?;
        if value.width() != line.width {
            return Err(Error::WidthMismatch {
                signal: signal.name().to_owned(),
                expected: line.width,
                actual: value.width(),
            });
        }
        line.pending = Some(value);
        Ok(())
    }

    fn advance(&mut self) {
        self.tick += 1;
        let mut changes = vec![];
        for (name, line) in self.lines.iter_mut() {
            if let Some(value) = line.pending.take() {
                if value != line.current {
                    if cfg!(feature = "trace-echo-signal-changes") {
                        log::trace!("{} <= {:x} @tick {}", name, value, self.tick);
                    }
                    line.current = value;
                    changes.push((name.clone(), line.current.clone()));
                }
            }
        }
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.record_cycle(self.tick, &changes);
        }
    }

    fn now(&self) -> Tick {
        self.tick
    }
}
