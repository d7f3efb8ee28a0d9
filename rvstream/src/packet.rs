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

//! The packet model: an ordered byte payload plus the metadata a driver needs
//! to send it and a scoreboard needs to report on it.

use adler32::RollingAdler32;
use itertools::Itertools;
use rand::seq::index;
use rand::Rng;
use rand_core::RngCore;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::signal::SignalValue;
use crate::Error;

pub const DEFAULT_SYMBOL_WIDTH: usize = 8;

/// How many bytes a generated packet carries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SizeSpec {
    Exact(usize),
    Random,
    OneWord,
    Small,
    Medium,
    Long,
}

impl SizeSpec {
    fn range(&self) -> RangeInclusive<usize> {
        match self {
            SizeSpec::Exact(size) => *size..=*size,
            SizeSpec::Random => 1..=1500,
            SizeSpec::OneWord => 1..=10,
            SizeSpec::Small => 10..=100,
            SizeSpec::Medium => 100..=500,
            SizeSpec::Long => 500..=1500,
        }
    }

    pub fn resolve(&self, rng: &mut dyn RngCore) -> Result<usize, Error> {
        match self {
            SizeSpec::Exact(0) => Err(Error::InvalidArgument(
                "packet size must be positive".to_owned(),
            )),
            SizeSpec::Exact(size) => Ok(*size),
            _ => Ok(rng.gen_range(self.range())),
        }
    }
}

impl TryFrom<i64> for SizeSpec {
    type Error = Error;

    fn try_from(size: i64) -> Result<Self, Self::Error> {
        if size <= 0 {
            return Err(Error::InvalidArgument(format!(
                "packet size must be positive, got {}",
                size
            )));
        }
        Ok(SizeSpec::Exact(size as usize))
    }
}

impl FromStr for SizeSpec {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        if let Ok(size) = spec.parse::<i64>() {
            return SizeSpec::try_from(size);
        }
        match spec.to_ascii_lowercase().as_str() {
            "random" => Ok(SizeSpec::Random),
            "one_word" => Ok(SizeSpec::OneWord),
            "small" => Ok(SizeSpec::Small),
            "medium" => Ok(SizeSpec::Medium),
            "long" => Ok(SizeSpec::Long),
            _ => Err(Error::InvalidArgument(format!(
                "unknown size specifier '{}'",
                spec
            ))),
        }
    }
}

/// How many idle ticks precede a generated packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DelaySpec {
    Exact(usize),
    Random,
    NoDelay,
    Short,
    Medium,
    Long,
}

impl DelaySpec {
    fn range(&self) -> RangeInclusive<usize> {
        match self {
            DelaySpec::Exact(delay) => *delay..=*delay,
            DelaySpec::Random => 0..=250,
            DelaySpec::NoDelay => 0..=0,
            DelaySpec::Short => 0..=5,
            DelaySpec::Medium => 5..=50,
            DelaySpec::Long => 50..=250,
        }
    }

    pub fn resolve(&self, rng: &mut dyn RngCore) -> usize {
        match self {
            DelaySpec::Exact(delay) => *delay,
            DelaySpec::NoDelay => 0,
            _ => rng.gen_range(self.range()),
        }
    }
}

impl TryFrom<i64> for DelaySpec {
    type Error = Error;

    fn try_from(delay: i64) -> Result<Self, Self::Error> {
        if delay < 0 {
            return Err(Error::InvalidArgument(format!(
                "delay must not be negative, got {}",
                delay
            )));
        }
        Ok(DelaySpec::Exact(delay as usize))
    }
}

impl FromStr for DelaySpec {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        if let Ok(delay) = spec.parse::<i64>() {
            return DelaySpec::try_from(delay);
        }
        match spec.to_ascii_lowercase().as_str() {
            "random" => Ok(DelaySpec::Random),
            "no_delay" => Ok(DelaySpec::NoDelay),
            "short" => Ok(DelaySpec::Short),
            "medium" => Ok(DelaySpec::Medium),
            "long" => Ok(DelaySpec::Long),
            _ => Err(Error::InvalidArgument(format!(
                "unknown delay specifier '{}'",
                spec
            ))),
        }
    }
}

/// Payload of a generated packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pattern {
    /// symbol `i` is `i mod (2^w - 1)`
    Increment,
    Random,
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        match spec.trim().to_ascii_lowercase().as_str() {
            "increment" => Ok(Pattern::Increment),
            "random" => Ok(Pattern::Random),
            _ => Err(Error::InvalidArgument(format!(
                "unknown data pattern '{}'",
                spec
            ))),
        }
    }
}

/// Which bytes `Packet::corrupt` touches.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CorruptTarget {
    /// this many distinct positions, sampled without replacement
    Count(usize),
    Positions(Vec<usize>),
}

/// The error value XORed into each corrupted byte when the caller supplies
/// none.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CorruptPattern {
    /// a random nonzero symbol
    Random,
    /// a single flipped bit
    BitError,
}

/// Layout of `Packet::dump`.
#[derive(Clone, Debug)]
pub struct DumpFormat {
    pub bytes_per_line: usize,
    pub index_width: usize,
    pub index_fill: char,
}

impl Default for DumpFormat {
    fn default() -> Self {
        Self {
            bytes_per_line: 8,
            index_width: 3,
            index_fill: '0',
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ByteDiff {
    pub index: usize,
    pub expected: u8,
    pub observed: u8,
}

/// Why two packets are not equal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mismatch {
    Size {
        lhs: String,
        rhs: String,
        expected: usize,
        observed: usize,
    },
    Content {
        lhs: String,
        rhs: String,
        diffs: Vec<ByteDiff>,
    },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mismatch::Size {
                lhs,
                rhs,
                expected,
                observed,
            } => write!(
                f,
                "size of {} is {}, size of {} is {}",
                lhs, expected, rhs, observed
            ),
            Mismatch::Content { lhs, rhs, diffs } => write!(
                f,
                "{} and {} differ at {} byte(s): {}",
                lhs,
                rhs,
                diffs.len(),
                diffs
                    .iter()
                    .map(|d| format!("[{}] 0x{:02x} != 0x{:02x}", d.index, d.expected, d.observed))
                    .join(", ")
            ),
        }
    }
}

/// An ordered byte sequence plus metadata.
///
/// The size is always the payload length. Two packets are equal when their
/// payloads are; names, delays and side-channel values are not compared.
#[derive(Clone, Debug)]
pub struct Packet {
    pub name: String,
    data: Vec<u8>,
    /// idle ticks before VALID is asserted
    pub delay: usize,
    /// side-channel values; the first one is driven on TUSER
    pub user: Vec<u64>,
    symbol_width: usize,
}

impl Packet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: vec![],
            delay: 0,
            user: vec![],
            symbol_width: DEFAULT_SYMBOL_WIDTH,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let mut packet = Self::new(name);
        packet.data = bytes.into();
        packet
    }

    pub fn with_delay(mut self, delay: usize) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_user(mut self, user: Vec<u64>) -> Self {
        self.user = user;
        self
    }

    pub fn with_symbol_width(mut self, symbol_width: usize) -> Result<Self, Error> {
        if !(1..=8).contains(&symbol_width) {
            return Err(Error::InvalidArgument(format!(
                "symbol width must be in 1..=8, got {}",
                symbol_width
            )));
        }
        self.symbol_width = symbol_width;
        Ok(self)
    }

    /// Appends `bytes` to the payload.
    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn symbol_width(&self) -> usize {
        self.symbol_width
    }

    /// The value driven on the side channel, zero when there is none.
    pub fn first_user(&self) -> u64 {
        self.user.first().copied().unwrap_or(0)
    }

    fn max_symbol(symbol_width: usize) -> u16 {
        (1u16 << symbol_width) - 1
    }

    /// A packet of 8 bit symbols; see `generate_symbols`.
    pub fn generate(
        name: impl Into<String>,
        size: SizeSpec,
        pattern: Pattern,
        delay: DelaySpec,
        rng: &mut dyn RngCore,
    ) -> Result<Self, Error> {
        Self::generate_symbols(name, size, pattern, delay, DEFAULT_SYMBOL_WIDTH, rng)
    }

    pub fn generate_symbols(
        name: impl Into<String>,
        size: SizeSpec,
        pattern: Pattern,
        delay: DelaySpec,
        symbol_width: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self, Error> {
        let mut packet = Self::new(name).with_symbol_width(symbol_width)?;
        let size = size.resolve(rng)?;
        let max_symbol = Self::max_symbol(symbol_width);
        packet.data = match pattern {
            Pattern::Increment => (0..size)
                .map(|i| (i % max_symbol as usize) as u8)
                .collect(),
            Pattern::Random => (0..size)
                .map(|_| rng.gen_range(0..=max_symbol) as u8)
                .collect(),
        };
        packet.delay = delay.resolve(rng);
        log::trace!(
            "generated {} with {} bytes and delay {}",
            packet.name,
            packet.size(),
            packet.delay
        );
        Ok(packet)
    }

    /// Rebuilds a payload from lane words, LSB lane first, keeping the first
    /// `total_bytes` bytes.
    pub fn from_words(
        name: impl Into<String>,
        words: &[SignalValue],
        total_bytes: usize,
        lane_width: usize,
    ) -> Result<Self, Error> {
        if lane_width == 0 {
            return Err(Error::InvalidArgument("lane width must be positive".to_owned()));
        }
        if total_bytes > words.len() * lane_width {
            return Err(Error::InvalidArgument(format!(
                "{} words of {} bytes cannot hold {} bytes",
                words.len(),
                lane_width,
                total_bytes
            )));
        }
        let data = words
            .iter()
            .flat_map(|word| (0..lane_width).map(move |lane| word.byte(lane)))
            .take(total_bytes)
            .collect::<Vec<_>>();
        Ok(Self::from_bytes(name, data))
    }

    /// Number of `lane_width` byte beats; an empty packet still takes one.
    pub fn beat_count(&self, lane_width: usize) -> usize {
        num::Integer::div_ceil(&self.size(), &lane_width).max(1)
    }

    /// Bytes of beat `index`, zero padded to `lane_width`.
    pub fn beat_bytes(&self, index: usize, lane_width: usize) -> Vec<u8> {
        let start = (index * lane_width).min(self.size());
        let end = (start + lane_width).min(self.size());
        let mut bytes = self.data[start..end].to_vec();
        bytes.resize(lane_width, 0);
        bytes
    }

    /// The payload sliced into lane words, the inverse of `from_words`.
    pub fn to_words(&self, lane_width: usize) -> Vec<SignalValue> {
        (0..self.beat_count(lane_width))
            .map(|index| SignalValue::from_bytes(&self.beat_bytes(index, lane_width), lane_width * 8))
            .collect()
    }

    /// XORs an error value into selected bytes and returns what was applied
    /// as `(position, error)` pairs.
    pub fn corrupt(
        &mut self,
        target: CorruptTarget,
        errors: Option<&[u8]>,
        pattern: CorruptPattern,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<(usize, u8)>, Error> {
        let positions = match target {
            CorruptTarget::Count(count) => {
                if count > self.size() {
                    return Err(Error::InvalidArgument(format!(
                        "cannot corrupt {} bytes of {} ({} bytes)",
                        count,
                        self.name,
                        self.size()
                    )));
                }
                let mut positions = index::sample(rng, self.size(), count).into_vec();
                positions.sort_unstable();
                positions
            }
            CorruptTarget::Positions(positions) => {
                if let Some(bad) = positions.iter().find(|&&p| p >= self.size()) {
                    return Err(Error::InvalidArgument(format!(
                        "position {} is out of range for {} ({} bytes)",
                        bad,
                        self.name,
                        self.size()
                    )));
                }
                positions
            }
        };
        if let Some(errors) = errors {
            if errors.len() < positions.len() {
                return Err(Error::InvalidArgument(format!(
                    "{} error values for {} positions",
                    errors.len(),
                    positions.len()
                )));
            }
        }

        let max_symbol = Self::max_symbol(self.symbol_width);
        let mut applied = Vec::with_capacity(positions.len());
        for (i, position) in positions.into_iter().enumerate() {
            let error = match (errors, pattern) {
                (Some(errors), _) => errors[i],
                (None, CorruptPattern::Random) => rng.gen_range(1..=max_symbol) as u8,
                (None, CorruptPattern::BitError) => 1u8 << rng.gen_range(0..self.symbol_width),
            };
            self.data[position] ^= error;
            applied.push((position, error));
        }
        log::debug!("corrupted {}: {:?}", self.name, applied);
        Ok(applied)
    }

    /// Compares payloads, listing every differing byte.
    pub fn compare(&self, other: &Packet) -> Result<(), Mismatch> {
        if self.size() != other.size() {
            return Err(Mismatch::Size {
                lhs: self.name.clone(),
                rhs: other.name.clone(),
                expected: self.size(),
                observed: other.size(),
            });
        }
        let diffs = self
            .data
            .iter()
            .zip(other.data.iter())
            .positions(|(a, b)| a != b)
            .map(|index| ByteDiff {
                index,
                expected: self.data[index],
                observed: other.data[index],
            })
            .collect::<Vec<_>>();
        if diffs.is_empty() {
            Ok(())
        } else {
            Err(Mismatch::Content {
                lhs: self.name.clone(),
                rhs: other.name.clone(),
                diffs,
            })
        }
    }

    /// Adler-32 of the payload.
    pub fn content_hash(&self) -> u32 {
        RollingAdler32::from_buffer(&self.data).hash()
    }

    pub fn dump(&self, format: &DumpFormat) -> String {
        let mut out = format!("{}: {} bytes", self.name, self.size());
        if !self.user.is_empty() {
            out.push_str(&format!(" user {:?}", self.user));
        }
        for (line, chunk) in self.data.chunks(format.bytes_per_line.max(1)).enumerate() {
            let index = (line * format.bytes_per_line.max(1)).to_string();
            let fill = format
                .index_width
                .saturating_sub(index.len());
            out.push('\n');
            out.extend(std::iter::repeat(format.index_fill).take(fill));
            out.push_str(&index);
            out.push_str(": ");
            out.push_str(&chunk.iter().map(|byte| format!("{:02x}", byte)).join(" "));
        }
        out
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Packet {}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size())
    }
}
