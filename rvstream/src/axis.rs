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

//! AXI-Stream binding.
//!
//! An `AxisInterface` names the lines of one AXI-Stream port; an
//! `AxisBinding` adds the lane order and the fallbacks for optional lines,
//! and implements `ProtocolBinding` on top of it.

use bitvec::prelude::*;
use std::fmt;
use std::rc::Rc;

use crate::binding::{Beat, HandshakeLines, LaneOrder, ProtocolBinding};
use crate::packet::Packet;
use crate::signal::{Signal, SignalBus, SignalValue};
use crate::Error;

/// How TDATA is exposed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LanePacking {
    /// one `8 * width` bit line
    Packed,
    /// one 8 bit line per lane, `tdata[i]`
    PerLane,
}

/// How TKEEP is exposed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeepEncoding {
    /// one bit per lane in a single line
    Packed,
    /// one single bit line per lane, `tkeep[i]`
    PerLane,
    /// one-hot marker of the last valid lane; lanes up to it are valid
    FirstFree,
}

/// The lines of an AXI-Stream port, named `<name>_tdata`, `<name>_tvalid`
/// and so on.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisInterface {
    name: String,
    width: usize,
    packing: LanePacking,
    tdata: Vec<Signal>,
    handshake: HandshakeLines,
    tlast: Option<Signal>,
    tkeep: Option<(KeepEncoding, Vec<Signal>)>,
    tuser: Option<Signal>,
}

impl AxisInterface {
    /// TDATA and TVALID only; `width` is in bytes.
    pub fn new(name: &str, width: usize) -> Result<Self, Error> {
        if width == 0 {
            return Err(Error::InvalidArgument(format!(
                "{}: lane width must be positive",
                name
            )));
        }
        Ok(Self {
            name: name.to_owned(),
            width,
            packing: LanePacking::Packed,
            tdata: vec![Signal::new(format!("{}_tdata", name), width * 8)],
            handshake: HandshakeLines::new(Signal::bit(format!("{}_tvalid", name)), None),
            tlast: None,
            tkeep: None,
            tuser: None,
        })
    }

    /// TDATA, TVALID, TREADY, TLAST and a packed TKEEP.
    pub fn full(name: &str, width: usize) -> Result<Self, Error> {
        Ok(Self::new(name, width)?
            .with_ready()
            .with_last()
            .with_keep(KeepEncoding::Packed))
    }

    pub fn with_packing(mut self, packing: LanePacking) -> Self {
        self.packing = packing;
        self.tdata = match packing {
            LanePacking::Packed => vec![Signal::new(format!("{}_tdata", self.name), self.width * 8)],
            LanePacking::PerLane => Signal::lanes(&format!("{}_tdata", self.name), self.width, 8),
        };
        self
    }

    pub fn with_ready(mut self) -> Self {
        self.handshake.ready = Some(Signal::bit(format!("{}_tready", self.name)));
        self
    }

    pub fn with_last(mut self) -> Self {
        self.tlast = Some(Signal::bit(format!("{}_tlast", self.name)));
        self
    }

    pub fn with_keep(mut self, encoding: KeepEncoding) -> Self {
        let base = format!("{}_tkeep", self.name);
        let lines = match encoding {
            KeepEncoding::Packed | KeepEncoding::FirstFree => vec![Signal::new(base, self.width)],
            KeepEncoding::PerLane => Signal::lanes(&base, self.width, 1),
        };
        self.tkeep = Some((encoding, lines));
        self
    }

    /// A side channel of `bits` bits.
    pub fn with_user(mut self, bits: usize) -> Self {
        self.tuser = Some(Signal::new(format!("{}_tuser", self.name), bits));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn packing(&self) -> LanePacking {
        self.packing
    }

    pub fn keep_encoding(&self) -> Option<KeepEncoding> {
        self.tkeep.as_ref().map(|(encoding, _)| *encoding)
    }

    pub fn tvalid(&self) -> &Signal {
        &self.handshake.valid
    }

    pub fn tready(&self) -> Option<&Signal> {
        self.handshake.ready.as_ref()
    }

    pub fn tlast(&self) -> Option<&Signal> {
        self.tlast.as_ref()
    }

    pub fn tuser(&self) -> Option<&Signal> {
        self.tuser.as_ref()
    }

    /// Every line of the port, for declaring them on a bus.
    pub fn signals(&self) -> Vec<Signal> {
        let mut signals = self.tdata.clone();
        signals.push(self.handshake.valid.clone());
        signals.extend(self.handshake.ready.iter().cloned());
        signals.extend(self.tlast.iter().cloned());
        if let Some((_, lines)) = &self.tkeep {
            signals.extend(lines.iter().cloned());
        }
        signals.extend(self.tuser.iter().cloned());
        signals
    }
}

impl fmt::Display for AxisInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes, {:?})", self.name, self.width, self.packing)
    }
}

pub type EndOfPacketHook = Rc<dyn Fn(&dyn SignalBus) -> Result<bool, Error>>;
/// Returns the valid lanes of the current beat, lane 0 in bit 0.
pub type KeepHook = Rc<dyn Fn(&dyn SignalBus) -> Result<SignalValue, Error>>;

/// The AXI-Stream `ProtocolBinding`.
#[derive(Clone)]
pub struct AxisBinding {
    interface: AxisInterface,
    lane_order: LaneOrder,
    end_of_packet: Option<EndOfPacketHook>,
    keep: Option<KeepHook>,
}

impl fmt::Debug for AxisBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisBinding")
            .field("interface", &self.interface)
            .field("lane_order", &self.lane_order)
            .field("end_of_packet", &self.end_of_packet.is_some())
            .field("keep", &self.keep.is_some())
            .finish()
    }
}

pub struct AxisBindingBuilder {
    binding: AxisBinding,
}

impl AxisBindingBuilder {
    pub fn lane_order(mut self, lane_order: LaneOrder) -> Self {
        self.binding.lane_order = lane_order;
        self
    }

    /// Decides the end of a packet when the port has no TLAST.
    pub fn end_of_packet<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn SignalBus) -> Result<bool, Error> + 'static,
    {
        self.binding.end_of_packet = Some(Rc::new(hook));
        self
    }

    /// Decides the valid lanes when the port has no TKEEP.
    pub fn keep<F>(mut self, hook: F) -> Self
    where
        F: Fn(&dyn SignalBus) -> Result<SignalValue, Error> + 'static,
    {
        self.binding.keep = Some(Rc::new(hook));
        self
    }

    /// Treats every lane of every beat as valid.
    pub fn assume_full_lanes(self) -> Self {
        let width = self.binding.interface.width;
        self.keep(move |_| Ok(SignalValue::from_bits(BitVec::repeat(true, width))))
    }

    pub fn build(self) -> AxisBinding {
        self.binding
    }
}

impl AxisBinding {
    pub fn new(interface: AxisInterface) -> Self {
        Self::builder(interface).build()
    }

    pub fn builder(interface: AxisInterface) -> AxisBindingBuilder {
        AxisBindingBuilder {
            binding: AxisBinding {
                interface,
                lane_order: LaneOrder::default(),
                end_of_packet: None,
                keep: None,
            },
        }
    }

    pub fn port(&self) -> &AxisInterface {
        &self.interface
    }

    fn mirrored(&self) -> bool {
        self.lane_order == LaneOrder::FirstByteHighest
    }

    // Lanes carrying payload on the given beat.
    fn kept_lanes(&self, packet: &Packet, last: bool) -> usize {
        let width = self.interface.width;
        if !last {
            width
        } else if packet.is_empty() {
            0
        } else {
            match packet.size() % width {
                0 => width,
                rest => rest,
            }
        }
    }

    fn encode_keep(&self, kept: usize, encoding: KeepEncoding) -> BitVec<u8, Lsb0> {
        let width = self.interface.width;
        let mut mask = BitVec::<u8, Lsb0>::repeat(false, width);
        match encoding {
            KeepEncoding::Packed | KeepEncoding::PerLane => mask[..kept].fill(true),
            KeepEncoding::FirstFree => {
                if kept > 0 {
                    mask.set(kept - 1, true);
                }
            }
        }
        if self.mirrored() {
            mask.reverse();
        }
        mask
    }

    fn read_keep(&self, bus: &dyn SignalBus) -> Result<BitVec<u8, Lsb0>, Error> {
        let width = self.interface.width;
        let (encoding, lines) = match &self.interface.tkeep {
            Some(keep) => keep,
            None => {
                let hook = self.keep.as_ref().ok_or_else(|| Error::MissingHook {
                    interface: self.interface.name.clone(),
                    hook: "tkeep",
                })?;
                let mut mask = hook(bus)?.bits().to_bitvec();
                mask.resize(width, false);
                return Ok(mask);
            }
        };
        let mut raw = match encoding {
            KeepEncoding::Packed | KeepEncoding::FirstFree => bus.read(&lines[0])?.bits().to_bitvec(),
            KeepEncoding::PerLane => lines
                .iter()
                .map(|line| bus.read_bool(line))
                .collect::<Result<BitVec<u8, Lsb0>, Error>>()?,
        };
        raw.resize(width, false);
        if self.mirrored() {
            raw.reverse();
        }
        if *encoding == KeepEncoding::FirstFree {
            let mut mask = BitVec::<u8, Lsb0>::repeat(false, width);
            if let Some(last_lane) = raw.last_one() {
                mask[..=last_lane].fill(true);
            }
            return Ok(mask);
        }
        Ok(raw)
    }

    fn read_lanes(&self, bus: &dyn SignalBus) -> Result<Vec<u8>, Error> {
        let mut bytes = match self.interface.packing {
            LanePacking::Packed => bus.read(&self.interface.tdata[0])?.to_bytes(),
            LanePacking::PerLane => self
                .interface
                .tdata
                .iter()
                .map(|lane| -> Result<u8, Error> { Ok(bus.read_u64(lane)? as u8) })
                .collect::<Result<Vec<_>, Error>>()?,
        };
        bytes.resize(self.interface.width, 0);
        if self.mirrored() {
            bytes.reverse();
        }
        Ok(bytes)
    }
}

impl ProtocolBinding for AxisBinding {
    fn interface(&self) -> &str {
        &self.interface.name
    }

    fn lane_width(&self) -> usize {
        self.interface.width
    }

    fn lane_order(&self) -> LaneOrder {
        self.lane_order
    }

    fn handshake(&self) -> &HandshakeLines {
        &self.interface.handshake
    }

    fn drive_beat(
        &self,
        bus: &mut dyn SignalBus,
        packet: &Packet,
        last: bool,
        index: usize,
    ) -> Result<(), Error> {
        let width = self.interface.width;
        let mut bytes = packet.beat_bytes(index, width);
        if self.mirrored() {
            bytes.reverse();
        }
        match self.interface.packing {
            LanePacking::Packed => {
                bus.write(&self.interface.tdata[0], SignalValue::from_bytes(&bytes, width * 8))?
            }
            LanePacking::PerLane => {
                for (lane, byte) in self.interface.tdata.iter().zip(bytes) {
                    bus.write_u64(lane, byte as u64)?;
                }
            }
        }

        if let Some((encoding, lines)) = &self.interface.tkeep {
            let mask = self.encode_keep(self.kept_lanes(packet, last), *encoding);
            match encoding {
                KeepEncoding::Packed | KeepEncoding::FirstFree => {
                    bus.write(&lines[0], SignalValue::from_bits(mask))?
                }
                KeepEncoding::PerLane => {
                    for (line, kept) in lines.iter().zip(mask.iter()) {
                        bus.write_bool(line, *kept)?;
                    }
                }
            }
        }
        if let Some(tlast) = &self.interface.tlast {
            bus.write_bool(tlast, last)?;
        }
        if let Some(tuser) = &self.interface.tuser {
            bus.write_u64(tuser, packet.first_user())?;
        }
        Ok(())
    }

    fn drive_idle(&self, bus: &mut dyn SignalBus) -> Result<(), Error> {
        if let Some(tlast) = &self.interface.tlast {
            bus.write_bool(tlast, false)?;
        }
        Ok(())
    }

    fn decode_beat(&self, bus: &dyn SignalBus) -> Result<Beat, Error> {
        let keep = self.read_keep(bus)?;
        let mut bytes = self.read_lanes(bus)?;
        for (byte, kept) in bytes.iter_mut().zip(keep.iter()) {
            if !*kept {
                *byte = 0;
            }
        }
        let user = match &self.interface.tuser {
            Some(tuser) => Some(bus.read_u64(tuser)?),
            None => None,
        };
        Ok(Beat {
            data: SignalValue::from_bytes(&bytes, self.interface.width * 8),
            valid_bytes: keep.count_ones(),
            user,
        })
    }

    fn is_end_of_packet(&self, bus: &dyn SignalBus) -> Result<bool, Error> {
        match (&self.interface.tlast, &self.end_of_packet) {
            (Some(tlast), _) => bus.read_bool(tlast),
            (None, Some(hook)) => hook(bus),
            (None, None) => Err(Error::MissingHook {
                interface: self.interface.name.clone(),
                hook: "tlast",
            }),
        }
    }

    fn check_monitor_hooks(&self) -> Result<(), Error> {
        if self.interface.tlast.is_none() && self.end_of_packet.is_none() {
            return Err(Error::MissingHook {
                interface: self.interface.name.clone(),
                hook: "tlast",
            });
        }
        if self.interface.tkeep.is_none() && self.keep.is_none() {
            return Err(Error::MissingHook {
                interface: self.interface.name.clone(),
                hook: "tkeep",
            });
        }
        Ok(())
    }
}
