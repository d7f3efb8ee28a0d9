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

//! The seam between the generic handshake engine and a concrete protocol.
//!
//! The driver and monitor own the VALID/READY handshake and the beat loop;
//! everything that depends on how bytes sit on the wire goes through a
//! `ProtocolBinding`.

use crate::packet::Packet;
use crate::signal::{Signal, SignalBus, SignalValue};
use crate::Error;

/// Where the first byte of a beat sits on the data lanes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LaneOrder {
    /// byte 0 on lane 0 (the least significant byte)
    FirstByteLowest,
    /// byte 0 on the highest lane; data and keep are mirrored
    FirstByteHighest,
}

impl Default for LaneOrder {
    fn default() -> Self {
        LaneOrder::FirstByteLowest
    }
}

/// One accepted beat as seen by a monitor.
#[derive(Clone, Debug, PartialEq)]
pub struct Beat {
    /// lane word with invalid lanes zeroed, byte 0 in the low lane
    pub data: SignalValue,
    pub valid_bytes: usize,
    pub user: Option<u64>,
}

/// The VALID line and the optional READY line of an interface.
#[derive(Clone, Debug, PartialEq)]
pub struct HandshakeLines {
    pub valid: Signal,
    pub ready: Option<Signal>,
}

impl HandshakeLines {
    pub fn new(valid: Signal, ready: Option<Signal>) -> Self {
        Self { valid, ready }
    }

    /// A beat was transferred on the current tick: VALID is high, and READY
    /// too when the interface has one.
    pub fn completed(&self, bus: &dyn SignalBus) -> Result<bool, Error> {
        if !bus.read_bool(&self.valid)? {
            return Ok(false);
        }
        match &self.ready {
            Some(ready) => bus.read_bool(ready),
            None => Ok(true),
        }
    }
}

pub trait ProtocolBinding {
    /// Name of the interface, used for logging and endpoint checks.
    fn interface(&self) -> &str;

    /// Bytes per beat.
    fn lane_width(&self) -> usize;

    fn lane_order(&self) -> LaneOrder;

    fn handshake(&self) -> &HandshakeLines;

    fn beat_count(&self, packet: &Packet) -> usize {
        packet.beat_count(self.lane_width())
    }

    /// Drives payload and side channels of beat `index`; VALID belongs to
    /// the driver.
    fn drive_beat(
        &self,
        bus: &mut dyn SignalBus,
        packet: &Packet,
        last: bool,
        index: usize,
    ) -> Result<(), Error>;

    /// Deasserts the end-of-packet marker once a packet is done.
    fn drive_idle(&self, bus: &mut dyn SignalBus) -> Result<(), Error>;

    fn decode_beat(&self, bus: &dyn SignalBus) -> Result<Beat, Error>;

    fn is_end_of_packet(&self, bus: &dyn SignalBus) -> Result<bool, Error>;

    /// Rebuilds a packet from the beats of one transfer. The side-channel
    /// value of the final beat becomes the packet's user value.
    fn assemble(&self, name: String, beats: &[Beat], size: usize) -> Result<Packet, Error> {
        let words = beats.iter().map(|beat| beat.data.clone()).collect::<Vec<_>>();
        let mut packet = Packet::from_words(name, &words, size, self.lane_width())?;
        packet.user = beats.last().and_then(|beat| beat.user).into_iter().collect();
        Ok(packet)
    }

    /// Fails when the monitor could not tell where packets end or which
    /// lanes are valid.
    fn check_monitor_hooks(&self) -> Result<(), Error> {
        Ok(())
    }
}
