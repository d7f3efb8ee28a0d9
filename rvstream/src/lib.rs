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

mod axis;
mod binding;
mod config;
mod driver;
mod error;
mod flow;
mod monitor;
pub mod packet;
mod responder;
mod scoreboard;
mod signal;
mod sim;
mod vcd;

// Public types
// type to use for clock ticks
pub type Tick = usize;

pub use crate::axis::{AxisBinding, AxisBindingBuilder, AxisInterface};
pub use crate::axis::{KeepEncoding, LanePacking};
pub use crate::binding::{Beat, HandshakeLines, LaneOrder, ProtocolBinding};
pub use crate::config::{FlowControlMode, ReadyValidConfig, DEFAULT_SEED};
pub use crate::driver::ReadyValidDriver;
pub use crate::error::{Error, Failure};
pub use crate::flow::ValidFlow;
pub use crate::monitor::{AnalysisPort, FieldMonitor, ReadyValidMonitor};
pub use crate::packet::{CorruptPattern, CorruptTarget, DelaySpec, DumpFormat, Pattern, SizeSpec};
pub use crate::packet::{ByteDiff, Mismatch, Packet};
pub use crate::responder::ReadyController;
pub use crate::scoreboard::{compare_ordered, compare_unordered};
pub use crate::scoreboard::{Comparator, Passthrough, PredictRule, Predictor};
pub use crate::signal::{Signal, SignalBus, SignalValue, SimulatedBus};
pub use crate::sim::{Component, Endpoint, Testbench, Watchdog};
pub use crate::sim::{ResetDriver, SignalAssertion};
pub use crate::vcd::VcdTracer;
