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

use std::fmt;

use crate::packet::Mismatch;
use crate::Tick;

/// Errors raised by the harness itself: bad arguments, bad configuration,
/// incomplete protocol bindings and bus access problems.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    InvalidArgument(String),
    InvalidConfig(String),
    /// A binding lacks a hook the monitor needs, e.g., no TLAST line and no
    /// end-of-packet fallback.
    MissingHook {
        interface: String,
        hook: &'static str,
    },
    /// Two endpoints of the same interface disagree on the lane order.
    LaneOrderConflict(String),
    UnknownSignal(String),
    WidthMismatch {
        signal: String,
        expected: usize,
        actual: usize,
    },
    /// A checked signal left its expected value outside of reset.
    SignalAsserted {
        signal: String,
        tick: Tick,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "ERROR: Invalid argument: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "ERROR: Invalid configuration: {}", msg),
            Self::MissingHook { interface, hook } => write!(
                f,
                "ERROR: {} has no {} signal; the {} hook must be supplied by the binding",
                interface, hook, hook
            ),
            Self::LaneOrderConflict(interface) => write!(
                f,
                "ERROR: Endpoints of {} disagree on the lane order",
                interface
            ),
            Self::UnknownSignal(name) => write!(f, "ERROR: Unknown signal {}", name),
            Self::WidthMismatch {
                signal,
                expected,
                actual,
            } => write!(
                f,
                "ERROR: Signal {} is {} bits wide, got a {} bit value",
                signal, expected, actual
            ),
            Self::SignalAsserted { signal, tick } => {
                write!(f, "ERROR: Signal {} was asserted @tick {}", signal, tick)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Test failures: the system under observation misbehaved.
///
/// Kept apart from `Error` so that a harness can tell a broken testbench from
/// a failing design.
#[derive(Clone, Debug, PartialEq)]
pub enum Failure {
    CountMismatch {
        expected: usize,
        observed: usize,
    },
    ContentMismatch {
        /// position of the pair in the compared streams
        index: usize,
        mismatch: Mismatch,
    },
    MissingPrediction {
        index: usize,
        observed: String,
    },
    WatchdogExpired {
        limit: usize,
        expected: usize,
        observed: usize,
    },
    /// The harness broke while the test was running.
    Harness(Error),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::CountMismatch { expected, observed } => write!(
                f,
                "[TEST_FAILED] Number of transactions are not equal: expected {}, observed {}",
                expected, observed
            ),
            Self::ContentMismatch { index, mismatch } => write!(
                f,
                "[TEST_FAILED] Packets at position {} are not equal: {}",
                index, mismatch
            ),
            Self::MissingPrediction { index, observed } => write!(
                f,
                "[TEST_FAILED] There is no predicted packet for {} (observed #{})",
                observed, index
            ),
            Self::WatchdogExpired {
                limit,
                expected,
                observed,
            } => write!(
                f,
                "[TEST_FAILED] Watchdog expired after {} ticks: expected {} packets, observed {}",
                limit, expected, observed
            ),
            Self::Harness(err) => write!(f, "[TEST_FAILED] {}", err),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Harness(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Failure::Harness(err)
    }
}
