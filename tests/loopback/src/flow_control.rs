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

//! Random flow control on both sides of the FIFO must not change the
//! delivered packets, in either lane order.

use rvstream::{DelaySpec, FlowControlMode, ReadyValidConfig, SizeSpec, Watchdog};
use rvstream::{Failure, KeepEncoding, LaneOrder, LanePacking};

use crate::harness::{Loopback, LoopbackOptions};

fn random(seed: u64) -> ReadyValidConfig {
    ReadyValidConfig {
        valid_low_limit: 3,
        valid_high_limit: 5,
        backpressure_min_delay: 1,
        backpressure_max_delay: 6,
        ready_burst_min: 2,
        ready_burst_max: 8,
        seed,
        ..ReadyValidConfig::with_mode(FlowControlMode::Random)
    }
}

pub fn options(trace: bool) -> LoopbackOptions {
    LoopbackOptions {
        driver: random(1),
        ready: random(2),
        trace,
        ..Default::default()
    }
}

/// The same traffic with the most significant lane first, one TDATA line per
/// lane and a first-free TKEEP.
pub fn mirrored_options(trace: bool) -> LoopbackOptions {
    LoopbackOptions {
        packing: LanePacking::PerLane,
        keep: KeepEncoding::FirstFree,
        lane_order: LaneOrder::FirstByteHighest,
        ..options(trace)
    }
}

/// Sends `count` packets through the loopback and checks them in order.
/// Returns the number of ticks it took.
pub fn run_flow_control(options: &LoopbackOptions, count: usize, seed: u64) -> Result<usize, Failure> {
    let mut env = Loopback::build(options)?;
    for packet in Loopback::stimulus(count, SizeSpec::Small, DelaySpec::Short, seed)? {
        env.send_expected(packet);
    }
    env.check(Watchdog::default(), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_flow_control() {
        let _ = env_logger::try_init();
        let ticks = run_flow_control(&options(false), 40, 7).unwrap();
        log::info!("Random flow control took {} ticks", ticks);
        assert!(ticks > 0);
    }

    #[test]
    fn test_mirrored_lanes() {
        let _ = env_logger::try_init();
        run_flow_control(&mirrored_options(false), 25, 11).unwrap();
    }

    #[test]
    fn test_back_to_back() {
        let _ = env_logger::try_init();
        let fast = LoopbackOptions::default();
        let slow = options(false);
        let fast_ticks = run_flow_control(&fast, 20, 3).unwrap();
        let slow_ticks = run_flow_control(&slow, 20, 3).unwrap();
        assert!(fast_ticks < slow_ticks);
    }
}
