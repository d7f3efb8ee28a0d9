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

//! A FIFO that swallows packets leaves the scoreboard waiting; the watchdog
//! must end the run and report the shortfall.

use rvstream::{DelaySpec, Failure, SizeSpec, Watchdog};

use crate::harness::{Loopback, LoopbackOptions};

pub fn run_dropped(count: usize, drop_every: usize, limit: usize, seed: u64) -> Result<usize, Failure> {
    let options = LoopbackOptions {
        drop_every: Some(drop_every),
        ..Default::default()
    };
    let mut env = Loopback::build(&options)?;
    for packet in Loopback::stimulus(count, SizeSpec::Small, DelaySpec::Short, seed)? {
        env.send_expected(packet);
    }
    env.check(Watchdog::new(limit), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_reports_dropped_packets() {
        let _ = env_logger::try_init();
        match run_dropped(9, 3, 2000, 13) {
            Err(Failure::WatchdogExpired {
                limit,
                expected,
                observed,
            }) => {
                assert_eq!(limit, 2000);
                assert_eq!(expected, 9);
                assert_eq!(observed, 6);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_nothing_dropped() {
        let _ = env_logger::try_init();
        // every 10th of 9 packets never comes
        run_dropped(9, 10, 2000, 13).unwrap();
    }
}
