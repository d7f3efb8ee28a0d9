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

use rand::Rng;
use rand_core::RngCore;

use crate::config::{FlowControlMode, ReadyValidConfig};

/// Decides the VALID level a driver presents on the next tick.
///
/// Tracks the level it last produced, so the random policy can hold a value
/// without reading it back from the bus.
pub struct ValidFlow {
    mode: FlowControlMode,
    low_limit: usize,
    high_limit: usize,
    countdown: usize,
    level: bool,
    rng: Box<dyn RngCore>,
}

impl ValidFlow {
    pub fn new(config: &ReadyValidConfig) -> Self {
        Self::with_rng(config, config.rng())
    }

    pub fn with_rng(config: &ReadyValidConfig, rng: Box<dyn RngCore>) -> Self {
        Self {
            mode: config.flow_ctrl_mode,
            low_limit: config.valid_low_limit,
            high_limit: config.valid_high_limit,
            countdown: 0,
            level: false,
            rng,
        }
    }

    /// VALID goes high at the start of every packet.
    pub fn assert_valid(&mut self) {
        self.level = true;
    }

    pub fn deassert(&mut self) {
        self.level = false;
    }

    pub fn level(&self) -> bool {
        self.level
    }

    /// The level for the next tick given whether the beat on the elapsed tick
    /// was accepted.
    pub fn next_valid(&mut self, completed: bool) -> bool {
        self.level = match self.mode {
            FlowControlMode::AlwaysOn => true,
            FlowControlMode::OneValidOneNonvalid => !completed,
            FlowControlMode::Random => self.next_random(completed),
        };
        self.level
    }

    fn next_random(&mut self, completed: bool) -> bool {
        if completed {
            if self.countdown > 0 {
                self.countdown -= 1;
            } else {
                self.countdown = self.rng.gen_range(1..=self.low_limit.max(1));
            }
            false
        } else if !self.level {
            if self.countdown > 0 {
                self.countdown -= 1;
                false
            } else {
                self.countdown = self.rng.gen_range(1..=self.high_limit.max(1));
                true
            }
        } else {
            self.level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_on() {
        let mut flow = ValidFlow::new(&ReadyValidConfig::default());
        flow.assert_valid();
        assert!(flow.next_valid(false));
        assert!(flow.next_valid(true));
    }

    #[test]
    fn test_one_valid_one_nonvalid() {
        let mut flow = ValidFlow::new(&ReadyValidConfig::with_mode(
            FlowControlMode::OneValidOneNonvalid,
        ));
        flow.assert_valid();
        assert!(flow.next_valid(false));
        assert!(!flow.next_valid(true));
        assert!(flow.next_valid(false));
    }

    #[test]
    fn test_random_stays_low_after_completion() {
        let config = ReadyValidConfig {
            flow_ctrl_mode: FlowControlMode::Random,
            valid_low_limit: 4,
            valid_high_limit: 3,
            ..Default::default()
        };
        let mut flow = ValidFlow::new(&config);
        flow.assert_valid();
        // holds high until the beat is taken
        assert!(flow.next_valid(false));
        assert!(flow.next_valid(false));
        assert!(!flow.next_valid(true));

        // low for at most low_limit further ticks, then high again
        let mut low_ticks = 0;
        while !flow.next_valid(false) {
            low_ticks += 1;
            assert!(low_ticks <= 4);
        }
        assert!(flow.level());
    }
}
