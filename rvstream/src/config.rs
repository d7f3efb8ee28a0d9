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

use rand::SeedableRng;
use rand_core::RngCore;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::Error;

/// Seed used when a configuration does not name one; runs are reproducible
/// by default.
pub const DEFAULT_SEED: u64 = 0x87654321FEDCBA09;

/// How a VALID or READY line is toggled.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControlMode {
    AlwaysOn,
    /// One tick asserted, one tick deasserted.
    OneValidOneNonvalid,
    /// Bursty runs of assertion and deassertion with bounded random lengths.
    Random,
}

impl Default for FlowControlMode {
    fn default() -> Self {
        FlowControlMode::AlwaysOn
    }
}

/// Flow control parameters for a driver, monitor or ready controller.
///
/// Every component holds its own copy; constructed programmatically or read
/// from a YAML file, with every field optional.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ReadyValidConfig {
    pub flow_ctrl_mode: FlowControlMode,
    /// upper bound of the low run drawn after a completed beat
    pub valid_low_limit: usize,
    /// upper bound of the high run drawn while deasserted
    pub valid_high_limit: usize,
    pub backpressure_min_delay: usize,
    pub backpressure_max_delay: usize,
    pub ready_burst_min: usize,
    pub ready_burst_max: usize,
    pub seed: u64,
}

impl Default for ReadyValidConfig {
    fn default() -> Self {
        Self {
            flow_ctrl_mode: FlowControlMode::AlwaysOn,
            valid_low_limit: 1,
            valid_high_limit: 1,
            backpressure_min_delay: 1,
            backpressure_max_delay: 5,
            ready_burst_min: 1,
            ready_burst_max: 10,
            seed: DEFAULT_SEED,
        }
    }
}

impl ReadyValidConfig {
    pub fn with_mode(flow_ctrl_mode: FlowControlMode) -> Self {
        Self {
            flow_ctrl_mode,
            ..Default::default()
        }
    }

    /// Checks the limits; called by every component constructor.
    pub fn validate(&self) -> Result<(), Error> {
        if self.backpressure_min_delay > self.backpressure_max_delay {
            return Err(Error::InvalidConfig(format!(
                "backpressure_min_delay {} > backpressure_max_delay {}",
                self.backpressure_min_delay, self.backpressure_max_delay
            )));
        }
        if self.ready_burst_min > self.ready_burst_max {
            return Err(Error::InvalidConfig(format!(
                "ready_burst_min {} > ready_burst_max {}",
                self.ready_burst_min, self.ready_burst_max
            )));
        }
        if self.ready_burst_min == 0 {
            return Err(Error::InvalidConfig(
                "ready_burst_min must be at least 1".to_owned(),
            ));
        }
        if self.flow_ctrl_mode == FlowControlMode::Random
            && (self.valid_low_limit == 0 || self.valid_high_limit == 0)
        {
            return Err(Error::InvalidConfig(format!(
                "random flow control draws from [1, limit]; got valid_low_limit {} valid_high_limit {}",
                self.valid_low_limit, self.valid_high_limit
            )));
        }
        Ok(())
    }

    pub fn from_str(config: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(config)
            .map_err(|e| Error::InvalidConfig(format!("{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(file_name: &Path) -> Result<Self, Error> {
        let file = File::open(file_name).map_err(|e| {
            Error::InvalidConfig(format!("{}: {}", file_name.display(), e))
        })?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", file_name.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// A fresh generator seeded from this configuration.
    pub fn rng(&self) -> Box<dyn RngCore> {
        Box::new(Xoshiro256StarStar::seed_from_u64(self.seed))
    }
}
