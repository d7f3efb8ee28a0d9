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

//! The scoreboard must catch what the loopback breaks: a corrupted payload
//! and a reordered prediction.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use rvstream::{CorruptPattern, CorruptTarget, DelaySpec, SizeSpec, Watchdog};
use rvstream::{Error, Failure};

use crate::harness::{Loopback, LoopbackOptions};

/// Flips one bit of packet `victim` on its way to the driver; the predictor
/// sees the original. Returns the comparison result and the corrupted
/// position.
pub fn run_corruption(
    options: &LoopbackOptions,
    count: usize,
    victim: usize,
    seed: u64,
) -> Result<(Result<usize, Failure>, usize), Error> {
    let mut env = Loopback::build(options)?;
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    let mut position = 0;
    for (i, packet) in Loopback::stimulus(count, SizeSpec::Small, DelaySpec::NoDelay, seed)?
        .into_iter()
        .enumerate()
    {
        if i != victim {
            env.send_expected(packet);
            continue;
        }
        let mut corrupted = packet.clone();
        let applied = corrupted.corrupt(
            CorruptTarget::Count(1),
            None,
            CorruptPattern::BitError,
            &mut rng,
        )?;
        position = applied[0].0;
        log::info!("Corrupting {} at byte {}", packet.name, position);
        env.predictor.push(packet);
        env.send(corrupted);
    }
    Ok((env.check(Watchdog::default(), true), position))
}

/// Predicts the stimulus in reverse order and compares either way.
pub fn run_reordered(options: &LoopbackOptions, count: usize, ordered: bool, seed: u64) -> Result<usize, Failure> {
    let mut env = Loopback::build(options)?;
    let packets = Loopback::stimulus(count, SizeSpec::Medium, DelaySpec::Short, seed)?;
    for packet in packets.iter().rev() {
        env.predictor.push(packet.clone());
    }
    for packet in packets {
        env.send(packet);
    }
    env.check(Watchdog::default(), ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvstream::Mismatch;

    #[test]
    fn test_corruption_is_detected() {
        let _ = env_logger::try_init();
        let (result, position) = run_corruption(&LoopbackOptions::default(), 6, 3, 5).unwrap();
        match result {
            Err(Failure::ContentMismatch {
                index,
                mismatch: Mismatch::Content { diffs, .. },
            }) => {
                assert_eq!(index, 3);
                assert_eq!(diffs.len(), 1);
                assert_eq!(diffs[0].index, position);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_no_corruption_passes() {
        let _ = env_logger::try_init();
        let (result, _) = run_corruption(&LoopbackOptions::default(), 4, 4, 5).unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_reordered_prediction() {
        let _ = env_logger::try_init();
        let options = LoopbackOptions::default();
        assert!(matches!(
            run_reordered(&options, 5, true, 9),
            Err(Failure::ContentMismatch { index: 0, .. })
        ));
        run_reordered(&options, 5, false, 9).unwrap();
    }
}
