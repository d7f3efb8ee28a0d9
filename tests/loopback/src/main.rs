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

use crate::checks::{run_corruption, run_reordered};
use crate::dropped::run_dropped;
use crate::flow_control::{mirrored_options, options, run_flow_control};
use crate::harness::LoopbackOptions;

mod checks;
mod dropped;
mod fifo;
mod flow_control;
mod harness;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let trace = std::env::var_os("RVSTREAM_VCD").is_some();

    let ticks = run_flow_control(&options(trace), 100, 1)?;
    log::info!("Random flow control: {} ticks", ticks);
    let ticks = run_flow_control(&mirrored_options(trace), 100, 2)?;
    log::info!("Mirrored lanes: {} ticks", ticks);

    let (result, position) = run_corruption(&LoopbackOptions::default(), 10, 4, 3)?;
    log::info!("Corruption at byte {}: {:?}", position, result.err());

    log::info!(
        "Reordered: ordered {:?}, unordered {:?}",
        run_reordered(&LoopbackOptions::default(), 10, true, 4).err(),
        run_reordered(&LoopbackOptions::default(), 10, false, 4)?
    );

    log::info!("Dropped: {:?}", run_dropped(30, 5, 10000, 5).err());
    Ok(())
}
