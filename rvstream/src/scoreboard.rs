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

//! Scoreboard: a predictor turns stimulus into expected packets, a
//! comparator checks what a monitor observed against them.

use std::collections::{HashMap, VecDeque};

use crate::monitor::AnalysisPort;
use crate::packet::{DumpFormat, Packet};
use crate::Failure;

/// Maps one input packet to the packets the design should produce for it.
pub trait PredictRule {
    fn predict(&mut self, packet: &Packet) -> Vec<Packet> {
        vec![packet.clone()]
    }
}

/// The design forwards packets unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl PredictRule for Passthrough {}

impl<F> PredictRule for F
where
    F: FnMut(&Packet) -> Vec<Packet>,
{
    fn predict(&mut self, packet: &Packet) -> Vec<Packet> {
        self(packet)
    }
}

pub struct Predictor<R: PredictRule = Passthrough> {
    name: String,
    input: VecDeque<Packet>,
    output: AnalysisPort,
    rule: R,
}

impl Predictor<Passthrough> {
    pub fn passthrough(name: &str) -> Self {
        Self::new(name, Passthrough)
    }
}

impl<R: PredictRule> Predictor<R> {
    pub fn new(name: &str, rule: R) -> Self {
        Self {
            name: name.to_owned(),
            input: VecDeque::new(),
            output: AnalysisPort::new(),
            rule,
        }
    }

    /// Writes predictions into `output`, typically a comparator's expected
    /// port.
    pub fn with_port(mut self, output: AnalysisPort) -> Self {
        self.output = output;
        self
    }

    pub fn port(&self) -> AnalysisPort {
        self.output.clone()
    }

    pub fn push(&mut self, packet: Packet) {
        self.input.push_back(packet);
    }

    /// Applies the rule to every queued input packet, returning how many
    /// expected packets were produced.
    pub fn predict(&mut self) -> usize {
        let mut produced = 0;
        while let Some(packet) = self.input.pop_front() {
            for expected in self.rule.predict(&packet) {
                self.output.write(expected);
                produced += 1;
            }
        }
        log::debug!("{}: predicted {} packets", self.name, produced);
        produced
    }
}

fn report_content(index: usize, expected: &Packet, observed: &Packet) {
    let format = DumpFormat::default();
    log::error!(
        "packets at position {} differ\n{}\n{}",
        index,
        expected.dump(&format),
        observed.dump(&format)
    );
}

/// Checks `observed` against `expected` position by position.
pub fn compare_ordered(expected: &[Packet], observed: &[Packet]) -> Result<(), Failure> {
    if expected.len() != observed.len() {
        let failure = Failure::CountMismatch {
            expected: expected.len(),
            observed: observed.len(),
        };
        log::error!("{}", failure);
        return Err(failure);
    }
    for (index, (prd, out)) in expected.iter().zip(observed.iter()).enumerate() {
        if let Err(mismatch) = prd.compare(out) {
            report_content(index, prd, out);
            return Err(Failure::ContentMismatch { index, mismatch });
        }
    }
    Ok(())
}

/// Checks that every observed packet matches a distinct expected one,
/// regardless of order.
///
/// Expected packets are bucketed by content hash; a match within a bucket is
/// confirmed byte by byte and consumed. Expected packets that were never
/// observed are not reported.
pub fn compare_unordered(expected: &[Packet], observed: &[Packet]) -> Result<(), Failure> {
    let mut buckets: HashMap<u32, Vec<&Packet>> = HashMap::new();
    for packet in expected {
        buckets.entry(packet.content_hash()).or_default().push(packet);
    }
    for (index, packet) in observed.iter().enumerate() {
        let candidates = buckets.entry(packet.content_hash()).or_default();
        match candidates.iter().position(|candidate| *candidate == packet) {
            Some(position) => {
                candidates.swap_remove(position);
            }
            None => {
                let failure = Failure::MissingPrediction {
                    index,
                    observed: packet.name.clone(),
                };
                log::error!("{}\n{}", failure, packet.dump(&DumpFormat::default()));
                return Err(failure);
            }
        }
    }
    Ok(())
}

/// Owns the expected and observed ports of one check.
pub struct Comparator {
    name: String,
    expected: AnalysisPort,
    observed: AnalysisPort,
}

impl Comparator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            expected: AnalysisPort::new(),
            observed: AnalysisPort::new(),
        }
    }

    /// Compares the given ports, e.g. a predictor's and a monitor's.
    pub fn with_ports(name: &str, expected: AnalysisPort, observed: AnalysisPort) -> Self {
        Self {
            name: name.to_owned(),
            expected,
            observed,
        }
    }

    pub fn expected(&self) -> AnalysisPort {
        self.expected.clone()
    }

    pub fn observed(&self) -> AnalysisPort {
        self.observed.clone()
    }

    pub fn log_statistics(&self) {
        let expected = self.expected.snapshot();
        let observed = self.observed.snapshot();
        log::info!("[{}] STATISTIC:", self.name);
        log::info!("\tNum of prd tnx: {}", expected.len());
        for packet in &expected {
            log::info!("\t{} : {}", packet.name, packet.size());
        }
        log::info!("\tNum of out tnx: {}", observed.len());
        for packet in &observed {
            log::info!("\t{} : {}", packet.name, packet.size());
        }
    }

    pub fn compare_ordered(&self) -> Result<(), Failure> {
        self.log_statistics();
        compare_ordered(&self.expected.snapshot(), &self.observed.snapshot())?;
        log::info!("[{}] Packets are equal.", self.name);
        Ok(())
    }

    pub fn compare_unordered(&self) -> Result<(), Failure> {
        self.log_statistics();
        compare_unordered(&self.expected.snapshot(), &self.observed.snapshot())?;
        log::info!("[{}] Packets are equal.", self.name);
        Ok(())
    }

    pub fn compare(&self, ordered: bool) -> Result<(), Failure> {
        if ordered {
            self.compare_ordered()
        } else {
            self.compare_unordered()
        }
    }
}
