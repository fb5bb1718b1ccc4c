//! Parameter metadata collected over matched runs.
//!
//! Observes each matched inspection and publishes per-parameter usage:
//! how often the parameter appeared, whether it looks secret, and up to
//! five sample values. Secret parameters never record samples.

use std::collections::{BTreeMap, BTreeSet};

use super::inspect::RunInspection;
use super::output::ParameterInfo;
use crate::filter::is_likely_secret;

const MAX_SAMPLES: usize = 5;

#[derive(Debug, Default)]
struct ParameterStat {
    count: usize,
    secret: bool,
    samples: BTreeSet<String>,
}

#[derive(Debug)]
pub struct MetadataCollector {
    enabled: bool,
    parameters: BTreeMap<String, ParameterStat>,
    total_runs: usize,
}

impl MetadataCollector {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            parameters: BTreeMap::new(),
            total_runs: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn total_runs(&self) -> usize {
        self.total_runs
    }

    pub fn observe(&mut self, inspection: &RunInspection) {
        if !self.enabled {
            return;
        }

        self.total_runs += 1;
        for (name, value) in &inspection.parameters {
            let stat = self
                .parameters
                .entry(name.clone())
                .or_insert_with(|| ParameterStat {
                    secret: is_likely_secret(name),
                    ..ParameterStat::default()
                });
            stat.count += 1;
            if stat.secret {
                continue;
            }
            if value.trim().is_empty() {
                continue;
            }
            if stat.samples.len() < MAX_SAMPLES {
                stat.samples.insert(value.clone());
            }
        }
    }

    /// Publishes the observed parameters, alphabetically by name
    /// (case-insensitive), with `frequency = count / total_runs`.
    pub fn parameters(&self) -> Vec<ParameterInfo> {
        let mut params: Vec<ParameterInfo> = self
            .parameters
            .iter()
            .map(|(name, stat)| ParameterInfo {
                name: name.clone(),
                is_secret: stat.secret,
                frequency: if self.total_runs > 0 {
                    stat.count as f64 / self.total_runs as f64
                } else {
                    0.0
                },
                sample_values: if stat.secret {
                    Vec::new()
                } else {
                    stat.samples.iter().cloned().collect()
                },
                ..ParameterInfo::default()
            })
            .collect();
        params.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        params
    }
}
