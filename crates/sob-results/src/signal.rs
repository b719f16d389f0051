//! Named time series handed from extraction to reduction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known signal names.
pub mod names {
    /// Impactor displacement along its travel axis.
    pub const INTRUSION: &str = "intrusion";
    /// Normal impactor wall force.
    pub const IMPACT_FORCE: &str = "impact_force";
    /// Structural mass in kg, a single sample at t = 0.
    pub const MASS: &str = "mass";
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    pub v: f64,
}

/// One persisted line of `signals.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub name: String,
    pub samples: Vec<Sample>,
}

/// Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSet {
    signals: BTreeMap<String, Vec<Sample>>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, samples: Vec<Sample>) {
        self.signals.insert(name.into(), samples);
    }

    pub fn with(mut self, name: impl Into<String>, samples: Vec<Sample>) -> Self {
        self.insert(name, samples);
        self
    }

    pub fn get(&self, name: &str) -> Option<&[Sample]> {
        self.signals.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn to_records(&self) -> Vec<SignalRecord> {
        self.signals
            .iter()
            .map(|(name, samples)| SignalRecord {
                name: name.clone(),
                samples: samples.clone(),
            })
            .collect()
    }

    pub fn from_records(records: impl IntoIterator<Item = SignalRecord>) -> Self {
        Self {
            signals: records.into_iter().map(|r| (r.name, r.samples)).collect(),
        }
    }
}

/// Zip a time axis with values.
pub fn samples(time: &[f64], values: &[f64]) -> Vec<Sample> {
    time.iter()
        .zip(values)
        .map(|(&t, &v)| Sample { t, v })
        .collect()
}

/// Time derivative: central differences inside, one-sided at the ends.
pub fn gradient(samples: &[Sample]) -> Vec<Sample> {
    let n = samples.len();
    if n < 2 {
        return samples.iter().map(|s| Sample { t: s.t, v: 0.0 }).collect();
    }
    let slope = |a: &Sample, b: &Sample| {
        let dt = b.t - a.t;
        if dt == 0.0 { 0.0 } else { (b.v - a.v) / dt }
    };
    (0..n)
        .map(|i| {
            let v = match i {
                0 => slope(&samples[0], &samples[1]),
                i if i == n - 1 => slope(&samples[n - 2], &samples[n - 1]),
                i => slope(&samples[i - 1], &samples[i + 1]),
            };
            Sample { t: samples[i].t, v }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_of_quadratic() {
        let s: Vec<Sample> = (0..5)
            .map(|i| {
                let t = i as f64;
                Sample { t, v: t * t }
            })
            .collect();
        let d = gradient(&s);
        assert_eq!(d[0].v, 1.0);
        assert_eq!(d[2].v, 4.0);
        assert_eq!(d[4].v, 7.0);
    }

    #[test]
    fn records_round_trip_names() {
        let set = SignalSet::new()
            .with("b", vec![Sample { t: 0.0, v: 1.0 }])
            .with("a", vec![]);
        let back = SignalSet::from_records(set.to_records());
        assert_eq!(back, set);
        assert_eq!(back.names().collect::<Vec<_>>(), ["a", "b"]);
    }
}
