//! Signal sets to scalar objectives, via a table of named metrics.

use std::collections::BTreeMap;

use sob_core::UnitSystem;
use uom::si::energy::joule;
use uom::si::force::kilonewton;

use crate::error::{ResultsError, ResultsResult};
use crate::signal::{Sample, SignalSet, names};

/// Intrusion above which `penalized_sea` switches to the penalty branch, mm.
const SEA_INTRUSION_LIMIT: f64 = 60.0;
/// Intrusion above which `penalized_mass` switches to the penalty branch, mm.
const MASS_INTRUSION_LIMIT: f64 = 50.0;
const MASS_PENALTY_BASE: f64 = 4.25952;

/// Per-problem constants the metrics need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionContext {
    pub units: UnitSystem,
    /// Initial impactor gap, subtracted from the peak displacement.
    pub intrusion_offset: f64,
}

impl Default for ReductionContext {
    fn default() -> Self {
        Self {
            units: UnitSystem::KgMmMs,
            intrusion_offset: 0.0,
        }
    }
}

/// What a metric function sees.
pub struct MetricInputs<'a> {
    pub signals: &'a SignalSet,
    pub ctx: &'a ReductionContext,
    /// Signal named in `metric(signal)`, for metrics that accept one.
    pub arg: Option<&'a str>,
}

impl<'a> MetricInputs<'a> {
    /// A present, non-empty signal.
    pub fn signal(&self, name: &str) -> ResultsResult<&'a [Sample]> {
        match self.signals.get(name) {
            None => Err(ResultsError::MissingSignal { name: name.into() }),
            Some([]) => Err(ResultsError::EmptySignal { name: name.into() }),
            Some(s) => Ok(s),
        }
    }

    fn target(&self) -> ResultsResult<&'a [Sample]> {
        self.signal(self.arg.unwrap_or(names::INTRUSION))
    }
}

pub type MetricFn = fn(&MetricInputs<'_>) -> ResultsResult<f64>;

#[derive(Clone, Copy)]
pub struct MetricSpec {
    /// Signals read by the metric (the default target for generic reductions).
    pub signals: &'static [&'static str],
    /// Accepts `metric(signal)`.
    pub takes_signal: bool,
    pub reduce: MetricFn,
}

impl std::fmt::Debug for MetricSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSpec")
            .field("signals", &self.signals)
            .field("takes_signal", &self.takes_signal)
            .finish_non_exhaustive()
    }
}

/// Split `name(arg)` into its parts.
pub fn parse_metric(metric: &str) -> (&str, Option<&str>) {
    let metric = metric.trim();
    match metric.strip_suffix(')').and_then(|m| m.split_once('(')) {
        Some((name, arg)) => (name.trim(), Some(arg.trim())),
        None => (metric, None),
    }
}

#[derive(Debug, Clone)]
pub struct ObjectiveReducer {
    ctx: ReductionContext,
    table: BTreeMap<String, MetricSpec>,
}

impl ObjectiveReducer {
    /// Reducer holding the built-in metrics.
    pub fn new(ctx: ReductionContext) -> Self {
        let table = builtin()
            .into_iter()
            .map(|(name, spec)| (name.to_string(), spec))
            .collect();
        Self { ctx, table }
    }

    pub fn context(&self) -> &ReductionContext {
        &self.ctx
    }

    /// Add or replace a metric.
    pub fn register(&mut self, name: impl Into<String>, spec: MetricSpec) -> Option<MetricSpec> {
        self.table.insert(name.into(), spec)
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    fn lookup<'m>(&self, metric: &'m str) -> ResultsResult<(&MetricSpec, Option<&'m str>)> {
        let (name, arg) = parse_metric(metric);
        let unknown = || ResultsError::UnknownMetric {
            name: metric.to_string(),
        };
        let spec = self.table.get(name).ok_or_else(unknown)?;
        if arg.is_some() && !spec.takes_signal {
            return Err(unknown());
        }
        Ok((spec, arg))
    }

    pub fn is_registered(&self, metric: &str) -> bool {
        self.lookup(metric).is_ok()
    }

    /// Signal names `metric` reads.
    pub fn required_signals(&self, metric: &str) -> ResultsResult<Vec<String>> {
        let (spec, arg) = self.lookup(metric)?;
        Ok(match arg {
            Some(arg) => vec![arg.to_string()],
            None => spec.signals.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn reduce(&self, signals: &SignalSet, metric: &str) -> ResultsResult<f64> {
        let (spec, arg) = self.lookup(metric)?;
        let inputs = MetricInputs {
            signals,
            ctx: &self.ctx,
            arg,
        };
        (spec.reduce)(&inputs)
    }

    pub fn reduce_all(&self, signals: &SignalSet, metrics: &[String]) -> ResultsResult<Vec<f64>> {
        metrics.iter().map(|m| self.reduce(signals, m)).collect()
    }
}

const INTRUSION_ONLY: &[&str] = &[names::INTRUSION];
const CRASH: &[&str] = &[names::INTRUSION, names::IMPACT_FORCE];
const CRASH_AND_MASS: &[&str] = &[names::INTRUSION, names::IMPACT_FORCE, names::MASS];
const MASS_ONLY: &[&str] = &[names::MASS];
const INTRUSION_AND_MASS: &[&str] = &[names::INTRUSION, names::MASS];

fn named(signals: &'static [&'static str], reduce: MetricFn) -> MetricSpec {
    MetricSpec {
        signals,
        takes_signal: false,
        reduce,
    }
}

/// Reductions over one signal, intrusion unless named.
fn generic(reduce: MetricFn) -> MetricSpec {
    MetricSpec {
        signals: INTRUSION_ONLY,
        takes_signal: true,
        reduce,
    }
}

fn builtin() -> Vec<(&'static str, MetricSpec)> {
    vec![
        ("intrusion", named(INTRUSION_ONLY, intrusion)),
        ("mass", named(MASS_ONLY, mass)),
        ("absorbed_energy", named(CRASH, absorbed_energy)),
        ("mean_impact_force", named(CRASH, mean_impact_force)),
        ("max_impact_force", named(CRASH, max_impact_force)),
        ("load_uniformity", named(CRASH, load_uniformity)),
        ("specific_energy_absorbed", named(CRASH_AND_MASS, specific_energy_absorbed)),
        ("penalized_sea", named(CRASH_AND_MASS, penalized_sea)),
        ("penalized_mass", named(INTRUSION_AND_MASS, penalized_mass)),
        ("max_abs", generic(|i| Ok(max_abs(i.target()?)))),
        ("max", generic(|i| Ok(fold(i.target()?, f64::NEG_INFINITY, f64::max)))),
        ("min", generic(|i| Ok(fold(i.target()?, f64::INFINITY, f64::min)))),
        ("mean", generic(|i| Ok(mean(i.target()?.iter().map(|s| s.v))))),
        ("final_value", generic(|i| Ok(i.target()?.last().map_or(0.0, |s| s.v)))),
        ("integral", generic(|i| Ok(integral(i.target()?)))),
    ]
}

fn max_abs(s: &[Sample]) -> f64 {
    fold(s, 0.0, |acc, v| acc.max(v.abs()))
}

fn fold(s: &[Sample], init: f64, f: impl Fn(f64, f64) -> f64) -> f64 {
    s.iter().map(|x| x.v).fold(init, f)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Trapezoid rule over time.
fn integral(s: &[Sample]) -> f64 {
    s.windows(2)
        .map(|w| 0.5 * (w[0].v + w[1].v) * (w[1].t - w[0].t))
        .sum()
}

fn intrusion(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    Ok(max_abs(i.signal(names::INTRUSION)?) - i.ctx.intrusion_offset)
}

fn mass(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    Ok(i.signal(names::MASS)?[0].v)
}

/// Displacement magnitudes and force magnitudes up to the peak intrusion.
fn loading_window(i: &MetricInputs<'_>) -> ResultsResult<(Vec<f64>, Vec<f64>)> {
    let x = i.signal(names::INTRUSION)?;
    let f = i.signal(names::IMPACT_FORCE)?;
    let peak = x
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (k, s)| {
            if s.v.abs() > bv { (k, s.v.abs()) } else { (bi, bv) }
        })
        .0;
    let end = (peak + 1).min(f.len());
    Ok((
        x[..end].iter().map(|s| s.v.abs()).collect(),
        f[..end].iter().map(|s| s.v.abs()).collect(),
    ))
}

fn kilonewtons(i: &MetricInputs<'_>, v: f64) -> f64 {
    i.ctx.units.force(v).get::<kilonewton>()
}

fn mean_impact_force(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    let (_, f) = loading_window(i)?;
    Ok(kilonewtons(i, mean(f.into_iter())))
}

fn max_impact_force(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    let (_, f) = loading_window(i)?;
    Ok(kilonewtons(i, f.into_iter().fold(0.0, f64::max)))
}

fn load_uniformity(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    let mean = mean_impact_force(i)?;
    if mean == 0.0 {
        return Err(ResultsError::UndefinedMetric {
            metric: "load_uniformity".into(),
            reason: "mean impact force is zero".into(),
        });
    }
    Ok((max_impact_force(i)? / mean).abs())
}

/// Joules.
fn absorbed_energy(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    let (x, f) = loading_window(i)?;
    let work: f64 = x
        .windows(2)
        .zip(f.windows(2))
        .map(|(x, f)| 0.5 * (f[0] + f[1]) * (x[1] - x[0]))
        .sum();
    Ok(i.ctx.units.work(work).get::<joule>())
}

/// kJ/kg.
fn specific_energy_absorbed(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    let m = mass(i)?;
    if m <= 0.0 {
        return Err(ResultsError::UndefinedMetric {
            metric: "specific_energy_absorbed".into(),
            reason: format!("structural mass is {m}"),
        });
    }
    Ok(absorbed_energy(i)? / m / 1000.0)
}

fn penalized_sea(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    let d = intrusion(i)?;
    if d <= SEA_INTRUSION_LIMIT {
        Ok(-specific_energy_absorbed(i)?)
    } else {
        Ok(100.0 * (d - SEA_INTRUSION_LIMIT))
    }
}

fn penalized_mass(i: &MetricInputs<'_>) -> ResultsResult<f64> {
    let d = intrusion(i)?;
    if d <= MASS_INTRUSION_LIMIT {
        mass(i)
    } else {
        Ok(MASS_PENALTY_BASE + 10.0 * (d / MASS_INTRUSION_LIMIT - 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(f64, f64)]) -> Vec<Sample> {
        points.iter().map(|&(t, v)| Sample { t, v }).collect()
    }

    fn reducer(offset: f64) -> ObjectiveReducer {
        ObjectiveReducer::new(ReductionContext {
            units: UnitSystem::KgMmMs,
            intrusion_offset: offset,
        })
    }

    #[test]
    fn max_abs_of_reference_signal() {
        let set = SignalSet::new().with("s", series(&[(0.0, 0.0), (1.0, -3.5), (2.0, 2.0)]));
        assert_eq!(reducer(0.0).reduce(&set, "max_abs(s)").unwrap(), 3.5);
    }

    #[test]
    fn parse_metric_forms() {
        assert_eq!(parse_metric("intrusion"), ("intrusion", None));
        assert_eq!(parse_metric(" max_abs( impact_force )"), ("max_abs", Some("impact_force")));
    }

    #[test]
    fn unknown_and_misused_metrics() {
        let set = SignalSet::new();
        let r = reducer(0.0);
        assert!(matches!(
            r.reduce(&set, "peak_acceleration"),
            Err(ResultsError::UnknownMetric { .. })
        ));
        assert!(matches!(
            r.reduce(&set, "intrusion(impact_force)"),
            Err(ResultsError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn missing_versus_empty_signal() {
        let r = reducer(0.0);
        assert!(matches!(
            r.reduce(&SignalSet::new(), "intrusion"),
            Err(ResultsError::MissingSignal { .. })
        ));
        let empty = SignalSet::new().with(names::INTRUSION, vec![]);
        assert!(matches!(
            r.reduce(&empty, "intrusion"),
            Err(ResultsError::EmptySignal { .. })
        ));
    }

    fn crush() -> SignalSet {
        // constant 10 kN while the wall travels 40 mm, then rebound
        SignalSet::new()
            .with(
                names::INTRUSION,
                series(&[(0.0, 1.0), (1.0, -11.0), (2.0, -21.0), (3.0, -41.0), (4.0, -30.0)]),
            )
            .with(
                names::IMPACT_FORCE,
                series(&[(0.0, 10.0), (1.0, 10.0), (2.0, 10.0), (3.0, 10.0), (4.0, 90.0)]),
            )
            .with(names::MASS, series(&[(0.0, 0.5)]))
    }

    #[test]
    fn crash_metrics() {
        let r = reducer(1.0);
        let s = crush();
        assert_eq!(r.reduce(&s, "intrusion").unwrap(), 40.0);
        // window ends at the peak, the rebound spike is excluded
        assert_eq!(r.reduce(&s, "max_impact_force").unwrap(), 10.0);
        assert_eq!(r.reduce(&s, "load_uniformity").unwrap(), 1.0);
        // 10 kN over 40 mm = 400 J
        let e = r.reduce(&s, "absorbed_energy").unwrap();
        assert!((e - 400.0).abs() < 1e-9);
        let sea = r.reduce(&s, "specific_energy_absorbed").unwrap();
        assert!((sea - 0.8).abs() < 1e-12);
        assert!((r.reduce(&s, "penalized_sea").unwrap() + 0.8).abs() < 1e-12);
        assert_eq!(r.reduce(&s, "penalized_mass").unwrap(), 0.5);
    }

    #[test]
    fn penalties_past_the_limits() {
        let r = reducer(0.0);
        let s = crush().with(names::INTRUSION, series(&[(0.0, 0.0), (1.0, -70.0)]));
        assert!((r.reduce(&s, "penalized_sea").unwrap() - 1000.0).abs() < 1e-9);
        let m = r.reduce(&s, "penalized_mass").unwrap();
        assert!((m - (4.25952 + 10.0 * 0.4)).abs() < 1e-12);
    }

    #[test]
    fn tonne_system_reports_kilonewtons() {
        let r = ObjectiveReducer::new(ReductionContext {
            units: UnitSystem::TonneMmS,
            intrusion_offset: 0.0,
        });
        let s = SignalSet::new()
            .with(names::INTRUSION, series(&[(0.0, 0.0), (1.0, 5.0)]))
            .with(names::IMPACT_FORCE, series(&[(0.0, 2000.0), (1.0, 2000.0)]));
        assert!((r.reduce(&s, "max_impact_force").unwrap() - 2.0).abs() < 1e-12);
        // 2000 N over 5 mm = 10 J
        assert!((r.reduce(&s, "absorbed_energy").unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn registration_is_additive() {
        let mut r = reducer(0.0);
        let before = r.metric_names().count();
        r.register(
            "sample_count",
            MetricSpec {
                signals: INTRUSION_ONLY,
                takes_signal: true,
                reduce: |i| Ok(i.target()?.len() as f64),
            },
        );
        assert_eq!(r.metric_names().count(), before + 1);
        let s = SignalSet::new().with("x", series(&[(0.0, 1.0), (1.0, 1.0)]));
        assert_eq!(r.reduce(&s, "sample_count(x)").unwrap(), 2.0);
        assert_eq!(r.required_signals("mass").unwrap(), ["mass"]);
    }
}
