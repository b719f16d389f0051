use proptest::prelude::*;
use sob_results::{ObjectiveReducer, ReductionContext, Sample, SignalSet};

fn signal(values: &[f64]) -> SignalSet {
    SignalSet::new().with(
        "s",
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample { t: i as f64, v })
            .collect(),
    )
}

proptest! {
    #[test]
    fn generic_reductions_are_ordered(values in prop::collection::vec(-1e3f64..1e3, 1..50)) {
        let r = ObjectiveReducer::new(ReductionContext::default());
        let s = signal(&values);
        let min = r.reduce(&s, "min(s)").unwrap();
        let max = r.reduce(&s, "max(s)").unwrap();
        let mean = r.reduce(&s, "mean(s)").unwrap();
        let max_abs = r.reduce(&s, "max_abs(s)").unwrap();
        let last = r.reduce(&s, "final_value(s)").unwrap();
        prop_assert!(min <= mean + 1e-9 && mean <= max + 1e-9);
        prop_assert!(max_abs >= last.abs());
        prop_assert!((max_abs - min.abs().max(max.abs())).abs() < 1e-12);
    }

    #[test]
    fn integral_of_constant_is_area(c in -100.0f64..100.0, n in 2usize..40) {
        let r = ObjectiveReducer::new(ReductionContext::default());
        let s = signal(&vec![c; n]);
        let area = r.reduce(&s, "integral(s)").unwrap();
        prop_assert!((area - c * (n - 1) as f64).abs() < 1e-9);
    }
}
