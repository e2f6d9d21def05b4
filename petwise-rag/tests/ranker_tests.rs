//! Ranker properties: determinism and monotonicity.

use petwise_rag::{Metadata, MetadataValue, RetrievalResult, rank};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Candidate {
    avg: Option<f64>,
    count: Option<i64>,
    synthesis: bool,
    faq: bool,
    distance: f32,
}

fn arb_candidate() -> impl Strategy<Value = Candidate> {
    (
        proptest::option::of(0.0f64..5.0),
        proptest::option::of(0i64..2000),
        any::<bool>(),
        any::<bool>(),
        0.0f32..2.0,
    )
        .prop_map(|(avg, count, synthesis, faq, distance)| Candidate { avg, count, synthesis, faq, distance })
}

fn to_result(candidates: &[Candidate]) -> RetrievalResult {
    let mut result = RetrievalResult::empty();
    for (i, c) in candidates.iter().enumerate() {
        let mut metadata = Metadata::new();
        if let Some(avg) = c.avg {
            metadata.insert("rating_avg".into(), MetadataValue::Float(avg));
        }
        if let Some(count) = c.count {
            metadata.insert("rating_count".into(), MetadataValue::Int(count));
        }
        metadata.insert("review_synthesis_flag".into(), MetadataValue::Bool(c.synthesis));
        if c.faq {
            metadata.insert("answered_faqs".into(), "Q: Is it soft? A: Yes.".into());
        }
        result.push((i + 1).to_string(), metadata, String::new(), c.distance);
    }
    result
}

fn position(result: &RetrievalResult, id: &str) -> usize {
    rank(result).iter().position(|c| c.product_id == id).unwrap()
}

/// **Property 3: ranker determinism**
/// **Property 4: ranker monotonicity**
mod prop_ranker {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn same_input_same_order(candidates in proptest::collection::vec(arb_candidate(), 0..40)) {
            let result = to_result(&candidates);
            let a = serde_json::to_string(&rank(&result)).unwrap();
            let b = serde_json::to_string(&rank(&result)).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn better_quality_or_relevance_never_drops_rank(
            candidates in proptest::collection::vec(arb_candidate(), 1..30),
            pick in any::<prop::sample::Index>(),
            improve_distance in any::<bool>(),
        ) {
            let i = pick.index(candidates.len());
            let id = (i + 1).to_string();
            let before = position(&to_result(&candidates), &id);

            let mut improved = candidates.clone();
            if improve_distance {
                improved[i].distance = (improved[i].distance - 0.25).max(0.0);
            } else if !improved[i].synthesis {
                improved[i].synthesis = true;
            } else {
                improved[i].faq = true;
            }
            let after = position(&to_result(&improved), &id);
            prop_assert!(after <= before, "moved from {} to {}", before, after);
        }
    }
}

#[test]
fn scores_are_non_negative() {
    let candidates = vec![
        Candidate { avg: Some(1.0), count: Some(500), synthesis: false, faq: false, distance: 1.9 },
        Candidate { avg: None, count: None, synthesis: true, faq: true, distance: 0.0 },
    ];
    for c in rank(&to_result(&candidates)) {
        assert!(c.score >= 0.0);
    }
}
