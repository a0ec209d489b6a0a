/// Property-based tests using proptest
/// Tests invariants that must hold for the scoring engine on all inputs
use lead_intake_api::models::Lead;
use lead_intake_api::scoring::{self, Priority};
use proptest::prelude::*;

fn build_lead(
    budget: Option<String>,
    timeline: Option<String>,
    vision: Vec<String>,
    big_idea: String,
    must_haves: String,
) -> Lead {
    let mut lead = Lead::draft("prop-token".to_string(), 1);
    lead.budget_plan = budget;
    lead.timeline = timeline;
    lead.vision = vision;
    lead.big_idea = Some(big_idea);
    lead.must_haves = Some(must_haves);
    lead
}

// Property: the engine never panics and never yields a negative score
proptest! {
    #[test]
    fn scoring_never_panics_and_score_is_non_negative(
        budget in proptest::option::of("\\PC{0,12}"),
        timeline in proptest::option::of("\\PC{0,12}"),
        vision in proptest::collection::vec("\\PC{0,16}", 0..6),
        big_idea in "\\PC{0,200}",
        must_haves in "\\PC{0,200}",
    ) {
        let mut lead = build_lead(budget, timeline, vision, big_idea, must_haves);
        scoring::apply(&mut lead);
        prop_assert!(lead.score >= 0);
    }

    #[test]
    fn penalty_floor_holds_with_empty_inputs(
        budget in prop::sample::select(vec!["unsure", ""]),
        timeline in prop::sample::select(vec!["unsure", ""]),
    ) {
        let mut lead = build_lead(
            Some(budget.to_string()),
            Some(timeline.to_string()),
            vec![],
            String::new(),
            String::new(),
        );
        scoring::apply(&mut lead);
        // Even when the unsure/unsure penalty fires with no positive rules
        prop_assert_eq!(lead.score, 0);
        prop_assert_eq!(lead.priority.as_str(), "Nurture");
    }
}

// Property: priority is a pure, monotonic function of score
proptest! {
    #[test]
    fn priority_is_monotone_in_score(a in -50i32..50, b in -50i32..50) {
        fn rank(p: Priority) -> u8 {
            match p {
                Priority::Nurture => 0,
                Priority::Warm => 1,
                Priority::Hot => 2,
            }
        }

        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(rank(Priority::from_score(lo)) <= rank(Priority::from_score(hi)));
    }

    #[test]
    fn priority_thresholds(score in -10i32..30) {
        let priority = Priority::from_score(score);
        if score >= 7 {
            prop_assert_eq!(priority, Priority::Hot);
        } else if score >= 4 {
            prop_assert_eq!(priority, Priority::Warm);
        } else {
            prop_assert_eq!(priority, Priority::Nurture);
        }
    }
}

// Property: applying the engine twice never drifts
proptest! {
    #[test]
    fn apply_is_idempotent(
        budget in proptest::option::of(prop::sample::select(vec!["unsure", "4-8k", "8-12k", "12k+"])),
        timeline in proptest::option::of(prop::sample::select(vec!["unsure", "2-4w", "1-2m", "3m+"])),
        vision in proptest::collection::vec(
            prop::sample::select(vec!["mobile", "webapp", "ecommerce", "ai", "branding"]),
            0..4,
        ),
        big_idea in "\\PC{0,120}",
    ) {
        let mut lead = build_lead(
            budget.map(str::to_string),
            timeline.map(str::to_string),
            vision.iter().map(|v| v.to_string()).collect(),
            big_idea,
            String::new(),
        );

        scoring::apply(&mut lead);
        let first = (lead.score, lead.priority.clone(), lead.derived_tags.0.clone());

        scoring::apply(&mut lead);
        prop_assert_eq!((lead.score, lead.priority.clone(), lead.derived_tags.0.clone()), first);
    }
}

// Property: tag derivation structural invariants
proptest! {
    #[test]
    fn project_type_always_mirrors_selection_length(
        vision in proptest::collection::vec("\\PC{0,16}", 0..8),
    ) {
        let mut lead = build_lead(None, None, vision.clone(), String::new(), String::new());
        scoring::apply(&mut lead);
        // One label per selected category, order and duplicates preserved
        prop_assert_eq!(lead.derived_tags.project_type.len(), vision.len());
    }

    #[test]
    fn known_budget_tiers_never_map_to_unknown(
        budget in prop::sample::select(vec!["4-8k", "8-12k", "12k+"]),
    ) {
        let mut lead = build_lead(Some(budget.to_string()), None, vec![], String::new(), String::new());
        scoring::apply(&mut lead);
        prop_assert_eq!(lead.derived_tags.budget_tier.as_deref(), Some(budget));
    }

    #[test]
    fn priority_label_always_matches_score(
        budget in proptest::option::of(prop::sample::select(vec!["unsure", "4-8k", "8-12k", "12k+"])),
        timeline in proptest::option::of(prop::sample::select(vec!["unsure", "2-4w", "1-2m"])),
        vision in proptest::collection::vec(
            prop::sample::select(vec!["webapp", "ecommerce", "marketing"]),
            0..3,
        ),
        text in "\\PC{0,120}",
    ) {
        let mut lead = build_lead(
            budget.map(str::to_string),
            timeline.map(str::to_string),
            vision.iter().map(|v| v.to_string()).collect(),
            text,
            String::new(),
        );
        scoring::apply(&mut lead);
        prop_assert_eq!(lead.priority.as_str(), Priority::from_score(lead.score).as_str());
    }
}
