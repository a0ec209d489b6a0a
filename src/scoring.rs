//! Lead scoring and tag derivation.
//!
//! A deterministic rule engine that converts form answers into a numeric
//! score, a priority bucket and a structured tag bundle. The rules are
//! additive and independent; keyword tables are plain data so each tag can
//! be tested in isolation. The engine performs no I/O and tolerates every
//! field being unset.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::fmt;

use crate::models::Lead;

/// Coarse follow-up bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Hot,
    Warm,
    Nurture,
}

impl Priority {
    /// Pure, monotonic mapping from score to bucket.
    pub fn from_score(score: i32) -> Self {
        if score >= 7 {
            Priority::Hot
        } else if score >= 4 {
            Priority::Warm
        } else {
            Priority::Nurture
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Hot => "Hot",
            Priority::Warm => "Warm",
            Priority::Nurture => "Nurture",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical labels computed from lead content, used by the admin surface
/// for filtering and analytics. Serialized as camelCase JSON into the
/// `derived_tags` JSONB column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadTags {
    /// Acquisition channel, copied from the lead's source.
    pub channel: Option<String>,
    /// Selected vision categories mapped to display labels, selection order.
    pub project_type: Vec<String>,
    pub commerce: Vec<String>,
    pub ai: Vec<String>,
    pub stack_hints: Vec<String>,
    /// Budget tier, or "Unknown" when the user picked "unsure".
    pub budget_tier: Option<String>,
    /// Timeline tier, or "Unknown" when the user picked "unsure".
    pub urgency: Option<String>,
    /// Country resolved from the origin IP, verbatim.
    pub region: Option<String>,
    pub priority_signals: Vec<String>,
}

// ============ Keyword Tables ============
//
// Each table is an ordered association list: tag -> patterns. Patterns are
// matched case-insensitively on word boundaries against the concatenated
// free-text fields, so "ai" does not fire inside "maintain".

const AI_AUTOMATION_KEYWORDS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "gpt",
    "llm",
    "chatbot",
    "automation",
    "automate",
];

const MULTI_TENANT_KEYWORDS: &[&str] = &[
    "multi-tenant",
    "multi tenant",
    "multitenant",
    "saas",
    "white label",
];

const SSO_AUTH_KEYWORDS: &[&str] = &[
    "sso",
    "single sign-on",
    "single sign on",
    "oauth",
    "saml",
    "okta",
    "auth0",
];

const PAYMENTS_KEYWORDS: &[&str] = &[
    "payment",
    "payments",
    "billing",
    "stripe",
    "razorpay",
    "subscription",
    "subscriptions",
    "checkout",
    "payout",
    "payouts",
    "invoice",
];

/// Vision category -> display label. Unmapped categories pass through raw.
const PROJECT_TYPE_LABELS: &[(&str, &str)] = &[
    ("mobile", "Mobile App"),
    ("webapp", "Web App"),
    ("ecommerce", "E-commerce"),
    ("dashboard", "Dashboard"),
    ("ai", "AI"),
    ("ui/ux", "UI/UX Design"),
    ("branding", "Branding"),
    ("marketing", "Marketing"),
    ("chatbots", "Chatbots"),
    ("landing-page", "Landing Page"),
    ("content-ops", "Content Ops"),
    ("maintenance", "Maintenance"),
];

const COMMERCE_TAGS: &[(&str, &[&str])] = &[
    (
        "SingleVendor",
        &["single vendor", "single-vendor", "own store", "d2c"],
    ),
    (
        "MultiVendor",
        &["multi vendor", "multi-vendor", "marketplace", "multiple sellers"],
    ),
    (
        "Subscriptions",
        &["subscription", "subscriptions", "recurring billing", "recurring payment", "membership"],
    ),
    (
        "WalletPayouts",
        &["wallet", "payout", "payouts", "split payment"],
    ),
];

const AI_TAGS: &[(&str, &[&str])] = &[
    (
        "RAG",
        &["rag", "retrieval augmented", "retrieval-augmented", "vector search", "embeddings"],
    ),
    ("OpenAI", &["openai", "gpt", "chatgpt"]),
    (
        "BotSupport",
        &["chatbot", "chat bot", "support bot", "bot support", "whatsapp bot"],
    ),
    (
        "Automation",
        &["automation", "automate", "workflow", "zapier", "n8n"],
    ),
];

const STACK_HINT_TAGS: &[(&str, &[&str])] = &[
    ("Flutter", &["flutter", "dart"]),
    ("NextJS", &["next.js", "nextjs", "next js"]),
    ("Node", &["node", "node.js", "nodejs", "express"]),
    ("Stripe", &["stripe"]),
    ("Razorpay", &["razorpay"]),
    ("SSO", &["sso", "single sign-on", "single sign on"]),
    ("RBAC", &["rbac", "role based access", "role-based access"]),
    (
        "Multilingual",
        &["multilingual", "multi-language", "multi language", "i18n", "localization"],
    ),
];

const PRIORITY_SIGNAL_TAGS: &[(&str, &[&str])] = &[
    ("Enterprise", &["enterprise", "b2b"]),
    (
        "MultiTenant",
        &["multi-tenant", "multi tenant", "multitenant", "saas"],
    ),
    ("SLA", &["sla", "uptime", "99.9"]),
    (
        "Analytics",
        &["analytics", "dashboard", "reporting", "metrics"],
    ),
    (
        "Payments",
        &["payment", "payments", "billing", "stripe", "razorpay"],
    ),
];

// ============ Matching ============

/// Case-insensitive word-boundary match of one pattern against the text blob.
/// A pattern that fails to compile simply does not match; the engine never errors.
fn keyword_match(text: &str, keyword: &str) -> bool {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
    Regex::new(&pattern)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

fn matches_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| keyword_match(text, kw))
}

/// Collect the tags whose keyword set matches the text, in table order.
fn tags_matching(text: &str, table: &[(&str, &[&str])]) -> Vec<String> {
    table
        .iter()
        .filter(|(_, keywords)| matches_any(text, keywords))
        .map(|(tag, _)| (*tag).to_string())
        .collect()
}

/// Lower-cased concatenation of all free-text detail fields.
/// Missing fields contribute nothing.
fn joined_text(lead: &Lead) -> String {
    [
        lead.big_idea.as_deref(),
        lead.must_haves.as_deref(),
        lead.audience.as_deref(),
        lead.problem.as_deref(),
        lead.references.as_deref(),
    ]
    .iter()
    .flatten()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

// ============ Score Calculator ============

/// Compute the lead score from the current field values.
///
/// Additive rule table; no rule excludes another. The AI / multi-tenant /
/// SSO keyword families share a single flat point even when several match.
/// Floored at zero after the unsure/unsure penalty.
pub fn compute_score(lead: &Lead) -> i32 {
    let text = joined_text(lead);
    let budget = lead.budget_plan.as_deref().unwrap_or("");
    let timeline = lead.timeline.as_deref().unwrap_or("");

    let mut score = 0i32;

    match budget {
        "8-12k" | "12k+" => score += 3,
        "4-8k" => score += 1,
        _ => {}
    }

    if lead
        .vision
        .iter()
        .any(|v| v == "ecommerce" || v == "webapp")
    {
        score += 2;
    }

    if timeline == "2-4w" {
        score += 1;
    }

    // Flat point: one or more of the three keyword families present.
    if matches_any(&text, AI_AUTOMATION_KEYWORDS)
        || matches_any(&text, MULTI_TENANT_KEYWORDS)
        || matches_any(&text, SSO_AUTH_KEYWORDS)
    {
        score += 1;
    }

    if matches_any(&text, PAYMENTS_KEYWORDS) {
        score += 1;
    }

    if budget == "unsure" && timeline == "unsure" {
        score -= 2;
    }

    score.max(0)
}

// ============ Tag Derivation ============

fn project_type_label(category: &str) -> String {
    PROJECT_TYPE_LABELS
        .iter()
        .find(|(cat, _)| *cat == category)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| category.to_string())
}

fn tier_or_unknown(tier: Option<&str>) -> Option<String> {
    tier.map(|t| {
        if t == "unsure" {
            "Unknown".to_string()
        } else {
            t.to_string()
        }
    })
}

/// Derive the tag bundle from the current field values.
pub fn derive_tags(lead: &Lead) -> LeadTags {
    let text = joined_text(lead);

    let project_type = lead
        .vision
        .iter()
        .map(|v| project_type_label(v))
        .collect::<Vec<_>>();

    let mut ai = tags_matching(&text, AI_TAGS);
    // The "ai" category forces a generic AI tag even when no keyword matched.
    if lead.vision.iter().any(|v| v == "ai") && !ai.iter().any(|t| t == "AI") {
        ai.push("AI".to_string());
    }

    LeadTags {
        channel: lead.source.clone(),
        project_type,
        commerce: tags_matching(&text, COMMERCE_TAGS),
        ai,
        stack_hints: tags_matching(&text, STACK_HINT_TAGS),
        budget_tier: tier_or_unknown(lead.budget_plan.as_deref()),
        urgency: tier_or_unknown(lead.timeline.as_deref()),
        region: lead.country.clone(),
        priority_signals: tags_matching(&text, PRIORITY_SIGNAL_TAGS),
    }
}

// ============ Invocation ============

/// Recompute score, priority and tags together on the given lead.
///
/// Called by every handler immediately before persisting, so the derived
/// fields always reflect the latest form values. Mutates only the derived
/// fields; everything else passes through unchanged.
pub fn apply(lead: &mut Lead) {
    let score = compute_score(lead);
    lead.score = score;
    lead.priority = Priority::from_score(score).as_str().to_string();
    lead.derived_tags = Json(derive_tags(lead));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BUDGET_TIERS, TIMELINE_TIERS, VISION_CATEGORIES};

    fn lead() -> Lead {
        Lead::draft("token".to_string(), 1)
    }

    #[test]
    fn test_every_vision_category_has_a_label() {
        for category in VISION_CATEGORIES {
            assert!(
                PROJECT_TYPE_LABELS.iter().any(|(cat, _)| cat == category),
                "category {} has no display label",
                category
            );
        }
    }

    #[test]
    fn test_all_vocabulary_tiers_are_handled() {
        // Every selectable tier must flow through scoring and tag mapping
        for budget in BUDGET_TIERS {
            for timeline in TIMELINE_TIERS {
                let mut l = lead();
                l.budget_plan = Some(budget.to_string());
                l.timeline = Some(timeline.to_string());
                apply(&mut l);
                assert!(l.score >= 0);
                let expected_budget = if *budget == "unsure" { "Unknown" } else { *budget };
                assert_eq!(l.derived_tags.budget_tier.as_deref(), Some(expected_budget));
            }
        }
    }

    #[test]
    fn test_keyword_match_word_boundaries() {
        assert!(keyword_match("we want an ai assistant", "ai"));
        assert!(keyword_match("AI-first product", "ai"));
        // "ai" inside a longer word must not fire
        assert!(!keyword_match("ongoing maintaince and maintain work", "ai"));
        assert!(!keyword_match("emails daily", "ai"));
    }

    #[test]
    fn test_keyword_match_case_insensitive() {
        assert!(keyword_match("needs STRIPE checkout", "stripe"));
        assert!(keyword_match("SaaS platform", "saas"));
    }

    #[test]
    fn test_joined_text_skips_missing_fields() {
        let mut l = lead();
        assert_eq!(joined_text(&l), "");

        l.big_idea = Some("Marketplace App".to_string());
        l.problem = Some("  ".to_string());
        l.references = Some("DRIBBBLE.com".to_string());
        assert_eq!(joined_text(&l), "marketplace app dribbble.com");
    }

    #[test]
    fn test_budget_scoring() {
        let mut l = lead();
        l.budget_plan = Some("12k+".to_string());
        assert_eq!(compute_score(&l), 3);

        l.budget_plan = Some("8-12k".to_string());
        assert_eq!(compute_score(&l), 3);

        l.budget_plan = Some("4-8k".to_string());
        assert_eq!(compute_score(&l), 1);

        l.budget_plan = Some("unsure".to_string());
        assert_eq!(compute_score(&l), 0);
    }

    #[test]
    fn test_vision_scoring() {
        let mut l = lead();
        l.vision = vec!["ecommerce".to_string()];
        assert_eq!(compute_score(&l), 2);

        l.vision = vec!["webapp".to_string(), "ecommerce".to_string()];
        // Intersection scores once, not per category
        assert_eq!(compute_score(&l), 2);

        l.vision = vec!["branding".to_string()];
        assert_eq!(compute_score(&l), 0);
    }

    #[test]
    fn test_keyword_point_is_flat_across_families() {
        let mut l = lead();
        l.big_idea = Some("an ai saas with sso login".to_string());
        // Three families match, still one point
        assert_eq!(compute_score(&l), 1);
    }

    #[test]
    fn test_payments_point_stacks_with_keyword_point() {
        let mut l = lead();
        l.big_idea = Some("automation platform with stripe billing".to_string());
        assert_eq!(compute_score(&l), 2);
    }

    #[test]
    fn test_unsure_penalty_needs_both() {
        let mut l = lead();
        l.budget_plan = Some("unsure".to_string());
        l.timeline = Some("unsure".to_string());
        l.vision = vec!["webapp".to_string()];
        assert_eq!(compute_score(&l), 0); // 2 - 2

        l.timeline = Some("1-2m".to_string());
        assert_eq!(compute_score(&l), 2);

        l.timeline = None;
        assert_eq!(compute_score(&l), 2);
    }

    #[test]
    fn test_score_floor() {
        let mut l = lead();
        l.budget_plan = Some("unsure".to_string());
        l.timeline = Some("unsure".to_string());
        assert_eq!(compute_score(&l), 0);
    }

    #[test]
    fn test_priority_boundaries() {
        assert_eq!(Priority::from_score(0), Priority::Nurture);
        assert_eq!(Priority::from_score(3), Priority::Nurture);
        assert_eq!(Priority::from_score(4), Priority::Warm);
        assert_eq!(Priority::from_score(6), Priority::Warm);
        assert_eq!(Priority::from_score(7), Priority::Hot);
        assert_eq!(Priority::from_score(42), Priority::Hot);
    }

    #[test]
    fn test_project_type_mapping_and_passthrough() {
        let mut l = lead();
        l.vision = vec![
            "ecommerce".to_string(),
            "quantum-thing".to_string(),
            "ecommerce".to_string(),
        ];
        let tags = derive_tags(&l);
        // Mapped labels keep selection order and duplicates
        assert_eq!(tags.project_type, vec!["E-commerce", "quantum-thing", "E-commerce"]);
    }

    #[test]
    fn test_commerce_tags_in_table_order() {
        let mut l = lead();
        l.big_idea = Some("wallet payouts for a multi vendor marketplace".to_string());
        let tags = derive_tags(&l);
        assert_eq!(tags.commerce, vec!["MultiVendor", "WalletPayouts"]);
    }

    #[test]
    fn test_ai_tags_forced_generic() {
        let mut l = lead();
        l.vision = vec!["ai".to_string()];
        let tags = derive_tags(&l);
        assert_eq!(tags.ai, vec!["AI"]);

        // With a keyword match the forced tag is appended after matched ones
        l.big_idea = Some("a chatgpt powered assistant".to_string());
        let tags = derive_tags(&l);
        assert_eq!(tags.ai, vec!["OpenAI", "AI"]);
    }

    #[test]
    fn test_stack_hints() {
        let mut l = lead();
        l.must_haves = Some("Next.js frontend, razorpay and i18n support".to_string());
        let tags = derive_tags(&l);
        assert_eq!(tags.stack_hints, vec!["NextJS", "Razorpay", "Multilingual"]);
    }

    #[test]
    fn test_priority_signals() {
        let mut l = lead();
        l.problem = Some("enterprise b2b tool with 99.9 uptime sla and reporting".to_string());
        let tags = derive_tags(&l);
        assert_eq!(tags.priority_signals, vec!["Enterprise", "SLA", "Analytics"]);
    }

    #[test]
    fn test_tier_mapping() {
        let mut l = lead();
        l.budget_plan = Some("unsure".to_string());
        l.timeline = Some("2-4w".to_string());
        let tags = derive_tags(&l);
        assert_eq!(tags.budget_tier.as_deref(), Some("Unknown"));
        assert_eq!(tags.urgency.as_deref(), Some("2-4w"));

        l.budget_plan = None;
        let tags = derive_tags(&l);
        assert_eq!(tags.budget_tier, None);
    }

    #[test]
    fn test_channel_and_region_passthrough() {
        let mut l = lead();
        l.source = Some("instagram".to_string());
        l.country = Some("Germany".to_string());
        let tags = derive_tags(&l);
        assert_eq!(tags.channel.as_deref(), Some("instagram"));
        assert_eq!(tags.region.as_deref(), Some("Germany"));
    }

    #[test]
    fn test_apply_sets_all_derived_fields_together() {
        let mut l = lead();
        l.budget_plan = Some("12k+".to_string());
        l.vision = vec!["ecommerce".to_string()];
        l.timeline = Some("2-4w".to_string());
        l.must_haves = Some("stripe subscription".to_string());

        apply(&mut l);

        // 3 (budget) + 2 (vision) + 1 (timeline) + 1 (payments) = 7
        assert_eq!(l.score, 7);
        assert_eq!(l.priority, "Hot");
        assert!(l.derived_tags.commerce.iter().any(|t| t == "Subscriptions"));
        assert!(l.derived_tags.stack_hints.iter().any(|t| t == "Stripe"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut l = lead();
        l.budget_plan = Some("4-8k".to_string());
        l.big_idea = Some("automation with payments".to_string());

        apply(&mut l);
        let first_score = l.score;
        let first_tags = l.derived_tags.0.clone();

        apply(&mut l);
        assert_eq!(l.score, first_score);
        assert_eq!(l.derived_tags.0, first_tags);
    }

    #[test]
    fn test_tags_serialize_camel_case() {
        let mut l = lead();
        l.budget_plan = Some("12k+".to_string());
        l.vision = vec!["webapp".to_string()];
        let json = serde_json::to_value(derive_tags(&l)).unwrap();

        assert!(json.get("projectType").is_some());
        assert!(json.get("stackHints").is_some());
        assert!(json.get("budgetTier").is_some());
        assert!(json.get("prioritySignals").is_some());
    }
}
