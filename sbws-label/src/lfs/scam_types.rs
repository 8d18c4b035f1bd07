// Scam-type signals - keyword matches for scam premises over title and description

use std::sync::Arc;

use sbws_common::Vote;

use super::{Category, KeywordVoter, SharedLf};

/// Companies scammers commonly impersonate
pub const SCAM_COMPANIES: &[&str] = &["geek squad", "norton", "microsoft"];

/// All scam-type voters in registry order
pub fn all() -> Vec<SharedLf> {
    let scam_type = |name: &'static str,
                     rationale: &'static str,
                     needles: &[&'static str],
                     hit: Vote|
                     -> SharedLf {
        Arc::new(KeywordVoter::title_or_desc(name, rationale, Category::ScamType, needles, hit))
    };

    vec![
        scam_type(
            "refund_scam",
            "Refund scams are conducted over phone calls",
            &["refund"],
            Vote::Call,
        ),
        scam_type(
            "irs_scam",
            "IRS scams are conducted over phone calls",
            &["irs"],
            Vote::Call,
        ),
        scam_type(
            "crypto_scam",
            "Crypto scams are not conducted over phone calls",
            &["crypto"],
            Vote::NotCall,
        ),
        scam_type(
            "not_a_scheme",
            "A scheme generally implies a greater complexity than a scam call",
            &["scheme"],
            Vote::NotCall,
        ),
        scam_type(
            "common_scam_companies",
            "Impersonated companies point to a scam call",
            SCAM_COMPANIES,
            Vote::Call,
        ),
        scam_type(
            "tech_support",
            "Tech support is a common premise for scams",
            &["tech support"],
            Vote::Call,
        ),
    ]
}
