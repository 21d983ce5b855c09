#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use deals_core::model::activity::{Activity, ActivityDraft, ActivityKind};
use deals_core::model::opportunity::{Opportunity, OpportunityDraft, Probability};
use deals_core::model::stage::{Stage, StageCatalog, SystemRole};
use proptest::prelude::*;
use rust_decimal::Decimal;

pub const STAGE_IDS: [&str; 4] = ["lead", "negotiation", "closed-won", "closed-lost"];
pub const TERMINAL_STAGE_IDS: [&str; 2] = ["closed-won", "closed-lost"];

/// Noon of 2024-06-10 in Sao Paulo.
pub fn base_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 15, 0, 0)
        .single()
        .expect("valid instant")
}

fn stage(id: &str, order: i32, role: SystemRole) -> Stage {
    Stage {
        id: id.to_string(),
        pipeline_id: "sales".to_string(),
        name: id.to_string(),
        order,
        color_hint: None,
        system_role: role,
    }
}

pub fn sales_stages() -> Vec<Stage> {
    vec![
        stage("lead", 1, SystemRole::Normal),
        stage("negotiation", 2, SystemRole::Normal),
        stage("closed-won", 3, SystemRole::Won),
        stage("closed-lost", 4, SystemRole::Lost),
    ]
}

pub fn sales_catalog() -> StageCatalog {
    StageCatalog::new("sales", sales_stages()).expect("valid catalog")
}

pub fn arb_amount() -> impl Strategy<Value = Option<Decimal>> {
    prop::option::of((0i64..10_000_000, 0u32..=4).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale)))
}

pub fn arb_probability() -> impl Strategy<Value = Probability> {
    (0i64..=100).prop_map(|p| Probability::try_from(p).expect("in range"))
}

pub fn opportunity(id: &str, stage_id: &str, amount: Option<Decimal>, probability: Probability) -> Opportunity {
    let draft = OpportunityDraft {
        id: id.to_string(),
        contact_id: "contact-1".to_string(),
        title: format!("Deal {id}"),
        estimated_amount: amount,
        probability,
        ..OpportunityDraft::default()
    };
    let mut opp = Opportunity::open(draft, &sales_catalog(), base_instant()).expect("opened");
    opp.stage_id = stage_id.to_string();
    opp
}

/// An opportunity in any stage of the sales pipeline.
pub fn arb_opportunity() -> impl Strategy<Value = Opportunity> {
    (prop::sample::select(STAGE_IDS.to_vec()), arb_amount(), arb_probability())
        .prop_map(|(stage_id, amount, probability)| opportunity("o1", stage_id, amount, probability))
}

/// A pipeline snapshot with unique ids, some archived.
pub fn arb_snapshot() -> impl Strategy<Value = Vec<Opportunity>> {
    prop::collection::vec(
        (
            prop::sample::select(STAGE_IDS.to_vec()),
            arb_amount(),
            arb_probability(),
            prop::bool::weighted(0.2),
        ),
        0..40,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (stage_id, amount, probability, archived))| {
                let mut opp = opportunity(&format!("o{i:03}"), stage_id, amount, probability);
                opp.archived = archived;
                opp
            })
            .collect()
    })
}

/// Tasks, meetings and notes spread over roughly a week either side of the
/// base instant. Meetings last an hour from their start.
pub fn arb_activities() -> impl Strategy<Value = Vec<Activity>> {
    let kind = prop::sample::select(vec![ActivityKind::Task, ActivityKind::Meeting, ActivityKind::Note]);
    prop::collection::vec((kind, -200i64..200, -300i64..0), 0..30).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (kind, offset_h, created_offset_h))| {
                let mut draft = ActivityDraft::new(format!("a{i:03}"), "o1", kind);
                let scheduled = base_instant() + Duration::hours(offset_h);
                match kind {
                    ActivityKind::Task => draft.due_at = Some(scheduled),
                    ActivityKind::Meeting => {
                        draft.start_at = Some(scheduled);
                        draft.end_at = Some(scheduled + Duration::hours(1));
                    }
                    _ => {}
                }
                Activity::create(draft, "ana", base_instant() + Duration::hours(created_offset_h))
                    .expect("valid activity")
            })
            .collect()
    })
}

pub fn opportunity_draft(id: &str) -> OpportunityDraft {
    OpportunityDraft {
        id: id.to_string(),
        contact_id: "contact-1".to_string(),
        title: format!("Deal {id}"),
        ..OpportunityDraft::default()
    }
}
