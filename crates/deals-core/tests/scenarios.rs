//! End-to-end engine scenarios against an in-memory store.

use chrono::{NaiveDate, TimeZone, Utc};
use deals_core::clock::{BusinessCalendar, FixedClock, RequestContext};
use deals_core::db::Store;
use deals_core::error::ErrorCode;
use deals_core::model::activity::{ActivityDraft, ActivityKind};
use deals_core::model::opportunity::{OpportunityDraft, Probability};
use deals_core::model::reason::ReasonCatalog;
use deals_core::service;
use deals_core::timeline::GateState;
use rust_decimal_macros::dec;

#[path = "generators.rs"]
mod generators;

fn ctx_at(y: i32, m: u32, d: u32, h: u32) -> RequestContext {
    let now = Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("instant");
    BusinessCalendar::default().context(&FixedClock(now))
}

fn seeded_store() -> Store {
    let store = Store::open_in_memory().expect("store");
    for stage in generators::sales_stages() {
        service::add_stage(&store, stage).expect("stage");
    }
    store
}

#[test]
fn negotiation_to_closed_lost_requires_a_reason() {
    let store = seeded_store();
    let ctx = ctx_at(2024, 6, 10, 15);
    let reasons = ReasonCatalog::default();

    let draft = OpportunityDraft {
        id: "O1".into(),
        contact_id: "c1".into(),
        title: "Fleet renewal".into(),
        stage_id: Some("negotiation".into()),
        estimated_amount: Some(dec!(1000)),
        probability: Probability::try_from(50).expect("in range"),
        ..OpportunityDraft::default()
    };
    service::create_opportunity(&store, "sales", draft, &ctx).expect("created");
    let before = service::forecast(&store, "sales").expect("forecast");
    assert_eq!(before.pipeline_total, dec!(1000));
    assert_eq!(before.pipeline_weighted_total, dec!(500));

    let err = service::move_opportunity(&store, &reasons, "O1", "closed-lost", None, "ana", &ctx)
        .expect_err("reason required");
    assert_eq!(err.code(), ErrorCode::ReasonRequired);
    assert_eq!(
        service::get_opportunity(&store, "O1").expect("get").stage_id,
        "negotiation"
    );
    assert!(store.list_activities("O1").expect("list").is_empty());

    service::move_opportunity(&store, &reasons, "O1", "closed-lost", Some("price"), "ana", &ctx)
        .expect("moved");
    let moved = service::get_opportunity(&store, "O1").expect("get");
    assert_eq!(moved.stage_id, "closed-lost");
    assert_eq!(moved.loss_reason.as_deref(), Some("price"));

    let activities = store.list_activities("O1").expect("list");
    assert_eq!(activities.len(), 1);
    let change = activities[0].stage_change.as_ref().expect("stage change payload");
    assert_eq!((change.from_stage_id.as_str(), change.to_stage_id.as_str()), ("negotiation", "closed-lost"));

    let after = service::forecast(&store, "sales").expect("forecast");
    assert_eq!(after.lost_count, before.lost_count + 1);
    assert_eq!(after.pipeline_total, before.pipeline_total - dec!(1000));
}

#[test]
fn task_completion_is_locked_after_its_due_date() {
    let store = seeded_store();
    let monday = ctx_at(2024, 6, 10, 15);
    let tuesday = ctx_at(2024, 6, 11, 15);

    service::create_opportunity(&store, "sales", generators::opportunity_draft("O1"), &monday)
        .expect("created");

    let mut draft = ActivityDraft::new("T1", "O1", ActivityKind::Task);
    draft.due_at = Some(Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).single().expect("instant"));
    service::add_activity(&store, draft, "ana", &monday).expect("task added");

    let done = service::set_activity_completion(&store, "T1", Some(true), "ana", &monday)
        .expect("completed on due date");
    assert!(done.completed);
    assert_eq!(done.completed_by.as_deref(), Some("ana"));

    let err = service::set_activity_completion(&store, "T1", Some(false), "ana", &tuesday)
        .expect_err("locked the next day");
    assert_eq!(err.code(), ErrorCode::NotEditableToday);
    assert!(store.get_activity("T1").expect("get").completed);

    let view = service::timeline(&store, "O1", &tuesday).expect("timeline");
    assert_eq!(view.reference.today, NaiveDate::from_ymd_opt(2024, 6, 11).expect("date"));
    let entry = &view.groups[0].entries[0];
    assert_eq!(entry.gate, Some(GateState::Completed));
    assert!(!entry.can_toggle);
    assert!(!entry.overdue);
}

#[test]
fn timezone_decides_the_reference_date() {
    let store = seeded_store();
    let created = ctx_at(2024, 6, 9, 15);
    service::create_opportunity(&store, "sales", generators::opportunity_draft("O1"), &created)
        .expect("created");

    // Due 23:30 Sao Paulo on the 10th, which is already the 11th in UTC.
    let mut draft = ActivityDraft::new("T1", "O1", ActivityKind::Task);
    draft.due_at = Some(Utc.with_ymd_and_hms(2024, 6, 11, 2, 30, 0).single().expect("instant"));
    service::add_activity(&store, draft, "ana", &created).expect("task added");

    let late_evening = ctx_at(2024, 6, 11, 2);
    assert_eq!(late_evening.today, NaiveDate::from_ymd_opt(2024, 6, 10).expect("date"));
    service::set_activity_completion(&store, "T1", None, "ana", &late_evening)
        .expect("still the due date locally");
}
