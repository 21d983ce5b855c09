use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};

use super::{
    Store, StoreError, activities::insert_activity_on, from_micros, from_micros_opt, parse_date,
    parse_decimal, to_micros,
};
use crate::model::activity::Activity;
use crate::model::opportunity::{Opportunity, Probability};

const ENTITY: &str = "opportunity";

const OPPORTUNITY_COLUMNS: &str = "opportunity_id, contact_id, pipeline_id, stage_id, title, \
     description, estimated_amount, probability, expected_close_date, owner_id, archived, \
     archived_at_us, loss_reason, win_reason, created_at_us, updated_at_us";

fn opportunity_from_row(row: &Row<'_>) -> rusqlite::Result<Opportunity> {
    let probability: i64 = row.get(7)?;
    let probability = Probability::try_from(probability).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(7, Type::Integer, Box::new(error))
    })?;

    Ok(Opportunity {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        pipeline_id: row.get(2)?,
        stage_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        estimated_amount: parse_decimal(6, row.get(6)?)?,
        probability,
        expected_close_date: parse_date(8, row.get(8)?)?,
        owner_id: row.get(9)?,
        archived: row.get(10)?,
        archived_at: from_micros_opt(11, row.get(11)?)?,
        loss_reason: row.get(12)?,
        win_reason: row.get(13)?,
        created_at: from_micros(14, row.get(14)?)?,
        updated_at: from_micros(15, row.get(15)?)?,
    })
}

/// Conditional update: writes only if the stored token still matches.
fn update_opportunity_on(
    conn: &Connection,
    opportunity: &Opportunity,
    expected_updated_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE opportunities SET
            contact_id = ?2, pipeline_id = ?3, stage_id = ?4, title = ?5, description = ?6,
            estimated_amount = ?7, probability = ?8, expected_close_date = ?9, owner_id = ?10,
            archived = ?11, archived_at_us = ?12, loss_reason = ?13, win_reason = ?14,
            updated_at_us = ?15
         WHERE opportunity_id = ?1 AND updated_at_us = ?16",
        params![
            opportunity.id,
            opportunity.contact_id,
            opportunity.pipeline_id,
            opportunity.stage_id,
            opportunity.title,
            opportunity.description,
            opportunity.estimated_amount.map(|amount| amount.to_string()),
            opportunity.probability.percent(),
            opportunity.expected_close_date.map(|date| date.to_string()),
            opportunity.owner_id,
            opportunity.archived,
            opportunity.archived_at.map(to_micros),
            opportunity.loss_reason,
            opportunity.win_reason,
            to_micros(opportunity.updated_at),
            to_micros(expected_updated_at),
        ],
    )?;

    if changed == 1 {
        return Ok(());
    }

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM opportunities WHERE opportunity_id = ?1)",
        [&opportunity.id],
        |row| row.get(0),
    )?;
    if exists {
        tracing::debug!(opportunity = %opportunity.id, "stale write rejected");
        Err(StoreError::ConcurrentModification {
            entity: ENTITY,
            id: opportunity.id.clone(),
        })
    } else {
        Err(StoreError::not_found(ENTITY, &opportunity.id))
    }
}

impl Store {
    /// # Errors
    ///
    /// Fails if the id is taken or the stage does not exist.
    pub fn insert_opportunity(&self, opportunity: &Opportunity) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "INSERT INTO opportunities ({OPPORTUNITY_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                opportunity.id,
                opportunity.contact_id,
                opportunity.pipeline_id,
                opportunity.stage_id,
                opportunity.title,
                opportunity.description,
                opportunity.estimated_amount.map(|amount| amount.to_string()),
                opportunity.probability.percent(),
                opportunity.expected_close_date.map(|date| date.to_string()),
                opportunity.owner_id,
                opportunity.archived,
                opportunity.archived_at.map(to_micros),
                opportunity.loss_reason,
                opportunity.win_reason,
                to_micros(opportunity.created_at),
                to_micros(opportunity.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Fetch one opportunity, archived or not.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no row has this id.
    pub fn get_opportunity(&self, id: &str) -> Result<Opportunity, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {OPPORTUNITY_COLUMNS} FROM opportunities WHERE opportunity_id = ?1"),
                [id],
                opportunity_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(ENTITY, id))
    }

    /// Every opportunity of `pipeline_id`, including archived ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn list_opportunities(&self, pipeline_id: &str) -> Result<Vec<Opportunity>, StoreError> {
        let sql = format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities
             WHERE pipeline_id = ?1
             ORDER BY created_at_us, opportunity_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([pipeline_id], opportunity_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Overwrite `opportunity` if its stored `updated_at` equals `expected_updated_at`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConcurrentModification`] when another writer got there
    /// first, [`StoreError::NotFound`] when the row is gone.
    pub fn save_opportunity(
        &self,
        opportunity: &Opportunity,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        update_opportunity_on(&self.conn, opportunity, expected_updated_at)
    }

    /// Persist a stage move and its stage-change entry atomically.
    ///
    /// # Errors
    ///
    /// As [`Store::save_opportunity`]; on error neither row is written.
    pub fn record_move(
        &self,
        opportunity: &Opportunity,
        expected_updated_at: DateTime<Utc>,
        stage_change: &Activity,
    ) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        update_opportunity_on(&tx, opportunity, expected_updated_at)?;
        insert_activity_on(&tx, stage_change)?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::opportunity::tests::{at, draft};
    use crate::model::stage::tests::sales_catalog;
    use rust_decimal_macros::dec;

    fn seeded() -> Store {
        let store = Store::open_in_memory().expect("store");
        for stage in sales_catalog().list_stages() {
            store.insert_stage(stage).expect("stage");
        }
        store
    }

    fn deal(id: &str) -> Opportunity {
        let mut d = draft(id, Some(dec!(1234.50)), 40);
        d.expected_close_date = chrono::NaiveDate::from_ymd_opt(2024, 7, 1);
        d.owner_id = Some("ana".into());
        Opportunity::open(d, &sales_catalog(), at(9)).expect("opened")
    }

    #[test]
    fn insert_and_get_preserves_every_field() {
        let store = seeded();
        let opp = deal("o1");
        store.insert_opportunity(&opp).expect("insert");
        assert_eq!(store.get_opportunity("o1").expect("get"), opp);
    }

    #[test]
    fn missing_opportunity_is_not_found() {
        let store = seeded();
        assert!(matches!(
            store.get_opportunity("nope"),
            Err(StoreError::NotFound { entity: "opportunity", .. })
        ));
    }

    #[test]
    fn list_is_scoped_to_pipeline_and_includes_archived() {
        let store = seeded();
        let mut archived = deal("o2");
        archived.archived = true;
        archived.archived_at = Some(at(10));
        store.insert_opportunity(&deal("o1")).expect("insert");
        store.insert_opportunity(&archived).expect("insert");

        let listed = store.list_opportunities("sales").expect("list");
        assert_eq!(listed.len(), 2);
        assert!(store.list_opportunities("renewals").expect("list").is_empty());
    }

    #[test]
    fn stale_save_is_rejected_and_leaves_row_untouched() {
        let store = seeded();
        let original = deal("o1");
        store.insert_opportunity(&original).expect("insert");

        let mut first = original.clone();
        first.title = "first writer".into();
        first.touch(at(10));
        store.save_opportunity(&first, original.updated_at).expect("first save");

        let mut second = original.clone();
        second.title = "second writer".into();
        second.touch(at(10));
        let err = store
            .save_opportunity(&second, original.updated_at)
            .expect_err("stale token");
        assert!(matches!(err, StoreError::ConcurrentModification { .. }));
        assert_eq!(store.get_opportunity("o1").expect("get").title, "first writer");
    }

    #[test]
    fn saving_a_deleted_row_is_not_found() {
        let store = seeded();
        let opp = deal("ghost");
        assert!(matches!(
            store.save_opportunity(&opp, opp.updated_at),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn failed_move_writes_nothing() {
        let store = seeded();
        let original = deal("o1");
        store.insert_opportunity(&original).expect("insert");

        let mut moved = original.clone();
        moved.stage_id = "negotiation".into();
        moved.touch(at(11));
        let change = Activity::stage_change("s1", "o1", "lead", "negotiation", "ana", at(11));

        let stale = at(3);
        assert!(store.record_move(&moved, stale, &change).is_err());
        assert!(store.list_activities("o1").expect("list").is_empty());

        store.record_move(&moved, original.updated_at, &change).expect("move");
        assert_eq!(store.get_opportunity("o1").expect("get").stage_id, "negotiation");
        assert_eq!(store.list_activities("o1").expect("list"), [change]);
    }
}
