use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{Store, StoreError, from_micros, from_micros_opt, parse_text, to_micros};
use crate::model::activity::{Activity, StageChange};

const ENTITY: &str = "activity";

const ACTIVITY_COLUMNS: &str = "activity_id, opportunity_id, kind, content, created_at_us, \
     created_by, start_at_us, end_at_us, due_at_us, location, completed, completed_by, \
     completed_at_us, assigned_to, from_stage_id, to_stage_id, updated_at_us";

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let kind: String = row.get(2)?;
    let from_stage_id: Option<String> = row.get(14)?;
    let to_stage_id: Option<String> = row.get(15)?;

    Ok(Activity {
        id: row.get(0)?,
        opportunity_id: row.get(1)?,
        kind: parse_text(2, &kind)?,
        content: row.get(3)?,
        created_at: from_micros(4, row.get(4)?)?,
        created_by: row.get(5)?,
        start_at: from_micros_opt(6, row.get(6)?)?,
        end_at: from_micros_opt(7, row.get(7)?)?,
        due_at: from_micros_opt(8, row.get(8)?)?,
        location: row.get(9)?,
        completed: row.get(10)?,
        completed_by: row.get(11)?,
        completed_at: from_micros_opt(12, row.get(12)?)?,
        assigned_to: row.get(13)?,
        stage_change: to_stage_id.map(|to_stage_id| StageChange {
            from_stage_id: from_stage_id.unwrap_or_default(),
            to_stage_id,
        }),
        updated_at: from_micros(16, row.get(16)?)?,
    })
}

pub(super) fn insert_activity_on(conn: &Connection, activity: &Activity) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "INSERT INTO activities ({ACTIVITY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            activity.id,
            activity.opportunity_id,
            activity.kind.to_string(),
            activity.content,
            to_micros(activity.created_at),
            activity.created_by,
            activity.start_at.map(to_micros),
            activity.end_at.map(to_micros),
            activity.due_at.map(to_micros),
            activity.location,
            activity.completed,
            activity.completed_by,
            activity.completed_at.map(to_micros),
            activity.assigned_to,
            activity.stage_change.as_ref().map(|change| change.from_stage_id.as_str()),
            activity.stage_change.as_ref().map(|change| change.to_stage_id.as_str()),
            to_micros(activity.updated_at),
        ],
    )?;
    Ok(())
}

impl Store {
    /// # Errors
    ///
    /// Fails if the id is taken or the opportunity does not exist.
    pub fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        insert_activity_on(&self.conn, activity)
    }

    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no row has this id.
    pub fn get_activity(&self, id: &str) -> Result<Activity, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE activity_id = ?1"),
                [id],
                activity_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(ENTITY, id))
    }

    /// Activities of one opportunity in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn list_activities(&self, opportunity_id: &str) -> Result<Vec<Activity>, StoreError> {
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE opportunity_id = ?1 ORDER BY seq"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([opportunity_id], activity_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Overwrite `activity` if its stored `updated_at` equals `expected_updated_at`.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConcurrentModification`] on a stale token,
    /// [`StoreError::NotFound`] when the row is gone.
    pub fn save_activity(
        &self,
        activity: &Activity,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE activities SET
                content = ?2, start_at_us = ?3, end_at_us = ?4, due_at_us = ?5, location = ?6,
                completed = ?7, completed_by = ?8, completed_at_us = ?9, assigned_to = ?10,
                updated_at_us = ?11
             WHERE activity_id = ?1 AND updated_at_us = ?12",
            params![
                activity.id,
                activity.content,
                activity.start_at.map(to_micros),
                activity.end_at.map(to_micros),
                activity.due_at.map(to_micros),
                activity.location,
                activity.completed,
                activity.completed_by,
                activity.completed_at.map(to_micros),
                activity.assigned_to,
                to_micros(activity.updated_at),
                to_micros(expected_updated_at),
            ],
        )?;
        if changed == 1 {
            return Ok(());
        }

        // Distinguish a stale token from a deleted row.
        self.get_activity(&activity.id)?;
        Err(StoreError::ConcurrentModification {
            entity: ENTITY,
            id: activity.id.clone(),
        })
    }

    /// # Errors
    ///
    /// [`StoreError::NotFound`] if no row has this id.
    pub fn delete_activity(&self, id: &str) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM activities WHERE activity_id = ?1", [id])?;
        if deleted == 0 {
            return Err(StoreError::not_found(ENTITY, id));
        }
        Ok(())
    }
}
