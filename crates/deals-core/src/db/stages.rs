use rusqlite::{Row, params};

use super::{Store, StoreError, parse_text};
use crate::model::stage::Stage;

const STAGE_COLUMNS: &str = "stage_id, pipeline_id, name, position, color_hint, system_role";

fn stage_from_row(row: &Row<'_>) -> rusqlite::Result<Stage> {
    let role: String = row.get(5)?;
    Ok(Stage {
        id: row.get(0)?,
        pipeline_id: row.get(1)?,
        name: row.get(2)?,
        order: row.get(3)?,
        color_hint: row.get(4)?,
        system_role: parse_text(5, &role)?,
    })
}

impl Store {
    /// # Errors
    ///
    /// Fails on constraint violations such as a reused stage id.
    pub fn insert_stage(&self, stage: &Stage) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO stages (stage_id, pipeline_id, name, position, color_hint, system_role)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stage.id,
                stage.pipeline_id,
                stage.name,
                stage.order,
                stage.color_hint,
                stage.system_role.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Stages of `pipeline_id` by position, ties in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn list_stages(&self, pipeline_id: &str) -> Result<Vec<Stage>, StoreError> {
        let sql = format!(
            "SELECT {STAGE_COLUMNS} FROM stages WHERE pipeline_id = ?1 ORDER BY position, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let stages = stmt
            .query_map([pipeline_id], stage_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stages)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stage_exists(&self, stage_id: &str) -> Result<bool, StoreError> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM stages WHERE stage_id = ?1)",
            [stage_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Distinct pipeline ids that have at least one stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_pipelines(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT pipeline_id FROM stages ORDER BY pipeline_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stage::SystemRole;
    use crate::model::stage::tests::stage;

    #[test]
    fn stages_list_by_position_then_creation() {
        let store = Store::open_in_memory().expect("store");
        for s in [
            stage("won", 3, SystemRole::Won),
            stage("b", 1, SystemRole::Normal),
            stage("a", 1, SystemRole::Normal),
        ] {
            store.insert_stage(&s).expect("insert");
        }
        let mut renewals = stage("r", 0, SystemRole::Normal);
        renewals.pipeline_id = "renewals".into();
        renewals.color_hint = Some("#00ff00".into());
        store.insert_stage(&renewals).expect("insert");

        let ids: Vec<String> = store
            .list_stages("sales")
            .expect("list")
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["b", "a", "won"]);

        let loaded = store.list_stages("renewals").expect("list");
        assert_eq!(loaded, [renewals]);
        assert_eq!(store.list_pipelines().expect("pipelines"), ["renewals", "sales"]);
    }

    #[test]
    fn reused_stage_id_is_rejected() {
        let store = Store::open_in_memory().expect("store");
        store.insert_stage(&stage("lead", 1, SystemRole::Normal)).expect("insert");
        assert!(store.stage_exists("lead").expect("exists"));
        assert!(matches!(
            store.insert_stage(&stage("lead", 2, SystemRole::Normal)),
            Err(StoreError::Sqlite(_))
        ));
    }
}
