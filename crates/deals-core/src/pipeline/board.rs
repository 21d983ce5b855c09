//! Kanban board: one column per stage, rebuilt from scratch per request.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::forecast::{AmountOverflow, Totals};
use crate::model::opportunity::Opportunity;
use crate::model::stage::{Stage, StageCatalog};

/// Which opportunities appear on the board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    /// Restrict to opportunities owned by this user ("only mine").
    pub only_owner: Option<String>,
    /// Archived opportunities are hidden unless this is set.
    pub include_archived: bool,
}

impl BoardFilter {
    fn admits(&self, opportunity: &Opportunity) -> bool {
        if opportunity.archived && !self.include_archived {
            return false;
        }
        match &self.only_owner {
            Some(owner) => opportunity.owner_id.as_deref() == Some(owner.as_str()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardColumn {
    pub stage: Stage,
    pub opportunities: Vec<Opportunity>,
    pub total_amount: Decimal,
    pub weighted_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    pub pipeline_id: String,
    pub columns: Vec<BoardColumn>,
}

impl Board {
    #[must_use]
    pub fn column(&self, stage_id: &str) -> Option<&BoardColumn> {
        self.columns.iter().find(|column| column.stage.id == stage_id)
    }

    #[must_use]
    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|column| column.opportunities.len()).sum()
    }
}

/// Group `opportunities` into the columns of `catalog`.
///
/// Every stage gets a column, empty or not. Cards are ordered by creation
/// time, then id. Opportunities of other pipelines are ignored; ones whose
/// stage is missing from the catalog are skipped with a warning.
///
/// # Errors
///
/// [`AmountOverflow`] when a column total leaves the decimal range.
pub fn build_board(
    catalog: &StageCatalog,
    opportunities: &[Opportunity],
    filter: &BoardFilter,
) -> Result<Board, AmountOverflow> {
    let mut by_stage: HashMap<&str, Vec<&Opportunity>> = HashMap::new();

    for opportunity in opportunities {
        if opportunity.pipeline_id != catalog.pipeline_id() || !filter.admits(opportunity) {
            continue;
        }
        if catalog.find(&opportunity.stage_id).is_none() {
            warn!(
                opportunity = %opportunity.id,
                stage = %opportunity.stage_id,
                "opportunity references a stage outside the catalog; skipping"
            );
            continue;
        }
        by_stage
            .entry(opportunity.stage_id.as_str())
            .or_default()
            .push(opportunity);
    }

    let columns = catalog
        .list_stages()
        .iter()
        .map(|stage| {
            let mut cards = by_stage.remove(stage.id.as_str()).unwrap_or_default();
            let totals = Totals::accumulate(&stage.id, cards.iter().copied())?;
            cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(BoardColumn {
                stage: stage.clone(),
                opportunities: cards.into_iter().cloned().collect(),
                total_amount: totals.amount.normalize(),
                weighted_amount: totals.weighted.normalize(),
            })
        })
        .collect::<Result<Vec<_>, AmountOverflow>>()?;

    Ok(Board {
        pipeline_id: catalog.pipeline_id().to_string(),
        columns,
    })
}
