//! Raw and probability-weighted projections over one pipeline.
//!
//! Open (normal-stage) opportunities make up the pipeline totals; won and
//! lost ones are reported separately. Archived entries are left out.
//!
//! Sums run over opportunities in ascending id order, so the result does not
//! depend on the order the snapshot was fetched in.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::error::ErrorCode;
use crate::model::opportunity::Opportunity;
use crate::model::stage::{StageCatalog, SystemRole};

/// A stage's amounts do not fit the decimal range.
///
/// Only reachable through rows written around the amount bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("amount totals overflow at stage '{stage_id}'")]
pub struct AmountOverflow {
    pub stage_id: String,
}

impl AmountOverflow {
    fn at(stage_id: &str) -> Self {
        Self {
            stage_id: stage_id.to_string(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::AmountOverflow
    }
}

/// Count plus raw and weighted sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Totals {
    pub count: usize,
    pub amount: Decimal,
    pub weighted: Decimal,
}

impl Totals {
    fn plus(self, count: usize, amount: Decimal, weighted: Decimal) -> Option<Self> {
        Some(Self {
            count: self.count + count,
            amount: self.amount.checked_add(amount)?,
            weighted: self.weighted.checked_add(weighted)?,
        })
    }

    /// Accumulate in ascending id order regardless of input order.
    pub(crate) fn accumulate<'a>(
        stage_id: &str,
        opportunities: impl IntoIterator<Item = &'a Opportunity>,
    ) -> Result<Self, AmountOverflow> {
        let mut sorted: Vec<&Opportunity> = opportunities.into_iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted
            .into_iter()
            .try_fold(Self::default(), |totals, opportunity| {
                totals.plus(1, opportunity.amount(), opportunity.weighted_amount()?)
            })
            .ok_or_else(|| AmountOverflow::at(stage_id))
    }

    fn add(&mut self, other: Self, stage_id: &str) -> Result<(), AmountOverflow> {
        *self = self
            .plus(other.count, other.amount, other.weighted)
            .ok_or_else(|| AmountOverflow::at(stage_id))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageForecast {
    pub stage_id: String,
    pub stage_name: String,
    pub system_role: SystemRole,
    pub count: usize,
    pub total_amount: Decimal,
    pub weighted_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forecast {
    pub pipeline_id: String,
    pub per_stage: Vec<StageForecast>,
    /// Sum over normal stages only.
    pub pipeline_total: Decimal,
    pub pipeline_weighted_total: Decimal,
    pub open_count: usize,
    pub won_count: usize,
    pub lost_count: usize,
    pub won_amount: Decimal,
}

/// Compute the forecast for `catalog`'s pipeline from a snapshot.
///
/// # Errors
///
/// [`AmountOverflow`] when a stage or pipeline sum leaves the decimal range.
pub fn compute_forecast(
    catalog: &StageCatalog,
    opportunities: &[Opportunity],
) -> Result<Forecast, AmountOverflow> {
    let mut by_stage: HashMap<&str, Vec<&Opportunity>> = HashMap::new();
    for opportunity in opportunities {
        if opportunity.archived || opportunity.pipeline_id != catalog.pipeline_id() {
            continue;
        }
        if catalog.find(&opportunity.stage_id).is_none() {
            warn!(
                opportunity = %opportunity.id,
                stage = %opportunity.stage_id,
                "opportunity references a stage outside the catalog; excluded from forecast"
            );
            continue;
        }
        by_stage
            .entry(opportunity.stage_id.as_str())
            .or_default()
            .push(opportunity);
    }

    let mut open = Totals::default();
    let mut won = Totals::default();
    let mut lost = Totals::default();
    let mut per_stage = Vec::with_capacity(catalog.list_stages().len());

    for stage in catalog.list_stages() {
        let cards = by_stage.remove(stage.id.as_str()).unwrap_or_default();
        let totals = Totals::accumulate(&stage.id, cards)?;
        match stage.system_role {
            SystemRole::Normal => open.add(totals, &stage.id)?,
            SystemRole::Won => won.add(totals, &stage.id)?,
            SystemRole::Lost => lost.add(totals, &stage.id)?,
        }
        per_stage.push(StageForecast {
            stage_id: stage.id.clone(),
            stage_name: stage.name.clone(),
            system_role: stage.system_role,
            count: totals.count,
            total_amount: totals.amount.normalize(),
            weighted_amount: totals.weighted.normalize(),
        });
    }

    Ok(Forecast {
        pipeline_id: catalog.pipeline_id().to_string(),
        per_stage,
        pipeline_total: open.amount.normalize(),
        pipeline_weighted_total: open.weighted.normalize(),
        open_count: open.count,
        won_count: won.count,
        lost_count: lost.count,
        won_amount: won.amount.normalize(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::opportunity::MAX_AMOUNT;
    use crate::model::opportunity::tests::{at, draft};
    use crate::model::stage::tests::sales_catalog;
    use rust_decimal_macros::dec;

    fn deal(id: &str, stage: &str, amount: Option<Decimal>, probability: i64) -> Opportunity {
        let mut opp = Opportunity::open(draft(id, amount, probability), &sales_catalog(), at(9))
            .expect("opened");
        opp.stage_id = stage.to_string();
        opp
    }

    #[test]
    fn empty_snapshot_yields_zeroes_for_every_stage() {
        let forecast = compute_forecast(&sales_catalog(), &[]).expect("forecast");
        assert_eq!(forecast.per_stage.len(), 4);
        assert!(forecast.per_stage.iter().all(|s| s.count == 0));
        assert_eq!(forecast.pipeline_total, Decimal::ZERO);
        assert_eq!(forecast.open_count, 0);
    }

    #[test]
    fn pipeline_totals_cover_open_stages_only() {
        let deals = [
            deal("a", "lead", Some(dec!(1000)), 50),
            deal("b", "negotiation", Some(dec!(300)), 10),
            deal("c", "closed-won", Some(dec!(5000)), 100),
            deal("d", "closed-lost", Some(dec!(700)), 0),
            deal("e", "lead", None, 90),
        ];
        let forecast = compute_forecast(&sales_catalog(), &deals).expect("forecast");

        assert_eq!(forecast.pipeline_total, dec!(1300));
        assert_eq!(forecast.pipeline_weighted_total, dec!(530));
        assert_eq!(forecast.open_count, 3);
        assert_eq!(forecast.won_count, 1);
        assert_eq!(forecast.won_amount, dec!(5000));
        assert_eq!(forecast.lost_count, 1);

        let lead = &forecast.per_stage[0];
        assert_eq!(lead.stage_id, "lead");
        assert_eq!(lead.count, 2);
        assert_eq!(lead.total_amount, dec!(1000));
        assert_eq!(lead.weighted_amount, dec!(500));
    }

    #[test]
    fn archived_and_foreign_entries_are_excluded() {
        let mut archived = deal("a", "lead", Some(dec!(1000)), 50);
        archived.archived = true;
        let mut foreign = deal("b", "lead", Some(dec!(1000)), 50);
        foreign.pipeline_id = "renewals".into();
        let orphan = deal("c", "gone", Some(dec!(1000)), 50);

        let forecast = compute_forecast(&sales_catalog(), &[archived, foreign, orphan]).expect("forecast");
        assert_eq!(forecast.open_count, 0);
        assert_eq!(forecast.pipeline_total, Decimal::ZERO);
    }

    #[test]
    fn input_order_does_not_matter() {
        let deals = vec![
            deal("x", "lead", Some(dec!(0.10)), 33),
            deal("y", "lead", Some(dec!(0.20)), 67),
            deal("z", "negotiation", Some(dec!(12345.678)), 1),
        ];
        let mut reversed = deals.clone();
        reversed.reverse();
        assert_eq!(
            compute_forecast(&sales_catalog(), &deals),
            compute_forecast(&sales_catalog(), &reversed)
        );
    }

    #[test]
    fn many_maximum_amounts_still_sum() {
        let deals: Vec<Opportunity> = (0..1000)
            .map(|i| deal(&format!("d{i:04}"), "lead", Some(MAX_AMOUNT), 100))
            .chain((0..1000).map(|i| deal(&format!("w{i:04}"), "closed-won", Some(MAX_AMOUNT), 100)))
            .collect();
        let forecast = compute_forecast(&sales_catalog(), &deals).expect("forecast");
        assert_eq!(forecast.pipeline_total, MAX_AMOUNT * dec!(1000));
        assert_eq!(forecast.pipeline_weighted_total, MAX_AMOUNT * dec!(1000));
        assert_eq!(forecast.won_amount, MAX_AMOUNT * dec!(1000));
        assert_eq!(forecast.open_count, 1000);
    }

    #[test]
    fn oversized_stored_amount_is_an_error_not_a_panic() {
        let mut huge = deal("a", "negotiation", None, 50);
        huge.estimated_amount = Some(Decimal::MAX);
        let err = compute_forecast(&sales_catalog(), &[huge]).expect_err("overflow");
        assert_eq!(err.stage_id, "negotiation");
        assert_eq!(err.code(), ErrorCode::AmountOverflow);

        let mut first = deal("b", "lead", None, 0);
        first.estimated_amount = Some(Decimal::MAX);
        let mut second = deal("c", "lead", None, 0);
        second.estimated_amount = Some(Decimal::MAX);
        let err = compute_forecast(&sales_catalog(), &[first, second]).expect_err("sum overflow");
        assert_eq!(err.stage_id, "lead");
    }
}
