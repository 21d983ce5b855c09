use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use crate::error::ErrorCode;

/// The three system roles a stage can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemRole {
    Normal,
    Won,
    Lost,
}

impl SystemRole {
    pub const ALL: [Self; 3] = [Self::Normal, Self::Won, Self::Lost];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    /// Won and Lost stages close an opportunity.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match super::normalize(s).as_str() {
            "normal" | "open" => Ok(Self::Normal),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            _ => Err(ParseEnumError {
                expected: "system role",
                got: s.to_string(),
            }),
        }
    }
}

/// A kanban column of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub pipeline_id: String,
    pub name: String,
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_hint: Option<String>,
    pub system_role: SystemRole,
}

/// Configuration problems in a pipeline's stage list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("pipeline '{pipeline_id}' has no stages")]
    NoStages { pipeline_id: String },

    #[error("pipeline '{pipeline_id}' has no normal stage to accept new opportunities")]
    NoOpenStage { pipeline_id: String },

    #[error("stage id '{stage_id}' appears more than once")]
    DuplicateStage { stage_id: String },
}

impl CatalogError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NoStages { .. } => ErrorCode::NoStages,
            Self::NoOpenStage { .. } => ErrorCode::NoOpenStage,
            Self::DuplicateStage { .. } => ErrorCode::DuplicateStage,
        }
    }
}

/// Ordered, validated stage list of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCatalog {
    pipeline_id: String,
    stages: Vec<Stage>,
}

impl StageCatalog {
    /// Build the catalog for `pipeline_id` from stages in creation order.
    ///
    /// Stages of other pipelines are ignored. The sort is stable, so stages
    /// sharing an `order` value keep their creation order.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NoStages`] when the pipeline has no stage at all,
    /// [`CatalogError::DuplicateStage`] when an id repeats.
    pub fn new(
        pipeline_id: impl Into<String>,
        stages: impl IntoIterator<Item = Stage>,
    ) -> Result<Self, CatalogError> {
        let pipeline_id = pipeline_id.into();
        let mut stages: Vec<Stage> = stages
            .into_iter()
            .filter(|stage| stage.pipeline_id == pipeline_id)
            .collect();

        if stages.is_empty() {
            return Err(CatalogError::NoStages { pipeline_id });
        }

        let mut seen = HashSet::with_capacity(stages.len());
        for stage in &stages {
            if !seen.insert(stage.id.as_str()) {
                return Err(CatalogError::DuplicateStage {
                    stage_id: stage.id.clone(),
                });
            }
        }

        stages.sort_by_key(|stage| stage.order);
        Ok(Self {
            pipeline_id,
            stages,
        })
    }

    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Stages ascending by `order`.
    #[must_use]
    pub fn list_stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn find(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.id == stage_id)
    }

    #[must_use]
    pub fn role_of(&self, stage_id: &str) -> Option<SystemRole> {
        self.find(stage_id).map(|stage| stage.system_role)
    }

    /// First normal stage in board order; where new opportunities land.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NoOpenStage`] if every stage is terminal.
    pub fn default_stage(&self) -> Result<&Stage, CatalogError> {
        self.stages
            .iter()
            .find(|stage| stage.system_role == SystemRole::Normal)
            .ok_or_else(|| CatalogError::NoOpenStage {
                pipeline_id: self.pipeline_id.clone(),
            })
    }
}
