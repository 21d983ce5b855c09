//! SQLite schema for the deals store.
//!
//! - `stages` holds every pipeline's columns; `position` is the display order
//! - `opportunities` holds the latest state of each deal; `updated_at_us` is
//!   the optimistic-concurrency token
//! - `activities` keeps the timeline; `seq` preserves insertion order
//!
//! Instants are microseconds since the Unix epoch, amounts are decimal text,
//! and calendar dates are ISO-8601 text.

/// Migration v1: stages, opportunities, activities.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stages (
    stage_id TEXT PRIMARY KEY CHECK (length(trim(stage_id)) > 0),
    pipeline_id TEXT NOT NULL CHECK (length(trim(pipeline_id)) > 0),
    name TEXT NOT NULL,
    position INTEGER NOT NULL,
    color_hint TEXT,
    system_role TEXT NOT NULL CHECK (system_role IN ('normal', 'won', 'lost'))
);

CREATE TABLE IF NOT EXISTS opportunities (
    opportunity_id TEXT PRIMARY KEY,
    contact_id TEXT NOT NULL,
    pipeline_id TEXT NOT NULL,
    stage_id TEXT NOT NULL REFERENCES stages(stage_id),
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    estimated_amount TEXT,
    probability INTEGER NOT NULL CHECK (probability BETWEEN 0 AND 100),
    expected_close_date TEXT,
    owner_id TEXT,
    archived INTEGER NOT NULL DEFAULT 0 CHECK (archived IN (0, 1)),
    archived_at_us INTEGER,
    loss_reason TEXT,
    win_reason TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (loss_reason IS NULL OR win_reason IS NULL)
);

CREATE TABLE IF NOT EXISTS activities (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    activity_id TEXT NOT NULL UNIQUE,
    opportunity_id TEXT NOT NULL REFERENCES opportunities(opportunity_id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN (
        'note', 'call', 'email', 'whatsapp', 'meeting', 'task', 'reminder', 'stage_change'
    )),
    content TEXT,
    created_at_us INTEGER NOT NULL,
    created_by TEXT NOT NULL,
    start_at_us INTEGER,
    end_at_us INTEGER,
    due_at_us INTEGER,
    location TEXT,
    completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1)),
    completed_by TEXT,
    completed_at_us INTEGER,
    assigned_to TEXT,
    from_stage_id TEXT,
    to_stage_id TEXT,
    updated_at_us INTEGER NOT NULL,
    CHECK ((kind = 'stage_change') = (to_stage_id IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_stages_pipeline_position
    ON stages(pipeline_id, position);

CREATE INDEX IF NOT EXISTS idx_opportunities_pipeline_stage
    ON opportunities(pipeline_id, stage_id);

CREATE INDEX IF NOT EXISTS idx_opportunities_owner
    ON opportunities(owner_id);

CREATE INDEX IF NOT EXISTS idx_activities_opportunity_seq
    ON activities(opportunity_id, seq);
"#;

/// Indexes every migrated database must have.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_stages_pipeline_position",
    "idx_opportunities_pipeline_stage",
    "idx_opportunities_owner",
    "idx_activities_opportunity_seq",
];
