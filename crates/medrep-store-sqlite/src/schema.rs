//! SQL schema for the medrep SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS reps (
    rep_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    role          TEXT NOT NULL,    -- 'rep' | 'manager'
    password_hash TEXT NOT NULL,    -- argon2 PHC string
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS weekly_plans (
    plan_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    rep_id          INTEGER NOT NULL REFERENCES reps(rep_id),
    week_number     INTEGER NOT NULL CHECK (week_number BETWEEN 1 AND 53),
    planned_date    TEXT NOT NULL,  -- YYYY-MM-DD
    plan_text       TEXT NOT NULL DEFAULT '',
    product_line    TEXT NOT NULL DEFAULT '',
    entity_address  TEXT NOT NULL DEFAULT '',
    entity_type     TEXT NOT NULL DEFAULT '',
    specialization  TEXT NOT NULL DEFAULT '',
    visit_objective TEXT NOT NULL DEFAULT '',
    other_objective TEXT NOT NULL DEFAULT '',
    notes           TEXT NOT NULL DEFAULT '',
    status          TEXT NOT NULL DEFAULT 'pending',
    is_deleted      INTEGER NOT NULL DEFAULT 0,
    deleted_at      TEXT,
    deleted_by      INTEGER REFERENCES reps(rep_id),
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- At most one visit per (rep, plan) is kept by get-or-create, not by a
-- constraint.
CREATE TABLE IF NOT EXISTS daily_visits (
    visit_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    rep_id          INTEGER NOT NULL REFERENCES reps(rep_id),
    weekly_plan_id  INTEGER REFERENCES weekly_plans(plan_id),
    client_id       INTEGER REFERENCES clients(client_id),
    visit_date      TEXT NOT NULL,
    actual_datetime TEXT,
    time_shift      TEXT NOT NULL DEFAULT '',
    entity          TEXT NOT NULL DEFAULT '',
    address         TEXT NOT NULL DEFAULT '',
    city            TEXT NOT NULL DEFAULT '',
    phone           TEXT NOT NULL DEFAULT '',
    client_doctor   TEXT NOT NULL DEFAULT '',
    visit_status    TEXT NOT NULL DEFAULT '',
    visit_objective TEXT NOT NULL DEFAULT '',
    other_objective TEXT NOT NULL DEFAULT '',
    week_number     INTEGER CHECK (week_number BETWEEN 1 AND 53),
    is_deleted      INTEGER NOT NULL DEFAULT 0,
    deleted_at      TEXT,
    deleted_by      INTEGER REFERENCES reps(rep_id),
    last_change     TEXT NOT NULL DEFAULT '',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clients (
    client_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    rep_id      INTEGER NOT NULL REFERENCES reps(rep_id),
    doctor_name TEXT NOT NULL DEFAULT '',
    entity_name TEXT NOT NULL DEFAULT '',
    city        TEXT NOT NULL DEFAULT '',
    location    TEXT NOT NULL DEFAULT '',
    phone       TEXT NOT NULL DEFAULT '',
    email       TEXT NOT NULL DEFAULT '',
    status      TEXT,               -- 'Potential' | 'Active' | 'Not Interested'
    notes       TEXT NOT NULL DEFAULT '',
    week_number INTEGER NOT NULL CHECK (week_number BETWEEN 1 AND 53),
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    deleted_at  TEXT,
    deleted_by  INTEGER REFERENCES reps(rep_id),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Intended to hold one row per (rep_id, week_number). Deliberately not
-- UNIQUE: duplicates are folded by the archival engine.
CREATE TABLE IF NOT EXISTS archive_snapshots (
    snapshot_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    rep_id          INTEGER NOT NULL REFERENCES reps(rep_id),
    week_number     INTEGER NOT NULL CHECK (week_number BETWEEN 1 AND 53),
    planned_date    TEXT,
    plan_text       TEXT NOT NULL DEFAULT '',
    targeted_line   TEXT NOT NULL DEFAULT '',
    entity_type     TEXT NOT NULL DEFAULT '',
    specialization  TEXT NOT NULL DEFAULT '',
    visit_objective TEXT NOT NULL DEFAULT '',
    entity_address  TEXT NOT NULL DEFAULT '',
    notes           TEXT NOT NULL DEFAULT '',
    status          TEXT NOT NULL DEFAULT '',
    total_visits    INTEGER NOT NULL DEFAULT 0,
    unique_clients  INTEGER NOT NULL DEFAULT 0,
    archived_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS plans_owner_idx     ON weekly_plans(rep_id, week_number, is_deleted);
CREATE INDEX IF NOT EXISTS visits_owner_idx    ON daily_visits(rep_id, week_number, is_deleted);
CREATE INDEX IF NOT EXISTS visits_plan_idx     ON daily_visits(weekly_plan_id);
CREATE INDEX IF NOT EXISTS clients_owner_idx   ON clients(rep_id, week_number, is_deleted);
CREATE INDEX IF NOT EXISTS snapshots_key_idx   ON archive_snapshots(rep_id, week_number);

PRAGMA user_version = 1;
";
