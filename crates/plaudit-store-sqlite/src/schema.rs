//! SQL schema for the Plaudit SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS companies (
    company_id               TEXT PRIMARY KEY,
    name                     TEXT NOT NULL,
    slug                     TEXT NOT NULL UNIQUE,
    iframe_token             TEXT,
    form_schema              TEXT,              -- JSON document or NULL
    auto_publish_high_rating INTEGER NOT NULL DEFAULT 0,
    created_at               TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS forms (
    form_id    TEXT PRIMARY KEY,
    company_id TEXT NOT NULL REFERENCES companies(company_id),
    slug       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Responses are never updated after insert.
CREATE TABLE IF NOT EXISTS responses (
    response_id TEXT PRIMARY KEY,
    company_id  TEXT NOT NULL REFERENCES companies(company_id),
    form_id     TEXT NOT NULL REFERENCES forms(form_id),
    payload     TEXT NOT NULL,                 -- JSON answer map
    created_at  TEXT NOT NULL
);

-- At most one testimonial per response.
CREATE TABLE IF NOT EXISTS testimonials (
    testimonial_id TEXT PRIMARY KEY,
    company_id     TEXT NOT NULL REFERENCES companies(company_id),
    response_id    TEXT NOT NULL UNIQUE REFERENCES responses(response_id),
    is_public      INTEGER,                    -- NULL is treated as false
    published_at   TEXT,
    ai_headline    TEXT NOT NULL DEFAULT '',
    ai_body        TEXT NOT NULL DEFAULT '',
    ai_bullets     TEXT NOT NULL DEFAULT '[]', -- JSON string array
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS forms_company_idx        ON forms(company_id);
CREATE INDEX IF NOT EXISTS responses_company_idx    ON responses(company_id);
CREATE INDEX IF NOT EXISTS testimonials_company_idx ON testimonials(company_id);

PRAGMA user_version = 1;
";
