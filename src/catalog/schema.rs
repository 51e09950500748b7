//! SQLite schema definitions for the ingestion catalog database.
//!
//! One row per track keyed by the prefixed record id, plus one JSON document
//! per provider holding its rotation/offset progress.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

// =============================================================================
// Version 1 - Tracks and provider progress documents
// =============================================================================

const TRACKS_TABLE_V1: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true), // <prefix>-<native id>
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("title_lower", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("artist_id", &SqlType::Text, non_null = true),
        sqlite_column!("album", &SqlType::Text, non_null = true),
        sqlite_column!("album_id", &SqlType::Text, non_null = true),
        sqlite_column!("duration_seconds", &SqlType::Integer, non_null = true),
        sqlite_column!("artwork_ref", &SqlType::Text, non_null = true),
        sqlite_column!("audio_ref", &SqlType::Text, non_null = true),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
        sqlite_column!("license_description", &SqlType::Text, non_null = true),
        sqlite_column!("provider_name", &SqlType::Text, non_null = true),
        sqlite_column!("provider_url", &SqlType::Text, non_null = true),
        sqlite_column!(
            "inserted_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_tracks_title_lower", "title_lower")],
};

const INGEST_PROGRESS_TABLE_V1: Table = Table {
    name: "ingest_progress",
    columns: &[
        sqlite_column!("path", &SqlType::Text, is_primary_key = true), // ingest_progress/<provider>
        sqlite_column!("document", &SqlType::Text, non_null = true),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[TRACKS_TABLE_V1, INGEST_PROGRESS_TABLE_V1],
    migration: None,
}];
