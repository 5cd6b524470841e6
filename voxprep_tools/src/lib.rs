pub mod backfill;
pub mod manifest;
pub mod merge;
