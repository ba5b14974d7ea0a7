//! `tagkit_label` v1:
//! Rust-side price-tag generation engine.
//!
//! Architecture:
//! - `conf`      : constants, static tables and preset factories
//! - `spec`      : enums/models/options/errors
//! - `util`      : shared helper functions
//! - `normalize` : raw cells to canonical record fields
//! - `classify`  : record color category
//! - `ingest`    : spreadsheet frames to records, filter options, export
//! - `xml`       : owned XML tree codec
//! - `document`  : owned word-processing document tree
//! - `ooxml`     : XML tree <-> document tree
//! - `docx`      : `.docx` package codec
//! - `template`  : placeholders and built-in prototypes
//! - `grid`      : prototype cell to N x M grid expansion
//! - `render`    : one chunk of records into one page
//! - `autosize`  : marker-driven font sizing
//! - `format`    : conditional colors and spacing cleanup
//! - `compose`   : ordered pages into one document
//! - `pipeline`  : filter/sort/chunk/render/compose/save orchestration
//! - `report`    : run-time report model
//! - `session`   : selection state and lineage overrides
//! - `feed`      : transfer-feed fuzzy matching

pub mod autosize;
pub mod classify;
pub mod compose;
pub mod conf;
pub mod document;
pub mod docx;
pub mod feed;
pub mod format;
pub mod grid;
pub mod ingest;
pub mod normalize;
pub mod ooxml;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod session;
pub mod spec;
pub mod template;
pub mod util;
pub mod xml;

pub use classify::classify_record;
pub use compose::compose_documents;
pub use docx::{SpecDocxPackage, load_docx, load_docx_bytes, save_docx_bytes};
pub use feed::{
    SpecFeedItem, SpecFeedMatchOptions, SpecFeedPayload, match_feed_json, match_feed_records,
    parse_feed,
};
pub use grid::expand_template;
pub use ingest::{
    SpecFilterOptions, derive_filter_options, export_records_to_xlsx, load_records,
    load_records_from_dataframe, load_records_from_ipc_bytes, read_spreadsheet,
};
pub use normalize::{normalize_record, normalize_row};
pub use pipeline::{FileLockReleaser, NoopLockReleaser, run_generate};
pub use render::{render_back_page, render_chunk};
pub use report::{ReportRun, ReportRunBuilder};
pub use session::{
    AuditLog, FileAuditLog, MemoryAuditLog, SelectionState, change_lineage,
};
pub use spec::{
    EnumColorCategory, EnumFieldKind, EnumLineage, EnumOrientation, EnumProductStrain,
    LabelError, SpecGridShape, SpecImageAsset, SpecLabelAssets, SpecLabelRecord,
    SpecRecordFilters, SpecRunOptions,
};
