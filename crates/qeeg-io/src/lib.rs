//! qeeg-io: thin adapters between the analysis core and the filesystem
//!
//! ## Modules
//! - `csv_reader` - dense recording CSV/TSV input
//! - `triggers` - trigger-channel event extraction
//! - `reference_csv` - reference statistics serialization
//! - `run_meta` - run-metadata JSON writer/reader
//! - `resolve` - `PATH#SELECTOR` input resolution over run-meta manifests
//! - `bands` - band-spec resolution including the `iaf:PATH` form

pub mod bands;
pub mod csv_reader;
pub mod reference_csv;
pub mod resolve;
pub mod run_meta;
pub mod triggers;

pub use bands::resolve_bands_spec;
pub use csv_reader::{parse_recording_csv, read_recording_csv};
pub use reference_csv::{
    load_reference_csv, parse_reference_csv, reference_option_mismatches, reference_to_csv,
    write_reference_csv,
};
pub use resolve::{glob_match, resolve_input, ResolveOptions, ResolvedInput};
pub use run_meta::{
    parse_run_meta, read_run_meta, run_meta_output_paths, write_run_meta_json, BuildInfo,
    RunMetaSummary,
};
pub use triggers::{
    extract_trigger_events, extract_trigger_events_auto, TriggerConfig, TriggerExtraction,
};
