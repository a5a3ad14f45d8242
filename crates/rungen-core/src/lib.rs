//! Rungen Core Library
//!
//! Scans a parent directory of sequencing runs, selects the runs that satisfy
//! a set of criteria, and turns each selected run into newline-delimited JSON
//! command messages for a downstream dispatcher.
//!
//! Flow of one invocation:
//!
//! 1. [`source::list_run_directories`] lists candidate run directories.
//! 2. [`CriteriaEngine`] applies inclusion and exclusion criteria.
//! 3. [`MessageBuilder`] fills a [`CommandTemplate`] per run.
//! 4. [`Emitter`] writes each message as one JSON line.
//!
//! [`Generator`] wires these together; [`Preset`] holds the standard settings.

pub mod builder;
pub mod correlation;
pub mod criteria;
pub mod emitter;
pub mod error;
pub mod generator;
pub mod message;
pub mod obs;
pub mod presets;
pub mod source;
pub mod symlink;
pub mod telemetry;
pub mod template;

pub use builder::{
    default_cache_root, CacheRewrite, FlagNames, InvocationDir, MessageBuilder, RewriteOptions,
    RunBuild,
};
pub use correlation::{IdSource, RandomIds, SequentialIds};
pub use criteria::{
    CriteriaEngine, CriteriaSet, Criterion, DateWindow, EvaluationContext, Instrument,
    OutputMarker, Rejection, RunErrorPolicy, RunFailure, SelectedRun, Selection,
};
pub use emitter::Emitter;
pub use error::{Result, RungenError};
pub use generator::{Flow, GenerationReport, Generator, GeneratorSettings, SentinelMarker};
pub use message::{CommandMessage, Message, SentinelContext, SentinelMessage};
pub use presets::{Preset, PresetOptions};
pub use source::RunDirectory;
pub use symlink::RenameRule;
pub use template::CommandTemplate;

pub use telemetry::init_tracing;

/// Crate version, as recorded in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
