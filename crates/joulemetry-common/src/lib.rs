//! ---
//! jm_section: "01-core-runtime"
//! jm_subsection: "module"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Shared runtime primitives for the Joulemetry workspace."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
//! Core shared primitives for the Joulemetry workspace.
//! This crate exposes configuration loading, logging bootstrap, version
//! metadata, and loop-timing diagnostics consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;
pub mod timing;
pub mod version;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, SamplingConfig, SessionConfig, SourcesConfig,
    SyntheticConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use timing::{SamplerTimings, TimingSummary};
pub use version::{Version, VersionInfo, VER_BUILD, VER_MAJOR, VER_MINOR, VER_RELEASE};
