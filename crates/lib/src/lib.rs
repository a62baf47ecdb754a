//! launchpack-lib: variant-aware build and packaging of launcher images
//!
//! The pieces, leaf first:
//! - `variant`: validates a vault type and expands it into modules
//! - `project`: checks those modules exist in the project
//! - `artifact`: materialises the downloadable agent into each module
//! - `plan`: builds the dependency graph of build steps
//! - `execute`: runs a plan, stopping at the first failure
//! - `tools`: the external container, cluster and packaging tools
//! - `pipeline`: wires the above together for the CLI

pub mod artifact;
pub mod config;
pub mod consts;
pub mod execute;
pub mod pipeline;
pub mod plan;
pub mod platform;
pub mod project;
pub mod tools;
pub mod util;
pub mod variant;
