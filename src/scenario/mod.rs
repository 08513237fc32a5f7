//! Suite and scenario model
//!
//! Suites are declarative YAML files: one actor plus the fixtures and
//! models it needs, then an ordered list of scenarios made of navigation,
//! interaction, and assertion steps. Parsing happens up front so a
//! malformed suite never reaches a live target.

mod lint;
mod spec;

pub use lint::{check_visibility_pairs, unpaired_capabilities};
pub use spec::*;
