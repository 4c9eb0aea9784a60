//! Rhai scripting for graft transformers.
//!
//! Scripts define plain functions:
//!
//! ```rhai
//! fn initialize() { this.seen = 0; }         // optional
//! fn transform(map) { map["name"] }          // simple / standard
//! fn transform(map, output) { ... }          // advanced
//! fn close() { }                             // optional
//! ```
//!
//! `map` is an ordered record: index it by column name, iterate it as
//! `[key, value]` pairs, or call `keys()`, `values()`, `len()` and
//! `to_string()`.
//!
//! `output.put_values(a, b, ...)` emits one row per call, with one field per
//! argument, up to [`MAX_PUT_VALUES`] arguments. `output.put_row(array)`
//! emits a row of any width.
//!
//! State kept on `this` is shared by every call and persists between them.
//! With `concurrent = true` calls may overlap, so updates to `this` can
//! interleave.

mod convert;
mod defaults;
mod engine;
mod record;

pub use convert::{from_dynamic, to_dynamic};
pub use defaults::{ADVANCED, SIMPLE, STANDARD, default_source};
pub use engine::{RhaiEngine, RhaiInstance, RhaiUnit};
pub use record::{MAX_PUT_VALUES, Record};
