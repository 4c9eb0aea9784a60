//! Example scripts used when a transformer has no code configured.

use rhi_graft_core::TransformerKind;

pub const SIMPLE: &str = r#"// Called once per record. `map` holds the input columns in order.
fn transform(map) {
    for key in map.keys() {
        if key.to_upper().contains("NAME") {
            return `Hello ${map[key]}`;
        }
    }
    "Hello"
}
"#;

pub const STANDARD: &str = r#"// Called once before the first record. Keep state on `this`.
fn initialize() {
    this.records = 0;
}

// Called once per record. `map` holds the input columns in order.
fn transform(map) {
    map.to_string()
}

// Called once after the last record.
fn close() {
}
"#;

pub const ADVANCED: &str = r#"fn initialize() {
}

// Called once per record. Each `output.put_values(...)` call emits one row.
fn transform(map, output) {
    for key in map.keys() {
        output.put_values(key, map[key]);
    }
}

fn close() {
}
"#;

pub fn default_source(kind: TransformerKind) -> &'static str {
    match kind {
        TransformerKind::Simple => SIMPLE,
        TransformerKind::Standard => STANDARD,
        TransformerKind::Advanced => ADVANCED,
    }
}
