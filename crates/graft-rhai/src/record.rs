//! Script-facing types: the ordered record map and the output collector.

use crate::convert::{from_dynamic, to_dynamic};
use rhi_graft_core::{RecordCollector, Value, ValueMap};
use rhai::{Array, Dynamic, Engine, ImmutableString, INT, Map};
use std::fmt;

/// One record's column values as seen by a script.
///
/// Unlike a rhai object map, iteration and printing follow the configured
/// column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(ValueMap);

impl Record {
    pub fn new(values: ValueMap) -> Self {
        Self(values)
    }

    pub fn into_inner(self) -> ValueMap {
        self.0
    }

    fn get(&self, key: &str) -> Dynamic {
        self.0.get(key).map_or(Dynamic::UNIT, to_dynamic)
    }

    fn set(&mut self, key: &str, value: Dynamic) {
        self.0.insert(key.to_string(), from_dynamic(value));
    }

    fn keys(&self) -> Array {
        self.0.keys().map(|k| Dynamic::from(k.clone())).collect()
    }

    fn values(&self) -> Array {
        self.0.values().map(to_dynamic).collect()
    }

    fn to_map(&self) -> Map {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str().into(), to_dynamic(v)))
            .collect()
    }
}

impl From<ValueMap> for Record {
    fn from(values: ValueMap) -> Self {
        Self(values)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// Iterates `[key, value]` pairs in column order.
impl IntoIterator for Record {
    type Item = Array;
    type IntoIter = std::vec::IntoIter<Array>;

    fn into_iter(self) -> Self::IntoIter {
        self.0
            .into_iter()
            .map(|(k, v)| vec![Dynamic::from(k), to_dynamic(&v)])
            .collect::<Vec<_>>()
            .into_iter()
    }
}

pub(crate) fn register_record(engine: &mut Engine) {
    engine
        .register_type_with_name::<Record>("Record")
        .register_indexer_get(|r: &mut Record, key: ImmutableString| r.get(&key))
        .register_indexer_set(|r: &mut Record, key: ImmutableString, value: Dynamic| {
            r.set(&key, value)
        })
        .register_fn("get", |r: &mut Record, key: ImmutableString| r.get(&key))
        .register_fn("contains", |r: &mut Record, key: ImmutableString| {
            r.0.contains_key(key.as_str())
        })
        .register_fn("keys", |r: &mut Record| r.keys())
        .register_fn("values", |r: &mut Record| r.values())
        .register_fn("len", |r: &mut Record| r.0.len() as INT)
        .register_fn("is_empty", |r: &mut Record| r.0.is_empty())
        .register_fn("to_map", |r: &mut Record| r.to_map())
        .register_fn("to_string", |r: &mut Record| r.to_string())
        .register_fn("to_debug", |r: &mut Record| r.to_string())
        .register_iterator::<Record>();
}

/// Register one `put_values` overload per arity, from the listed names down to none.
macro_rules! register_put_values {
    ($engine:ident;) => {
        $engine.register_fn("put_values", |out: &mut RecordCollector| put(out, Vec::new()));
    };
    ($engine:ident; $head:ident $(, $tail:ident)*) => {
        $engine.register_fn(
            "put_values",
            |out: &mut RecordCollector, $head: Dynamic $(, $tail: Dynamic)*| {
                put(out, vec![$head $(, $tail)*])
            },
        );
        register_put_values!($engine; $($tail),*);
    };
}

/// Most arguments a single `put_values` call accepts. rhai matches `Dynamic`
/// parameters only within the first 16 positions, one of which is the
/// collector. Wider rows go through `put_row`.
pub const MAX_PUT_VALUES: usize = 15;

fn put(out: &mut RecordCollector, values: Vec<Dynamic>) {
    out.put_values(values.into_iter().map(from_dynamic).collect());
}

pub(crate) fn register_collector(engine: &mut Engine) {
    engine.register_type_with_name::<RecordCollector>("OutputCollector");
    register_put_values!(
        engine; a, b, c, d, e, f, g, h, i, j, k, l, m, n, o
    );
    engine.register_fn("put_row", |out: &mut RecordCollector, row: Array| put(out, row));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_graft_core::ValueMapExt;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register_record(&mut engine);
        register_collector(&mut engine);
        engine
    }

    fn record() -> Record {
        Record::new(ValueMap::new().with("foo", "Kasper").with("bar", "Sørensen"))
    }

    #[test]
    fn test_record_string_form() {
        let engine = engine();
        let mut scope = rhai::Scope::new();
        scope.push("map", record());

        let text: String = engine.eval_with_scope(&mut scope, "map.to_string()").unwrap();
        assert_eq!(text, "{foo=Kasper, bar=Sørensen}");
    }

    #[test]
    fn test_record_access() {
        let engine = engine();
        let mut scope = rhai::Scope::new();
        scope.push("map", record());

        let foo: String = engine.eval_with_scope(&mut scope, r#"map["foo"]"#).unwrap();
        assert_eq!(foo, "Kasper");

        let missing: bool = engine.eval_with_scope(&mut scope, r#"map["nope"] == ()"#).unwrap();
        assert!(missing);

        let len: INT = engine
            .eval_with_scope(&mut scope, r#"map["age"] = 42; map.len()"#)
            .unwrap();
        assert_eq!(len, 3);
    }

    #[test]
    fn test_record_keeps_column_order() {
        let engine = engine();
        let mut scope = rhai::Scope::new();
        scope.push("map", record());

        let keys: String = engine
            .eval_with_scope(
                &mut scope,
                r#"
                let out = "";
                for pair in map { out += pair[0] + ";"; }
                out
                "#,
            )
            .unwrap();
        assert_eq!(keys, "foo;bar;");
    }

    #[test]
    fn test_collector_arities() {
        let engine = engine();
        let out = RecordCollector::new();
        let mut scope = rhai::Scope::new();
        scope.push("out", out.clone());

        engine
            .run_with_scope(
                &mut scope,
                r#"
                out.put_values();
                out.put_values("a", 1);
                out.put_values("a", 1, 2.5, true, ());
                out.put_row(["x", "y", "z"]);
                "#,
            )
            .unwrap();

        let rows = out.take();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_empty());
        assert_eq!(rows[1], vec![Value::from("a"), Value::Int(1)]);
        assert_eq!(rows[2][4], Value::Null);
        assert_eq!(rows[3].len(), 3);
    }

    #[test]
    fn test_collector_wide_rows() {
        let engine = engine();
        let out = RecordCollector::new();
        let mut scope = rhai::Scope::new();
        scope.push("out", out.clone());

        engine
            .run_with_scope(
                &mut scope,
                r#"
                out.put_values(1, 2, 3, 4, 5, 6);
                out.put_values(1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15);
                let wide = [];
                for i in 0..30 { wide.push(i); }
                out.put_row(wide);
                "#,
            )
            .unwrap();

        let rows = out.take();
        assert_eq!(rows[0], (1..=6).map(Value::Int).collect::<Vec<_>>());
        assert_eq!(rows[1].len(), MAX_PUT_VALUES);
        assert_eq!(rows[1][14], Value::Int(15));
        assert_eq!(rows[2].len(), 30);
    }
}
