use serde_json::Value;

/// Read-only accessor over a loosely-typed object payload.
///
/// Every lookup is total: a missing key, a value of the wrong shape or a path
/// through a non-object yields `None` (or an empty slice) instead of an error.
#[derive(Clone, Copy, Debug)]
pub struct Document<'a>(&'a Value);

static EMPTY: &[Value] = &[];

impl<'a> Document<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(value)
    }

    pub fn at(&self, path: &[&str]) -> Option<&'a Value> {
        path.iter().try_fold(self.0, |current, key| current.get(key))
    }

    pub fn object_at(&self, path: &[&str]) -> Option<Document<'a>> {
        self.at(path).filter(|v| v.is_object()).map(Document)
    }

    pub fn str_at(&self, path: &[&str]) -> Option<&'a str> {
        self.at(path).and_then(Value::as_str)
    }

    pub fn string_or(&self, path: &[&str], default: &str) -> String {
        self.str_at(path).unwrap_or(default).to_string()
    }

    /// Numeric lookup normalizing integers, floats and numeric strings.
    pub fn number_at(&self, path: &[&str]) -> Option<f64> {
        match self.at(path)? {
            Value::Number(n) => n
                .as_f64()
                .or_else(|| n.as_i64().map(|i| i as f64))
                .or_else(|| n.as_u64().map(|u| u as f64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn bool_at(&self, path: &[&str]) -> Option<bool> {
        match self.at(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn array_at(&self, path: &[&str]) -> &'a [Value] {
        self.at(path)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY)
    }
}
