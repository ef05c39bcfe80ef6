use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::RuntimeError;
use crate::runtime::condition;

/// 数据提供者 (Data Provider)
/// 为条件判断和文本模板提供变量
pub trait DataProvider {
    fn get(&self, key: &str) -> Option<Value>;

    /// Evaluates a condition such as `{gold} >= 10`.
    fn predicate(&self, expression: &str) -> Result<bool, RuntimeError> {
        condition::evaluate(expression, |key| self.get(key))
    }

    /// Replaces every `{name}` in `content` with the variable's value.
    fn render(&self, content: &str) -> Result<String, RuntimeError> {
        if !content.contains(['{', '}']) {
            return Ok(content.to_string());
        }

        let unbalanced = || RuntimeError::UnbalancedBraces(content.to_string());
        let mut out = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(open) = rest.find('{') {
            let (head, tail) = rest.split_at(open);
            if head.contains('}') {
                return Err(unbalanced());
            }
            out.push_str(head);

            let close = tail.find('}').ok_or_else(unbalanced)?;
            let name = &tail[1..close];
            if name.contains('{') {
                return Err(unbalanced());
            }

            match self.get(name.trim()) {
                Some(Value::String(s)) => out.push_str(&s),
                Some(value) => out.push_str(&value.to_string()),
                None => debug!(variable = name, "template variable is not set"),
            }
            rest = &tail[close + 1..];
        }

        if rest.contains('}') {
            return Err(unbalanced());
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// In-memory variable store.
#[derive(Debug, Clone, Default)]
pub struct MemoryData {
    vars: HashMap<String, Value>,
}

impl MemoryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.vars.remove(key)
    }
}

impl DataProvider for MemoryData {
    fn get(&self, key: &str) -> Option<Value> {
        self.vars.get(key).cloned()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for MemoryData {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_substitutes_variables() {
        let data = MemoryData::new().with("name", "Ham").with("gold", 12);
        assert_eq!(data.render("{name} has {gold} gold").unwrap(), "Ham has 12 gold");
        assert_eq!(data.render("plain").unwrap(), "plain");
        assert_eq!(data.render("[{missing}]").unwrap(), "[]");
    }

    #[test]
    fn test_render_rejects_unbalanced_braces() {
        let data = MemoryData::new();
        assert!(matches!(data.render("{oops"), Err(RuntimeError::UnbalancedBraces(_))));
        assert!(matches!(data.render("oops}"), Err(RuntimeError::UnbalancedBraces(_))));
        assert!(matches!(data.render("{a{b}"), Err(RuntimeError::UnbalancedBraces(_))));
    }

    #[test]
    fn test_predicate_uses_variables() {
        let data: MemoryData = [("x", json!(1))].into_iter().collect();
        assert!(data.predicate("{x}==1").unwrap());
        assert!(!data.predicate("{x}==2").unwrap());
    }
}
