/// Condition evaluator - evaluates WHERE/HAVING trees against rows
use super::ast::{CompareOp, Condition, Predicate};
use crate::types::{SqlRow, Value};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Compiled LIKE pattern for fast matching. Patterns and inputs are
/// lowercased, so matching is case-insensitive and anchored at both ends.
#[derive(Debug, Clone)]
enum CompiledPattern {
    /// Exact match: "abc" (no wildcards)
    Exact(String),
    /// Prefix match: "abc%"
    Prefix(String),
    /// Suffix match: "%abc"
    Suffix(String),
    /// Contains match: "%abc%"
    Contains(String),
    /// Complex pattern with multiple wildcards
    Complex(Vec<PatternSegment>),
}

#[derive(Debug, Clone, PartialEq)]
enum PatternSegment {
    Literal(char),
    AnyChar,  // _
    AnyChars, // %
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Self {
        let pattern = pattern.to_lowercase();
        let has_underscore = pattern.contains('_');
        let percents = pattern.matches('%').count();

        if percents == 0 && !has_underscore {
            return CompiledPattern::Exact(pattern);
        }

        if !has_underscore && percents == 1 {
            if let Some(prefix) = pattern.strip_suffix('%') {
                return CompiledPattern::Prefix(prefix.to_string());
            }
            if let Some(suffix) = pattern.strip_prefix('%') {
                return CompiledPattern::Suffix(suffix.to_string());
            }
        }

        if !has_underscore && percents == 2 && pattern.len() > 2 {
            if let Some(inner) = pattern.strip_prefix('%').and_then(|p| p.strip_suffix('%')) {
                return CompiledPattern::Contains(inner.to_string());
            }
        }

        let mut segments = Vec::with_capacity(pattern.len());
        for ch in pattern.chars() {
            match ch {
                // Consecutive % collapse into one
                '%' if segments.last() == Some(&PatternSegment::AnyChars) => {}
                '%' => segments.push(PatternSegment::AnyChars),
                '_' => segments.push(PatternSegment::AnyChar),
                c => segments.push(PatternSegment::Literal(c)),
            }
        }

        CompiledPattern::Complex(segments)
    }

    #[inline]
    fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        match self {
            CompiledPattern::Exact(pattern) => text == *pattern,
            CompiledPattern::Prefix(prefix) => text.starts_with(prefix.as_str()),
            CompiledPattern::Suffix(suffix) => text.ends_with(suffix.as_str()),
            CompiledPattern::Contains(substring) => text.contains(substring.as_str()),
            CompiledPattern::Complex(segments) => {
                let chars: Vec<char> = text.chars().collect();
                Self::match_segments(&chars, segments)
            }
        }
    }

    /// Greedy wildcard match that backtracks only to the most recent `%`,
    /// so the cost is bounded by text length times pattern length.
    fn match_segments(text: &[char], segments: &[PatternSegment]) -> bool {
        let (mut ti, mut si) = (0, 0);
        // (segment after the last %, text position it was tried from)
        let mut resume: Option<(usize, usize)> = None;

        while ti < text.len() {
            match segments.get(si) {
                Some(PatternSegment::AnyChars) => {
                    si += 1;
                    resume = Some((si, ti));
                }
                Some(PatternSegment::AnyChar) => {
                    ti += 1;
                    si += 1;
                }
                Some(PatternSegment::Literal(c)) if *c == text[ti] => {
                    ti += 1;
                    si += 1;
                }
                _ => match resume {
                    Some((after_star, from)) => {
                        // Let the % absorb one more character and retry
                        si = after_star;
                        ti = from + 1;
                        resume = Some((after_star, from + 1));
                    }
                    None => return false,
                },
            }
        }

        segments[si..].iter().all(|s| *s == PatternSegment::AnyChars)
    }
}

/// Names under which the base (FROM) table's columns may be qualified.
///
/// Base columns are stored bare in merged rows while joined columns carry an
/// `alias.column` key, so `u.name` must fall back to `name` when `u` names the
/// base table.
#[derive(Debug, Clone, Default)]
pub struct ColumnScope {
    base_names: Vec<String>,
}

impl ColumnScope {
    pub fn new(table: &str, alias: Option<&str>) -> Self {
        let mut base_names = vec![table.to_string()];
        if let Some(alias) = alias {
            base_names.push(alias.to_string());
        }
        Self { base_names }
    }

    /// Scope without table qualifiers (e.g. aggregated output rows)
    pub fn unqualified() -> Self {
        Self::default()
    }

    /// Whether `qualifier` is the base table's name or alias
    pub fn names_base(&self, qualifier: &str) -> bool {
        self.base_names.iter().any(|b| b == qualifier)
    }

    /// Key under which `name` is stored, among `available` keys
    pub fn resolve_key<'a>(&self, available: &'a [String], name: &str) -> Option<&'a str> {
        if let Some(key) = available.iter().find(|k| k.as_str() == name) {
            return Some(key);
        }
        if let Some((qualifier, column)) = name.split_once('.') {
            if self.names_base(qualifier) {
                return available.iter().find(|k| k.as_str() == column).map(|k| k.as_str());
            }
            return None;
        }
        // Bare name of a joined column: "user_id" matches "o.user_id"
        let suffix = format!(".{}", name);
        available
            .iter()
            .find(|k| k.ends_with(&suffix))
            .map(|k| k.as_str())
    }

    /// Value of `name` in `row`; missing columns read as null
    pub fn lookup<'a>(&self, row: &'a SqlRow, name: &str) -> &'a Value {
        const NULL: &Value = &Value::Null;

        if let Some(v) = row.get(name) {
            return v;
        }
        if let Some((qualifier, column)) = name.split_once('.') {
            if self.names_base(qualifier) {
                return row.get(column).unwrap_or(NULL);
            }
            return NULL;
        }
        let suffix = format!(".{}", name);
        let mut matches: Vec<(&String, &Value)> =
            row.iter().filter(|(k, _)| k.ends_with(&suffix)).collect();
        // Deterministic when several joined tables share a column name
        matches.sort_by(|a, b| a.0.cmp(b.0));
        matches.first().map(|(_, v)| *v).unwrap_or(NULL)
    }
}

pub struct ExprEvaluator {
    /// Pattern cache: pattern string -> compiled pattern
    pattern_cache: RwLock<HashMap<String, CompiledPattern>>,
}

impl ExprEvaluator {
    pub fn new() -> Self {
        Self {
            pattern_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate a condition tree against a row
    pub fn eval(&self, condition: &Condition, row: &SqlRow, scope: &ColumnScope) -> bool {
        match condition {
            Condition::And(left, right) => {
                self.eval(left, row, scope) && self.eval(right, row, scope)
            }
            Condition::Or(left, right) => {
                self.eval(left, row, scope) || self.eval(right, row, scope)
            }
            Condition::Not(inner) => !self.eval(inner, row, scope),
            Condition::Comparison { column, predicate } => {
                let value = scope.lookup(row, column);
                self.eval_predicate(value, predicate)
            }
        }
    }

    fn eval_predicate(&self, value: &Value, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::IsNull { negated } => value.is_null() != *negated,
            Predicate::Like { pattern, negated } => {
                if value.is_null() {
                    return false;
                }
                self.like_match_cached(&value.to_string(), pattern) != *negated
            }
            Predicate::Compare { op, value: literal } => compare(value, *op, literal),
        }
    }

    fn like_match_cached(&self, text: &str, pattern: &str) -> bool {
        if let Some(compiled) = self.pattern_cache.read().get(pattern) {
            return compiled.matches(text);
        }

        let compiled = CompiledPattern::compile(pattern);
        let result = compiled.matches(text);

        let mut cache = self.pattern_cache.write();
        // Limit cache size to prevent memory bloat
        if cache.len() < 1000 {
            cache.insert(pattern.to_string(), compiled);
        }

        result
    }
}

impl Default for ExprEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply a comparison operator; any comparison involving null is false
pub fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    match op {
        CompareOp::Eq => left.sql_eq(right),
        CompareOp::Ne => !left.is_null() && !right.is_null() && !left.sql_eq(right),
        CompareOp::Lt => left.sql_cmp(right) == Some(Ordering::Less),
        CompareOp::Gt => left.sql_cmp(right) == Some(Ordering::Greater),
        CompareOp::Le => matches!(left.sql_cmp(right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Ge => matches!(left.sql_cmp(right), Some(Ordering::Greater | Ordering::Equal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> SqlRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn like(text: &str, pattern: &str) -> bool {
        ExprEvaluator::new().like_match_cached(text, pattern)
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("Alice", "a%"));
        assert!(like("alice", "%ICE"));
        assert!(like("Alice", "%lic%"));
        assert!(like("Alice", "_lice"));
        assert!(like("Alice", "A__ce"));
        assert!(like("Alice", "%"));
        assert!(like("", "%"));
        assert!(like("a.b*c", "a.b*c"));
        assert!(like("abcabc", "%b_a%c"));
    }

    #[test]
    fn test_like_is_anchored() {
        assert!(!like("Alice", "lic"));
        assert!(!like("Alice", "_lic"));
        assert!(!like("Alice", "A_"));
        assert!(!like("Al", "A__"));
        assert!(!like("Bob", "%a%"));
    }

    #[test]
    fn test_like_many_wildcards() {
        assert!(like("mississippi", "%iss%ppi"));
        assert!(like("mississippi", "m%s%s%i"));
        assert!(like("abcabd", "%ab_"));
        assert!(like("aXbXc", "a%%b%c"));
        assert!(!like("mississippi", "%iss%ppix"));
        assert!(!like("abcabc", "%ab_d"));
        assert!(!like("ab", "a%_%_"));
    }

    #[test]
    fn test_like_backtracking_stays_linear() {
        let text = "a".repeat(200);
        let start = std::time::Instant::now();
        assert!(!like(&text, "%a%a%a%a%a%a%a%a%a%a%a%a%b"));
        assert!(like(&text, "%a%a%a%a%a%a%a%a%a%a%a%a"));
        assert!(start.elapsed() < std::time::Duration::from_millis(200));
    }

    #[test]
    fn test_eval_tree() {
        let evaluator = ExprEvaluator::new();
        let scope = ColumnScope::new("users", None);
        let r = row(&[("age", Value::Integer(30)), ("name", Value::Text("Bob".into()))]);

        let gt = Condition::compare("age", CompareOp::Gt, Value::Integer(25));
        let eq = Condition::compare("name", CompareOp::Eq, Value::Text("Alice".into()));
        assert!(evaluator.eval(&gt, &r, &scope));
        assert!(!evaluator.eval(&eq, &r, &scope));
        assert!(evaluator.eval(&Condition::Or(Box::new(gt.clone()), Box::new(eq.clone())), &r, &scope));
        assert!(!evaluator.eval(&Condition::And(Box::new(gt.clone()), Box::new(eq.clone())), &r, &scope));
        assert!(evaluator.eval(&Condition::Not(Box::new(eq)), &r, &scope));
    }

    #[test]
    fn test_null_semantics() {
        let evaluator = ExprEvaluator::new();
        let scope = ColumnScope::unqualified();
        let r = row(&[("email", Value::Null)]);

        let is_null = Condition::Comparison {
            column: "email".into(),
            predicate: Predicate::IsNull { negated: false },
        };
        let missing_is_null = Condition::Comparison {
            column: "phone".into(),
            predicate: Predicate::IsNull { negated: false },
        };
        let ne = Condition::compare("email", CompareOp::Ne, Value::Text("x".into()));
        assert!(evaluator.eval(&is_null, &r, &scope));
        assert!(evaluator.eval(&missing_is_null, &r, &scope));
        assert!(!evaluator.eval(&ne, &r, &scope));
    }

    #[test]
    fn test_scope_lookup_qualified_and_joined() {
        let scope = ColumnScope::new("users", Some("u"));
        let r = row(&[
            ("name", Value::Text("Ann".into())),
            ("o.total", Value::Integer(5)),
        ]);
        assert_eq!(scope.lookup(&r, "u.name"), &Value::Text("Ann".into()));
        assert_eq!(scope.lookup(&r, "users.name"), &Value::Text("Ann".into()));
        assert_eq!(scope.lookup(&r, "o.total"), &Value::Integer(5));
        assert_eq!(scope.lookup(&r, "total"), &Value::Integer(5));
        assert_eq!(scope.lookup(&r, "x.name"), &Value::Null);

        let keys = vec!["name".to_string(), "o.total".to_string()];
        assert_eq!(scope.resolve_key(&keys, "u.name"), Some("name"));
        assert_eq!(scope.resolve_key(&keys, "total"), Some("o.total"));
        assert_eq!(scope.resolve_key(&keys, "age"), None);
    }

    #[test]
    fn test_compare_ordering_mixed() {
        assert!(compare(&Value::Real(2.5), CompareOp::Gt, &Value::Integer(2)));
        assert!(compare(&Value::Integer(3), CompareOp::Le, &Value::Integer(3)));
        assert!(compare(
            &Value::Date("2024-03-01T00:00:00.000Z".into()),
            CompareOp::Ge,
            &Value::Text("2024-01-01".into())
        ));
        assert!(!compare(&Value::Bool(true), CompareOp::Gt, &Value::Integer(0)));
        assert!(!compare(&Value::Null, CompareOp::Eq, &Value::Null));
    }
}
