//! Filter predicate DSL for the read path (§4.8): a small, ordered list of
//! predicates evaluated in two stages — [`QueryPredicate`]s lower into SQL
//! and run against the store, then [`IssuePredicate`]s filter the
//! already-materialized rows where full-text/feature sets are available.
//!
//! `QueryPredicate` lowering follows the hand-built `WHERE`/`LIKE` clause
//! style of `drift-storage`'s detection queries (`prepare_cached` +
//! positional `?N` params, no query builder crate); `IssuePredicate` is a
//! narrow, `matches`-only trait-free enum in the spirit of
//! `drift_core::traits::storage::drift_reader::IDriftReader`'s read-only
//! surface.

use regex::Regex;
use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::ToSql;

use sapp_core::types::collections::FxHashSet;

/// A bound value for one `?N` placeholder in a lowered query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Int(i64),
    Text(String),
}

impl ToSql for QueryValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            QueryValue::Int(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            QueryValue::Text(v) => ToSqlOutput::Owned(Value::Text(v.clone())),
        })
    }
}

/// A predicate that lowers directly into SQL against a fixed column name
/// (§4.8). `column` is `&'static str` since predicates are built from a
/// closed set of known table columns, not arbitrary user text.
#[derive(Debug, Clone)]
pub enum QueryPredicate {
    InRange { column: &'static str, lo: QueryValue, hi: QueryValue },
    Equals { column: &'static str, value: QueryValue },
    IsNull { column: &'static str },
    Like { column: &'static str, patterns: Vec<String> },
}

/// Lowers an ordered list of [`QueryPredicate`]s into one `WHERE` clause
/// (predicates AND-ed together; `Like` patterns for the same predicate
/// OR-ed together) plus the positional params in the order they appear in
/// the rendered text. Returns an empty string and no params for an empty
/// predicate list.
pub fn render_where(predicates: &[QueryPredicate]) -> (String, Vec<QueryValue>) {
    if predicates.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut clauses = Vec::with_capacity(predicates.len());
    let mut params = Vec::new();
    let mut next = 1usize;
    for predicate in predicates {
        match predicate {
            QueryPredicate::InRange { column, lo, hi } => {
                clauses.push(format!("{column} BETWEEN ?{} AND ?{}", next, next + 1));
                params.push(lo.clone());
                params.push(hi.clone());
                next += 2;
            }
            QueryPredicate::Equals { column, value } => {
                clauses.push(format!("{column} = ?{next}"));
                params.push(value.clone());
                next += 1;
            }
            QueryPredicate::IsNull { column } => {
                clauses.push(format!("{column} IS NULL"));
            }
            QueryPredicate::Like { column, patterns } => {
                let mut alternatives = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    alternatives.push(format!("{column} LIKE ?{next}"));
                    params.push(QueryValue::Text(pattern.clone()));
                    next += 1;
                }
                clauses.push(format!("({})", alternatives.join(" OR ")));
            }
        }
    }
    (format!("WHERE {}", clauses.join(" AND ")), params)
}

/// Appends the rendered `WHERE` clause (if any) to a base `SELECT ... FROM
/// ...` query, returning the full SQL text and its params in order.
pub fn apply_to_query(base_query: &str, predicates: &[QueryPredicate]) -> (String, Vec<QueryValue>) {
    let (where_clause, params) = render_where(predicates);
    if where_clause.is_empty() {
        (base_query.to_string(), params)
    } else {
        (format!("{base_query} {where_clause}"), params)
    }
}

/// The issue attribute a [`IssuePredicate::Matches`] regex runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAttribute {
    Callable,
    Message,
    Filename,
}

/// A materialized result row with the full-text/feature sets a
/// [`QueryPredicate`] cannot see (§4.8 "already-materialized result rows
/// where full-text sets are available").
#[derive(Debug, Clone)]
pub struct MaterializedIssue {
    pub callable: String,
    pub message: String,
    pub filename: String,
    pub features: FxHashSet<String>,
}

impl IssueAttribute {
    fn value<'a>(self, issue: &'a MaterializedIssue) -> &'a str {
        match self {
            IssueAttribute::Callable => &issue.callable,
            IssueAttribute::Message => &issue.message,
            IssueAttribute::Filename => &issue.filename,
        }
    }
}

/// A predicate evaluated against an already-materialized row (§4.8).
#[derive(Debug, Clone)]
pub enum IssuePredicate {
    HasAll(Vec<String>),
    HasAny(Vec<String>),
    HasNone(Vec<String>),
    Matches(Regex, IssueAttribute),
}

impl IssuePredicate {
    pub fn matches(&self, issue: &MaterializedIssue) -> bool {
        match self {
            IssuePredicate::HasAll(features) => features.iter().all(|f| issue.features.contains(f)),
            IssuePredicate::HasAny(features) => features.iter().any(|f| issue.features.contains(f)),
            IssuePredicate::HasNone(features) => !features.iter().any(|f| issue.features.contains(f)),
            IssuePredicate::Matches(regex, attribute) => regex.is_match(attribute.value(issue)),
        }
    }
}

/// An ordered composition of both predicate categories (§4.8): query
/// predicates are applied to SQL first, issue predicates to the resulting
/// rows second.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub query_predicates: Vec<QueryPredicate>,
    pub issue_predicates: Vec<IssuePredicate>,
}

impl FilterSet {
    pub fn sql_for(&self, base_query: &str) -> (String, Vec<QueryValue>) {
        apply_to_query(base_query, &self.query_predicates)
    }

    /// Filters already-materialized rows by every issue predicate, in
    /// order; a row survives only if all predicates match it.
    pub fn retain_matching<'a>(&self, issues: &'a [MaterializedIssue]) -> Vec<&'a MaterializedIssue> {
        issues
            .iter()
            .filter(|issue| self.issue_predicates.iter().all(|p| p.matches(issue)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn features(names: &[&str]) -> FxHashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn in_range_lowers_to_between_with_two_params() {
        let predicates = vec![QueryPredicate::InRange { column: "code", lo: QueryValue::Int(6000), hi: QueryValue::Int(6999) }];
        let (sql, params) = render_where(&predicates);
        assert_eq!(sql, "WHERE code BETWEEN ?1 AND ?2");
        assert_eq!(params, vec![QueryValue::Int(6000), QueryValue::Int(6999)]);
    }

    #[test]
    fn like_with_multiple_patterns_ors_them_together() {
        let predicates = vec![QueryPredicate::Like {
            column: "callable",
            patterns: vec!["foo.%".to_string(), "bar.%".to_string()],
        }];
        let (sql, params) = render_where(&predicates);
        assert_eq!(sql, "WHERE (callable LIKE ?1 OR callable LIKE ?2)");
        assert_eq!(params, vec![QueryValue::Text("foo.%".to_string()), QueryValue::Text("bar.%".to_string())]);
    }

    #[test]
    fn predicates_are_joined_with_and_and_placeholders_stay_sequential() {
        let predicates = vec![
            QueryPredicate::Equals { column: "status", value: QueryValue::Text("uncategorized".to_string()) },
            QueryPredicate::IsNull { column: "first_seen_instance" },
            QueryPredicate::InRange { column: "first_seen", lo: QueryValue::Int(0), hi: QueryValue::Int(100) },
        ];
        let (sql, params) = render_where(&predicates);
        assert_eq!(
            sql,
            "WHERE status = ?1 AND first_seen_instance IS NULL AND first_seen BETWEEN ?2 AND ?3"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_predicate_list_renders_nothing() {
        let (sql, params) = render_where(&[]);
        assert_eq!(sql, "");
        assert!(params.is_empty());
    }

    /// Lowered SQL actually filters rows when run against a real table,
    /// mirroring `drift-storage`'s `pattern_id LIKE ?1` query.
    #[test]
    fn lowered_query_filters_a_real_sqlite_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE issues (id INTEGER PRIMARY KEY, code INTEGER NOT NULL)", []).unwrap();
        conn.execute("INSERT INTO issues (id, code) VALUES (1, 6001), (2, 7001), (3, 6050)", []).unwrap();

        let predicates = vec![QueryPredicate::InRange { column: "code", lo: QueryValue::Int(6000), hi: QueryValue::Int(6999) }];
        let (sql, params) = apply_to_query("SELECT id FROM issues", &predicates);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

        let mut stmt = conn.prepare(&sql).unwrap();
        let ids: Vec<i64> = stmt
            .query_map(param_refs.as_slice(), |row| row.get(0))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn has_all_requires_every_feature_present() {
        let issue = MaterializedIssue {
            callable: "a.foo".to_string(),
            message: "m".to_string(),
            filename: "a.py".to_string(),
            features: features(&["always-via:tito", "via:user-controlled"]),
        };
        let predicate = IssuePredicate::HasAll(vec!["always-via:tito".to_string(), "via:user-controlled".to_string()]);
        assert!(predicate.matches(&issue));
        let missing = IssuePredicate::HasAll(vec!["always-via:tito".to_string(), "via:nonexistent".to_string()]);
        assert!(!missing.matches(&issue));
    }

    #[test]
    fn has_none_rejects_any_overlap() {
        let issue = MaterializedIssue {
            callable: "a.foo".to_string(),
            message: "m".to_string(),
            filename: "a.py".to_string(),
            features: features(&["via:user-controlled"]),
        };
        assert!(!IssuePredicate::HasNone(vec!["via:user-controlled".to_string()]).matches(&issue));
        assert!(IssuePredicate::HasNone(vec!["via:other".to_string()]).matches(&issue));
    }

    #[test]
    fn matches_runs_regex_against_the_chosen_attribute() {
        let issue = MaterializedIssue {
            callable: "django.views.foo".to_string(),
            message: "RCE vulnerability".to_string(),
            filename: "views.py".to_string(),
            features: FxHashSet::default(),
        };
        let predicate = IssuePredicate::Matches(Regex::new(r"^django\.").unwrap(), IssueAttribute::Callable);
        assert!(predicate.matches(&issue));
        let predicate = IssuePredicate::Matches(Regex::new(r"^django\.").unwrap(), IssueAttribute::Message);
        assert!(!predicate.matches(&issue));
    }

    #[test]
    fn filter_set_applies_query_then_issue_predicates_in_order() {
        let set = FilterSet {
            query_predicates: vec![QueryPredicate::Equals { column: "status", value: QueryValue::Text("uncategorized".to_string()) }],
            issue_predicates: vec![IssuePredicate::HasAny(vec!["via:user-controlled".to_string()])],
        };
        let (sql, params) = set.sql_for("SELECT id FROM issues");
        assert_eq!(sql, "SELECT id FROM issues WHERE status = ?1");
        assert_eq!(params, vec![QueryValue::Text("uncategorized".to_string())]);

        let issues = vec![
            MaterializedIssue { callable: "a".to_string(), message: "m".to_string(), filename: "f".to_string(), features: features(&["via:user-controlled"]) },
            MaterializedIssue { callable: "b".to_string(), message: "m".to_string(), filename: "f".to_string(), features: features(&["via:other"]) },
        ];
        let kept = set.retain_matching(&issues);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].callable, "a");
    }
}
