//! Query text preparation for relational sources.
//!
//! `${name}` placeholders are replaced by the stringified parameter value and
//! filters are added to the outer query as an `AND`-joined predicate list.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use prism_core::record::{Value, to_plain_string};
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex"));

static WHERE_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bwhere\b").expect("where regex"));

static TRAILING_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(group\s+by|having|order\s+by|limit|offset)\b").expect("trailing clause regex")
});

/// Replace `${name}` placeholders with parameter values
///
/// Unknown placeholders are left untouched.
#[must_use]
pub fn substitute_params(query: &str, params: &IndexMap<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(query, |caps: &regex::Captures<'_>| match params.get(&caps[1]) {
            Some(value) => to_plain_string(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// SQL literal for a scalar value
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

fn predicate(field: &str, value: &Value) -> String {
    match value {
        Value::Null => format!("{} IS NULL", field),
        Value::Array(items) if items.is_empty() => "1 = 0".to_string(),
        Value::Array(items) => {
            let list: Vec<String> = items.iter().map(sql_literal).collect();
            format!("{} IN ({})", field, list.join(", "))
        }
        scalar => format!("{} = {}", field, sql_literal(scalar)),
    }
}

/// Byte offsets that sit outside parentheses and string literals
fn outer_level(query: &str) -> Vec<bool> {
    let mut depth = 0usize;
    let mut quoted = false;
    query
        .bytes()
        .map(|b| {
            let outer = depth == 0 && !quoted;
            match b {
                b'\'' => quoted = !quoted,
                b'(' if !quoted => depth += 1,
                b')' if !quoted => depth = depth.saturating_sub(1),
                _ => {}
            }
            outer
        })
        .collect()
}

/// Append filter predicates to a query
///
/// Only the outer query is considered: a `where` inside a subquery or a
/// string literal is ignored. Predicates go in front of a trailing
/// `GROUP BY`, `HAVING`, `ORDER BY`, `LIMIT` or `OFFSET`. An existing outer
/// `WHERE` condition is parenthesized and chained with `AND`. Compound
/// queries (`UNION` and friends) only get the predicates on their last
/// branch.
#[must_use]
pub fn append_filters(query: &str, filters: &IndexMap<String, Value>) -> String {
    let base = query.trim().trim_end_matches(';').trim_end();
    if filters.is_empty() {
        return base.to_string();
    }

    let predicates = filters
        .iter()
        .map(|(field, value)| predicate(field, value))
        .collect::<Vec<_>>()
        .join(" AND ");

    let outer = outer_level(base);
    let where_at = WHERE_CLAUSE
        .find_iter(base)
        .find(|m| outer[m.start()])
        .map(|m| m.end());
    let tail_at = TRAILING_CLAUSE
        .find_iter(base)
        .find(|m| outer[m.start()] && where_at.is_none_or(|w| m.start() >= w))
        .map_or(base.len(), |m| m.start());

    let head = &base[..tail_at];
    let tail = base[tail_at..].trim();
    let filtered = match where_at {
        Some(end) => format!(
            "{} ({}) AND {}",
            &head[..end],
            head[end..].trim(),
            predicates
        ),
        None => format!("{} WHERE {}", head.trim_end(), predicates),
    };

    if tail.is_empty() {
        filtered
    } else {
        format!("{} {}", filtered, tail)
    }
}

/// Full relational query: substitution first, then filters
#[must_use]
pub fn build_relational_query(
    query: &str,
    params: &IndexMap<String, Value>,
    filters: &IndexMap<String, Value>,
) -> String {
    append_filters(&substitute_params(query, params), filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_substitute_params() {
        let params = map(&[("region", json!("east")), ("year", json!(2024))]);
        let sql = substitute_params(
            "SELECT * FROM sales WHERE region = '${region}' AND year = ${year}",
            &params,
        );
        assert_eq!(sql, "SELECT * FROM sales WHERE region = 'east' AND year = 2024");
    }

    #[test]
    fn test_unknown_placeholder_left_alone() {
        let sql = substitute_params("SELECT ${missing}", &IndexMap::new());
        assert_eq!(sql, "SELECT ${missing}");
    }

    #[test]
    fn test_append_filters_where() {
        let filters = map(&[("region", json!("east")), ("amount", json!(10))]);
        let sql = append_filters("SELECT * FROM sales;", &filters);
        assert_eq!(sql, "SELECT * FROM sales WHERE region = 'east' AND amount = 10");
    }

    #[test]
    fn test_append_filters_existing_where() {
        let filters = map(&[("status", json!("paid"))]);
        let sql = append_filters("SELECT * FROM orders where total > 0 OR vip", &filters);
        assert_eq!(sql, "SELECT * FROM orders where (total > 0 OR vip) AND status = 'paid'");
    }

    #[test]
    fn test_filters_go_before_trailing_clauses() {
        let filters = map(&[("region", json!("east"))]);
        let sql = append_filters(
            "SELECT region, SUM(amount) FROM sales GROUP BY region ORDER BY 2 DESC LIMIT 5;",
            &filters,
        );
        assert_eq!(
            sql,
            "SELECT region, SUM(amount) FROM sales WHERE region = 'east' GROUP BY region ORDER BY 2 DESC LIMIT 5"
        );

        let sql = append_filters("SELECT * FROM sales WHERE amount > 0 ORDER BY amount", &filters);
        assert_eq!(
            sql,
            "SELECT * FROM sales WHERE (amount > 0) AND region = 'east' ORDER BY amount"
        );
    }

    #[test]
    fn test_nested_where_and_literals_are_ignored() {
        let filters = map(&[("region", json!("east"))]);
        let sql = append_filters(
            "SELECT * FROM (SELECT * FROM sales WHERE amount > 0) s",
            &filters,
        );
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT * FROM sales WHERE amount > 0) s WHERE region = 'east'"
        );

        let sql = append_filters("SELECT 'where to order by' AS note FROM t", &filters);
        assert_eq!(sql, "SELECT 'where to order by' AS note FROM t WHERE region = 'east'");
    }

    #[test]
    fn test_list_filter_becomes_in() {
        let filters = map(&[("region", json!(["east", "west"])), ("id", json!([1, 2, 3]))]);
        let sql = append_filters("SELECT * FROM t", &filters);
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE region IN ('east', 'west') AND id IN (1, 2, 3)"
        );
    }

    #[test]
    fn test_null_and_empty_list() {
        let filters = map(&[("deleted_at", Value::Null), ("tag", json!([]))]);
        let sql = append_filters("SELECT * FROM t", &filters);
        assert_eq!(sql, "SELECT * FROM t WHERE deleted_at IS NULL AND 1 = 0");
    }

    #[test]
    fn test_quotes_are_escaped() {
        let filters = map(&[("name", json!("O'Brien"))]);
        let sql = append_filters("SELECT * FROM people", &filters);
        assert_eq!(sql, "SELECT * FROM people WHERE name = 'O''Brien'");
    }

    #[test]
    fn test_no_filters_is_identity() {
        assert_eq!(append_filters("SELECT 1", &IndexMap::new()), "SELECT 1");
    }

    #[test]
    fn test_build_relational_query() {
        let params = map(&[("tbl", json!("sales"))]);
        let filters = map(&[("region", json!("north"))]);
        let sql = build_relational_query("SELECT * FROM ${tbl}", &params, &filters);
        assert_eq!(sql, "SELECT * FROM sales WHERE region = 'north'");
    }
}
