use crate::document::{TAGS_FIELD, TAG_SEPARATOR};
use searchmem_core::{MemoryFilter, SearchMemError, SearchMemResult, TagConstraint};

/// Translates tag filters into an OData filter expression.
///
/// Constraints inside one filter are joined with `and`, filters are joined
/// with `or`. Filters without constraints are ignored; when none remain the
/// result is `None`, meaning every document matches.
///
/// A tag key containing the `:` separator cannot match any stored tag and
/// is rejected with [`SearchMemError::InvalidArgument`].
pub fn translate_filters(filters: &[MemoryFilter]) -> SearchMemResult<Option<String>> {
    let mut clauses = Vec::new();
    for filter in filters.iter().filter(|f| !f.is_empty()) {
        let conjunction = filter
            .constraints()
            .iter()
            .map(constraint_clause)
            .collect::<SearchMemResult<Vec<_>>>()?
            .join(" and ");
        clauses.push(format!("({conjunction})"));
    }

    if clauses.is_empty() {
        Ok(None)
    } else {
        Ok(Some(clauses.join(" or ")))
    }
}

fn constraint_clause(constraint: &TagConstraint) -> SearchMemResult<String> {
    if constraint.key.contains(TAG_SEPARATOR) {
        return Err(SearchMemError::InvalidArgument(format!(
            "filter tag key '{}' contains the reserved character '{TAG_SEPARATOR}'",
            constraint.key
        )));
    }
    let literal = escape_literal(&format!(
        "{}{}{}",
        constraint.key, TAG_SEPARATOR, constraint.value
    ));
    let test = format!("{TAGS_FIELD}/any(s: s eq '{literal}')");
    Ok(if constraint.negate {
        format!("not {test}")
    } else {
        test
    })
}

/// OData string literals escape a single quote by doubling it.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
