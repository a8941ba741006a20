use sea_orm::Value;

use crate::query::Dialect;
use crate::validation::is_valid_identifier;

/// Substring predicate matching `term` against every search field, joined by OR.
///
/// One field renders as `title LIKE ?`, several as
/// `(title ILIKE ? OR body ILIKE ?)`, with one `%term%` value bound per field.
/// Returns `None` when the term is empty or no field is a valid identifier.
#[must_use]
pub fn search_predicate(
    fields: &[String],
    term: &str,
    dialect: Dialect,
) -> Option<(String, Vec<Value>)> {
    if term.is_empty() {
        return None;
    }

    let operator = dialect.search_operator();
    let conditions: Vec<String> = fields
        .iter()
        .filter(|field| is_valid_identifier(field))
        .map(|field| format!("{field} {operator} ?"))
        .collect();

    let pattern = format!("%{term}%");
    let values = vec![Value::from(pattern); conditions.len()];

    match conditions.len() {
        0 => None,
        1 => conditions.into_iter().next().map(|condition| (condition, values)),
        _ => Some((format!("({})", conditions.join(" OR ")), values)),
    }
}
