//! Parsing of list/search parameters and the SQL fragments they turn into.

use sea_orm::sea_query::{Expr, LikeExpr, SimpleExpr};

/// Parses a comma separated list of ids such as `"1,2, 5"`.
///
/// An empty or blank input means "no filter" and yields an empty list.
pub fn parse_id_list(raw: &str) -> Result<Vec<i32>, String> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<i32>()
                .map_err(|_| format!("'{part}' is not a valid id"))
        })
        .collect()
}

/// Splits a free-text search into keywords on commas and whitespace.
pub fn search_keywords(query: &str) -> Vec<String> {
    query
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Case folding applied to stored search columns and to search keywords alike.
///
/// Done in Rust rather than with SQL `LOWER()`, which SQLite only applies to ASCII.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// "Folded column contains needle", with LIKE wildcards in the needle escaped.
/// `column` must hold text already passed through [`fold_case`].
pub fn folded_contains(column: Expr, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&fold_case(needle)));
    column.like(LikeExpr::new(pattern).escape('\\'))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_ids() {
        assert_eq!(parse_id_list("1,2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list(" 4 , 10").unwrap(), vec![4, 10]);
    }

    #[test]
    fn blank_id_list_means_no_filter() {
        assert!(parse_id_list("").unwrap().is_empty());
        assert!(parse_id_list("   ").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_numeric_ids() {
        assert_eq!(parse_id_list("1,abc").unwrap_err(), "'abc' is not a valid id");
        assert!(parse_id_list("1,,2").is_err());
    }

    #[test]
    fn splits_keywords_on_commas_and_whitespace() {
        assert_eq!(search_keywords("chicken, rice"), vec!["chicken", "rice"]);
        assert_eq!(search_keywords("  taco,,salsa\tlime "), vec!["taco", "salsa", "lime"]);
        assert!(search_keywords(" , ").is_empty());
    }

    #[test]
    fn folds_non_ascii_letters() {
        assert_eq!(fold_case("Ørretfilet med ÆBLE og Å"), "ørretfilet med æble og å");
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
