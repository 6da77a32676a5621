//! SQL extraction from free-form model replies
//!
//! The first fenced block tagged `sql` wins. Models sometimes mislabel SQL as
//! `vbnet`, so the first such block is the fallback. Block contents are
//! returned verbatim, surrounding newlines included.

use regex::Regex;
use std::sync::LazyLock;

static SQL_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```sql(.*?)```").expect("valid sql block pattern"));

static VBNET_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```vbnet(.*?)```").expect("valid vbnet block pattern"));

/// Errors from SQL extraction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("No ```sql or ```vbnet code block found in model output")]
    NoSqlFound,
}

/// Return the body of the first `sql` block, else of the first `vbnet` block
pub fn extract_sql(text: &str) -> Result<String, ExtractError> {
    [&*SQL_BLOCK, &*VBNET_BLOCK]
        .into_iter()
        .find_map(|pattern| pattern.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str().to_string())
        .ok_or(ExtractError::NoSqlFound)
}
