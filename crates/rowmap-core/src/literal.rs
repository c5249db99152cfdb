//! `{=name}` literal substitution.
//!
//! A `{=name}` token in command text is replaced by the literal rendering of
//! the bound parameter `name`, and that parameter is then dropped from the
//! bound list. Only values with an injection-free textual form are accepted;
//! arrays render as `(a,b,...)` lists for `IN` clauses.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, LiteralError, Result};
use crate::params::BoundParam;

fn token_pattern() -> Result<&'static Regex> {
    static TOKEN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    TOKEN
        .get_or_init(|| Regex::new(r"\{=([A-Za-z_][A-Za-z0-9_]*)\}"))
        .as_ref()
        .map_err(|e| Error::Custom(format!("literal token pattern failed to compile: {e}")))
}

/// Whether `sql` contains any literal token.
pub fn has_literals(sql: &str) -> bool {
    sql.contains("{=") && token_pattern().is_ok_and(|re| re.is_match(sql))
}

/// Replace every `{=name}` token in `sql` with its parameter's literal text.
///
/// Parameters consumed by a token are removed from `params`; the rest are
/// returned untouched.
///
/// ```
/// use rowmap_core::{BoundParam, Value};
/// use rowmap_core::literal::expand_literals;
///
/// let params = vec![BoundParam { name: "n".into(), value: Value::Int(3), sql_type: None }];
/// let (sql, rest) = expand_literals("select top {=n} * from t", params).unwrap();
/// assert_eq!(sql, "select top 3 * from t");
/// assert!(rest.is_empty());
/// ```
pub fn expand_literals(
    sql: &str,
    params: Vec<BoundParam>,
) -> Result<(Cow<'_, str>, Vec<BoundParam>)> {
    if !has_literals(sql) {
        return Ok((Cow::Borrowed(sql), params));
    }

    let mut consumed = vec![false; params.len()];
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for caps in token_pattern()?.captures_iter(sql) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        let Some(index) = params.iter().position(|p| p.is_named(name)) else {
            return Err(LiteralError {
                name: name.to_string(),
                message: "no parameter with this name is bound".to_string(),
            }
            .into());
        };
        let param = &params[index];
        let Some(text) = param.value.to_literal() else {
            return Err(LiteralError {
                name: name.to_string(),
                message: format!("a {} value cannot be rendered as a literal", param.value.type_name()),
            }
            .into());
        };
        out.push_str(&sql[last..whole.start()]);
        out.push_str(&text);
        last = whole.end();
        consumed[index] = true;
    }
    out.push_str(&sql[last..]);

    let remaining = params
        .into_iter()
        .zip(consumed)
        .filter_map(|(param, used)| (!used).then_some(param))
        .collect();
    tracing::trace!(sql = %out, "Expanded literal tokens");
    Ok((Cow::Owned(out), remaining))
}
