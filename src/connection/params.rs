use crate::error::SqlSessionError;
use crate::sql_text::placeholder_names;
use crate::types::NamedParams;

/// Check that the statement's `:name` placeholders and the supplied parameters agree.
pub(crate) fn validate_params(sql: &str, params: &NamedParams) -> Result<(), SqlSessionError> {
    let names = placeholder_names(sql);
    let missing: Vec<String> = names
        .iter()
        .filter(|name| !params.contains_key(name.as_str()))
        .map(|name| format!(":{name}"))
        .collect();
    let unused: Vec<String> = params
        .keys()
        .filter(|key| !names.contains(key))
        .map(|key| format!(":{key}"))
        .collect();

    match (missing.is_empty(), unused.is_empty()) {
        (true, true) => Ok(()),
        (false, true) => Err(SqlSessionError::ParameterMismatch(format!(
            "no value supplied for {}",
            missing.join(", ")
        ))),
        (true, false) => Err(SqlSessionError::ParameterMismatch(format!(
            "supplied parameters not used by the statement: {}",
            unused.join(", ")
        ))),
        (false, false) => Err(SqlSessionError::ParameterMismatch(format!(
            "no value supplied for {}; supplied parameters not used by the statement: {}",
            missing.join(", "),
            unused.join(", ")
        ))),
    }
}

/// The subset of `params` a statement refers to.
pub(crate) fn params_for(sql: &str, params: &NamedParams) -> NamedParams {
    let names = placeholder_names(sql);
    params
        .iter()
        .filter(|(key, _)| names.contains(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
