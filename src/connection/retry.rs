use crate::classify::TransientCondition;
use crate::error::{DriverError, SqlSessionError};

use super::handle::LiveHandle;

/// Run `op` against the handle; on a transient condition roll back once and retry once.
///
/// Errors that are not transient propagate untouched. A retry that fails again surfaces as
/// `TransientDriver` when still transient, otherwise as the plain driver error.
pub(crate) fn with_transient_retry<T, F>(
    handle: &mut LiveHandle,
    mut op: F,
) -> Result<T, SqlSessionError>
where
    F: FnMut(&mut LiveHandle) -> Result<T, DriverError>,
{
    let err = match op(handle) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    let Some(condition) = TransientCondition::detect(err.code.as_deref(), &err.message) else {
        return Err(SqlSessionError::Driver(err));
    };

    tracing::warn!(%condition, error = %err, "transient driver error; rolling back and retrying once");
    match handle.rollback() {
        Ok(true) => {}
        Ok(false) => tracing::debug!("handle has no rollback; retrying without it"),
        Err(rollback_err) => tracing::warn!(error = %rollback_err, "rollback before retry failed"),
    }

    op(handle).map_err(|retry_err| {
        match TransientCondition::detect(retry_err.code.as_deref(), &retry_err.message) {
            Some(condition) => SqlSessionError::TransientDriver {
                condition,
                source: retry_err,
            },
            None => SqlSessionError::Driver(retry_err),
        }
    })
}
