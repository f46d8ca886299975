use std::error::Error;

use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::types::{NamedParams, RowValues};

/// Positional parameter list for a statement rewritten from `:name` to `$n` placeholders.
///
/// Names without a supplied value bind as NULL.
#[must_use]
pub fn positional_params(names: &[String], params: &NamedParams) -> Vec<RowValues> {
    names
        .iter()
        .map(|name| params.get(name).cloned().unwrap_or(RowValues::Null))
        .collect()
}

/// Borrow bind values in the shape tokio-postgres expects.
#[must_use]
pub fn as_refs(values: &[RowValues]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl ToSql for RowValues {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                _ => (*i).to_sql(ty, out),
            },
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => (*f).to_sql(ty, out),
            },
            RowValues::Text(s) => s.to_sql(ty, out),
            RowValues::Bool(b) => (*b).to_sql(ty, out),
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
                Type::DATE => dt.date().to_sql(ty, out),
                _ => dt.to_sql(ty, out),
            },
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(jsval) => jsval.to_sql(ty, out),
            RowValues::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_names_bind_null() {
        let params = NamedParams::from([("a".to_string(), RowValues::Int(1))]);
        let values = positional_params(&["a".into(), "b".into(), "a".into()], &params);
        assert_eq!(
            values,
            vec![RowValues::Int(1), RowValues::Null, RowValues::Int(1)]
        );
    }

    #[test]
    fn narrow_integer_columns_reject_overflow() {
        let mut buf = bytes::BytesMut::new();
        assert!(RowValues::Int(7).to_sql(&Type::INT2, &mut buf).is_ok());
        assert!(RowValues::Int(i64::MAX).to_sql(&Type::INT4, &mut buf).is_err());
    }
}
