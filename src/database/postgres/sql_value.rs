use bytes::BytesMut;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type as PgType};

/// An owned SQL parameter value that can sit in a queued batch until the
/// batch is transmitted. The ledger schema only needs TEXT and BIGINT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    BigInt(i64),
    Null,
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &PgType,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Text(value) => value.to_sql(ty, out),
            SqlValue::BigInt(value) => value.to_sql(ty, out),
            SqlValue::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &PgType) -> bool {
        true
    }

    to_sql_checked!();
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bigint_encodes_as_int8() {
        let mut out = BytesMut::new();
        let result = SqlValue::BigInt(1).to_sql(&PgType::INT8, &mut out).unwrap();
        assert!(matches!(result, IsNull::No));
        assert_eq!(out.as_ref(), &1i64.to_be_bytes());
    }

    #[test]
    fn test_text_encodes_as_utf8() {
        let mut out = BytesMut::new();
        let result = SqlValue::from("first item").to_sql(&PgType::TEXT, &mut out).unwrap();
        assert!(matches!(result, IsNull::No));
        assert_eq!(out.as_ref(), b"first item");
    }

    #[test]
    fn test_null_writes_nothing() {
        let mut out = BytesMut::new();
        let result = SqlValue::Null.to_sql(&PgType::TEXT, &mut out).unwrap();
        assert!(matches!(result, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(SqlValue::from("x"), SqlValue::Text("x".to_string()));
        assert_eq!(SqlValue::from("x".to_string()), SqlValue::Text("x".to_string()));
        assert_eq!(SqlValue::from(2i64), SqlValue::BigInt(2));
    }
}
