//! Bridge serde_json values to types sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A JSON value lowered to a bindable PostgreSQL argument.
///
/// Strings stay text even when they parse as uuids; the placeholder casts
/// from the introspected column type do the conversion server-side.
#[derive(Clone, Debug)]
pub enum PgValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
    Json(Value),
}

impl From<&Value> for PgValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => PgValue::Null,
            Value::Bool(b) => PgValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgValue::I64(i),
                None => PgValue::F64(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => PgValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => PgValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgValue::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgValue::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgValue::Json(v) => <serde_json::Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }
}

impl sqlx::Type<Postgres> for PgValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}
