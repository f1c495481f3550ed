//! Builtin data types.
//!
//! Every document references the builtin document unless it opts out. Its
//! types are plain [`TypeSource`]s, imported like any user type, whose
//! [`BuiltinCodec`] hooks do the decode/encode coercions.
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use crate::document::DocumentInfo;
use crate::factory::{DocumentInit, TypeDefinitions};
use crate::schema::{AdditionalFieldsSchema, ComplexSchema, SimpleSchema, TypeRef};
use crate::thunk::{CodecHooks, Thunk, TypeSource};

pub const BUILTIN_DOCUMENT_URL: &str = "urn:api-typegraph:builtin";

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap()
});
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$").unwrap()
});
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+\S*$").unwrap());
static BASE64_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$").unwrap()
});
static BIGINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCodec {
    Any,
    Boolean,
    Number,
    Integer,
    BigInt,
    String,
    Date,
    DateTime,
    Time,
    Uuid,
    Email,
    Url,
    Base64,
}

// ————————————————————————————————————————————————————————————————————————————
// SOURCES
// ————————————————————————————————————————————————————————————————————————————

fn simple(name: &str, description: &str, base: Option<&Arc<TypeSource>>, codec: BuiltinCodec) -> Arc<TypeSource> {
    let mut schema = SimpleSchema::named(name).describe(description);
    if let Some(base) = base {
        schema = schema.extends(TypeRef::Thunk(Thunk::Source(base.clone())));
    }
    TypeSource::new(schema).with_hooks(codec).shared()
}

pub static ANY: Lazy<Arc<TypeSource>> = Lazy::new(|| simple("any", "Any JSON value", None, BuiltinCodec::Any));
pub static BOOLEAN: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("boolean", "true or false", None, BuiltinCodec::Boolean));
pub static NUMBER: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("number", "Finite floating point number", None, BuiltinCodec::Number));
pub static INTEGER: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("integer", "Whole number", Some(&*NUMBER), BuiltinCodec::Integer));
pub static BIGINT: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("bigint", "Arbitrary size integer carried as a decimal string", None, BuiltinCodec::BigInt));
pub static STRING: Lazy<Arc<TypeSource>> = Lazy::new(|| simple("string", "Text", None, BuiltinCodec::String));
pub static DATE: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("date", "Calendar date, YYYY-MM-DD", None, BuiltinCodec::Date));
pub static DATETIME: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("datetime", "Date and time, RFC 3339", None, BuiltinCodec::DateTime));
pub static TIME: Lazy<Arc<TypeSource>> = Lazy::new(|| simple("time", "Time of day", None, BuiltinCodec::Time));
pub static UUID: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("uuid", "RFC 4122 identifier", Some(&*STRING), BuiltinCodec::Uuid));
pub static EMAIL: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("email", "E-mail address", Some(&*STRING), BuiltinCodec::Email));
pub static URL: Lazy<Arc<TypeSource>> = Lazy::new(|| simple("url", "Absolute URL", Some(&*STRING), BuiltinCodec::Url));
pub static BASE64: Lazy<Arc<TypeSource>> =
    Lazy::new(|| simple("base64", "Binary data, base64 encoded", Some(&*STRING), BuiltinCodec::Base64));
pub static OBJECT: Lazy<Arc<TypeSource>> = Lazy::new(|| {
    TypeSource::new(
        ComplexSchema::named("object")
            .describe("Object with arbitrary fields")
            .additional_fields(AdditionalFieldsSchema::Flag(true)),
    )
    .shared()
});

pub fn sources() -> Vec<Arc<TypeSource>> {
    [
        &ANY, &BOOLEAN, &NUMBER, &INTEGER, &BIGINT, &STRING, &DATE, &DATETIME, &TIME, &UUID, &EMAIL,
        &URL, &BASE64, &OBJECT,
    ]
    .into_iter()
    .map(|source| Lazy::force(source).clone())
    .collect()
}

pub(crate) fn builtin_init() -> DocumentInit {
    DocumentInit {
        url: Some(BUILTIN_DOCUMENT_URL.to_string()),
        info: DocumentInfo {
            title: Some("Builtin types".to_string()),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            description: None,
        },
        references: Default::default(),
        types: TypeDefinitions::List(sources().into_iter().map(Thunk::Source).collect()),
        no_builtin_types: true,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CODEC HOOKS
// ————————————————————————————————————————————————————————————————————————————

impl CodecHooks for BuiltinCodec {
    fn decode(&self, value: &Value) -> Result<Value, String> {
        self.coerce(value, true)
    }

    fn encode(&self, value: &Value) -> Result<Value, String> {
        self.coerce(value, false)
    }
}

impl BuiltinCodec {
    /// Normalize `value`; `lenient` also accepts the string spellings that
    /// query strings and form bodies carry.
    fn coerce(self, value: &Value, lenient: bool) -> Result<Value, String> {
        match self {
            BuiltinCodec::Any => Ok(value.clone()),
            BuiltinCodec::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) if lenient => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" => Ok(Value::Bool(false)),
                    _ => Err("must be a boolean".into()),
                },
                _ => Err("must be a boolean".into()),
            },
            BuiltinCodec::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) if lenient => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| "must be a number".to_string())
                    .and_then(number_value),
                _ => Err("must be a number".into()),
            },
            BuiltinCodec::Integer => {
                let number = BuiltinCodec::Number.coerce(value, lenient)?;
                match number.as_i64() {
                    Some(i) => Ok(Value::from(i)),
                    None => match number.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
                        _ => Err("must be an integer".into()),
                    },
                }
            }
            BuiltinCodec::BigInt => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
                Value::String(s) if BIGINT_RE.is_match(s.trim()) => Ok(Value::String(s.trim().to_string())),
                _ => Err("must be an integer".into()),
            },
            BuiltinCodec::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(_) | Value::Bool(_) if lenient => Ok(Value::String(value.to_string())),
                _ => Err("must be a string".into()),
            },
            BuiltinCodec::Date => {
                let s = text(value, "must be a date")?;
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
                    .ok_or("must be a date (YYYY-MM-DD)")?;
                Ok(Value::String(date.format("%Y-%m-%d").to_string()))
            }
            BuiltinCodec::DateTime => {
                let s = text(value, "must be a date-time")?;
                if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    return Ok(Value::String(dt.to_rfc3339()));
                }
                let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
                    .or_else(|| {
                        NaiveDate::parse_from_str(s, "%Y-%m-%d")
                            .ok()
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                    })
                    .ok_or("must be a date-time (RFC 3339)")?;
                Ok(Value::String(naive.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            }
            BuiltinCodec::Time => {
                let s = text(value, "must be a time")?;
                let time = NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                    .map_err(|_| "must be a time (HH:MM:SS)".to_string())?;
                Ok(Value::String(time.format("%H:%M:%S%.f").to_string()))
            }
            BuiltinCodec::Uuid => matching(value, &UUID_RE, "must be a UUID"),
            BuiltinCodec::Email => matching(value, &EMAIL_RE, "must be an e-mail address"),
            BuiltinCodec::Url => matching(value, &URL_RE, "must be an absolute URL"),
            BuiltinCodec::Base64 => matching(value, &BASE64_RE, "must be base64 encoded"),
        }
    }
}

fn text<'v>(value: &'v Value, message: &str) -> Result<&'v str, String> {
    value.as_str().map(str::trim).ok_or_else(|| message.to_string())
}

fn matching(value: &Value, re: &Regex, message: &str) -> Result<Value, String> {
    let s = text(value, message)?;
    if re.is_match(s) {
        Ok(Value::String(s.to_string()))
    } else {
        Err(message.to_string())
    }
}

fn number_value(f: f64) -> Result<Value, String> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Ok(Value::from(f as i64));
    }
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| "must be a finite number".to_string())
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_decode_strict_encode() {
        assert_eq!(BuiltinCodec::Integer.decode(&json!("42")), Ok(json!(42)));
        assert!(BuiltinCodec::Integer.encode(&json!("42")).is_err());
        assert_eq!(BuiltinCodec::Boolean.decode(&json!("yes")), Ok(json!(true)));
        assert!(BuiltinCodec::Integer.decode(&json!(1.5)).is_err());
        assert_eq!(BuiltinCodec::Number.decode(&json!(" 2.5 ")), Ok(json!(2.5)));
    }

    #[test]
    fn dates_are_normalized() {
        assert_eq!(BuiltinCodec::Date.decode(&json!("2024-02-29")), Ok(json!("2024-02-29")));
        assert_eq!(
            BuiltinCodec::Date.decode(&json!("2024-02-29T23:10:00+00:00")),
            Ok(json!("2024-02-29"))
        );
        assert!(BuiltinCodec::Date.decode(&json!("2023-02-29")).is_err());
        assert_eq!(
            BuiltinCodec::DateTime.decode(&json!("2024-01-02")),
            Ok(json!("2024-01-02T00:00:00"))
        );
        assert_eq!(BuiltinCodec::Time.decode(&json!("07:30")), Ok(json!("07:30:00")));
    }

    #[test]
    fn string_formats() {
        assert!(BuiltinCodec::Uuid.decode(&json!("6f1c2b1e-1d3a-4c5e-9f00-123456789abc")).is_ok());
        assert!(BuiltinCodec::Uuid.decode(&json!("not-a-uuid")).is_err());
        assert!(BuiltinCodec::Email.decode(&json!("ada@example.com")).is_ok());
        assert!(BuiltinCodec::Email.decode(&json!("ada@")).is_err());
        assert!(BuiltinCodec::Url.decode(&json!("https://example.com/x?y=1")).is_ok());
        assert!(BuiltinCodec::Base64.decode(&json!("aGVsbG8=")).is_ok());
        assert_eq!(BuiltinCodec::BigInt.decode(&json!(12)), Ok(json!("12")));
    }

    #[test]
    fn builtin_sources_are_stable() {
        let first = sources();
        let second = sources();
        assert_eq!(first.len(), 14);
        assert!(first.iter().zip(&second).all(|(a, b)| a.id() == b.id()));
    }
}
