//! Design-time types.
//!
//! A field declared without an explicit type is typed through the Rust type it
//! was declared with. The mapping from [`DesignType`] to a data type name lives
//! in a read-only [`DesignTypeMap`]; the process-wide default is built once and
//! handed to each factory, which never mutates it.
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesignType {
    String,
    Number,
    Integer,
    Boolean,
    BigInt,
    Date,
    DateTime,
    Buffer,
    Object,
    Any,
}

/// Implemented by Rust types that may appear as undeclared field types.
pub trait HasDesignType {
    const DESIGN_TYPE: DesignType;
}

macro_rules! design_types {
    ($($design:ident => $($ty:ty),+;)+) => {
        $($(
            impl HasDesignType for $ty {
                const DESIGN_TYPE: DesignType = DesignType::$design;
            }
        )+)+
    };
}

design_types! {
    String => String, str;
    Number => f32, f64;
    Integer => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize;
    BigInt => i128, u128;
    Boolean => bool;
    Date => chrono::NaiveDate;
    DateTime => chrono::NaiveDateTime, chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::FixedOffset>;
    Buffer => Vec<u8>, [u8];
    Object => serde_json::Map<String, serde_json::Value>;
    Any => serde_json::Value;
}

impl<T: HasDesignType> HasDesignType for Option<T> {
    const DESIGN_TYPE: DesignType = T::DESIGN_TYPE;
}

#[derive(Debug, Clone, Default)]
pub struct DesignTypeMap {
    entries: HashMap<DesignType, String>,
}

static BUILTIN_DESIGN_TYPES: Lazy<Arc<DesignTypeMap>> = Lazy::new(|| {
    Arc::new(
        DesignTypeMap::new()
            .with(DesignType::String, "string")
            .with(DesignType::Number, "number")
            .with(DesignType::Integer, "integer")
            .with(DesignType::Boolean, "boolean")
            .with(DesignType::BigInt, "bigint")
            .with(DesignType::Date, "date")
            .with(DesignType::DateTime, "datetime")
            .with(DesignType::Buffer, "base64")
            .with(DesignType::Object, "object")
            .with(DesignType::Any, "any"),
    )
});

impl DesignTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table matching the builtin document's type names.
    pub fn builtin() -> Arc<DesignTypeMap> {
        BUILTIN_DESIGN_TYPES.clone()
    }

    pub fn with(mut self, design_type: DesignType, name: impl Into<String>) -> Self {
        self.entries.insert(design_type, name.into());
        self
    }

    pub fn get(&self, design_type: DesignType) -> Option<&str> {
        self.entries.get(&design_type).map(String::as_str)
    }
}
