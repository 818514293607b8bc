//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use keel_transport::TransportError;
use uuid::Uuid;

use crate::deser::RawId;
use crate::paging::Page;

const PAGE_NO: &str = "pageNo";
const PAGE_SIZE: &str = "pageSize";

/// Failure converting between a typed id and its [`RawId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdSerializationError {
    /// The raw id lacks a value the id needs.
    #[error("missing id parameter `{0}`")]
    Missing(String),
    /// A raw value could not be parsed.
    #[error("invalid value `{value}` for id parameter `{param}`: {reason}")]
    Invalid {
        /// Parameter being parsed.
        param: String,
        /// Offending value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

impl From<IdSerializationError> for TransportError {
    fn from(err: IdSerializationError) -> Self {
        TransportError::deserialization_failed(err.to_string())
    }
}

/// Converts a call id to and from its untyped path and query form.
pub trait IdSerializer<Id>: Send + Sync {
    /// Render `id` as raw parameters.
    fn serialize(&self, id: &Id) -> Result<RawId, IdSerializationError>;

    /// Parse raw parameters back into an id.
    fn deserialize(&self, raw: RawId) -> Result<Id, IdSerializationError>;
}

/// Ids made of one path value parsed with [`FromStr`] and rendered with
/// [`fmt::Display`].
pub struct FromStrIdSerializer<T> {
    _id: PhantomData<fn() -> T>,
}

impl<T> FromStrIdSerializer<T> {
    /// Create the serializer.
    pub fn new() -> Self {
        Self { _id: PhantomData }
    }
}

impl<T> Default for FromStrIdSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IdSerializer<T> for FromStrIdSerializer<T>
where
    T: FromStr + fmt::Display,
    T::Err: fmt::Display,
{
    fn serialize(&self, id: &T) -> Result<RawId, IdSerializationError> {
        Ok(RawId::from_path_values([id.to_string()]))
    }

    fn deserialize(&self, raw: RawId) -> Result<T, IdSerializationError> {
        let param = raw
            .path_params()
            .first()
            .ok_or_else(|| IdSerializationError::Missing("0".to_owned()))?;
        param
            .raw_value()
            .parse()
            .map_err(|err: T::Err| IdSerializationError::Invalid {
                param: param.name().unwrap_or("0").to_owned(),
                value: param.raw_value().to_owned(),
                reason: err.to_string(),
            })
    }
}

/// Id of calls addressed without parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitIdSerializer;

impl IdSerializer<()> for UnitIdSerializer {
    fn serialize(&self, _id: &()) -> Result<RawId, IdSerializationError> {
        Ok(RawId::empty())
    }

    fn deserialize(&self, _raw: RawId) -> Result<(), IdSerializationError> {
        Ok(())
    }
}

/// [`Page`] carried in the `pageNo` and `pageSize` query parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageIdSerializer;

impl PageIdSerializer {
    fn parse(raw: &RawId, name: &str) -> Result<Option<u32>, IdSerializationError> {
        raw.query_param(name)
            .map(|value| {
                value.parse().map_err(|err: std::num::ParseIntError| {
                    IdSerializationError::Invalid {
                        param: name.to_owned(),
                        value: value.to_owned(),
                        reason: err.to_string(),
                    }
                })
            })
            .transpose()
    }
}

impl IdSerializer<Page> for PageIdSerializer {
    fn serialize(&self, page: &Page) -> Result<RawId, IdSerializationError> {
        Ok(RawId::empty()
            .with_optional_query_param(PAGE_NO, page.page_no().map(|n| n.to_string()))
            .with_optional_query_param(PAGE_SIZE, page.page_size().map(|n| n.to_string())))
    }

    fn deserialize(&self, raw: RawId) -> Result<Page, IdSerializationError> {
        Ok(Page::new(
            Self::parse(&raw, PAGE_NO)?,
            Self::parse(&raw, PAGE_SIZE)?,
        ))
    }
}

fn erase<T: 'static>(serializer: impl IdSerializer<T> + 'static) -> Box<dyn Any> {
    let serializer: Arc<dyn IdSerializer<T>> = Arc::new(serializer);
    Box::new(serializer)
}

macro_rules! from_str_builtin {
    ($requested:expr, $($ty:ty),+ $(,)?) => {
        $(
            if $requested == TypeId::of::<$ty>() {
                return Some(erase(FromStrIdSerializer::<$ty>::new()));
            }
        )+
    };
}

fn builtin_for(requested: TypeId) -> Option<Box<dyn Any>> {
    from_str_builtin!(requested, String, bool, i32, i64, u32, u64, usize, Uuid);
    if requested == TypeId::of::<()>() {
        return Some(erase(UnitIdSerializer));
    }
    if requested == TypeId::of::<Page>() {
        return Some(erase(PageIdSerializer));
    }
    None
}

/// Serializer shipped for `T`, if there is one: strings, booleans, integers
/// and UUIDs as a single path value, `()` and [`Page`].
pub fn builtin_id_serializer<T: 'static>() -> Option<Arc<dyn IdSerializer<T>>> {
    builtin_for(TypeId::of::<T>())?
        .downcast::<Arc<dyn IdSerializer<T>>>()
        .ok()
        .map(|serializer| *serializer)
}
