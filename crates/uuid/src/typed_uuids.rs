/*
 * SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use uuid::Uuid;

use crate::UuidConversionError;

/// Marker trait for the entity kind behind a [`TypedUuid`].
///
/// The `TYPE_NAME` shows up in error messages and in `NotFound` reporting,
/// so it should be the user-facing name of the entity ("Instance", "Site", ...).
pub trait UuidSubtype: Send + Sync + 'static {
    const TYPE_NAME: &'static str;
}

/// A UUID that is tagged with the entity kind it identifies.
///
/// Using distinct Rust types for the IDs of different entities prevents a
/// whole class of "passed the instance id where the site id was expected"
/// bugs, while keeping the wire and database representation a plain UUID.
pub struct TypedUuid<T: UuidSubtype> {
    inner: Uuid,
    _marker: PhantomData<T>,
}

impl<T: UuidSubtype> TypedUuid<T> {
    /// Wraps a raw UUID
    pub const fn from_uuid(inner: Uuid) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Generates a new random (v4) ID
    pub fn new_v4() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Returns the untyped UUID
    pub const fn as_uuid(&self) -> Uuid {
        self.inner
    }

    /// Parses an ID from its canonical string form, reporting the entity
    /// kind on failure.
    pub fn parse(value: &str) -> Result<Self, UuidConversionError> {
        Uuid::parse_str(value)
            .map(Self::from_uuid)
            .map_err(|_| UuidConversionError::InvalidUuid {
                ty: T::TYPE_NAME,
                value: value.to_string(),
            })
    }
}

// The derived impls would put bounds on `T`, which we don't want: the marker
// is phantom data and never constructed.
impl<T: UuidSubtype> Copy for TypedUuid<T> {}

impl<T: UuidSubtype> Clone for TypedUuid<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: UuidSubtype> PartialEq for TypedUuid<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T: UuidSubtype> Eq for TypedUuid<T> {}

impl<T: UuidSubtype> Hash for TypedUuid<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl<T: UuidSubtype> Ord for TypedUuid<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}

impl<T: UuidSubtype> PartialOrd for TypedUuid<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: UuidSubtype> Display for TypedUuid<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl<T: UuidSubtype> Debug for TypedUuid<T> {
    // The derived Debug implementation is messy, just output the string
    // representation even when debugging.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", T::TYPE_NAME, self.inner)
    }
}

impl<T: UuidSubtype> FromStr for TypedUuid<T> {
    type Err = UuidConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<T: UuidSubtype> From<Uuid> for TypedUuid<T> {
    fn from(inner: Uuid) -> Self {
        Self::from_uuid(inner)
    }
}

impl<T: UuidSubtype> From<TypedUuid<T>> for Uuid {
    fn from(id: TypedUuid<T>) -> Self {
        id.inner
    }
}

impl<T: UuidSubtype> serde::Serialize for TypedUuid<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.inner.serialize(serializer)
    }
}

impl<'de, T: UuidSubtype> serde::Deserialize<'de> for TypedUuid<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Uuid::deserialize(deserializer).map(Self::from_uuid)
    }
}

// Make TypedUuid bindable directly into a sqlx query
#[cfg(feature = "sqlx")]
mod sqlx_impls {
    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::postgres::{PgHasArrayType, PgTypeInfo};
    use sqlx::{Database, Postgres};
    use uuid::Uuid;

    use super::{TypedUuid, UuidSubtype};

    impl<T: UuidSubtype> sqlx::Type<Postgres> for TypedUuid<T> {
        fn type_info() -> PgTypeInfo {
            <Uuid as sqlx::Type<Postgres>>::type_info()
        }
    }

    impl<T: UuidSubtype> PgHasArrayType for TypedUuid<T> {
        fn array_type_info() -> PgTypeInfo {
            <Uuid as PgHasArrayType>::array_type_info()
        }
    }

    impl<T: UuidSubtype> sqlx::Encode<'_, Postgres> for TypedUuid<T> {
        fn encode_by_ref(
            &self,
            buf: &mut <Postgres as Database>::ArgumentBuffer<'_>,
        ) -> Result<IsNull, BoxDynError> {
            <Uuid as sqlx::Encode<'_, Postgres>>::encode_by_ref(&self.inner, buf)
        }
    }

    impl<'r, T: UuidSubtype> sqlx::Decode<'r, Postgres> for TypedUuid<T> {
        fn decode(value: <Postgres as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
            let inner = <Uuid as sqlx::Decode<'r, Postgres>>::decode(value)?;
            Ok(TypedUuid::from_uuid(inner))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestMarker;
    impl UuidSubtype for TestMarker {
        const TYPE_NAME: &'static str = "TestObject";
    }
    type TestId = TypedUuid<TestMarker>;

    #[test]
    fn round_trips_through_string() {
        let id = TestId::new_v4();
        let parsed: TestId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_reports_type_name() {
        let err = TestId::parse("not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("TestObject"));
    }

    #[test]
    fn serde_uses_plain_uuid_representation() {
        let id = TestId::new_v4();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: TestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
