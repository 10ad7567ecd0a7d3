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

pub mod association;
pub mod expected_machine;
pub mod extension_service;
pub mod ib_interface;
pub mod ib_partition;
pub mod instance;
pub mod instance_type;
pub mod interface;
pub mod machine;
pub mod network_security_group;
pub mod nvl_logical_partition;
pub mod nvlink_interface;
pub mod os_image;
pub mod site;
pub mod ssh_key_group;
pub mod status_detail;
pub mod work_lock;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::Location;
use std::pin::Pin;

use sqlx::Acquire;

///
/// Wraps a sqlx::Error and records location and query
///
#[derive(Debug)]
pub struct AnnotatedSqlxError {
    file: &'static str,
    line: u32,
    query: String,
    pub source: sqlx::Error,
}

#[derive(thiserror::Error, Debug)]
pub enum DatabaseError {
    #[error(transparent)]
    Sqlx(#[from] AnnotatedSqlxError),
    #[error("{kind} not found: {id}")]
    NotFoundError {
        /// The type of the resource that was not found (e.g. Instance)
        kind: &'static str,
        /// The ID of the resource that was not found
        id: String,
    },
    #[error("{kind} already exists: {id}")]
    AlreadyFoundError {
        kind: &'static str,
        id: String,
    },
    #[error("Internal error: {message}")]
    Internal { message: String },
    #[error("Argument is invalid: {0}")]
    InvalidArgument(String),
    #[error("Argument is missing in input: {0}")]
    MissingArgument(&'static str),
    #[error("Uuid type conversion error: {0}")]
    UuidConversionError(#[from] anvil_uuid::UuidConversionError),
    #[error("{0}")]
    FailedPrecondition(String),
}

impl DatabaseError {
    /// Returns true if the database error wraps a sqlx::Error::RowNotFound,
    /// or if it's our own DatabaseError::NotFoundError
    pub fn is_not_found(&self) -> bool {
        match self {
            DatabaseError::Sqlx(e) => matches!(e.source, sqlx::Error::RowNotFound),
            DatabaseError::NotFoundError { .. } => true,
            _ => false,
        }
    }

    #[track_caller]
    pub fn new(op_name: &str, source: sqlx::Error) -> DatabaseError {
        let loc = Location::caller();
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: op_name.to_string(),
            source,
        })
    }

    #[track_caller]
    pub fn query(query: &str, source: sqlx::Error) -> DatabaseError {
        let loc = Location::caller();
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: query.to_string(),
            source,
        })
    }

    fn txn_begin(source: sqlx::Error, loc: &'static Location<'static>) -> DatabaseError {
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: "transaction begin".into(),
            source,
        })
    }

    fn txn_commit(source: sqlx::Error, loc: &'static Location<'static>) -> DatabaseError {
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: "transaction commit".into(),
            source,
        })
    }

    fn txn_rollback(source: sqlx::Error, loc: &'static Location<'static>) -> DatabaseError {
        DatabaseError::Sqlx(AnnotatedSqlxError {
            file: loc.file(),
            line: loc.line(),
            query: "transaction rollback".into(),
            source,
        })
    }

    /// Creates a `Internal` error with the given error message
    pub fn internal(message: String) -> Self {
        DatabaseError::Internal { message }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

impl Display for AnnotatedSqlxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Database Error: {} file={} line={} query={}.",
            self.source, self.file, self.line, self.query,
        )
    }
}

impl Error for AnnotatedSqlxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// The value to write to a nullable / clearable column.
///
/// Inventory-driven updates must distinguish "leave the column alone" from
/// "clear it": a `None` reaching the DAO is treated as no update, so callers
/// that need to empty a column pass [`ColumnUpdate::Clear`] explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnUpdate<T> {
    #[default]
    Unchanged,
    Clear,
    Set(T),
}

impl<T> ColumnUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ColumnUpdate::Unchanged)
    }

    /// Collapses to the value to bind: `Some(Some(v))` to set, `Some(None)`
    /// to clear, `None` to skip the column.
    pub fn to_bind(self) -> Option<Option<T>> {
        match self {
            ColumnUpdate::Unchanged => None,
            ColumnUpdate::Clear => Some(None),
            ColumnUpdate::Set(value) => Some(Some(value)),
        }
    }
}

pub struct Transaction<'a> {
    inner: sqlx::PgTransaction<'a>,
}

impl<'a> Transaction<'a> {
    // This function can just be async when
    // https://github.com/rust-lang/rust/issues/110011 will be
    // implemented
    #[track_caller]
    pub fn begin(pool: &'a sqlx::PgPool) -> impl Future<Output = Result<Self, DatabaseError>> {
        let loc = Location::caller();
        async move {
            pool.begin()
                .await
                .map_err(|e| DatabaseError::txn_begin(e, loc))
                .map(|inner| Self { inner })
        }
    }

    #[track_caller]
    pub fn begin_inner(
        conn: &'a mut sqlx::PgConnection,
    ) -> Pin<Box<dyn Future<Output = Result<Self, DatabaseError>> + Send + 'a>> {
        let loc = Location::caller();
        Box::pin(async move {
            conn.begin()
                .await
                .map_err(|e| DatabaseError::txn_begin(e, loc))
                .map(|inner| Self { inner })
        })
    }

    #[track_caller]
    pub fn commit(self) -> Pin<Box<dyn Future<Output = Result<(), DatabaseError>> + Send + 'a>> {
        let loc = Location::caller();
        Box::pin(async move {
            self.inner
                .commit()
                .await
                .map_err(|e| DatabaseError::txn_commit(e, loc))
        })
    }

    #[track_caller]
    pub fn rollback(self) -> Pin<Box<dyn Future<Output = Result<(), DatabaseError>> + Send + 'a>> {
        let loc = Location::caller();
        Box::pin(async move {
            self.inner
                .rollback()
                .await
                .map_err(|e| DatabaseError::txn_rollback(e, loc))
        })
    }

    pub fn as_pgconn(&mut self) -> &mut sqlx::PgConnection {
        &mut self.inner
    }
}

impl<'a> std::ops::Deref for Transaction<'a> {
    type Target = sqlx::PgTransaction<'a>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::ops::DerefMut for Transaction<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

#[cfg(test)]
#[ctor::ctor]
fn setup_test_logging() {
    use tracing_subscriber::filter::{EnvFilter, LevelFilter};
    use tracing_subscriber::fmt::TestWriter;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::util::SubscriberInitExt;

    if let Err(e) = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::default()
                .compact()
                .with_writer(TestWriter::new),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy()
                .add_directive("sqlx=warn".parse().unwrap())
                .add_directive("hyper=warn".parse().unwrap())
                .add_directive("rustls=warn".parse().unwrap())
                .add_directive("h2=warn".parse().unwrap()),
        )
        .try_init()
    {
        // Note: Resist the temptation to ignore this error. We really should only have one place in
        // the test binary that initializes logging.
        panic!(
            "Failed to initialize trace logging for api-db tests. It's possible some earlier \
            code path has already set a global default log subscriber: {e}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_new() {
        const OP_NAME: &str = "something people want to say";
        let DatabaseError::Sqlx(err) =
            DatabaseError::new(OP_NAME, sqlx::Error::protocol("some error"))
        else {
            unreachable!()
        };
        assert_eq!(err.line, line!() - 4);
        assert_eq!(err.file, file!());
        assert!(format!("{err}").contains(OP_NAME))
    }

    #[test]
    fn test_column_update_binding() {
        assert_eq!(ColumnUpdate::<String>::Unchanged.to_bind(), None);
        assert_eq!(ColumnUpdate::<String>::Clear.to_bind(), Some(None));
        assert_eq!(
            ColumnUpdate::Set("x".to_string()).to_bind(),
            Some(Some("x".to_string()))
        );
    }
}
