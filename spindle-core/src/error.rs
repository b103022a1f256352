// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! # PERFORMANCE CRITICAL MODULE
//!
//! Error constructors sit on every buffer read and every type check. They are
//! `#[cold]` so LLVM lays the success path out straight, and `#[track_caller]`
//! so `SPINDLE_PANIC_ON_ERROR` can report the exact creation site.
//!
//! Errors fall into five categories (see [`ErrorCategory`]). Callers that
//! decode untrusted input usually want to branch on [`Error::category`]
//! rather than on individual variants.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// Set `SPINDLE_PANIC_ON_ERROR` at compile time to panic where an error is created.
pub const PANIC_ON_ERROR: bool = option_env!("SPINDLE_PANIC_ON_ERROR").is_some();

/// Check if `SPINDLE_PANIC_ON_ERROR` was set at compile time.
#[inline(always)]
pub const fn should_panic_on_error() -> bool {
    PANIC_ON_ERROR
}

/// Number of ancestor segments kept in a [`Error::DepthExceed`] path.
pub const MAX_REPORTED_PATH: usize = 16;

/// Coarse classification of an [`enum@Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or inconsistent stream: underflow, bad tags, bad refs, schema drift.
    Protocol,
    /// Input asked for a type the engine refuses to materialize.
    Security,
    /// A resource bound enforced by the engine was hit.
    Resource,
    /// A decoded type rejected its own field values.
    Construction,
    /// The caller used the API incorrectly.
    Usage,
}

/// Error type for Spindle serialization and deserialization operations.
///
/// Do not construct variants directly; use the constructor functions, which
/// honor `SPINDLE_PANIC_ON_ERROR` and keep the error path out of line.
///
/// ```rust
/// use spindle_core::error::{Error, ErrorCategory};
///
/// let err = Error::unknown_type("demo.Point");
/// assert_eq!(err.category(), ErrorCategory::Security);
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Read past the end of the readable region.
    #[error("Buffer underflow: {cursor} + {needed} > {limit}")]
    BufferUnderflow {
        cursor: usize,
        needed: usize,
        limit: usize,
    },

    /// Invalid or corrupted data (bad tag byte, bad length, bad UTF-8).
    #[error("{0}")]
    InvalidData(Cow<'static, str>),

    /// A reference marker that cannot be resolved.
    #[error("{0}")]
    InvalidRef(Cow<'static, str>),

    /// Structural hash of the stream does not match the local type.
    #[error(
        "Incompatible schema for type `{type_name}`: stream hash {remote_hash:#010x}, local hash \
         {local_hash:#010x}; align field names and types on both sides or use compatible mode"
    )]
    IncompatibleSchema {
        type_name: String,
        remote_hash: u32,
        local_hash: u32,
    },

    /// A matched field changed to a type that cannot be promoted.
    #[error("Field `{type_name}.{field}` was written as {remote} and cannot be read as {local}")]
    FieldTypeMismatch {
        type_name: String,
        field: String,
        remote: String,
        local: String,
    },

    /// The stream names a type that is not registered while registration is required.
    #[error("{0}")]
    UnknownType(Cow<'static, str>),

    /// The stream names a denylisted type.
    #[error("Type `{0}` is disallowed")]
    Disallowed(Cow<'static, str>),

    /// The graph nested deeper than the configured limit.
    #[error("{}", depth_message(.max, .path))]
    DepthExceed { max: u32, path: Vec<String> },

    /// A record factory rejected its decoded field values.
    #[error("Failed to construct `{type_name}`: {reason}; decoded fields: {fields}")]
    Construction {
        type_name: String,
        reason: String,
        fields: String,
    },

    /// General type-related error (wrong value kind for a declared type).
    #[error("{0}")]
    TypeError(Cow<'static, str>),

    /// Unsupported operation or feature.
    #[error("{0}")]
    Unsupported(Cow<'static, str>),

    /// Operation not allowed in the current state.
    #[error("{0}")]
    NotAllowed(Cow<'static, str>),
}

fn depth_message(max: &u32, path: &[String]) -> String {
    let mut msg = format!(
        "Maximum graph depth {} exceeded; the graph is nested too deep or is cyclic \
         while reference tracking is disabled",
        max
    );
    if !path.is_empty() {
        // segments are pushed innermost first while unwinding
        msg.push_str(" at ");
        if path.len() >= MAX_REPORTED_PATH {
            msg.push_str("... > ");
        }
        for (i, segment) in path.iter().rev().enumerate() {
            if i > 0 {
                msg.push_str(" > ");
            }
            msg.push_str(segment);
        }
    }
    msg
}

macro_rules! raise {
    ($err:expr) => {{
        let err = $err;
        if PANIC_ON_ERROR {
            panic!("SPINDLE_PANIC_ON_ERROR: {}", err);
        }
        err
    }};
}

impl Error {
    /// Creates a new [`Error::BufferUnderflow`].
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn buffer_underflow(cursor: usize, needed: usize, limit: usize) -> Self {
        raise!(Error::BufferUnderflow {
            cursor,
            needed,
            limit
        })
    }

    /// Creates a new [`Error::InvalidData`].
    ///
    /// ```
    /// use spindle_core::error::Error;
    ///
    /// let err = Error::invalid_data(format!("Invalid slot head {}", 42));
    /// ```
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn invalid_data<S: Into<Cow<'static, str>>>(s: S) -> Self {
        raise!(Error::InvalidData(s.into()))
    }

    /// Creates a new [`Error::InvalidRef`].
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn invalid_ref<S: Into<Cow<'static, str>>>(s: S) -> Self {
        raise!(Error::InvalidRef(s.into()))
    }

    /// Creates a new [`Error::IncompatibleSchema`] naming both hashes.
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn incompatible_schema(type_name: &str, remote_hash: u32, local_hash: u32) -> Self {
        raise!(Error::IncompatibleSchema {
            type_name: type_name.to_string(),
            remote_hash,
            local_hash,
        })
    }

    /// Creates a new [`Error::FieldTypeMismatch`].
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn field_type_mismatch(
        type_name: &str,
        field: &str,
        remote: impl fmt::Display,
        local: impl fmt::Display,
    ) -> Self {
        raise!(Error::FieldTypeMismatch {
            type_name: type_name.to_string(),
            field: field.to_string(),
            remote: remote.to_string(),
            local: local.to_string(),
        })
    }

    /// Creates a new [`Error::UnknownType`].
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn unknown_type<S: Into<Cow<'static, str>>>(s: S) -> Self {
        raise!(Error::UnknownType(s.into()))
    }

    /// Creates a new [`Error::Disallowed`].
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn disallowed<S: Into<Cow<'static, str>>>(s: S) -> Self {
        raise!(Error::Disallowed(s.into()))
    }

    /// Creates a new [`Error::DepthExceed`] with an empty path.
    ///
    /// Each enclosing frame appends itself through [`Error::at`] while the
    /// error propagates.
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn depth_exceed(max: u32) -> Self {
        raise!(Error::DepthExceed {
            max,
            path: Vec::new(),
        })
    }

    /// Creates a new [`Error::Construction`] carrying the decoded field values.
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn construction(type_name: &str, reason: impl fmt::Display, fields: String) -> Self {
        raise!(Error::Construction {
            type_name: type_name.to_string(),
            reason: reason.to_string(),
            fields,
        })
    }

    /// Creates a new [`Error::TypeError`].
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn type_error<S: Into<Cow<'static, str>>>(s: S) -> Self {
        raise!(Error::TypeError(s.into()))
    }

    /// Creates a new [`Error::Unsupported`].
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn unsupported<S: Into<Cow<'static, str>>>(s: S) -> Self {
        raise!(Error::Unsupported(s.into()))
    }

    /// Creates a new [`Error::NotAllowed`].
    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn not_allowed<S: Into<Cow<'static, str>>>(s: S) -> Self {
        raise!(Error::NotAllowed(s.into()))
    }

    /// Returns the coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::BufferUnderflow { .. }
            | Error::InvalidData(_)
            | Error::InvalidRef(_)
            | Error::IncompatibleSchema { .. }
            | Error::FieldTypeMismatch { .. } => ErrorCategory::Protocol,
            Error::UnknownType(_) | Error::Disallowed(_) => ErrorCategory::Security,
            Error::DepthExceed { .. } => ErrorCategory::Resource,
            Error::Construction { .. } => ErrorCategory::Construction,
            Error::TypeError(_) | Error::Unsupported(_) | Error::NotAllowed(_) => {
                ErrorCategory::Usage
            }
        }
    }

    /// True for untrusted-input rejections.
    #[inline]
    pub fn is_security(&self) -> bool {
        self.category() == ErrorCategory::Security
    }

    /// Appends an ancestor segment to a depth error; other errors pass through.
    #[cold]
    #[inline(never)]
    pub fn at(mut self, segment: impl FnOnce() -> String) -> Self {
        if let Error::DepthExceed { path, .. } = &mut self {
            if path.len() < MAX_REPORTED_PATH {
                path.push(segment());
            }
        }
        self
    }
}

/// Ensures a condition is true; otherwise returns an [`enum@Error`].
///
/// A bare literal or format string produces [`Error::InvalidData`].
///
/// ```
/// use spindle_core::ensure;
/// use spindle_core::error::Error;
///
/// fn check_len(n: usize) -> Result<(), Error> {
///     ensure!(n < 10, "length {} too large", n);
///     ensure!(n > 0, Error::invalid_data("empty"));
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:literal) => {
        if !$cond {
            return Err($crate::error::Error::invalid_data($msg));
        }
    };
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::invalid_data(format!($fmt, $($arg)*)));
        }
    };
}

/// Returns early with an [`Error::InvalidData`].
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::error::Error::invalid_data($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::invalid_data(format!($fmt, $($arg)*)))
    };
}

/// Returns early with an [`Error::NotAllowed`].
#[macro_export]
macro_rules! not_allowed {
    ($err:expr) => {
        return Err($crate::error::Error::not_allowed($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::not_allowed(format!($fmt, $($arg)*)))
    };
}
