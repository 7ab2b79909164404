// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Small helpers shared by the service modules.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a std mutex, recovering the guard if a callback panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns the media type portion of a `Content-Type` value for logging.
pub(crate) fn media_type(content_type: Option<&str>) -> &str {
    content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .unwrap_or("<missing>")
}
