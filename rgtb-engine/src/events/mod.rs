// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Events used to synchronise tasks.
//!
//! A [`Once`](once::Once) event fires a single time and every listener, even
//! those that start listening after it has fired, sees the result. A
//! [`Repeated`](repeated::Repeated) event can be fired many times and wakes the
//! listeners that were waiting when it fires.

pub mod once;
pub mod repeated;
