// Copyright the gap-tracker authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Entry points wiring the core gap-tracker crates to their edges: an HTTP
//! API (C7), an event-queue consumer (C8), and a backfill-registration
//! trigger, all sharing the same process bootstrap (C9).

pub mod bootstrap;
pub mod config;
pub mod envelope;
pub mod error;
pub mod event_adapter;
pub mod handlers;

pub use bootstrap::{bootstrap, AppState};
pub use config::Config;
pub use error::ApiError;
