// Copyright the gap-tracker authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Client for the external granule catalog (CMR). Shared by the registry
//! (collection temporal extent, at registration time) and the backfill
//! producer (paginated granule search, to seed ingest events for a
//! newly-registered collection's full history).

mod client;
mod error;

pub use client::{CatalogClient, CatalogEnv, GranuleSummary};
pub use error::CatalogError;
