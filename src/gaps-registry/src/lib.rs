// Copyright the gap-tracker authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Collection registry (component C2): declares a collection for tracking --
//! catalog extent lookup, partition provisioning, initial full-extent gap,
//! tolerance upsert, backfill trigger, and event-bus filter policy update --
//! idempotent at step granularity per §4.2.

mod error;
mod registry;

pub use error::RegistryError;
pub use registry::{RegisterOutcome, RegisterRequest, Registry};
