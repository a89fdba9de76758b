// Copyright the gap-tracker authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Backfill (component C3): seeds ingest events for a collection's entire
//! catalog history into the event queue, so the maintenance engine can carve
//! the collection's initial full-extent gap down to its real coverage.
//!
//! Producers fetch CMR pages into a shared channel, consumers drain it into
//! SQS batches, and a single `tokio::task::JoinSet` holds every producer and
//! consumer task: any task's failure aborts every sibling rather than
//! letting the run limp along on partial data.

mod error;
mod plan;
mod run;

pub use error::BackfillError;
pub use plan::{plan, BackfillPlan};
pub use run::{run_backfill, BackfillStats};
