// Copyright the gap-tracker authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The gap maintenance engine (component C4): groups a batch of granule
//! events by collection, then applies each collection's group inside its own
//! advisory-locked transaction against [`gaps_db::Store`]. A group succeeds
//! or fails as a unit; other groups in the same batch are unaffected.

mod batch;
mod error;
mod process;

pub use batch::{group_by_collection, EventGroup};
pub use error::EngineError;
pub use process::{process_batch, BatchOutcome, MessageFailure};
