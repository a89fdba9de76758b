// Copyright the gap-tracker authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! The interval store (component C1): partitioned postgres storage of the
//! `gaps` and `reasons` relations, one partition pair per collection, each
//! carrying a GiST exclusion constraint that makes overlap (invariants G1/R1)
//! a database-enforced property rather than something this crate has to get
//! right on its own.
//!
//! Range algebra -- union, intersection, containment across many rows --
//! stays in SQL. This crate never materializes a collection's full gap set in
//! memory to compute a merge or split; see the design notes in `SPEC_FULL.md`
//! for why.

mod error;
mod pool;
mod schema;
mod store;

pub use error::StoreError;
pub use pool::{build_pool, PoolSettings};
pub use schema::{bootstrap, ensure_partitions, ensure_partitions_standalone};
pub use store::{InputRecord, ReasonRecord, Store};

pub use deadpool_postgres::Pool;
