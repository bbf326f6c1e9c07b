//! Part records and partition planning.
//!
//! A download is cut into at most 64 parts. Parts are finer than workers:
//! workers pull parts from a shared table, so a slow connection only ever
//! holds back one small slice of the file.

mod part;
mod plan;

pub use part::{PartRecord, PartStatus};
pub use plan::{part_end, plan_fresh, plan_resume, PartPlan, MIN_PART_SIZE};
