//! Canonical plan-year schema shared by every pipeline stage

mod record;

pub use record::{
    normalize_employer_id, normalize_plan_number, AssetAllocation, LiabilityAmounts,
    MergeQuality, MortalityBasis, ParticipantCounts, PlanYearRecord, SourcePresence, TrackingId,
    PLAN_NUMBER_WIDTH,
};
