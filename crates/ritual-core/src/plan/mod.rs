//! Plan shaping: proposal extraction, locale labels, normalization.

pub mod labels;
pub mod normalize;
pub mod proposal;

pub use labels::Locale;
pub use normalize::{
    DEFAULT_STEPS_PER_LEVEL, DEFAULT_TOTAL_STEPS, NormalizationReport, NormalizeOptions,
    Normalized, normalize,
};
pub use proposal::{RawLevel, RawPlan, RawStep, parse_proposal};
