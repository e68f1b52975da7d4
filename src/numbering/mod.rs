pub mod generator;
pub mod pattern;

pub use generator::{NumberScope, NumberingError, NumberingService, SequenceReset};
pub use pattern::{
    default_pattern, default_patterns, format_pattern, validate_pattern, PatternValidation,
    TokenContext, GENERIC_DEFAULT_PATTERN,
};
