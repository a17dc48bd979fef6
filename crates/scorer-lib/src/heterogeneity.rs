//! Hardware heterogeneity weighting

use crate::topology::HardwareClass;

/// Multiplier applied to a node's winning score.
///
/// Unknown hardware classes are neutral (1.0) rather than zero.
pub fn class_factor(class: Option<&HardwareClass>) -> f64 {
    match class {
        Some(class) => class.interconnect[0] * class.interconnect[1] * class.max_frequency_ghz,
        None => 1.0,
    }
}

/// Scale a base score by the node's hardware class
pub fn adjust(base_score: f64, class: Option<&HardwareClass>) -> f64 {
    base_score * class_factor(class)
}
