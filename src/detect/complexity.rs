//! Whole-file cyclomatic complexity approximation.
//!
//! Complexity is calculated as:
//! - Start at 1
//! - Add 1 for each match of a control-structure pattern (if, for, while,
//!   switch, catch and their per-language equivalents)
//!
//! Matches are counted over the entire text, not per function, so nested
//! structures in different functions all add to the same total.

use regex::Regex;

/// Baseline complexity of any code sample.
pub const BASELINE_COMPLEXITY: usize = 1;

/// Count control structures in `code` using the given patterns.
pub fn cyclomatic_complexity(code: &str, control_structures: &[Regex]) -> usize {
    let branches: usize = control_structures
        .iter()
        .map(|re| re.find_iter(code).count())
        .sum();
    BASELINE_COMPLEXITY + branches
}
