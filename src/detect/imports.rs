//! Dependency extraction from import statements.
//!
//! Each language contributes regex patterns whose first capture group is the
//! imported module. Results are deduplicated regardless of how often a module
//! is imported.

use regex::Regex;
use std::collections::BTreeSet;

/// Extract the set of imported modules from `code`.
pub fn extract_dependencies(code: &str, patterns: &[Regex]) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    for re in patterns {
        for caps in re.captures_iter(code) {
            if let Some(m) = caps.get(1) {
                let name = m.as_str().trim();
                if !name.is_empty() {
                    deps.insert(name.to_string());
                }
            }
        }
    }
    deps
}
