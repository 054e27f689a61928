//! Python rule tables.

use super::LanguageTable;

pub(crate) static TABLE: LanguageTable = LanguageTable {
    security: &[
        (r"eval\(", "Use of eval() is dangerous"),
        (r"exec\(", "Use of exec() is dangerous"),
        (r"os\.system\(", "Use of os.system() is dangerous"),
        (r"subprocess\.call\(", "Use of subprocess.call() is dangerous"),
        (r"pickle\.loads\(", "Use of pickle.loads() is dangerous"),
    ],
    performance: &[
        (
            r"for\s+.*\s+in\s+range\(len\(",
            "Use enumerate() instead of range(len())",
        ),
        (
            r#"\+\s*=\s*['"]\w+['"]"#,
            "Use list comprehension or join() for string concatenation",
        ),
        (
            r"\.append\(.*\)\s*for\s+.*\s+in",
            "Use list comprehension instead of loop with append()",
        ),
    ],
    maintainability: &[
        (r"def\s+\w+\s*\([^)]{120,}\)", "Function signature is too long"),
        (
            r"\bif\b.*\b(?:and|or)\b.*\b(?:and|or)\b",
            "Complex conditional statement",
        ),
        (r"\bglobal\s+\w+", "Use of global variables"),
    ],
    control_structures: &[
        r"\bif\b",
        r"\belif\b",
        r"\bfor\b",
        r"\bwhile\b",
        r"\bexcept\b",
    ],
    imports: &[r"(?m)^\s*(?:from|import)\s+([A-Za-z_]\w*)"],
    test_indicators: &[
        r"(?i)def\s+test_",
        r"(?i)class\s+Test",
        r"(?i)\bpytest\b",
        r"(?i)\bunittest\b",
    ],
};
