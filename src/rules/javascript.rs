//! JavaScript rule tables, also used for TypeScript.

use super::LanguageTable;

pub(crate) static TABLE: LanguageTable = LanguageTable {
    security: &[
        (r"\beval\(", "Use of eval() is dangerous"),
        (r"new\s+Function\(", "Use of Function constructor is dangerous"),
        (r"innerHTML\s*=", "Use of innerHTML is dangerous"),
        (r"document\.write\(", "Use of document.write() is dangerous"),
    ],
    performance: &[
        (r"for\s*\(\s*var\s+i", "Use let instead of var in for loops"),
        (
            r"\.forEach\(\s*function\s*\(",
            "Use arrow function in forEach",
        ),
        (
            r"document\.getElementsBy",
            "Use querySelector for better performance",
        ),
    ],
    maintainability: &[
        (r"function\s*\w*\s*\([^)]{120,}\)", "Function signature is too long"),
        (r"\bif\b.*&&.*&&", "Complex conditional statement"),
        (
            r"var\s+\w+\s*=\s*function",
            "Use const/let and arrow functions",
        ),
    ],
    control_structures: &[
        r"\bif\s*\(",
        r"\bfor\s*\(",
        r"\bwhile\s*\(",
        r"\bswitch\s*\(",
        r"\bcatch\s*\(",
    ],
    imports: &[
        r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
        r#"\bimport\s+(?:[\w*{}\s,$]+\s+from\s+)?['"]([^'"]+)['"]"#,
        r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
    ],
    test_indicators: &[
        r"(?i)\btest\(",
        r"(?i)\bdescribe\(",
        r"(?i)\bit\(",
        r"(?i)\bjest\b",
    ],
};
