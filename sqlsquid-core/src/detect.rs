// Signature-based SQL error detection for probe responses

use crate::model::NONE_MARKER;

/// Any of these in the lower-cased body marks the response as vulnerable.
pub const DETECTION_SIGNATURES: [&str; 13] = [
    "you have an error in your sql syntax;",
    "warning: mysql",
    "unclosed quotation mark after the character string",
    "quoted string not properly terminated",
    "syntax error",
    "mysql_fetch_array()",
    "mysql_num_rows()",
    "mysql_fetch_assoc()",
    "mysql_query()",
    "pg_query()",
    "pg_fetch_array()",
    "syntax error in query",
    "sqlstate",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub error_category: &'static str,
    pub sqli_type: &'static str,
    pub db_guess: &'static str,
}

impl Classification {
    const fn new(error_category: &'static str, sqli_type: &'static str, db_guess: &'static str) -> Self {
        Self {
            error_category,
            sqli_type,
            db_guess,
        }
    }

    const fn none() -> Self {
        Self::new(NONE_MARKER, NONE_MARKER, NONE_MARKER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub is_vulnerable: bool,
    pub classification: Classification,
}

impl Detection {
    pub fn error_category(&self) -> &'static str {
        self.classification.error_category
    }

    pub fn sqli_type(&self) -> &'static str {
        self.classification.sqli_type
    }

    pub fn db_guess(&self) -> &'static str {
        self.classification.db_guess
    }
}

pub fn is_sql_injection(response_body: &str) -> bool {
    let lower = response_body.to_lowercase();
    DETECTION_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

/// First matching rule wins. Independent of `is_sql_injection`: the two
/// passes use overlapping but different signature lists.
pub fn classify(response_body: &str) -> Classification {
    let lower = response_body.to_lowercase();

    if lower.contains("mysql") {
        Classification::new("MySQL Error", "Boolean-based", "MySQL")
    } else if lower.contains("syntax error") || lower.contains("sql syntax") {
        Classification::new("Syntax Error", "Error-based", NONE_MARKER)
    } else if lower.contains("unclosed quotation") {
        Classification::new("Unclosed Quotation", "Error-based", NONE_MARKER)
    } else if lower.contains("pg_query") {
        Classification::new("PostgreSQL Error", "Boolean-based", "PostgreSQL")
    } else {
        Classification::new("Unknown", NONE_MARKER, NONE_MARKER)
    }
}

/// Non-vulnerable responses carry `-` in every classification column.
pub fn detect(response_body: &str) -> Detection {
    if is_sql_injection(response_body) {
        Detection {
            is_vulnerable: true,
            classification: classify(response_body),
        }
    } else {
        Detection {
            is_vulnerable: false,
            classification: Classification::none(),
        }
    }
}
