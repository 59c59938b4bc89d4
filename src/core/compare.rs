//! Output equality used by the judge.
//!
//! Forgiving of line endings, trailing whitespace and repeated blanks, strict
//! about everything else: leading whitespace and single interior spaces are
//! significant.

pub fn normalize(output: &str) -> String {
    let without_cr: String = output.chars().filter(|&c| c != '\r').collect();
    let trimmed = without_cr.trim_end();

    let mut normalized = String::with_capacity(trimmed.len());
    let mut in_blank_run = false;
    for c in trimmed.chars() {
        if c == ' ' || c == '\t' {
            if !in_blank_run {
                normalized.push(' ');
            }
            in_blank_run = true;
        } else {
            normalized.push(c);
            in_blank_run = false;
        }
    }

    normalized
}

pub fn same_output(actual: &str, expected: &str) -> bool {
    normalize(actual) == normalize(expected)
}
