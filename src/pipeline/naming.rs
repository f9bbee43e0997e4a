//! Sheet naming.
//!
//! Names are derived from file, page and block positions, then sanitised
//! for the spreadsheet format: at most 31 characters, none of `[ ] : * ? / \`,
//! no leading or trailing apostrophe. Spreadsheet applications compare sheet
//! names case-insensitively, so uniqueness is enforced the same way.

use std::collections::HashSet;

/// Longest sheet name the xlsx format accepts.
pub const MAX_SHEET_NAME: usize = 31;

/// Name of the placeholder sheet of an otherwise empty workbook.
pub const EMPTY_SHEET: &str = "EMPTY";

const FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// `File_<n>` for the n-th file of a standard job (1-based).
pub fn standard_name(file_num: usize) -> String {
    format!("File_{file_num}")
}

/// `F<f>_P<p>_T<k>` for the k-th table on page p of file f (all 1-based).
pub fn table_name(file_num: usize, page_num: usize, table_num: usize) -> String {
    format!("F{file_num}_P{page_num}_T{table_num}")
}

/// `F<f>_P<p>_TEXT` for the aggregated free text of a page.
pub fn text_name(file_num: usize, page_num: usize) -> String {
    format!("F{file_num}_P{page_num}_TEXT")
}

/// Make `raw` acceptable as a sheet name.
pub fn sanitize(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let trimmed = cleaned.trim_matches('\'');
    if trimmed.is_empty() {
        return "Sheet".to_string();
    }
    trimmed.chars().take(MAX_SHEET_NAME).collect()
}

/// Hands out sanitised names that are unique within one workbook.
#[derive(Debug, Default)]
pub struct SheetNamer {
    taken: HashSet<String>,
}

impl SheetNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitise `raw` and, if the result is already taken, append `~2`,
    /// `~3`, … shortening the stem to stay within 31 characters.
    pub fn claim(&mut self, raw: &str) -> String {
        let base = sanitize(raw);
        if self.taken.insert(base.to_lowercase()) {
            return base;
        }

        let mut k = 2;
        loop {
            let suffix = format!("~{k}");
            let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
            let stem: String = base.chars().take(keep).collect();
            let candidate = format!("{stem}{suffix}");
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            k += 1;
        }
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(&name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_names() {
        assert_eq!(standard_name(3), "File_3");
        assert_eq!(table_name(1, 2, 3), "F1_P2_T3");
        assert_eq!(text_name(10, 4), "F10_P4_TEXT");
    }

    #[test]
    fn forbidden_characters_are_removed() {
        assert_eq!(sanitize("Q1/Q2: [draft]?*\\"), "Q1Q2 draft");
    }

    #[test]
    fn apostrophes_trimmed_at_edges_only() {
        assert_eq!(sanitize("'O'Brien'"), "O'Brien");
    }

    #[test]
    fn empty_after_cleaning_becomes_sheet() {
        assert_eq!(sanitize("[]"), "Sheet");
        assert_eq!(sanitize("''"), "Sheet");
    }

    #[test]
    fn long_names_are_truncated() {
        let name = sanitize(&"x".repeat(40));
        assert_eq!(name.chars().count(), MAX_SHEET_NAME);
    }

    #[test]
    fn collisions_get_suffix_case_insensitively() {
        let mut namer = SheetNamer::new();
        assert_eq!(namer.claim("Data"), "Data");
        assert_eq!(namer.claim("DATA"), "DATA~2");
        assert_eq!(namer.claim("data"), "data~3");
        assert!(namer.is_taken("dAtA~2"));
    }

    #[test]
    fn suffix_keeps_long_names_within_limit() {
        let mut namer = SheetNamer::new();
        let long = "y".repeat(31);
        assert_eq!(namer.claim(&long), long);
        let second = namer.claim(&long);
        assert_eq!(second.chars().count(), MAX_SHEET_NAME);
        assert!(second.ends_with("~2"));
    }
}
