//! Box-drawn two-column table for terminal display.

use prettytable::format::consts::FORMAT_BOX_CHARS;
use prettytable::{Cell, Row, Table};

/// Render a titled `Metric | Value` grid
pub fn render_table(title: &str, headers: (&str, &str), rows: &[(String, String)]) -> String {
    let mut table = Table::new();
    table.set_format(*FORMAT_BOX_CHARS);
    table.set_titles(Row::new(vec![Cell::new(headers.0), Cell::new(headers.1)]));
    for (key, value) in rows {
        table.add_row(Row::new(vec![Cell::new(key), Cell::new(value)]));
    }

    format!("{}\n{}", title, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_equal_width() {
        let rows = vec![
            ("Model Used".to_string(), "buffalo_l".to_string()),
            ("Threshold".to_string(), "60.00%".to_string()),
        ];
        let table = render_table("Results", ("Metric", "Value"), &rows);

        let widths: Vec<usize> = table
            .lines()
            .skip(1)
            .map(|line| line.chars().count())
            .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{}", table);
    }

    #[test]
    fn contains_title_headers_and_cells() {
        let rows = vec![("Similarity Score".to_string(), "85.00%".to_string())];
        let table = render_table("Results", ("Metric", "Value"), &rows);

        assert!(table.starts_with("Results\n"));
        assert!(table.contains("Metric"));
        assert!(table.contains("Similarity Score"));
        assert!(table.contains("85.00%"));
        assert!(table.contains('┌'));
    }

    #[test]
    fn one_line_per_row_plus_borders() {
        let rows = vec![
            ("Verification Status".to_string(), "✅ Verified".to_string()),
            ("Model Used".to_string(), "antelopev2".to_string()),
        ];
        let table = render_table("Results", ("Metric", "Value"), &rows);

        assert!(table.contains("✅ Verified"));
        assert_eq!(table.lines().filter(|l| l.contains("Model Used")).count(), 1);
    }
}
