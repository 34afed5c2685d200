//! Row-major grid of raw cell text, the only shape the detector and the
//! projection ever see.

/// Rows may have different lengths; any read past the end of a row yields `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        )
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Length of the longest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(|cell| cell.trim().is_empty()))
    }

    /// Copy of the top-left `max_rows` × `max_columns` corner.
    pub fn window(&self, max_rows: usize, max_columns: usize) -> Grid {
        let rows = self
            .rows
            .iter()
            .take(max_rows)
            .map(|row| row.iter().take(max_columns).cloned().collect())
            .collect();
        Grid { rows }
    }
}

impl From<Vec<Vec<String>>> for Grid {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Grid::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_past_row_end_as_empty() {
        let grid = Grid::from_strs(&[&["a", "b", "c"], &["d"]]);
        assert_eq!(grid.cell(1, 0), "d");
        assert_eq!(grid.cell(1, 2), "");
        assert_eq!(grid.cell(9, 0), "");
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
    }

    #[test]
    fn window_bounds_rows_and_columns() {
        let grid = Grid::from_strs(&[&["a", "b", "c"], &["d", "e"], &["f"]]);
        let window = grid.window(2, 2);
        assert_eq!(window.height(), 2);
        assert_eq!(window.width(), 2);
        assert_eq!(window.cell(0, 2), "");
        assert_eq!(window.cell(1, 1), "e");
    }

    #[test]
    fn blank_cells_make_an_empty_grid() {
        assert!(Grid::default().is_empty());
        assert!(Grid::from_strs(&[&["", " "], &[]]).is_empty());
        assert!(!Grid::from_strs(&[&["", "x"]]).is_empty());
    }
}
