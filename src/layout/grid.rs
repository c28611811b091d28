//! # Step Grid
//!
//! Pages and multi-step sub-layouts place their steps in a uniform grid.
//! A grid is planned from the step count and the requested [`PageLayout`],
//! then cut into cells:
//! - Track sizes are floored to whole pixels
//! - Cells fill row-major for horizontal grids, column-major for vertical ones
//! - An incomplete last row (or column) is stretched across the full width
//!   (or height) so no empty cells remain
//! - Divider lines run between rows (horizontal) or columns (vertical)

use log::warn;

use crate::model::{GridCount, GridLayout, Offset, Orientation, PageLayout, Rect};

/// A planned grid: how many rows and columns, and the fill order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub rows: u32,
    pub cols: u32,
    pub direction: Orientation,
}

/// Plan a grid for `count` steps inside `area`.
///
/// Flow layouts pick `cols = ceil(sqrt(n))` and `rows = ceil(n / cols)`;
/// a vertical flow swaps the two. Explicit grids fill whichever count is
/// `auto` from the other one.
pub fn plan(count: usize, layout: PageLayout, area: Rect) -> Grid {
    let n = count as u32;
    let natural_cols = (count as f64).sqrt().ceil() as u32;
    let natural_rows = if natural_cols == 0 { 0 } else { n.div_ceil(natural_cols) };

    let (rows, cols, direction) = match layout {
        PageLayout::Flow(Orientation::Horizontal) => {
            (natural_rows, natural_cols, Orientation::Horizontal)
        }
        PageLayout::Flow(Orientation::Vertical) => {
            (natural_cols, natural_rows, Orientation::Vertical)
        }
        PageLayout::Grid(GridLayout { rows, cols, direction }) => {
            let direction = direction.unwrap_or(if area.width > area.height {
                Orientation::Horizontal
            } else {
                Orientation::Vertical
            });
            let (rows, cols) = match (rows, cols) {
                (GridCount::Auto, GridCount::Auto) => (natural_rows, natural_cols),
                (GridCount::Auto, GridCount::Count(c)) => (n.div_ceil(c.max(1)), c),
                (GridCount::Count(r), GridCount::Auto) => (r, n.div_ceil(r.max(1))),
                (GridCount::Count(r), GridCount::Count(c)) => (r, c),
            };
            (rows, cols, direction)
        }
    };

    if (rows == 0 || cols == 0) && count > 0 {
        warn!("grid of {rows}x{cols} cannot hold {count} steps, using one cell per track");
    }
    Grid {
        rows: rows.max(1),
        cols: cols.max(1),
        direction,
    }
}

impl Grid {
    /// Floored row height and column width for `area`.
    pub fn track_size(&self, area: Rect) -> (f64, f64) {
        (
            (area.width / self.cols as f64).floor(),
            (area.height / self.rows as f64).floor(),
        )
    }

    /// The plain cell of the `index`-th step, before any stretching.
    pub fn cell(&self, index: usize, area: Rect) -> Rect {
        let (col_size, row_size) = self.track_size(area);
        let index = index as u32;
        let (row, col) = match self.direction {
            Orientation::Horizontal => (index / self.cols, index % self.cols),
            Orientation::Vertical => (index % self.rows, index / self.rows),
        };
        Rect::new(
            area.x + col_size * col as f64,
            area.y + row_size * row as f64,
            col_size,
            row_size,
        )
    }

    /// Final boxes for `count` steps, with the last row or column stretched
    /// when the grid is not full.
    pub fn cells(&self, count: usize, area: Rect) -> Vec<Rect> {
        let mut cells: Vec<Rect> = (0..count).map(|i| self.cell(i, area)).collect();
        let capacity = (self.rows * self.cols) as usize;
        if count == 0 || count >= capacity {
            return cells;
        }
        let empty = (capacity - count) as u32;
        let (col_size, row_size) = self.track_size(area);
        match self.direction {
            Orientation::Horizontal if empty < self.cols => {
                let in_last_row = self.cols - empty;
                let width = (area.width / in_last_row as f64).floor();
                for i in 0..in_last_row {
                    let index = ((self.rows - 1) * self.cols + i) as usize;
                    if let Some(cell) = cells.get_mut(index) {
                        *cell = Rect::new(
                            area.x + width * i as f64,
                            area.y + (self.rows - 1) as f64 * row_size,
                            width,
                            row_size,
                        );
                    }
                }
            }
            Orientation::Vertical if empty < self.rows => {
                let in_last_col = self.rows - empty;
                let height = (area.height / in_last_col as f64).floor();
                for i in 0..in_last_col {
                    let index = ((self.cols - 1) * self.rows + i) as usize;
                    if let Some(cell) = cells.get_mut(index) {
                        *cell = Rect::new(
                            area.x + (self.cols - 1) as f64 * col_size,
                            area.y + height * i as f64,
                            col_size,
                            height,
                        );
                    }
                }
            }
            _ => {}
        }
        cells
    }

    /// Separator lines: between rows for horizontal grids, between columns
    /// for vertical ones, inset by `margin` at both ends.
    pub fn divider_lines(&self, area: Rect, margin: f64) -> Vec<(Offset, Offset)> {
        let (col_size, row_size) = self.track_size(area);
        match self.direction {
            Orientation::Horizontal => (1..self.rows)
                .map(|i| {
                    let y = area.y + row_size * i as f64;
                    (
                        Offset::new(area.x + margin, y),
                        Offset::new(area.x + area.width - margin, y),
                    )
                })
                .collect(),
            Orientation::Vertical => (1..self.cols)
                .map(|i| {
                    let x = area.x + col_size * i as f64;
                    (
                        Offset::new(x, area.y + margin),
                        Offset::new(x, area.y + area.height - margin),
                    )
                })
                .collect(),
        }
    }

    /// The layout actually used, recorded on the page after layout.
    pub fn actual(&self) -> PageLayout {
        if self.rows > 1 || self.cols > 1 {
            PageLayout::Grid(GridLayout {
                rows: GridCount::Count(self.rows),
                cols: GridCount::Count(self.cols),
                direction: Some(self.direction),
            })
        } else {
            PageLayout::Flow(Orientation::Horizontal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> Rect {
        Rect::new(0.0, 0.0, 900.0, 600.0)
    }

    #[test]
    fn five_steps_flow_horizontally_in_two_rows() {
        let g = plan(5, PageLayout::Flow(Orientation::Horizontal), area());
        assert_eq!((g.rows, g.cols), (2, 3));
        let cells = g.cells(5, area());
        assert_eq!(cells[0], Rect::new(0.0, 0.0, 300.0, 300.0));
        assert_eq!(cells[2], Rect::new(600.0, 0.0, 300.0, 300.0));
        // last row holds two steps, each half the width
        assert_eq!(cells[3], Rect::new(0.0, 300.0, 450.0, 300.0));
        assert_eq!(cells[4], Rect::new(450.0, 300.0, 450.0, 300.0));
    }

    #[test]
    fn vertical_flow_fills_columns_first() {
        let g = plan(6, PageLayout::Flow(Orientation::Vertical), area());
        assert_eq!((g.rows, g.cols), (3, 2));
        let cells = g.cells(6, area());
        assert_eq!(cells[1], Rect::new(0.0, 200.0, 450.0, 200.0));
        assert_eq!(cells[4], Rect::new(450.0, 200.0, 450.0, 200.0));
    }

    #[test]
    fn vertical_last_column_stretches() {
        let g = plan(5, PageLayout::Flow(Orientation::Vertical), area());
        assert_eq!((g.rows, g.cols), (3, 2));
        let cells = g.cells(5, area());
        assert_eq!(cells[3], Rect::new(450.0, 0.0, 450.0, 300.0));
        assert_eq!(cells[4], Rect::new(450.0, 300.0, 450.0, 300.0));
    }

    #[test]
    fn auto_rows_follow_fixed_columns() {
        let layout = PageLayout::Grid(GridLayout {
            rows: GridCount::Auto,
            cols: GridCount::Count(4),
            direction: None,
        });
        let g = plan(7, layout, area());
        assert_eq!((g.rows, g.cols), (2, 4));
        assert_eq!(g.direction, Orientation::Horizontal);
    }

    #[test]
    fn zero_counts_are_clamped() {
        let layout = PageLayout::Grid(GridLayout {
            rows: GridCount::Count(0),
            cols: GridCount::Count(0),
            direction: Some(Orientation::Vertical),
        });
        let g = plan(2, layout, area());
        assert_eq!((g.rows, g.cols), (1, 1));
    }

    #[test]
    fn track_sizes_are_floored() {
        let g = plan(3, PageLayout::Flow(Orientation::Horizontal), Rect::new(0.0, 0.0, 1000.0, 500.0));
        let (col, row) = g.track_size(Rect::new(0.0, 0.0, 1000.0, 500.0));
        assert_eq!((col, row), (500.0, 250.0));
    }

    #[test]
    fn dividers_sit_between_rows() {
        let g = plan(4, PageLayout::Flow(Orientation::Horizontal), area());
        let lines = g.divider_lines(area(), 10.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], (Offset::new(10.0, 300.0), Offset::new(890.0, 300.0)));
    }

    #[test]
    fn single_step_reports_flow_layout() {
        let g = plan(1, PageLayout::Flow(Orientation::Vertical), area());
        assert_eq!(g.actual(), PageLayout::Flow(Orientation::Horizontal));
        assert_eq!(g.cells(1, area())[0], area());
    }
}
