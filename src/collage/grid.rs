/// Cell rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Geometry of a fixed `cols` x `rows` grid placed inside a border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
    pub gap: u32,
    pub border: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl GridLayout {
    /// Computes cell sizes for a grid occupying `canvas_size` pixels (excluding
    /// the border). Sizes are floored; the rounding slack is left unused.
    pub fn calculate(canvas_size: u32, cols: u32, rows: u32, gap: u32, border: u32) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let cell_width = canvas_size.saturating_sub(gap.saturating_mul(cols - 1)) / cols;
        let cell_height = canvas_size.saturating_sub(gap.saturating_mul(rows - 1)) / rows;

        GridLayout {
            cols,
            rows,
            gap,
            border,
            cell_width,
            cell_height,
        }
    }

    pub fn cell_count(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    /// Rectangle of cell `index`, where `index = row * cols + col`.
    pub fn cell(&self, index: usize) -> CellRect {
        let index = index as u32;
        let row = index / self.cols;
        let col = index % self.cols;

        CellRect {
            x: self
                .border
                .saturating_add(col.saturating_mul(self.cell_width.saturating_add(self.gap))),
            y: self
                .border
                .saturating_add(row.saturating_mul(self.cell_height.saturating_add(self.gap))),
            width: self.cell_width,
            height: self.cell_height,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (usize, CellRect)> + '_ {
        (0..self.cell_count()).map(move |i| (i, self.cell(i)))
    }
}
