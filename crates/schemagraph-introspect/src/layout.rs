//! Deterministic grid placement for introspected nodes.

use schemagraph_core::Position;

/// Row-major grid: nodes are placed left to right, wrapping to a new row
/// once the cursor passes `max_x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub origin_x: f64,
    pub origin_y: f64,
    pub step_x: f64,
    pub step_y: f64,
    pub max_x: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        GridLayout {
            origin_x: 50.0,
            origin_y: 50.0,
            step_x: 300.0,
            step_y: 250.0,
            max_x: 1000.0,
        }
    }
}

impl GridLayout {
    pub fn cursor(&self) -> GridCursor {
        GridCursor {
            layout: *self,
            x: self.origin_x,
            y: self.origin_y,
        }
    }
}

/// Hands out successive grid positions.
#[derive(Debug, Clone)]
pub struct GridCursor {
    layout: GridLayout,
    x: f64,
    y: f64,
}

impl GridCursor {
    /// Returns the current position and advances the cursor.
    pub fn next_position(&mut self) -> Position {
        let position = Position::new(self.x, self.y);
        self.x += self.layout.step_x;
        if self.x > self.layout.max_x {
            self.x = self.layout.origin_x;
            self.y += self.layout.step_y;
        }
        position
    }
}

impl Iterator for GridCursor {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        Some(self.next_position())
    }
}
