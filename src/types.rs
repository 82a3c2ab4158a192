use serde::{Deserialize, Serialize};

/// A 2D point in image coordinates, stored as (row, col).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub row: f64,
    pub col: f64,
}

impl Point {
    pub const fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    pub const fn zero() -> Self {
        Self { row: 0.0, col: 0.0 }
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            row: self.row + rhs.row,
            col: self.col + rhs.col,
        }
    }
}

impl std::ops::AddAssign for Point {
    fn add_assign(&mut self, rhs: Self) {
        self.row += rhs.row;
        self.col += rhs.col;
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            row: self.row * rhs,
            col: self.col * rhs,
        }
    }
}

/// A single detection: a circular region plus the cascade's confidence.
///
/// `scale` is the diameter of the square window the cascade was evaluated on.
/// For raw scanner output `quality` is the margin above the final stage
/// threshold; for clusters it is the sum of the member qualities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub row: f64,
    pub col: f64,
    pub scale: f64,
    pub quality: f64,
}

impl Detection {
    pub const fn new(row: f64, col: f64, scale: f64, quality: f64) -> Self {
        Self {
            row,
            col,
            scale,
            quality,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.row, self.col)
    }

    pub fn radius(&self) -> f64 {
        self.scale / 2.0
    }
}
