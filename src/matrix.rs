//! Key matrix geometry: coordinates, linear indices and hand classification

use serde::{Deserialize, Serialize};

/// A physical key location in the switch matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

/// Which hand a key belongs to on a split layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
    /// Center column of an odd-width matrix, or outside the matrix
    Unknown,
}

impl Hand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Unknown => "Unknown",
        }
    }
}

/// Estimated finger for a column, counted from the hand's outer edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Finger {
    Pinky = 0,
    Ring = 1,
    Middle = 2,
    Index = 3,
}

/// Number of fingers tracked per hand
pub const FINGERS_PER_HAND: usize = 4;

/// Geometry of a `ROWS` x `COLS` matrix.
///
/// Linear indices are row-major: `index = row * COLS + col`. The mapping is
/// fixed at compile time, which is what keeps persisted per-position counters
/// meaningful between boots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matrix<const ROWS: usize, const COLS: usize>;

impl<const ROWS: usize, const COLS: usize> Matrix<ROWS, COLS> {
    /// Total number of key positions
    pub const POSITIONS: usize = ROWS * COLS;

    /// Whether the coordinate lies inside the matrix
    pub fn contains(row: u8, col: u8) -> bool {
        (row as usize) < ROWS && (col as usize) < COLS
    }

    /// Linear index for a coordinate, `None` outside the matrix
    pub fn to_index(row: u8, col: u8) -> Option<u16> {
        if !Self::contains(row, col) {
            return None;
        }
        u16::try_from(row as usize * COLS + col as usize).ok()
    }

    /// Coordinate for a linear index, `None` past the last position
    pub fn from_index(index: u16) -> Option<Position> {
        let index = index as usize;
        if index >= Self::POSITIONS {
            return None;
        }
        let row = u8::try_from(index / COLS).ok()?;
        let col = u8::try_from(index % COLS).ok()?;
        Some(Position { row, col })
    }

    /// Left half of the columns is the left hand, right half the right hand
    pub fn classify_hand(_row: u8, col: u8) -> Hand {
        let col = col as usize;
        if col >= COLS {
            Hand::Unknown
        } else if col < COLS / 2 {
            Hand::Left
        } else if col >= (COLS + 1) / 2 {
            Hand::Right
        } else {
            Hand::Unknown
        }
    }

    /// Finger estimate from the distance to the hand's outer edge.
    ///
    /// Thumb clusters can't be told apart from the matrix alone, so every key
    /// four or more columns in from the edge counts as the index finger.
    pub fn classify_finger(row: u8, col: u8) -> Option<(Hand, Finger)> {
        let hand = Self::classify_hand(row, col);
        let from_edge = match hand {
            Hand::Left => col as usize,
            Hand::Right => COLS - 1 - col as usize,
            Hand::Unknown => return None,
        };
        let finger = match from_edge {
            0 | 1 => Finger::Pinky,
            2 => Finger::Ring,
            3 => Finger::Middle,
            _ => Finger::Index,
        };
        Some((hand, finger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Split = Matrix<4, 12>;
    type Odd = Matrix<5, 15>;

    #[test]
    fn index_roundtrip_covers_every_position() {
        for row in 0..4u8 {
            for col in 0..12u8 {
                let index = Split::to_index(row, col).unwrap();
                assert_eq!(Split::from_index(index), Some(Position::new(row, col)));
            }
        }
    }

    #[test]
    fn index_is_row_major() {
        assert_eq!(Split::to_index(0, 0), Some(0));
        assert_eq!(Split::to_index(1, 0), Some(12));
        assert_eq!(Split::to_index(3, 11), Some(47));
    }

    #[test]
    fn out_of_range_coordinates_rejected() {
        assert_eq!(Split::to_index(4, 0), None);
        assert_eq!(Split::to_index(0, 12), None);
        assert_eq!(Split::from_index(48), None);
    }

    #[test]
    fn even_width_splits_in_half() {
        assert_eq!(Split::classify_hand(0, 0), Hand::Left);
        assert_eq!(Split::classify_hand(0, 5), Hand::Left);
        assert_eq!(Split::classify_hand(0, 6), Hand::Right);
        assert_eq!(Split::classify_hand(3, 11), Hand::Right);
    }

    #[test]
    fn odd_width_center_column_unknown() {
        assert_eq!(Odd::classify_hand(0, 6), Hand::Left);
        assert_eq!(Odd::classify_hand(0, 7), Hand::Unknown);
        assert_eq!(Odd::classify_hand(0, 8), Hand::Right);
    }

    #[test]
    fn column_outside_matrix_is_unknown() {
        assert_eq!(Split::classify_hand(0, 200), Hand::Unknown);
    }

    #[test]
    fn fingers_counted_from_outer_edge() {
        assert_eq!(Split::classify_finger(0, 0), Some((Hand::Left, Finger::Pinky)));
        assert_eq!(Split::classify_finger(0, 2), Some((Hand::Left, Finger::Ring)));
        assert_eq!(Split::classify_finger(0, 5), Some((Hand::Left, Finger::Index)));
        assert_eq!(Split::classify_finger(0, 11), Some((Hand::Right, Finger::Pinky)));
        assert_eq!(Split::classify_finger(0, 8), Some((Hand::Right, Finger::Middle)));
        assert_eq!(Odd::classify_finger(0, 7), None);
    }
}
