//! Piece shapes: fixed boolean masks (I, O, T, S, Z) with their fill tags.

/// Opaque colour identifier stored in committed cells. The theme maps it to a colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FillTag(pub u8);

/// Rectangular mask plus fill tag. Rows are top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub name: char,
    pub fill: FillTag,
    mask: &'static [&'static [bool]],
}

const X: bool = true;
const O: bool = false;

/// The five shapes the demo drops, in index order.
pub const SHAPES: [Shape; 5] = [
    Shape::new('I', FillTag(0), &[&[X, X, X, X]]),
    Shape::new('O', FillTag(1), &[&[X, X], &[X, X]]),
    Shape::new('T', FillTag(2), &[&[O, X, O], &[X, X, X]]),
    Shape::new('S', FillTag(3), &[&[X, X, O], &[O, X, X]]),
    Shape::new('Z', FillTag(4), &[&[O, X, X], &[X, X, O]]),
];

impl Shape {
    pub const fn new(name: char, fill: FillTag, mask: &'static [&'static [bool]]) -> Self {
        Self { name, fill, mask }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.mask.len()
    }

    /// Bounding-box width (widest mask row).
    pub fn width(&self) -> usize {
        self.mask.iter().map(|row| row.len()).max().unwrap_or(0)
    }

    /// (row, col) offsets of filled mask cells, row-major.
    pub fn filled(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mask.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, filled)| **filled)
                .map(move |(c, _)| (r, c))
        })
    }
}

/// Index of the shape with this letter (case-insensitive).
pub fn index_of(name: char) -> Option<usize> {
    let name = name.to_ascii_uppercase();
    SHAPES.iter().position(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_boxes() {
        let dims: Vec<(usize, usize)> = SHAPES.iter().map(|s| (s.height(), s.width())).collect();
        assert_eq!(dims, vec![(1, 4), (2, 2), (2, 3), (2, 3), (2, 3)]);
    }

    #[test]
    fn test_every_shape_is_a_tetromino() {
        for shape in &SHAPES {
            assert_eq!(shape.filled().count(), 4, "shape {}", shape.name);
        }
    }

    #[test]
    fn test_t_mask_cells() {
        let cells: Vec<_> = SHAPES[2].filled().collect();
        assert_eq!(cells, vec![(0, 1), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_index_of() {
        assert_eq!(index_of('i'), Some(0));
        assert_eq!(index_of('Z'), Some(4));
        assert_eq!(index_of('L'), None);
    }

    #[test]
    fn test_fill_tags_are_distinct() {
        let tags: std::collections::HashSet<u8> = SHAPES.iter().map(|s| s.fill.0).collect();
        assert_eq!(tags.len(), SHAPES.len());
    }
}
