//! Canvas geometry, colors, board snapshots and target images.
//!
//! The shared board is a fixed 1000×600 grid of RGB cells. A snapshot is
//! the raw row-major buffer the server returns, 3 bytes per cell.

use std::sync::Arc;

use crate::error::PaintError;

/// Board width in cells.
pub const BOARD_WIDTH: u16 = 1000;
/// Board height in cells.
pub const BOARD_HEIGHT: u16 = 600;
/// Bytes per board cell.
pub const CELL_BYTES: usize = 3;
/// Size of a full board snapshot in bytes.
pub const BOARD_BYTES: usize = BOARD_WIDTH as usize * BOARD_HEIGHT as usize * CELL_BYTES;

// ── Rgb ──────────────────────────────────────────────────────────

/// One 24-bit color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance between two colors in RGB space.
    pub fn distance(self, other: Rgb) -> f64 {
        let dr = self.r as f64 - other.r as f64;
        let dg = self.g as f64 - other.g as f64;
        let db = self.b as f64 - other.b as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    /// `true` when `other` is within `threshold` of `self` (inclusive).
    pub fn matches(self, other: Rgb, threshold: f64) -> bool {
        self.distance(other) <= threshold
    }
}

// ── BoardSnapshot ────────────────────────────────────────────────

/// The full board as fetched for one correction round.
#[derive(Clone)]
pub struct BoardSnapshot {
    cells: Vec<u8>,
}

impl BoardSnapshot {
    /// Wrap a raw snapshot buffer. Extra trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PaintError> {
        if bytes.len() < BOARD_BYTES {
            return Err(PaintError::BoardSize {
                expected: BOARD_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            cells: bytes[..BOARD_BYTES].to_vec(),
        })
    }

    /// A board painted entirely in one color.
    pub fn filled(color: Rgb) -> Self {
        let mut cells = Vec::with_capacity(BOARD_BYTES);
        for _ in 0..(BOARD_BYTES / CELL_BYTES) {
            cells.extend_from_slice(&[color.r, color.g, color.b]);
        }
        Self { cells }
    }

    /// Color of the cell at board coordinates `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is off the board.
    pub fn get(&self, x: u16, y: u16) -> Rgb {
        let i = Self::offset(x, y);
        Rgb::new(self.cells[i], self.cells[i + 1], self.cells[i + 2])
    }

    /// Overwrite one cell.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is off the board.
    pub fn set(&mut self, x: u16, y: u16, color: Rgb) {
        let i = Self::offset(x, y);
        self.cells[i] = color.r;
        self.cells[i + 1] = color.g;
        self.cells[i + 2] = color.b;
    }

    fn offset(x: u16, y: u16) -> usize {
        assert!(
            x < BOARD_WIDTH && y < BOARD_HEIGHT,
            "cell ({x}, {y}) is off the board"
        );
        (y as usize * BOARD_WIDTH as usize + x as usize) * CELL_BYTES
    }
}

impl std::fmt::Debug for BoardSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSnapshot")
            .field("bytes", &self.cells.len())
            .finish()
    }
}

// ── TargetImage ──────────────────────────────────────────────────

/// The image a run keeps painted. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetImage {
    width: u16,
    height: u16,
    pixels: Vec<Rgb>,
}

impl TargetImage {
    /// Build from a row-major pixel grid.
    pub fn new(width: u16, height: u16, pixels: Vec<Rgb>) -> Result<Self, PaintError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(PaintError::ImageDecode(format!(
                "pixel grid has {} cells, expected {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A single-color image.
    pub fn solid(width: u16, height: u16, color: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Color at local image coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the image.
    pub fn pixel(&self, x: u16, y: u16) -> Rgb {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) is outside {}x{}",
            self.width,
            self.height
        );
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

// ── Placement ────────────────────────────────────────────────────

/// Where a target image sits on the board.
///
/// The rectangle is `[x, x + width - 1] × [y, y + height - 1]`, clipped
/// to the board when iterating cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Placement {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Placement of `image` with its top-left corner at `(x, y)`.
    pub fn of(image: &TargetImage, x: u16, y: u16) -> Self {
        Self::new(x, y, image.width(), image.height())
    }

    /// `true` if board cell `(bx, by)` lies inside the rectangle.
    pub fn contains(&self, bx: u16, by: u16) -> bool {
        let (bx, by) = (bx as u32, by as u32);
        let (x, y) = (self.x as u32, self.y as u32);
        bx >= x && bx < x + self.width as u32 && by >= y && by < y + self.height as u32
    }

    /// Convert board coordinates to local image coordinates.
    ///
    /// Returns `None` outside the rectangle.
    pub fn to_local(&self, bx: u16, by: u16) -> Option<(u16, u16)> {
        self.contains(bx, by).then(|| (bx - self.x, by - self.y))
    }

    /// Convert local image coordinates to board coordinates.
    ///
    /// Returns `None` if the cell falls off the board.
    pub fn to_board(&self, lx: u16, ly: u16) -> Option<(u16, u16)> {
        let bx = self.x as u32 + lx as u32;
        let by = self.y as u32 + ly as u32;
        (bx < BOARD_WIDTH as u32 && by < BOARD_HEIGHT as u32).then(|| (bx as u16, by as u16))
    }

    /// Every local coordinate whose board cell exists, row-major.
    pub fn local_cells(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        (0..self.height).flat_map(move |ly| {
            (0..self.width).filter_map(move |lx| self.to_board(lx, ly).map(|_| (lx, ly)))
        })
    }
}

// ── Defense ──────────────────────────────────────────────────────

/// Real-time guard over one placed target.
///
/// Every broadcast change inside the placement is compared with the
/// target; a mismatch yields the color to paint back.
#[derive(Debug, Clone)]
pub struct Defense {
    target: Arc<TargetImage>,
    placement: Placement,
}

impl Defense {
    pub fn new(target: Arc<TargetImage>, placement: Placement) -> Self {
        Self { target, placement }
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// The corrective color for a change at board `(x, y)`, if one is due.
    pub fn correction(&self, x: u16, y: u16, live: Rgb, threshold: f64) -> Option<Rgb> {
        let (lx, ly) = self.placement.to_local(x, y)?;
        let wanted = self.target.pixel(lx, ly);
        (!wanted.matches(live, threshold)).then_some(wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_identity_and_extremes() {
        let grey = Rgb::new(10, 10, 10);
        assert_eq!(grey.distance(grey), 0.0);

        let d = Rgb::new(0, 0, 0).distance(Rgb::new(255, 255, 255));
        assert!((d - 441.67).abs() < 0.01, "d = {d}");
    }

    #[test]
    fn match_boundary_is_inclusive() {
        let a = Rgb::new(0, 0, 0);
        let b = Rgb::new(3, 4, 0); // distance 5
        assert!(a.matches(b, 5.0));
        assert!(!a.matches(b, 4.99));
    }

    #[test]
    fn snapshot_rejects_short_buffer() {
        let err = BoardSnapshot::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, PaintError::BoardSize { actual: 10, .. }));
    }

    #[test]
    fn snapshot_reads_row_major() {
        let mut bytes = vec![0u8; BOARD_BYTES];
        let i = (2 * BOARD_WIDTH as usize + 5) * CELL_BYTES;
        bytes[i..i + 3].copy_from_slice(&[1, 2, 3]);
        let snap = BoardSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(snap.get(5, 2), Rgb::new(1, 2, 3));
        assert_eq!(snap.get(2, 5), Rgb::default());
    }

    #[test]
    #[should_panic(expected = "off the board")]
    fn snapshot_get_off_board_panics() {
        // Would alias (0, 1) without the bounds check
        BoardSnapshot::filled(Rgb::default()).get(BOARD_WIDTH, 0);
    }

    #[test]
    #[should_panic(expected = "outside 2x2")]
    fn target_pixel_outside_image_panics() {
        TargetImage::solid(2, 2, Rgb::default()).pixel(2, 0);
    }

    #[test]
    fn target_rejects_wrong_grid_size() {
        assert!(TargetImage::new(2, 2, vec![Rgb::default(); 3]).is_err());
        assert!(TargetImage::new(2, 2, vec![Rgb::default(); 4]).is_ok());
    }

    #[test]
    fn placement_contains_and_converts() {
        let p = Placement::new(10, 20, 3, 2);
        assert!(p.contains(10, 20));
        assert!(p.contains(12, 21));
        assert!(!p.contains(13, 21));
        assert!(!p.contains(9, 20));
        assert_eq!(p.to_local(11, 21), Some((1, 1)));
        assert_eq!(p.to_board(2, 1), Some((12, 21)));
    }

    #[test]
    fn placement_clips_to_board() {
        let p = Placement::new(998, 599, 4, 2);
        let cells: Vec<_> = p.local_cells().collect();
        assert_eq!(cells, vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn defense_only_reacts_inside_and_beyond_threshold() {
        let target = Arc::new(TargetImage::solid(2, 2, Rgb::new(255, 255, 255)));
        let defense = Defense::new(target, Placement::new(5, 5, 2, 2));

        assert_eq!(defense.correction(0, 0, Rgb::default(), 5.0), None);
        assert_eq!(
            defense.correction(6, 6, Rgb::default(), 5.0),
            Some(Rgb::new(255, 255, 255))
        );
        assert_eq!(defense.correction(6, 6, Rgb::new(252, 255, 255), 5.0), None);
    }
}
