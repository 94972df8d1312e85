//! Gesture-pattern pad and the two-draw setup flow
//!
//! The pad is a 3x3 grid; cells are numbered row-major 0..=8. A pattern is
//! the ordered list of cells visited in one stroke, each at most once.

use super::pointer::{Point, PointerSurface};

/// Number of cells in the grid
pub const GRID_CELLS: u8 = 9;

/// Shortest pattern accepted for unlock or setup
pub const MIN_PATTERN_POINTS: usize = 4;

/// At least [`MIN_PATTERN_POINTS`] distinct cells, all on the grid
pub fn is_valid_pattern(pattern: &[u8]) -> bool {
    if pattern.len() < MIN_PATTERN_POINTS || pattern.len() > GRID_CELLS as usize {
        return false;
    }
    let mut seen = [false; GRID_CELLS as usize];
    for &cell in pattern {
        if cell >= GRID_CELLS || seen[cell as usize] {
            return false;
        }
        seen[cell as usize] = true;
    }
    true
}

/// Comma-separated storage form, e.g. `"0,1,2,5"`
pub fn encode_pattern(pattern: &[u8]) -> String {
    pattern
        .iter()
        .map(|cell| cell.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse the storage form; `None` for anything that is not a valid pattern
pub fn decode_pattern(s: &str) -> Option<Vec<u8>> {
    let pattern = s
        .split(',')
        .map(|part| part.trim().parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>()?;
    is_valid_pattern(&pattern).then_some(pattern)
}

/// The 3x3 drawing surface
#[derive(Debug, Clone)]
pub struct PatternPad {
    spacing: f32,
    hit_radius: f32,
    selected: Vec<u8>,
    drawing: bool,
}

impl PatternPad {
    /// `spacing` is the distance between neighbouring cell centres; the pad is
    /// `3 * spacing` pixels square. A cell is hit when the pointer comes
    /// within `hit_radius` of its centre.
    pub fn new(spacing: f32, hit_radius: f32) -> Self {
        Self {
            spacing,
            hit_radius,
            selected: Vec::new(),
            drawing: false,
        }
    }

    /// Centre of `cell` in pad coordinates
    pub fn center(&self, cell: u8) -> Point {
        let col = (cell % 3) as f32;
        let row = (cell / 3) as f32;
        Point::new(
            self.spacing / 2.0 + col * self.spacing,
            self.spacing / 2.0 + row * self.spacing,
        )
    }

    /// Cells selected so far in the current stroke
    pub fn selected(&self) -> &[u8] {
        &self.selected
    }

    /// Nearest unselected cell within the hit radius
    pub fn hit_test(&self, at: Point) -> Option<u8> {
        (0..GRID_CELLS)
            .filter(|cell| !self.selected.contains(cell))
            .map(|cell| (cell, self.center(cell).distance(at)))
            .filter(|(_, distance)| *distance <= self.hit_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(cell, _)| cell)
    }

    fn visit(&mut self, at: Point) {
        if let Some(cell) = self.hit_test(at) {
            self.selected.push(cell);
        }
    }
}

impl PointerSurface for PatternPad {
    type Output = Vec<u8>;

    fn on_start(&mut self, at: Point) {
        self.selected.clear();
        self.drawing = true;
        self.visit(at);
    }

    fn on_move(&mut self, at: Point) {
        if self.drawing {
            self.visit(at);
        }
    }

    fn on_end(&mut self, at: Point) -> Option<Vec<u8>> {
        if !self.drawing {
            return None;
        }
        self.visit(at);
        self.drawing = false;
        let pattern = std::mem::take(&mut self.selected);
        (!pattern.is_empty()).then_some(pattern)
    }
}

/// Which draw the setup flow expects next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    First,
    Confirm,
}

/// Result of one draw during setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// Fewer than [`MIN_PATTERN_POINTS`] cells; the step does not change
    TooShort,
    /// First draw accepted, draw again to confirm
    ConfirmNeeded,
    /// Both draws agree; the pattern may be saved
    Matched(Vec<u8>),
    /// Second draw differs; back to the first draw
    Mismatch,
}

/// Draw-twice-to-confirm flow for choosing a new pattern
#[derive(Debug, Clone, Default)]
pub struct PatternSetup {
    first: Option<Vec<u8>>,
    confirmed: Option<Vec<u8>>,
}

impl PatternSetup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> SetupStep {
        if self.first.is_some() {
            SetupStep::Confirm
        } else {
            SetupStep::First
        }
    }

    pub fn submit(&mut self, pattern: Vec<u8>) -> SetupOutcome {
        if !is_valid_pattern(&pattern) {
            return SetupOutcome::TooShort;
        }

        match self.first.take() {
            None => {
                self.confirmed = None;
                self.first = Some(pattern);
                SetupOutcome::ConfirmNeeded
            }
            Some(first) if first == pattern => {
                self.confirmed = Some(pattern.clone());
                SetupOutcome::Matched(pattern)
            }
            Some(_) => {
                tracing::debug!("Pattern confirmation mismatch, restarting setup");
                self.confirmed = None;
                SetupOutcome::Mismatch
            }
        }
    }

    /// Whether a confirmed pattern is ready to save
    pub fn can_save(&self) -> bool {
        self.confirmed.is_some()
    }

    pub fn confirmed(&self) -> Option<&[u8]> {
        self.confirmed.as_deref()
    }

    pub fn reset(&mut self) {
        self.first = None;
        self.confirmed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::pointer::{PointerEvent, dispatch};

    fn draw(pad: &mut PatternPad, cells: &[u8]) -> Option<Vec<u8>> {
        let points: Vec<Point> = cells.iter().map(|&c| pad.center(c)).collect();
        let (last, rest) = points.split_last()?;
        let (first, middle) = rest.split_first()?;
        dispatch(pad, PointerEvent::Start(*first));
        for p in middle {
            dispatch(pad, PointerEvent::Move(*p));
        }
        dispatch(pad, PointerEvent::End(*last))
    }

    #[test]
    fn test_valid_pattern() {
        assert!(is_valid_pattern(&[0, 1, 2, 3]));
        assert!(!is_valid_pattern(&[0, 1, 2]));
        assert!(!is_valid_pattern(&[0, 1, 1, 2]));
        assert!(!is_valid_pattern(&[0, 1, 2, 9]));
    }

    #[test]
    fn test_pattern_storage_form() {
        assert_eq!(encode_pattern(&[0, 4, 8, 5]), "0,4,8,5");
        assert_eq!(decode_pattern("0,4,8,5"), Some(vec![0, 4, 8, 5]));
        assert_eq!(decode_pattern("0,4"), None);
        assert_eq!(decode_pattern("a,b,c,d"), None);
    }

    #[test]
    fn test_pad_records_stroke() {
        let mut pad = PatternPad::new(80.0, 30.0);
        assert_eq!(draw(&mut pad, &[0, 1, 2, 5, 8]), Some(vec![0, 1, 2, 5, 8]));
        assert!(pad.selected().is_empty());
    }

    #[test]
    fn test_pad_ignores_revisits_and_misses() {
        let mut pad = PatternPad::new(80.0, 30.0);
        let (c0, c4, c8) = (pad.center(0), pad.center(4), pad.center(8));
        dispatch(&mut pad, PointerEvent::Start(c4));
        dispatch(&mut pad, PointerEvent::Move(Point::new(80.0, 80.0))); // between cells
        dispatch(&mut pad, PointerEvent::Move(c0));
        dispatch(&mut pad, PointerEvent::Move(c4));
        let out = dispatch(&mut pad, PointerEvent::End(c8));
        assert_eq!(out, Some(vec![4, 0, 8]));
    }

    #[test]
    fn test_hit_test_nearest_within_radius() {
        let pad = PatternPad::new(80.0, 30.0);
        assert_eq!(pad.hit_test(Point::new(45.0, 38.0)), Some(0));
        assert_eq!(pad.hit_test(Point::new(115.0, 200.0)), Some(7));
        assert_eq!(pad.hit_test(Point::new(80.0, 80.0)), None);
    }

    #[test]
    fn test_setup_matching_draws_allow_save() {
        let mut setup = PatternSetup::new();
        assert_eq!(setup.submit(vec![0, 1, 2, 3]), SetupOutcome::ConfirmNeeded);
        assert_eq!(setup.step(), SetupStep::Confirm);
        assert_eq!(setup.submit(vec![0, 1, 2, 3]), SetupOutcome::Matched(vec![0, 1, 2, 3]));
        assert!(setup.can_save());
        assert_eq!(setup.confirmed(), Some(&[0, 1, 2, 3][..]));
    }

    #[test]
    fn test_setup_mismatch_resets() {
        let mut setup = PatternSetup::new();
        setup.submit(vec![0, 1, 2, 3]);
        assert_eq!(setup.submit(vec![0, 1, 2, 4]), SetupOutcome::Mismatch);
        assert_eq!(setup.step(), SetupStep::First);
        assert!(!setup.can_save());
    }

    #[test]
    fn test_setup_short_draw_keeps_step() {
        let mut setup = PatternSetup::new();
        assert_eq!(setup.submit(vec![0, 1]), SetupOutcome::TooShort);
        assert_eq!(setup.step(), SetupStep::First);

        setup.submit(vec![0, 1, 2, 3]);
        assert_eq!(setup.submit(vec![0, 1, 2]), SetupOutcome::TooShort);
        assert_eq!(setup.step(), SetupStep::Confirm);
    }
}
