//! Pointer abstraction shared by every gesture surface
//!
//! A surface receives `start`, `move` and `end` events in surface-local
//! pixel coordinates and may produce an output when the stroke ends. The
//! slide track, the swipe-up area and the pattern pad all implement
//! [`PointerSurface`], so mouse and touch input are wired once.

/// A position in surface-local pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One pointer event (mouse or touch, already normalized)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Start(Point),
    Move(Point),
    End(Point),
}

/// Something that reacts to a pointer stroke
pub trait PointerSurface {
    /// What a completed stroke produces
    type Output;

    fn on_start(&mut self, at: Point);

    fn on_move(&mut self, at: Point);

    /// Finish the stroke; `Some` when the stroke accomplished something
    fn on_end(&mut self, at: Point) -> Option<Self::Output>;
}

/// Route one event to a surface
pub fn dispatch<S: PointerSurface + ?Sized>(surface: &mut S, event: PointerEvent) -> Option<S::Output> {
    match event {
        PointerEvent::Start(at) => {
            surface.on_start(at);
            None
        }
        PointerEvent::Move(at) => {
            surface.on_move(at);
            None
        }
        PointerEvent::End(at) => surface.on_end(at),
    }
}

/// Horizontal slide-to-unlock track
///
/// Completes when the handle was dragged past `threshold` (a fraction of the
/// track width). The handle snaps back after every stroke.
#[derive(Debug, Clone)]
pub struct SlideTrack {
    track_width: f32,
    threshold: f32,
    start: Option<Point>,
    progress: f32,
}

impl SlideTrack {
    pub fn new(track_width: f32, threshold: f32) -> Self {
        Self {
            track_width: track_width.max(1.0),
            threshold: threshold.clamp(0.0, 1.0),
            start: None,
            progress: 0.0,
        }
    }

    /// Handle position as a fraction of the track, 0.0..=1.0
    pub fn progress(&self) -> f32 {
        self.progress
    }

    fn track(&mut self, at: Point) {
        if let Some(start) = self.start {
            self.progress = ((at.x - start.x) / self.track_width).clamp(0.0, 1.0);
        }
    }
}

impl PointerSurface for SlideTrack {
    type Output = ();

    fn on_start(&mut self, at: Point) {
        self.start = Some(at);
        self.progress = 0.0;
    }

    fn on_move(&mut self, at: Point) {
        self.track(at);
    }

    fn on_end(&mut self, at: Point) -> Option<()> {
        self.start?;
        self.track(at);
        let complete = self.progress >= self.threshold;
        self.start = None;
        self.progress = 0.0;
        complete.then_some(())
    }
}

/// Vertical swipe-up area
///
/// Completes when the pointer travelled at least `min_distance` pixels upwards.
#[derive(Debug, Clone)]
pub struct SwipeUp {
    min_distance: f32,
    start: Option<Point>,
    distance: f32,
}

impl SwipeUp {
    pub fn new(min_distance: f32) -> Self {
        Self { min_distance, start: None, distance: 0.0 }
    }

    /// Upward travel of the current stroke in pixels (never negative)
    pub fn distance(&self) -> f32 {
        self.distance
    }

    fn track(&mut self, at: Point) {
        if let Some(start) = self.start {
            self.distance = (start.y - at.y).max(0.0);
        }
    }
}

impl PointerSurface for SwipeUp {
    type Output = ();

    fn on_start(&mut self, at: Point) {
        self.start = Some(at);
        self.distance = 0.0;
    }

    fn on_move(&mut self, at: Point) {
        self.track(at);
    }

    fn on_end(&mut self, at: Point) -> Option<()> {
        self.start?;
        self.track(at);
        let complete = self.distance >= self.min_distance;
        self.start = None;
        self.distance = 0.0;
        complete.then_some(())
    }
}
