//! Pan and pinch-zoom state for the page list.
//!
//! The host forwards raw touch events and recognized pinch updates; the
//! controller accumulates a pan offset and a zoom scale and hands back the
//! [`Transform`] to apply when drawing the list.

/// Identifier of a touch pointer, stable for the duration of a touch
pub type PointerId = u32;

/// Zoom state of the view
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomState {
    /// Scale is at its minimum; the content is pinned to the origin
    Idle,
    /// Zoomed in past the minimum scale
    Transformed { scale: f32 },
}

/// A single touch pointer position in view coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub id: PointerId,
    pub x: f32,
    pub y: f32,
}

impl Pointer {
    pub fn new(id: PointerId, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    /// First pointer went down
    Down,
    /// An additional pointer went down
    PointerDown(PointerId),
    Move,
    /// A pointer other than the last one went up
    PointerUp(PointerId),
    /// Last pointer went up
    Up,
    Cancel,
}

/// A touch event with the positions of every pointer currently down
#[derive(Debug, Clone, PartialEq)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub pointers: Vec<Pointer>,
}

impl TouchEvent {
    pub fn new(action: TouchAction, pointers: Vec<Pointer>) -> Self {
        Self { action, pointers }
    }

    /// Single-finger event using pointer id 0
    pub fn single(action: TouchAction, x: f32, y: f32) -> Self {
        Self::new(action, vec![Pointer::new(0, x, y)])
    }

    fn pointer(&self, id: PointerId) -> Option<&Pointer> {
        self.pointers.iter().find(|p| p.id == id)
    }
}

/// Affine transform to apply at draw time: translate, then scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translate_x: 0.0,
        translate_y: 0.0,
        scale: 1.0,
    };

    /// Map a content point to view coordinates
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.translate_x + x * self.scale,
            self.translate_y + y * self.scale,
        )
    }
}

/// Gesture-driven pan/zoom controller
///
/// # Example
///
/// ```
/// use pdf_viewer_core::TransformController;
///
/// let mut transform = TransformController::default();
/// transform.set_view_size(100.0, 200.0);
/// transform.on_scale(1.5, 50.0, 50.0);
///
/// assert_eq!(transform.offset(), (-25.0, -25.0));
/// assert_eq!(transform.bounds(), (-50.0, -100.0));
/// ```
#[derive(Debug, Clone)]
pub struct TransformController {
    state: ZoomState,
    min_scale: f32,
    max_scale: f32,
    view_width: f32,
    view_height: f32,
    offset_x: f32,
    offset_y: f32,
    /// Lowest allowed offset per axis, always <= 0
    bound_x: f32,
    bound_y: f32,
    active_pointer: Option<PointerId>,
    last_touch: (f32, f32),
    redraw_requested: bool,
}

impl Default for TransformController {
    fn default() -> Self {
        Self::new(1.0, 3.0)
    }
}

impl TransformController {
    /// Create a controller zooming between `min_scale` and `max_scale`
    ///
    /// Limits are expected to be validated (see
    /// [`ViewerConfig::validate`](crate::ViewerConfig::validate)); an
    /// inverted range collapses to `min_scale`.
    pub fn new(min_scale: f32, max_scale: f32) -> Self {
        Self {
            state: ZoomState::Idle,
            min_scale,
            max_scale: max_scale.max(min_scale),
            view_width: 0.0,
            view_height: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            bound_x: 0.0,
            bound_y: 0.0,
            active_pointer: None,
            last_touch: (0.0, 0.0),
            redraw_requested: false,
        }
    }

    pub fn state(&self) -> ZoomState {
        self.state
    }

    /// Current zoom scale
    pub fn scale(&self) -> f32 {
        match self.state {
            ZoomState::Idle => self.min_scale,
            ZoomState::Transformed { scale } => scale,
        }
    }

    pub fn offset(&self) -> (f32, f32) {
        (self.offset_x, self.offset_y)
    }

    /// Lowest allowed pan offset per axis
    pub fn bounds(&self) -> (f32, f32) {
        (self.bound_x, self.bound_y)
    }

    pub fn view_size(&self) -> (f32, f32) {
        (self.view_width, self.view_height)
    }

    pub fn active_pointer(&self) -> Option<PointerId> {
        self.active_pointer
    }

    /// Record the measured view size
    pub fn set_view_size(&mut self, width: f32, height: f32) {
        self.view_width = width.max(0.0);
        self.view_height = height.max(0.0);
        self.update_bounds();
    }

    /// Apply a pinch update with scale factor `factor` around a focus point
    ///
    /// The content point under the focus stays fixed while the scale is
    /// below its maximum. The offset is not clamped here; the next drag
    /// clamps it. Returns `false` for a non-finite or non-positive factor.
    pub fn on_scale(&mut self, factor: f32, focus_x: f32, focus_y: f32) -> bool {
        if !factor.is_finite() || factor <= 0.0 {
            log::debug!("ignoring scale factor {}", factor);
            return false;
        }

        let scale = (self.scale() * factor).clamp(self.min_scale, self.max_scale);
        if scale < self.max_scale {
            let diff_x = (focus_x - self.offset_x) * (factor - 1.0);
            let diff_y = (focus_y - self.offset_y) * (factor - 1.0);
            self.offset_x -= diff_x;
            self.offset_y -= diff_y;
        }

        self.state = if scale <= self.min_scale {
            ZoomState::Idle
        } else {
            ZoomState::Transformed { scale }
        };
        self.update_bounds();
        self.redraw_requested = true;
        true
    }

    /// Feed a raw touch event
    ///
    /// Drags follow one active pointer at a time. Returns `true` when the
    /// event changed the offset.
    pub fn on_touch_event(&mut self, event: &TouchEvent) -> bool {
        match event.action {
            TouchAction::Down => {
                if let Some(pointer) = event.pointers.first() {
                    self.active_pointer = Some(pointer.id);
                    self.last_touch = (pointer.x, pointer.y);
                }
                false
            }
            TouchAction::PointerDown(_) => false,
            TouchAction::Move => {
                let Some(pointer) = self.active_pointer.and_then(|id| event.pointer(id)) else {
                    return false;
                };
                let (x, y) = (pointer.x, pointer.y);
                self.drag_by(x - self.last_touch.0, y - self.last_touch.1);
                self.last_touch = (x, y);
                true
            }
            TouchAction::PointerUp(id) => {
                if self.active_pointer == Some(id) {
                    match event.pointers.iter().find(|p| p.id != id) {
                        Some(next) => {
                            self.active_pointer = Some(next.id);
                            self.last_touch = (next.x, next.y);
                        }
                        None => self.active_pointer = None,
                    }
                }
                false
            }
            TouchAction::Up | TouchAction::Cancel => {
                self.active_pointer = None;
                false
            }
        }
    }

    /// Move the content by `(dx, dy)`, clamped to the pan bounds
    pub fn drag_by(&mut self, dx: f32, dy: f32) {
        self.offset_x = (self.offset_x + dx).clamp(self.bound_x, 0.0);
        self.offset_y = (self.offset_y + dy).clamp(self.bound_y, 0.0);
        self.redraw_requested = true;
    }

    /// Transform for the current frame
    ///
    /// In [`ZoomState::Idle`] the offset is reset to the origin first.
    pub fn draw(&mut self) -> Transform {
        if self.state == ZoomState::Idle {
            self.offset_x = 0.0;
            self.offset_y = 0.0;
        }
        self.redraw_requested = false;
        Transform {
            translate_x: self.offset_x,
            translate_y: self.offset_y,
            scale: self.scale(),
        }
    }

    /// Whether a gesture changed the transform since the last draw
    pub fn needs_redraw(&self) -> bool {
        self.redraw_requested
    }

    /// Return to the un-zoomed state
    pub fn reset(&mut self) {
        self.state = ZoomState::Idle;
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.active_pointer = None;
        self.update_bounds();
        self.redraw_requested = true;
    }

    fn update_bounds(&mut self) {
        let scale = self.scale();
        self.bound_x = (self.view_width - self.view_width * scale).min(0.0);
        self.bound_y = (self.view_height - self.view_height * scale).min(0.0);
    }
}
