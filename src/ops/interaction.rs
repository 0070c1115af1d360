//! Pointer-driven drag / resize of the signature overlay.
//!
//! All coordinates are screen space (container-relative). The controller
//! never looks at document space; the session reprojects the clamped
//! overlay after every move.

use super::geometry::{OverlayRect, RenderRect};

/// Smallest overlay edge, in screen pixels.
pub const MIN_OVERLAY_SIZE: f32 = 10.0;

/// Side length of the square resize handles drawn on the overlay.
pub const HANDLE_SIZE: f32 = 8.0;

/// Pointer distance (screen px) within which a handle is grabbed.
pub const HANDLE_HIT_RADIUS: f32 = 7.0;

/// Resize handle, named by compass direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
}

impl ResizeHandle {
    pub fn all() -> &'static [ResizeHandle] {
        &[
            ResizeHandle::NW,
            ResizeHandle::N,
            ResizeHandle::NE,
            ResizeHandle::E,
            ResizeHandle::SE,
            ResizeHandle::S,
            ResizeHandle::SW,
            ResizeHandle::W,
        ]
    }

    pub fn moves_west(&self) -> bool {
        matches!(self, ResizeHandle::W | ResizeHandle::NW | ResizeHandle::SW)
    }

    pub fn moves_east(&self) -> bool {
        matches!(self, ResizeHandle::E | ResizeHandle::NE | ResizeHandle::SE)
    }

    pub fn moves_north(&self) -> bool {
        matches!(self, ResizeHandle::N | ResizeHandle::NE | ResizeHandle::NW)
    }

    pub fn moves_south(&self) -> bool {
        matches!(self, ResizeHandle::S | ResizeHandle::SE | ResizeHandle::SW)
    }

    /// Centre of this handle on the given overlay.
    pub fn position(&self, rect: &OverlayRect) -> (f32, f32) {
        let x = if self.moves_west() {
            rect.left
        } else if self.moves_east() {
            rect.right()
        } else {
            rect.left + rect.width * 0.5
        };
        let y = if self.moves_north() {
            rect.top
        } else if self.moves_south() {
            rect.bottom()
        } else {
            rect.top + rect.height * 0.5
        };
        (x, y)
    }
}

/// What a pointer-down landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    Body,
    Handle(ResizeHandle),
}

/// Handles win over the body so corners stay grabbable on small overlays.
pub fn hit_test(rect: &OverlayRect, px: f32, py: f32, radius: f32) -> Option<PointerTarget> {
    let mut best: Option<(ResizeHandle, f32)> = None;
    for &handle in ResizeHandle::all() {
        let (hx, hy) = handle.position(rect);
        let dist = ((px - hx) * (px - hx) + (py - hy) * (py - hy)).sqrt();
        if dist <= radius && best.is_none_or(|(_, d)| dist < d) {
            best = Some((handle, dist));
        }
    }
    if let Some((handle, _)) = best {
        return Some(PointerTarget::Handle(handle));
    }
    rect.contains(px, py).then_some(PointerTarget::Body)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    Idle,
    Dragging,
    Resizing(ResizeHandle),
}

/// One pointer gesture, from press to release.
#[derive(Clone, Copy, Debug, Default)]
pub struct InteractionSession {
    pub mode: InteractionMode,
    pub anchor_pointer: (f32, f32),
    pub anchor_overlay: OverlayRect,
}

impl InteractionSession {
    pub fn is_active(&self) -> bool {
        self.mode != InteractionMode::Idle
    }

    /// Start a gesture. Ignored while one is already running.
    pub fn pointer_down(&mut self, target: PointerTarget, pointer: (f32, f32), overlay: OverlayRect) {
        if self.is_active() {
            return;
        }
        self.mode = match target {
            PointerTarget::Body => InteractionMode::Dragging,
            PointerTarget::Handle(handle) => InteractionMode::Resizing(handle),
        };
        self.anchor_pointer = pointer;
        self.anchor_overlay = overlay;
    }

    /// New overlay for the current pointer position, clamped to `bounds`.
    /// `None` when idle.
    pub fn pointer_move(&self, pointer: (f32, f32), bounds: &RenderRect) -> Option<OverlayRect> {
        let dx = pointer.0 - self.anchor_pointer.0;
        let dy = pointer.1 - self.anchor_pointer.1;
        let moved = apply_delta(self.mode, &self.anchor_overlay, dx, dy)?;
        Some(clamp_overlay(moved, bounds))
    }

    /// Restart the running gesture from `overlay` at `pointer`, keeping its
    /// mode. Used when the layout changes underneath an active gesture.
    pub fn reanchor(&mut self, pointer: (f32, f32), overlay: OverlayRect) {
        if !self.is_active() {
            return;
        }
        self.anchor_pointer = pointer;
        self.anchor_overlay = overlay;
    }

    /// End the gesture regardless of where the pointer is.
    pub fn pointer_up(&mut self) {
        *self = Self::default();
    }
}

/// Unclamped result of moving the pointer by `(dx, dy)` since the press.
pub fn apply_delta(mode: InteractionMode, anchor: &OverlayRect, dx: f32, dy: f32) -> Option<OverlayRect> {
    let mut r = *anchor;
    match mode {
        InteractionMode::Idle => return None,
        InteractionMode::Dragging => {
            r.left += dx;
            r.top += dy;
        }
        InteractionMode::Resizing(handle) => {
            if handle.moves_west() {
                r.left += dx;
                r.width -= dx;
            }
            if handle.moves_east() {
                r.width += dx;
            }
            if handle.moves_north() {
                r.top += dy;
                r.height -= dy;
            }
            if handle.moves_south() {
                r.height += dy;
            }
        }
    }
    Some(r)
}

/// Enforce the minimum size and keep the overlay on the rendered page.
///
/// Size is capped at the page size so the position clamp can always succeed.
pub fn clamp_overlay(rect: OverlayRect, bounds: &RenderRect) -> OverlayRect {
    let width = rect
        .width
        .max(MIN_OVERLAY_SIZE)
        .min(bounds.width.max(MIN_OVERLAY_SIZE));
    let height = rect
        .height
        .max(MIN_OVERLAY_SIZE)
        .min(bounds.height.max(MIN_OVERLAY_SIZE));
    // min-then-max: the lower bound wins if the page is narrower than the floor
    let left = rect.left.min(bounds.max_x() - width).max(bounds.min_x());
    let top = rect.top.min(bounds.max_y() - height).max(bounds.min_y());
    OverlayRect {
        left,
        top,
        width,
        height,
    }
}
