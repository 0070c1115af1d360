//! Preview layout and coordinate mapping for the signature placement tool.
//!
//! Two coordinate spaces are involved:
//! * **Document space** — the page's intrinsic size as reported by the
//!   rendering collaborator (PDF points). Placements are persisted here.
//! * **Screen space** — pixels relative to the top-left corner of the preview
//!   container. The page image is letterboxed inside the container, so the
//!   mapping is a scale plus the letterbox offset.
//!
//! Nothing in here touches egui; the preview panel feeds container sizes in
//! and reads overlay rectangles out.

// ============================================================================
// DOCUMENT SPACE
// ============================================================================

/// Intrinsic page size in document units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    /// Returns `None` unless both dimensions are finite and positive.
    pub fn new(width: f32, height: f32) -> Option<Self> {
        let geometry = Self { width, height };
        geometry.is_valid().then_some(geometry)
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width / self.height
    }
}

/// Signature rectangle in document space. This is what gets persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignaturePlacement {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Placement used when a signer has no stored position yet.
pub const DEFAULT_PLACEMENT: SignaturePlacement = SignaturePlacement {
    x: 50.0,
    y: 50.0,
    w: 150.0,
    h: 75.0,
};

impl Default for SignaturePlacement {
    fn default() -> Self {
        DEFAULT_PLACEMENT
    }
}

impl SignaturePlacement {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// All four fields rounded to two decimals (the persisted precision).
    pub fn rounded(&self) -> Self {
        Self {
            x: round2(self.x),
            y: round2(self.y),
            w: round2(self.w),
            h: round2(self.h),
        }
    }

    /// `[x, y, w, h]` as the numeric strings handed to the persistence collaborator.
    pub fn to_position_args(&self) -> [String; 4] {
        [
            format!("{:.2}", self.x),
            format!("{:.2}", self.y),
            format!("{:.2}", self.w),
            format!("{:.2}", self.h),
        ]
    }

    pub fn get(&self, field: PlacementField) -> f32 {
        match field {
            PlacementField::X => self.x,
            PlacementField::Y => self.y,
            PlacementField::W => self.w,
            PlacementField::H => self.h,
        }
    }

    pub fn set(&mut self, field: PlacementField, value: f32) {
        match field {
            PlacementField::X => self.x = value,
            PlacementField::Y => self.y = value,
            PlacementField::W => self.w = value,
            PlacementField::H => self.h = value,
        }
    }
}

/// One of the four editable numeric fields of a placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementField {
    X,
    Y,
    W,
    H,
}

impl PlacementField {
    pub fn all() -> &'static [PlacementField] {
        &[
            PlacementField::X,
            PlacementField::Y,
            PlacementField::W,
            PlacementField::H,
        ]
    }

    /// Value used when the field text does not parse (or parses to zero for sizes).
    pub fn fallback(&self) -> f32 {
        match self {
            PlacementField::X | PlacementField::Y => 0.0,
            PlacementField::W => DEFAULT_PLACEMENT.w,
            PlacementField::H => DEFAULT_PLACEMENT.h,
        }
    }

    /// Parse user-entered text. Empty, non-numeric, non-finite and zero
    /// values all fall back to the field default.
    pub fn parse(&self, text: &str) -> f32 {
        match text.trim().replace(',', ".").parse::<f32>() {
            Ok(v) if v.is_finite() && v != 0.0 => v,
            _ => self.fallback(),
        }
    }
}

/// Round to two decimals.
pub fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

// ============================================================================
// SCREEN SPACE
// ============================================================================

/// Size of the preview container as last observed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContainerRect {
    pub width: f32,
    pub height: f32,
}

impl ContainerRect {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Letterboxed page rectangle inside the container (container-relative).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderRect {
    pub width: f32,
    pub height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl RenderRect {
    pub fn min_x(&self) -> f32 {
        self.offset_x
    }

    pub fn min_y(&self) -> f32 {
        self.offset_y
    }

    pub fn max_x(&self) -> f32 {
        self.offset_x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.offset_y + self.height
    }
}

/// Document units per screen pixel, per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleFactors {
    pub x: f32,
    pub y: f32,
}

/// Signature rectangle in screen space, relative to the container.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OverlayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl OverlayRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.left && px <= self.right() && py >= self.top && py <= self.bottom()
    }
}

// ============================================================================
// LAYOUT NORMALIZER
// ============================================================================

/// Largest rectangle with the page's aspect ratio that fits in the container,
/// centred on both axes. `None` while the preview is not renderable (empty
/// container or degenerate page).
pub fn compute_render_rect(page: PageGeometry, container: ContainerRect) -> Option<RenderRect> {
    if container.is_empty() || !page.is_valid() {
        return None;
    }

    let image_ratio = page.aspect_ratio();
    let container_ratio = container.width / container.height;

    let (width, height) = if image_ratio > container_ratio {
        (container.width, container.width / image_ratio)
    } else {
        (container.height * image_ratio, container.height)
    };

    Some(RenderRect {
        width,
        height,
        offset_x: (container.width - width) / 2.0,
        offset_y: (container.height - height) / 2.0,
    })
}

// ============================================================================
// COORDINATE MAPPER
// ============================================================================

/// A successful layout pass: the render rectangle plus the scale factors
/// derived from it. Only exists when both transforms are well defined.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreviewLayout {
    pub page: PageGeometry,
    pub render: RenderRect,
    pub scale: ScaleFactors,
}

impl PreviewLayout {
    pub fn compute(page: PageGeometry, container: ContainerRect) -> Option<Self> {
        let render = compute_render_rect(page, container)?;
        if render.width <= 0.0 || render.height <= 0.0 {
            return None;
        }
        Some(Self {
            page,
            render,
            scale: ScaleFactors {
                x: page.width / render.width,
                y: page.height / render.height,
            },
        })
    }

    /// Document-space placement → container-relative overlay.
    pub fn to_screen(&self, p: &SignaturePlacement) -> OverlayRect {
        OverlayRect {
            left: p.x / self.scale.x + self.render.offset_x,
            top: p.y / self.scale.y + self.render.offset_y,
            width: p.w / self.scale.x,
            height: p.h / self.scale.y,
        }
    }

    /// Container-relative overlay → document-space placement (unrounded).
    pub fn to_document(&self, o: &OverlayRect) -> SignaturePlacement {
        SignaturePlacement {
            x: (o.left - self.render.offset_x) * self.scale.x,
            y: (o.top - self.render.offset_y) * self.scale.y,
            w: o.width * self.scale.x,
            h: o.height * self.scale.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn wide_page_in_square_container_is_width_bound() {
        let page = PageGeometry::new(800.0, 600.0).unwrap();
        let rect = compute_render_rect(page, ContainerRect::new(400.0, 400.0)).unwrap();
        assert_eq!(
            rect,
            RenderRect {
                width: 400.0,
                height: 300.0,
                offset_x: 0.0,
                offset_y: 50.0
            }
        );
    }

    #[test]
    fn tall_page_is_height_bound_and_centred() {
        let page = PageGeometry::new(595.0, 842.0).unwrap();
        let rect = compute_render_rect(page, ContainerRect::new(1000.0, 500.0)).unwrap();
        assert_eq!(rect.height, 500.0);
        assert!(approx(rect.width, 500.0 * 595.0 / 842.0, 1e-3));
        assert!(approx(rect.offset_x, (1000.0 - rect.width) / 2.0, 1e-3));
        assert_eq!(rect.offset_y, 0.0);
    }

    #[test]
    fn empty_container_or_page_is_not_renderable() {
        let page = PageGeometry {
            width: 800.0,
            height: 600.0,
        };
        assert!(compute_render_rect(page, ContainerRect::new(0.0, 400.0)).is_none());
        assert!(compute_render_rect(page, ContainerRect::new(400.0, 0.0)).is_none());
        let flat = PageGeometry {
            width: 800.0,
            height: 0.0,
        };
        assert!(compute_render_rect(flat, ContainerRect::new(400.0, 400.0)).is_none());
        assert!(PageGeometry::new(-1.0, 10.0).is_none());
        assert!(PreviewLayout::compute(flat, ContainerRect::new(400.0, 400.0)).is_none());
    }

    #[test]
    fn render_rect_fits_container_and_keeps_ratio() {
        let pages = [(800.0, 600.0), (595.0, 842.0), (1.0, 1000.0), (3000.0, 7.5), (612.0, 792.0)];
        let containers = [(400.0, 400.0), (1366.0, 560.0), (13.0, 900.0), (640.0, 480.0), (1.0, 1.0)];
        for &(pw, ph) in &pages {
            for &(cw, ch) in &containers {
                let page = PageGeometry::new(pw, ph).unwrap();
                let container = ContainerRect::new(cw, ch);
                let r = compute_render_rect(page, container).unwrap();
                assert!(r.offset_x >= 0.0 && r.offset_y >= 0.0, "{pw}x{ph} in {cw}x{ch}");
                assert!(r.max_x() <= cw + 1e-3 && r.max_y() <= ch + 1e-3);
                assert!(approx(r.width / r.height, pw / ph, (pw / ph) * 1e-4));
                assert!(approx(r.offset_x, cw - r.max_x(), 1e-3));
                assert!(approx(r.offset_y, ch - r.max_y(), 1e-3));
                // One axis always touches the container.
                assert!(approx(r.width, cw, 1e-3) || approx(r.height, ch, 1e-3));
            }
        }
    }

    #[test]
    fn stored_position_projects_into_letterboxed_overlay() {
        let page = PageGeometry::new(800.0, 600.0).unwrap();
        let layout = PreviewLayout::compute(page, ContainerRect::new(400.0, 400.0)).unwrap();
        assert_eq!(layout.scale, ScaleFactors { x: 2.0, y: 2.0 });

        let overlay = layout.to_screen(&SignaturePlacement::new(100.0, 50.0, 150.0, 75.0));
        assert_eq!(overlay, OverlayRect::new(50.0, 75.0, 75.0, 37.5));
    }

    #[test]
    fn document_round_trip_holds_after_rounding() {
        let page = PageGeometry::new(595.28, 841.89).unwrap();
        let containers = [(613.0, 700.0), (1200.0, 333.0), (401.0, 401.0), (97.0, 1500.0)];
        let placements = [
            SignaturePlacement::new(50.0, 50.0, 150.0, 75.0),
            SignaturePlacement::new(412.37, 700.12, 120.5, 40.25),
            SignaturePlacement::new(0.0, 0.0, 595.28, 841.89),
            SignaturePlacement::new(300.01, 12.99, 33.33, 66.67),
        ];
        for &(cw, ch) in &containers {
            let layout = PreviewLayout::compute(page, ContainerRect::new(cw, ch)).unwrap();
            for p in &placements {
                let back = layout.to_document(&layout.to_screen(p)).rounded();
                for &field in PlacementField::all() {
                    assert!(
                        approx(back.get(field), p.get(field), 0.011),
                        "{field:?}: {} vs {} in {cw}x{ch}",
                        back.get(field),
                        p.get(field)
                    );
                }
            }
        }
    }

    #[test]
    fn position_args_use_two_decimals() {
        let p = SignaturePlacement::new(10.0, 2.345, 150.0, 75.499);
        assert_eq!(p.to_position_args(), ["10.00", "2.35", "150.00", "75.50"].map(String::from));
    }

    #[test]
    fn field_parsing_falls_back_per_field() {
        assert_eq!(PlacementField::X.parse("12.5"), 12.5);
        assert_eq!(PlacementField::Y.parse("12,5"), 12.5);
        assert_eq!(PlacementField::X.parse("abc"), 0.0);
        assert_eq!(PlacementField::W.parse(""), 150.0);
        assert_eq!(PlacementField::H.parse("0"), 75.0);
        assert_eq!(PlacementField::H.parse("NaN"), 75.0);
    }
}
