use crate::ops::bridge::{
    LoadedPreview, ProcessRequest, SaveRequest, SignerConfig, SignerKind, SignerRef,
};
use crate::ops::geometry::{
    ContainerRect, OverlayRect, PlacementField, PreviewLayout, SignaturePlacement,
    DEFAULT_PLACEMENT,
};
use crate::ops::interaction::{self, HANDLE_HIT_RADIUS, InteractionSession};

/// Maximum number of activity-log entries kept per window.
const MAX_LOG_ENTRIES: usize = 500;

// ============================================================================
// ACTIVITY LOG
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Map the free-form level strings emitted by the automation script.
    pub fn from_script(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "error" | "critical" => LogLevel::Error,
            "warning" | "warn" => LogLevel::Warning,
            "success" | "info_final" => LogLevel::Success,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// User-visible log, newest entry first.
#[derive(Clone, Debug, Default)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
}

impl ActivityLog {
    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Error => {
                crate::log_err!("{}", message);
            }
            LogLevel::Warning => {
                crate::log_warn!("{}", message);
            }
            _ => {
                crate::log_info!("{}", message);
            }
        }
        self.entries.insert(0, LogEntry { level, message });
        self.entries.truncate(MAX_LOG_ENTRIES);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.first()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusIndicator {
    #[default]
    Idle,
    Busy,
    Success,
    Error,
}

// ============================================================================
// SIGNER SESSION
// ============================================================================

/// Ties a preview request to the selection it was issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewTicket {
    pub seq: u64,
    pub signer: SignerRef,
}

/// Everything the signature window knows. Owned by the UI thread; every
/// handler takes `&mut self` and no state lives anywhere else.
#[derive(Default)]
pub struct SignerSession {
    pub config: SignerConfig,
    selection: Option<SignerRef>,
    /// Sequence number of the most recent preview request.
    preview_seq: u64,
    preview_loading: bool,
    preview: Option<LoadedPreview>,
    preview_error: Option<String>,
    /// Authoritative document-space placement. `None` with no signer selected.
    placement: Option<SignaturePlacement>,
    container: ContainerRect,
    layout: Option<PreviewLayout>,
    /// Screen projection of `placement`. `None` while the page isn't renderable.
    overlay: Option<OverlayRect>,
    interaction: InteractionSession,
    /// Last pointer position seen during a gesture.
    last_pointer: (f32, f32),
    pub emissor: Option<String>,
    pub receptor: Option<String>,
    saving: bool,
    processing: bool,
    pub status: StatusIndicator,
    pub log: ActivityLog,
}

impl SignerSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn selection(&self) -> Option<&SignerRef> {
        self.selection.as_ref()
    }

    pub fn placement(&self) -> Option<SignaturePlacement> {
        self.placement
    }

    pub fn overlay(&self) -> Option<OverlayRect> {
        self.overlay
    }

    pub fn layout(&self) -> Option<&PreviewLayout> {
        self.layout.as_ref()
    }

    pub fn preview(&self) -> Option<&LoadedPreview> {
        self.preview.as_ref()
    }

    pub fn preview_error(&self) -> Option<&str> {
        self.preview_error.as_deref()
    }

    pub fn is_loading_preview(&self) -> bool {
        self.preview_loading
    }

    /// Changes whenever the selection changes; keys texture caches.
    pub fn preview_generation(&self) -> u64 {
        self.preview_seq
    }

    pub fn interaction(&self) -> &InteractionSession {
        &self.interaction
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn can_save(&self) -> bool {
        self.selection.is_some() && self.placement.is_some() && !self.saving
    }

    pub fn can_process(&self) -> bool {
        self.emissor.is_some() && self.receptor.is_some() && !self.processing
    }

    /// True for a selected driver that has no stored position yet.
    pub fn driver_warning(&self) -> bool {
        match &self.selection {
            Some(signer) if signer.kind == SignerKind::Driver => self
                .config
                .find(signer)
                .is_some_and(|entry| !entry.has_position_defined),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn begin_config_load(&mut self) {
        self.status = StatusIndicator::Busy;
        self.log.push(LogLevel::Info, t!("signer.log.loading_config"));
    }

    pub fn finish_config_load(&mut self, result: Result<SignerConfig, String>) {
        match result {
            Ok(config) => {
                self.config = config;
                self.status = StatusIndicator::Idle;
                self.log.push(LogLevel::Info, t!("signer.log.config_loaded"));
            }
            Err(e) => {
                self.status = StatusIndicator::Error;
                self.log
                    .push(LogLevel::Error, t!("signer.log.config_failed", error = e));
            }
        }
    }

    // ------------------------------------------------------------------
    // Selection & preview
    // ------------------------------------------------------------------

    /// Change the signer being adjusted. Returns the preview request to send,
    /// or `None` when the selection was cleared.
    pub fn select_signer(&mut self, signer: Option<SignerRef>) -> Option<PreviewTicket> {
        self.interaction.pointer_up();
        self.preview = None;
        self.preview_error = None;
        self.layout = None;
        self.overlay = None;
        self.placement = None;
        self.preview_seq += 1;

        let Some(signer) = signer else {
            self.selection = None;
            self.preview_loading = false;
            return None;
        };

        self.selection = Some(signer.clone());
        self.preview_loading = true;
        Some(PreviewTicket {
            seq: self.preview_seq,
            signer,
        })
    }

    fn is_current(&self, ticket: &PreviewTicket) -> bool {
        ticket.seq == self.preview_seq && self.selection.as_ref() == Some(&ticket.signer)
    }

    /// Install a preview response. Stale responses (older ticket, or a
    /// selection that has since changed) are dropped; returns whether the
    /// response was applied.
    pub fn finish_preview(
        &mut self,
        ticket: &PreviewTicket,
        result: Result<LoadedPreview, String>,
    ) -> bool {
        if !self.is_current(ticket) {
            crate::log_info!(
                "Discarding stale preview #{} for {}",
                ticket.seq,
                ticket.signer.name
            );
            return false;
        }
        self.preview_loading = false;

        match result {
            Ok(preview) => {
                self.placement = Some(
                    preview
                        .position
                        .map(|p| p.rounded())
                        .unwrap_or(DEFAULT_PLACEMENT),
                );
                self.preview = Some(preview);
                self.relayout();
            }
            Err(e) => {
                self.log
                    .push(LogLevel::Error, t!("signer.log.preview_failed", error = e.clone()));
                self.preview_error = Some(e);
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Container resize notification. Cheap and idempotent.
    pub fn resize_container(&mut self, container: ContainerRect) {
        if container == self.container {
            return;
        }
        self.container = container;
        self.relayout();
    }

    fn relayout(&mut self) {
        self.layout = self
            .preview
            .as_ref()
            .and_then(LoadedPreview::page_geometry)
            .and_then(|page| PreviewLayout::compute(page, self.container));
        self.reproject();
        if self.interaction.is_active() {
            match self.overlay {
                Some(overlay) => self.interaction.reanchor(self.last_pointer, overlay),
                None => self.interaction.pointer_up(),
            }
        }
    }

    /// Document → screen for the current placement.
    fn reproject(&mut self) {
        self.overlay = match (&self.layout, &self.placement) {
            (Some(layout), Some(placement)) => Some(layout.to_screen(placement)),
            _ => None,
        };
    }

    /// Screen → document for the current overlay.
    fn sync_placement_from_overlay(&mut self) {
        if let (Some(layout), Some(overlay)) = (&self.layout, &self.overlay) {
            self.placement = Some(layout.to_document(overlay).rounded());
        }
    }

    // ------------------------------------------------------------------
    // Pointer interaction (container-relative coordinates)
    // ------------------------------------------------------------------

    /// Returns whether the press landed on the overlay or one of its handles.
    pub fn pointer_down(&mut self, px: f32, py: f32) -> bool {
        let Some(overlay) = self.overlay else { return false };
        match interaction::hit_test(&overlay, px, py, HANDLE_HIT_RADIUS) {
            Some(target) => {
                self.interaction.pointer_down(target, (px, py), overlay);
                self.last_pointer = (px, py);
                true
            }
            None => false,
        }
    }

    pub fn pointer_move(&mut self, px: f32, py: f32) {
        let Some(layout) = self.layout else { return };
        if self.interaction.is_active() {
            self.last_pointer = (px, py);
        }
        if let Some(moved) = self.interaction.pointer_move((px, py), &layout.render) {
            self.overlay = Some(moved);
            self.sync_placement_from_overlay();
        }
    }

    pub fn pointer_up(&mut self) {
        self.interaction.pointer_up();
    }

    // ------------------------------------------------------------------
    // Numeric fields
    // ------------------------------------------------------------------

    /// Commit user-typed text for one field. Ignored during a gesture or
    /// with no signer selected.
    pub fn commit_field(&mut self, field: PlacementField, text: &str) -> bool {
        self.set_field(field, field.parse(text))
    }

    pub fn set_field(&mut self, field: PlacementField, value: f32) -> bool {
        if self.interaction.is_active() {
            return false;
        }
        let Some(placement) = self.placement.as_mut() else { return false };
        placement.set(field, value);
        self.reproject();
        true
    }

    // ------------------------------------------------------------------
    // Save
    // ------------------------------------------------------------------

    pub fn begin_save(&mut self) -> Option<SaveRequest> {
        if !self.can_save() {
            return None;
        }
        let signer = self.selection.clone()?;
        self.sync_placement_from_overlay();
        let placement = self.placement?;
        self.saving = true;
        self.status = StatusIndicator::Busy;
        Some(SaveRequest {
            signer,
            position: placement.to_position_args(),
        })
    }

    /// Returns `true` when the configuration should be reloaded.
    pub fn finish_save(&mut self, result: Result<String, String>) -> bool {
        self.saving = false;
        match result {
            Ok(message) => {
                self.log.push(LogLevel::Success, message);
                self.status = StatusIndicator::Success;
                true
            }
            Err(e) => {
                self.log
                    .push(LogLevel::Error, t!("signer.log.save_failed", error = e));
                self.status = StatusIndicator::Error;
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Batch processing
    // ------------------------------------------------------------------

    pub fn begin_process(&mut self) -> Option<ProcessRequest> {
        if self.processing {
            return None;
        }
        let (Some(emissor), Some(receptor)) = (self.emissor.clone(), self.receptor.clone()) else {
            self.log
                .push(LogLevel::Error, t!("signer.log.select_emissor_receptor"));
            return None;
        };
        self.processing = true;
        self.status = StatusIndicator::Busy;
        self.log.push(LogLevel::Info, t!("signer.log.processing"));
        Some(ProcessRequest {
            emissor_file: emissor,
            receptor_file: receptor,
        })
    }

    pub fn finish_process(&mut self, result: Result<String, String>) {
        self.processing = false;
        match result {
            Ok(message) => {
                self.log.push(LogLevel::Success, message);
                self.status = StatusIndicator::Success;
            }
            Err(e) => {
                self.log
                    .push(LogLevel::Error, t!("signer.log.process_failed", error = e));
                self.status = StatusIndicator::Error;
            }
        }
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn push_status(&mut self, message: impl Into<String>) {
        self.log.push(LogLevel::Info, message);
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.log.push(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::bridge::{RgbaPreview, SignerEntry};
    use crate::ops::geometry::PageGeometry;
    use crate::ops::interaction::{InteractionMode, MIN_OVERLAY_SIZE};

    fn driver(name: &str) -> SignerRef {
        SignerRef::new(name, SignerKind::Driver)
    }

    fn page_preview(position: Option<SignaturePlacement>) -> LoadedPreview {
        LoadedPreview {
            page: Some(RgbaPreview {
                width: 8,
                height: 6,
                pixels: vec![255; 8 * 6 * 4],
            }),
            geometry: PageGeometry::new(800.0, 600.0),
            position,
            signature: None,
        }
    }

    fn session_with_preview(position: Option<SignaturePlacement>) -> SignerSession {
        let mut s = SignerSession::new();
        s.resize_container(ContainerRect::new(400.0, 400.0));
        let ticket = s.select_signer(Some(driver("JOAO"))).unwrap();
        assert!(s.finish_preview(&ticket, Ok(page_preview(position))));
        s
    }

    #[test]
    fn stored_position_is_projected_into_overlay() {
        let s = session_with_preview(Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
        assert_eq!(s.overlay(), Some(OverlayRect::new(50.0, 75.0, 75.0, 37.5)));
        assert!(!s.is_loading_preview());
    }

    #[test]
    fn missing_position_seeds_default_placement() {
        let s = session_with_preview(None);
        assert_eq!(s.placement(), Some(SignaturePlacement::new(50.0, 50.0, 150.0, 75.0)));
    }

    #[test]
    fn preview_without_page_hides_overlay_but_allows_save() {
        let mut s = SignerSession::new();
        s.resize_container(ContainerRect::new(400.0, 400.0));
        let ticket = s.select_signer(Some(driver("JOAO"))).unwrap();
        s.finish_preview(&ticket, Ok(LoadedPreview::default()));
        assert!(s.overlay().is_none());
        assert!(s.layout().is_none());
        assert!(s.can_save());

        let req = s.begin_save().unwrap();
        assert_eq!(req.signer, driver("JOAO"));
        assert_eq!(req.position, ["50.00", "50.00", "150.00", "75.00"].map(String::from));
        assert_eq!(s.status, StatusIndicator::Busy);
    }

    #[test]
    fn stale_preview_is_discarded() {
        let mut s = SignerSession::new();
        s.resize_container(ContainerRect::new(400.0, 400.0));
        let first = s.select_signer(Some(driver("A"))).unwrap();
        let second = s.select_signer(Some(driver("B"))).unwrap();

        assert!(!s.finish_preview(&first, Ok(page_preview(None))));
        assert!(s.preview().is_none());
        assert!(s.is_loading_preview());

        assert!(s.finish_preview(&second, Ok(page_preview(None))));
        assert!(s.overlay().is_some());
    }

    #[test]
    fn reselecting_same_signer_still_discards_old_response() {
        let mut s = SignerSession::new();
        let first = s.select_signer(Some(driver("A"))).unwrap();
        let _second = s.select_signer(Some(driver("A"))).unwrap();
        assert!(!s.finish_preview(&first, Ok(page_preview(None))));
    }

    #[test]
    fn clearing_selection_disables_save() {
        let mut s = session_with_preview(None);
        assert!(s.select_signer(None).is_none());
        assert!(s.placement().is_none());
        assert!(s.overlay().is_none());
        assert!(!s.can_save());
        assert!(s.begin_save().is_none());
    }

    #[test]
    fn preview_error_is_local_and_logged() {
        let mut s = SignerSession::new();
        let ticket = s.select_signer(Some(driver("A"))).unwrap();
        s.finish_preview(&ticket, Err("boom".into()));
        assert_eq!(s.preview_error(), Some("boom"));
        assert_eq!(s.log.latest().unwrap().level, LogLevel::Error);
        assert!(!s.is_loading_preview());
        assert_ne!(s.status, StatusIndicator::Error);
    }

    #[test]
    fn drag_updates_document_placement() {
        let mut s = session_with_preview(Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
        // Overlay at (50,75) 75x37.5; grab the middle.
        assert!(s.pointer_down(80.0, 90.0));
        assert_eq!(s.interaction().mode, InteractionMode::Dragging);
        s.pointer_move(90.0, 100.0);
        assert_eq!(s.placement(), Some(SignaturePlacement::new(120.0, 70.0, 150.0, 75.0)));
        s.pointer_up();
        assert_eq!(s.interaction().mode, InteractionMode::Idle);
    }

    #[test]
    fn press_outside_overlay_is_ignored() {
        let mut s = session_with_preview(None);
        assert!(!s.pointer_down(390.0, 340.0));
        assert!(!s.interaction().is_active());
    }

    #[test]
    fn resize_floor_is_in_screen_pixels() {
        let mut s = session_with_preview(Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
        // SE corner sits at (125, 112.5).
        assert!(s.pointer_down(125.0, 112.5));
        s.pointer_move(-400.0, -400.0);
        let overlay = s.overlay().unwrap();
        assert_eq!((overlay.width, overlay.height), (MIN_OVERLAY_SIZE, MIN_OVERLAY_SIZE));
        // scale 2 → 20 document units
        assert_eq!(s.placement().map(|p| (p.w, p.h)), Some((20.0, 20.0)));
    }

    #[test]
    fn field_edits_reposition_overlay_only_when_idle() {
        let mut s = session_with_preview(Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
        assert!(s.commit_field(PlacementField::X, "200"));
        assert_eq!(s.overlay().unwrap().left, 100.0);

        assert!(s.pointer_down(110.0, 90.0));
        assert!(!s.commit_field(PlacementField::Y, "10"));
        assert_eq!(s.placement().unwrap().y, 50.0);
    }

    #[test]
    fn container_resize_keeps_document_placement() {
        let mut s = session_with_preview(Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
        s.resize_container(ContainerRect::new(800.0, 1000.0));
        assert_eq!(s.overlay(), Some(OverlayRect::new(100.0, 250.0, 150.0, 75.0)));
        assert_eq!(s.placement(), Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));

        s.resize_container(ContainerRect::new(0.0, 0.0));
        assert!(s.overlay().is_none());
        assert!(s.placement().is_some());
    }

    #[test]
    fn container_resize_mid_drag_keeps_placement_under_pointer() {
        let mut s = session_with_preview(Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
        assert!(s.pointer_down(80.0, 90.0));
        s.resize_container(ContainerRect::new(800.0, 800.0));
        assert!(s.interaction().is_active());
        // Scale 1 now: page at offset_y 100.
        assert_eq!(s.overlay(), Some(OverlayRect::new(100.0, 150.0, 150.0, 75.0)));

        s.pointer_move(80.0, 90.0);
        assert_eq!(s.placement(), Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
        s.pointer_move(90.0, 100.0);
        assert_eq!(s.placement(), Some(SignaturePlacement::new(110.0, 60.0, 150.0, 75.0)));
    }

    #[test]
    fn container_collapse_mid_drag_ends_gesture() {
        let mut s = session_with_preview(Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
        assert!(s.pointer_down(80.0, 90.0));
        s.resize_container(ContainerRect::new(0.0, 0.0));
        assert!(!s.interaction().is_active());
        assert_eq!(s.placement(), Some(SignaturePlacement::new(100.0, 50.0, 150.0, 75.0)));
    }

    #[test]
    fn save_captures_overlay_and_failure_keeps_placement() {
        let mut s = session_with_preview(None);
        let req = s.begin_save().unwrap();
        assert_eq!(req.position[0], "50.00");
        assert!(!s.can_save());

        assert!(!s.finish_save(Err("disk full".into())));
        assert_eq!(s.status, StatusIndicator::Error);
        assert!(s.placement().is_some());
        assert!(s.can_save());

        s.begin_save().unwrap();
        assert!(s.finish_save(Ok("Posição salva".into())));
        assert_eq!(s.status, StatusIndicator::Success);
        assert_eq!(s.log.latest().unwrap().message, "Posição salva");
    }

    #[test]
    fn processing_requires_both_signers() {
        let mut s = SignerSession::new();
        assert!(!s.can_process());
        assert!(s.begin_process().is_none());
        assert_eq!(s.log.latest().unwrap().level, LogLevel::Error);

        s.emissor = Some("ana.png".into());
        s.receptor = Some("bia.png".into());
        let req = s.begin_process().unwrap();
        assert_eq!(req.emissor_file, "ana.png");
        assert!(!s.can_process());
        assert!(s.begin_process().is_none());

        s.finish_process(Err("no pdfs".into()));
        assert_eq!(s.status, StatusIndicator::Error);
        assert!(s.can_process());
    }

    #[test]
    fn driver_without_position_raises_warning() {
        let mut s = SignerSession::new();
        s.config.drivers = vec![
            SignerEntry {
                name: "JOAO".into(),
                display_name: None,
                has_position_defined: false,
            },
            SignerEntry {
                name: "MARIA".into(),
                display_name: None,
                has_position_defined: true,
            },
        ];
        s.select_signer(Some(driver("JOAO")));
        assert!(s.driver_warning());
        s.select_signer(Some(driver("MARIA")));
        assert!(!s.driver_warning());
    }

    #[test]
    fn script_levels_map_to_log_levels() {
        assert_eq!(LogLevel::from_script("info_final"), LogLevel::Success);
        assert_eq!(LogLevel::from_script("ERROR"), LogLevel::Error);
        assert_eq!(LogLevel::from_script("warning"), LogLevel::Warning);
        assert_eq!(LogLevel::from_script("debug"), LogLevel::Info);
    }

    #[test]
    fn log_is_newest_first_and_bounded() {
        let mut log = ActivityLog::default();
        for i in 0..(MAX_LOG_ENTRIES + 5) {
            log.push(LogLevel::Info, format!("line {i}"));
        }
        assert_eq!(log.entries().len(), MAX_LOG_ENTRIES);
        assert_eq!(log.latest().unwrap().message, format!("line {}", MAX_LOG_ENTRIES + 4));
    }
}
