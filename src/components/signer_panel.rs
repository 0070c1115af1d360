use eframe::egui;
use egui::{Color32, CursorIcon, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Vec2};

use super::dialogs::{PanelColors, accent_separator, section_label, status_dot, status_label};
use super::log_view;
use crate::ops::bridge::{ProcessRequest, RgbaPreview, SaveRequest, SignerEntry, SignerKind, SignerRef};
use crate::ops::geometry::{ContainerRect, PlacementField};
use crate::ops::interaction::{
    self, HANDLE_HIT_RADIUS, HANDLE_SIZE, InteractionMode, PointerTarget, ResizeHandle,
};
use crate::session::{PreviewTicket, SignerSession};

/// Backend work requested by the panel this frame.
#[derive(Clone, Debug, PartialEq)]
pub enum SignerAction {
    ReloadConfig,
    Preview(PreviewTicket),
    Save(SaveRequest),
    Process(ProcessRequest),
}

const CONTROLS_WIDTH: f32 = 290.0;
const UV_FULL: Rect = Rect {
    min: Pos2 { x: 0.0, y: 0.0 },
    max: Pos2 { x: 1.0, y: 1.0 },
};

struct PreviewTextures {
    generation: u64,
    ready: bool,
    page: Option<TextureHandle>,
    signature: Option<TextureHandle>,
}

/// Widget state that egui needs across frames. The placement itself lives
/// in [`SignerSession`].
#[derive(Default)]
pub struct SignerPanel {
    field_text: [String; 4],
    textures: Option<PreviewTextures>,
}

impl SignerPanel {
    pub fn show(&mut self, ui: &mut egui::Ui, session: &mut SignerSession) -> Vec<SignerAction> {
        let colors = PanelColors::from_ctx(ui.ctx());
        let mut actions = Vec::new();

        ui.horizontal_top(|ui| {
            ui.vertical(|ui| {
                ui.set_width(CONTROLS_WIDTH);
                self.show_controls(ui, session, &colors, &mut actions);
            });
            ui.separator();
            ui.vertical(|ui| {
                self.show_preview(ui, session, &colors);
            });
        });

        accent_separator(ui, &colors);
        section_label(ui, &colors, &t!("signer.section.log"));
        log_view::show(ui, "signer_log", &session.log, 140.0);

        actions
    }

    // ------------------------------------------------------------------
    // Controls column
    // ------------------------------------------------------------------

    fn show_controls(
        &mut self,
        ui: &mut egui::Ui,
        session: &mut SignerSession,
        colors: &PanelColors,
        actions: &mut Vec<SignerAction>,
    ) {
        section_label(ui, colors, &t!("signer.section.signer"));
        let mut pick = None;
        signer_combo(ui, "signer_responsavel_combo", &t!("signer.responsavel"), session, SignerKind::Responsavel, &mut pick);
        signer_combo(ui, "signer_driver_combo", &t!("signer.driver"), session, SignerKind::Driver, &mut pick);
        if let Some(choice) = pick
            && let Some(ticket) = session.select_signer(choice)
        {
            actions.push(SignerAction::Preview(ticket));
        }
        if session.driver_warning() {
            ui.colored_label(colors.warning, t!("signer.driver_warning"));
        }
        if ui.small_button(t!("signer.reload")).clicked() {
            actions.push(SignerAction::ReloadConfig);
        }

        accent_separator(ui, colors);
        section_label(ui, colors, &t!("signer.section.position"));
        let editable = session.placement().is_some() && !session.interaction().is_active();
        egui::Grid::new("signer_position_grid")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                for (i, &field) in PlacementField::all().iter().enumerate() {
                    ui.label(field_label(field));
                    let response = ui.add_enabled(
                        editable,
                        egui::TextEdit::singleline(&mut self.field_text[i]).desired_width(90.0),
                    );
                    // singleline edits drop focus on Enter, so this covers both commit paths
                    if response.lost_focus() {
                        session.commit_field(field, &self.field_text[i]);
                    }
                    if !response.has_focus() {
                        self.field_text[i] = session
                            .placement()
                            .map(|p| format!("{:.2}", p.get(field)))
                            .unwrap_or_default();
                    }
                    ui.end_row();
                }
            });
        ui.add_space(4.0);
        let save_text = if session.is_saving() {
            t!("signer.saving")
        } else {
            t!("signer.save")
        };
        if ui
            .add_enabled(session.can_save(), egui::Button::new(save_text))
            .clicked()
            && let Some(request) = session.begin_save()
        {
            actions.push(SignerAction::Save(request));
        }

        accent_separator(ui, colors);
        section_label(ui, colors, &t!("signer.section.process"));
        egui::Grid::new("signer_process_grid")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label(t!("signer.emissor"));
                party_combo(ui, "signer_emissor_combo", &session.config.responsaveis, &mut session.emissor);
                ui.end_row();
                ui.label(t!("signer.receptor"));
                party_combo(ui, "signer_receptor_combo", &session.config.responsaveis, &mut session.receptor);
                ui.end_row();
            });
        ui.add_space(4.0);
        let process_text = if session.is_processing() {
            t!("signer.processing")
        } else {
            t!("signer.process")
        };
        if ui
            .add_enabled(session.can_process(), egui::Button::new(process_text))
            .clicked()
            && let Some(request) = session.begin_process()
        {
            actions.push(SignerAction::Process(request));
        }

        ui.add_space(8.0);
        status_dot(ui, colors.for_status(session.status), &status_label(session.status));
    }

    // ------------------------------------------------------------------
    // Preview canvas
    // ------------------------------------------------------------------

    fn show_preview(&mut self, ui: &mut egui::Ui, session: &mut SignerSession, colors: &PanelColors) {
        let size = Vec2::new(ui.available_width().max(200.0), ui.available_height().clamp(320.0, 620.0));
        let (rect, response) = ui.allocate_exact_size(size, Sense::click_and_drag());
        session.resize_container(ContainerRect::new(rect.width(), rect.height()));
        self.sync_textures(ui.ctx(), session);

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 4.0, ui.visuals().extreme_bg_color);

        let placeholder = if session.is_loading_preview() {
            Some((t!("signer.preview.loading"), colors.text_muted))
        } else if let Some(err) = session.preview_error() {
            Some((t!("signer.preview.failed", error = err), colors.error))
        } else if session.selection().is_none() {
            Some((t!("signer.preview.select"), colors.text_muted))
        } else if session.layout().is_none() {
            Some((t!("signer.preview.no_document"), colors.text_muted))
        } else {
            None
        };
        if let Some((text, color)) = placeholder {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                text,
                egui::FontId::proportional(14.0),
                color,
            );
        }

        let textures = self.textures.as_ref();
        if let Some(layout) = session.layout()
            && let Some(page) = textures.and_then(|t| t.page.as_ref())
        {
            let r = layout.render;
            let page_rect = Rect::from_min_size(
                rect.min + Vec2::new(r.offset_x, r.offset_y),
                Vec2::new(r.width, r.height),
            );
            painter.image(page.id(), page_rect, UV_FULL, Color32::WHITE);
        }

        if let Some(o) = session.overlay() {
            let overlay_rect =
                Rect::from_min_size(rect.min + Vec2::new(o.left, o.top), Vec2::new(o.width, o.height));
            if let Some(sig) = textures.and_then(|t| t.signature.as_ref()) {
                painter.image(sig.id(), overlay_rect, UV_FULL, Color32::from_white_alpha(230));
            }
            painter.rect_filled(overlay_rect, 0.0, colors.accent_faint);
            painter.rect_stroke(overlay_rect, 0.0, Stroke::new(1.5, colors.accent));
            for handle in ResizeHandle::all() {
                let (hx, hy) = handle.position(&o);
                let handle_rect =
                    Rect::from_center_size(rect.min + Vec2::new(hx, hy), Vec2::splat(HANDLE_SIZE));
                painter.rect_filled(handle_rect, 1.0, colors.accent);
                painter.rect_stroke(handle_rect, 1.0, Stroke::new(1.0, Color32::WHITE));
            }
        }

        self.handle_pointer(ui, rect, &response, session);
    }

    /// Feeds container-relative pointer events into the session. Release
    /// anywhere ends the gesture.
    fn handle_pointer(
        &self,
        ui: &egui::Ui,
        rect: Rect,
        response: &egui::Response,
        session: &mut SignerSession,
    ) {
        let (pressed, released, pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let local = pos.map(|p| (p.x - rect.min.x, p.y - rect.min.y));

        if pressed
            && response.hovered()
            && let Some((x, y)) = local
        {
            session.pointer_down(x, y);
        }
        if session.interaction().is_active()
            && let Some((x, y)) = local
        {
            session.pointer_move(x, y);
        }
        if released {
            session.pointer_up();
        }

        let cursor = match session.interaction().mode {
            InteractionMode::Dragging => Some(CursorIcon::Grabbing),
            InteractionMode::Resizing(handle) => Some(resize_cursor(handle)),
            InteractionMode::Idle if response.hovered() => match (session.overlay(), local) {
                (Some(o), Some((x, y))) => match interaction::hit_test(&o, x, y, HANDLE_HIT_RADIUS) {
                    Some(PointerTarget::Body) => Some(CursorIcon::Grab),
                    Some(PointerTarget::Handle(handle)) => Some(resize_cursor(handle)),
                    None => None,
                },
                _ => None,
            },
            InteractionMode::Idle => None,
        };
        if let Some(cursor) = cursor {
            ui.ctx().set_cursor_icon(cursor);
        }
    }

    /// Upload page and signature images once per loaded preview.
    fn sync_textures(&mut self, ctx: &egui::Context, session: &SignerSession) {
        let generation = session.preview_generation();
        let ready = session.preview().is_some();
        if self
            .textures
            .as_ref()
            .is_some_and(|t| t.generation == generation && t.ready == ready)
        {
            return;
        }
        let preview = session.preview();
        self.textures = Some(PreviewTextures {
            generation,
            ready,
            page: preview
                .and_then(|p| p.page.as_ref())
                .map(|img| load_texture(ctx, "signer_page", img)),
            signature: preview
                .and_then(|p| p.signature.as_ref())
                .map(|img| load_texture(ctx, "signer_signature", img)),
        });
    }
}

fn load_texture(ctx: &egui::Context, name: &str, img: &RgbaPreview) -> TextureHandle {
    let color = egui::ColorImage::from_rgba_unmultiplied(
        [img.width as usize, img.height as usize],
        &img.pixels,
    );
    ctx.load_texture(name, color, TextureOptions::LINEAR)
}

fn resize_cursor(handle: ResizeHandle) -> CursorIcon {
    match handle {
        ResizeHandle::N => CursorIcon::ResizeNorth,
        ResizeHandle::S => CursorIcon::ResizeSouth,
        ResizeHandle::E => CursorIcon::ResizeEast,
        ResizeHandle::W => CursorIcon::ResizeWest,
        ResizeHandle::NE => CursorIcon::ResizeNorthEast,
        ResizeHandle::NW => CursorIcon::ResizeNorthWest,
        ResizeHandle::SE => CursorIcon::ResizeSouthEast,
        ResizeHandle::SW => CursorIcon::ResizeSouthWest,
    }
}

fn field_label(field: PlacementField) -> String {
    match field {
        PlacementField::X => t!("signer.field.x"),
        PlacementField::Y => t!("signer.field.y"),
        PlacementField::W => t!("signer.field.w"),
        PlacementField::H => t!("signer.field.h"),
    }
}

fn entry_label(entry: &SignerEntry) -> String {
    if entry.has_position_defined {
        entry.label().to_string()
    } else {
        format!("{} {}", entry.label(), t!("signer.no_position"))
    }
}

/// One picker per signer kind. Both share the session's single selection,
/// so picking in one clears the other.
fn signer_combo(
    ui: &mut egui::Ui,
    id: &str,
    label: &str,
    session: &SignerSession,
    kind: SignerKind,
    pick: &mut Option<Option<SignerRef>>,
) {
    let entries = match kind {
        SignerKind::Driver => &session.config.drivers,
        SignerKind::Responsavel => &session.config.responsaveis,
    };
    let current = session.selection().filter(|s| s.kind == kind);
    let selected_text = current
        .and_then(|s| entries.iter().find(|e| e.name == s.name))
        .map(entry_label)
        .unwrap_or_else(|| t!("signer.none"));

    ui.label(label);
    egui::ComboBox::from_id_source(id)
        .width(CONTROLS_WIDTH - 10.0)
        .selected_text(selected_text)
        .show_ui(ui, |ui| {
            if ui.selectable_label(current.is_none(), t!("signer.none")).clicked() && current.is_some() {
                *pick = Some(None);
            }
            for entry in entries {
                let is_current = current.is_some_and(|s| s.name == entry.name);
                if ui.selectable_label(is_current, entry_label(entry)).clicked() && !is_current {
                    *pick = Some(Some(SignerRef::new(entry.name.clone(), kind)));
                }
            }
        });
}

fn party_combo(ui: &mut egui::Ui, id: &str, entries: &[SignerEntry], value: &mut Option<String>) {
    let selected_text = value
        .as_deref()
        .and_then(|name| entries.iter().find(|e| e.name == name))
        .map(|e| e.label().to_string())
        .unwrap_or_else(|| t!("signer.none"));
    egui::ComboBox::from_id_source(id)
        .width(170.0)
        .selected_text(selected_text)
        .show_ui(ui, |ui| {
            ui.selectable_value(value, None, t!("signer.none"));
            for entry in entries {
                ui.selectable_value(value, Some(entry.name.clone()), entry.label());
            }
        });
}
