use eframe::egui;
use egui::{Color32, Pos2, Rect, Rounding, Sense, Vec2};

use crate::session::{LogLevel, StatusIndicator};
use crate::settings::AppSettings;

// ============================================================================
// SHARED PANEL STYLING
// ============================================================================

/// Colors pulled from the active egui visuals.
pub struct PanelColors {
    pub accent: Color32,
    pub accent_faint: Color32,
    pub text_muted: Color32,
    pub success: Color32,
    pub warning: Color32,
    pub error: Color32,
}

impl PanelColors {
    pub fn from_ctx(ctx: &egui::Context) -> Self {
        let v = ctx.style().visuals.clone();
        let accent = v.selection.stroke.color;
        let is_dark = v.dark_mode;
        let alpha = if is_dark { 35 } else { 25 };
        Self {
            accent,
            accent_faint: Color32::from_rgba_unmultiplied(accent.r(), accent.g(), accent.b(), alpha),
            text_muted: if is_dark {
                Color32::from_gray(160)
            } else {
                v.weak_text_color()
            },
            success: if is_dark {
                Color32::from_rgb(110, 200, 120)
            } else {
                Color32::from_rgb(30, 130, 50)
            },
            warning: v.warn_fg_color,
            error: v.error_fg_color,
        }
    }

    pub fn for_level(&self, level: LogLevel, default: Color32) -> Color32 {
        match level {
            LogLevel::Info => default,
            LogLevel::Success => self.success,
            LogLevel::Warning => self.warning,
            LogLevel::Error => self.error,
        }
    }

    pub fn for_status(&self, status: StatusIndicator) -> Color32 {
        match status {
            StatusIndicator::Idle => self.text_muted,
            StatusIndicator::Busy => self.accent,
            StatusIndicator::Success => self.success,
            StatusIndicator::Error => self.error,
        }
    }
}

/// Accent header bar with icon + title.
pub fn paint_panel_header(ui: &mut egui::Ui, colors: &PanelColors, icon: &str, title: &str) {
    let header_height = 32.0;
    let (rect, _) = ui.allocate_exact_size(
        Vec2::new(ui.available_width(), header_height),
        Sense::hover(),
    );
    let painter = ui.painter();
    painter.rect_filled(rect, Rounding::ZERO, colors.accent_faint);
    painter.rect_filled(
        Rect::from_min_size(rect.min, Vec2::new(3.0, header_height)),
        Rounding::ZERO,
        colors.accent,
    );
    painter.text(
        Pos2::new(rect.min.x + 12.0, rect.center().y),
        egui::Align2::LEFT_CENTER,
        format!("{} {}", icon, title),
        egui::FontId::proportional(14.0),
        colors.accent,
    );
}

pub fn section_label(ui: &mut egui::Ui, colors: &PanelColors, text: &str) {
    ui.add_space(6.0);
    ui.label(egui::RichText::new(text).size(11.0).color(colors.text_muted).strong());
    ui.add_space(2.0);
}

pub fn accent_separator(ui: &mut egui::Ui, colors: &PanelColors) {
    let (rect, _) = ui.allocate_exact_size(Vec2::new(ui.available_width(), 1.0), Sense::hover());
    ui.painter().rect_filled(rect, 0.0, colors.accent_faint);
}

/// Small filled dot followed by a label.
pub fn status_dot(ui: &mut egui::Ui, color: Color32, text: &str) {
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(Vec2::splat(12.0), Sense::hover());
        ui.painter().circle_filled(rect.center(), 5.0, color);
        ui.label(text);
    });
}

pub fn status_label(status: StatusIndicator) -> String {
    match status {
        StatusIndicator::Idle => t!("status.idle"),
        StatusIndicator::Busy => t!("status.busy"),
        StatusIndicator::Success => t!("status.success"),
        StatusIndicator::Error => t!("status.error"),
    }
}

// ============================================================================
// ABOUT
// ============================================================================

#[derive(Default)]
pub struct AboutDialog {
    pub open: bool,
}

impl AboutDialog {
    pub fn show(&mut self, ctx: &egui::Context) {
        if !self.open {
            return;
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Escape)) {
            self.open = false;
            return;
        }
        let mut close = false;
        egui::Window::new("about_dialog_internal")
            .title_bar(false)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.set_min_width(300.0);
                let colors = PanelColors::from_ctx(ctx);
                paint_panel_header(ui, &colors, "\u{2139}", &t!("about.title"));
                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    ui.heading("MtrDesk");
                    ui.label(t!("about.version", version = env!("CARGO_PKG_VERSION")));
                    ui.add_space(4.0);
                    ui.label(egui::RichText::new(t!("about.description")).color(colors.text_muted));
                    if let Some(path) = crate::logger::log_path() {
                        ui.add_space(4.0);
                        ui.label(
                            egui::RichText::new(t!("about.log_file", path = path.display()))
                                .small()
                                .color(colors.text_muted),
                        );
                    }
                    ui.add_space(8.0);
                    if ui.button(t!("common.close")).clicked() {
                        close = true;
                    }
                });
            });
        if close {
            self.open = false;
        }
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Edits a draft copy of the settings; returns the new value on Save.
#[derive(Default)]
pub struct SettingsDialog {
    pub open: bool,
    draft: AppSettings,
}

impl SettingsDialog {
    pub fn open_with(&mut self, current: &AppSettings) {
        self.draft = current.clone();
        self.open = true;
    }

    pub fn show(&mut self, ctx: &egui::Context) -> Option<AppSettings> {
        if !self.open {
            return None;
        }
        let mut result = None;
        let mut open = self.open;
        let mut close = false;
        egui::Window::new(t!("settings.title"))
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                let colors = PanelColors::from_ctx(ctx);
                section_label(ui, &colors, &t!("settings.section.paths"));
                egui::Grid::new("settings_paths_grid")
                    .num_columns(3)
                    .spacing([8.0, 6.0])
                    .show(ui, |ui| {
                        path_row(ui, &t!("settings.python"), &mut self.draft.python_executable, PathKind::File);
                        path_row(ui, &t!("settings.automation_script"), &mut self.draft.automation_script, PathKind::File);
                        path_row(ui, &t!("settings.signer_script"), &mut self.draft.signer_script, PathKind::File);
                        path_row(ui, &t!("settings.signer_base_dir"), &mut self.draft.signer_base_dir, PathKind::Folder);
                    });
                ui.label(
                    egui::RichText::new(t!("settings.empty_means_default"))
                        .size(11.0)
                        .color(colors.text_muted),
                );

                accent_separator(ui, &colors);
                section_label(ui, &colors, &t!("settings.section.language"));
                let selected = crate::i18n::LANGUAGES
                    .iter()
                    .find(|(code, _)| *code == self.draft.language)
                    .map(|(_, name)| name.to_string())
                    .unwrap_or_else(|| t!("settings.language_auto"));
                egui::ComboBox::from_id_source("settings_language_combo")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.draft.language, String::new(), t!("settings.language_auto"));
                        for (code, name) in crate::i18n::LANGUAGES {
                            ui.selectable_value(&mut self.draft.language, code.to_string(), *name);
                        }
                    });

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button(t!("common.save")).clicked() {
                        result = Some(self.draft.clone());
                        close = true;
                    }
                    if ui.button(t!("common.cancel")).clicked() {
                        close = true;
                    }
                });
            });
        self.open = open && !close;
        result
    }
}

#[derive(Clone, Copy)]
enum PathKind {
    File,
    Folder,
}

fn path_row(ui: &mut egui::Ui, label: &str, value: &mut String, kind: PathKind) {
    ui.label(label);
    ui.add(egui::TextEdit::singleline(value).desired_width(320.0));
    if ui.small_button("\u{1F4C2}").clicked() {
        let picked = match kind {
            PathKind::File => rfd::FileDialog::new().pick_file(),
            PathKind::Folder => rfd::FileDialog::new().pick_folder(),
        };
        if let Some(path) = picked {
            *value = path.to_string_lossy().into_owned();
        }
    }
    ui.end_row();
}
