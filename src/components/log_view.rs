use eframe::egui;

use super::dialogs::PanelColors;
use crate::session::ActivityLog;

/// Scrollable activity log, newest entry on top.
pub fn show(ui: &mut egui::Ui, id: &str, log: &ActivityLog, height: f32) {
    let colors = PanelColors::from_ctx(ui.ctx());
    let default = ui.visuals().text_color();
    egui::Frame::group(ui.style()).show(ui, |ui| {
        egui::ScrollArea::vertical()
            .id_source(id)
            .max_height(height)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                if log.is_empty() {
                    ui.label(egui::RichText::new(t!("log.empty")).color(colors.text_muted).italics());
                    return;
                }
                for entry in log.entries() {
                    ui.label(
                        egui::RichText::new(&entry.message)
                            .monospace()
                            .color(colors.for_level(entry.level, default)),
                    );
                }
            });
    });
}
