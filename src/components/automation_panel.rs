use eframe::egui;

use super::dialogs::{PanelColors, accent_separator, paint_panel_header, section_label};
use super::log_view;
use crate::ops::automation::{AutomationConfig, AutomationState};

/// What the user asked for this frame.
#[derive(Clone, Debug, PartialEq)]
pub enum AutomationAction {
    Start(AutomationConfig),
    OpenSigner,
    ShowAbout,
    ShowSettings,
}

/// Main panel: credentials form, pickers, progress and log.
/// Every control is disabled while a run is active.
pub fn show(ui: &mut egui::Ui, state: &mut AutomationState) -> Option<AutomationAction> {
    let colors = PanelColors::from_ctx(ui.ctx());
    let idle = !state.is_running();
    let mut action = None;

    paint_panel_header(ui, &colors, "\u{1F4E5}", &t!("automation.title"));
    ui.add_space(6.0);

    section_label(ui, &colors, &t!("automation.section.credentials"));
    ui.add_enabled_ui(idle, |ui| {
        egui::Grid::new("automation_form_grid")
            .num_columns(3)
            .min_col_width(120.0)
            .spacing([8.0, 6.0])
            .show(ui, |ui| {
                text_row(ui, &t!("automation.field.cnpj"), &mut state.form.cnpj_empresa, false);
                text_row(ui, &t!("automation.field.obra"), &mut state.form.codigo_obra, false);
                text_row(ui, &t!("automation.field.cpf"), &mut state.form.cpf_usuario, false);
                text_row(ui, &t!("automation.field.password"), &mut state.form.senha_usuario, true);

                ui.label(t!("automation.field.excel"));
                ui.add(egui::TextEdit::singleline(&mut state.form.caminho_arquivo_excel).desired_width(360.0));
                if ui.button(t!("common.browse")).clicked()
                    && let Some(path) = rfd::FileDialog::new()
                        .add_filter(&t!("automation.filter.excel"), &["xlsx", "xls"])
                        .pick_file()
                {
                    state.form.caminho_arquivo_excel = path.to_string_lossy().into_owned();
                    state.log_info(t!("automation.log.excel_selected", path = path.display()));
                }
                ui.end_row();

                ui.label(t!("automation.field.drivers_folder"));
                ui.add(egui::TextEdit::singleline(&mut state.form.pasta_raiz_motoristas).desired_width(360.0));
                if ui.button(t!("common.browse")).clicked()
                    && let Some(path) = rfd::FileDialog::new().pick_folder()
                {
                    state.form.pasta_raiz_motoristas = path.to_string_lossy().into_owned();
                    state.log_info(t!("automation.log.folder_selected", path = path.display()));
                }
                ui.end_row();
            });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            let start = ui.add_sized(
                [180.0, 28.0],
                egui::Button::new(egui::RichText::new(t!("automation.start")).strong()),
            );
            if start.clicked()
                && let Some(config) = state.begin_run()
            {
                action = Some(AutomationAction::Start(config));
            }
            if ui.button(t!("automation.open_signer")).clicked() {
                action = Some(AutomationAction::OpenSigner);
            }
            if ui.button(t!("automation.settings")).clicked() {
                action = Some(AutomationAction::ShowSettings);
            }
            if ui.button(t!("automation.about")).clicked() {
                action = Some(AutomationAction::ShowAbout);
            }
        });
    });

    accent_separator(ui, &colors);
    section_label(ui, &colors, &t!("automation.section.progress"));
    let progress = &state.progress;
    ui.add(
        egui::ProgressBar::new(progress.percentage() / 100.0)
            .text(progress.label())
            .animate(state.is_running()),
    );
    if !progress.message.is_empty() {
        ui.label(egui::RichText::new(&progress.message).color(colors.text_muted));
    }

    accent_separator(ui, &colors);
    section_label(ui, &colors, &t!("automation.section.log"));
    let height = ui.available_height().max(120.0);
    log_view::show(ui, "automation_log", &state.log, height);

    action
}

fn text_row(ui: &mut egui::Ui, label: &str, value: &mut String, password: bool) {
    ui.label(label);
    ui.add(
        egui::TextEdit::singleline(value)
            .password(password)
            .desired_width(360.0),
    );
    ui.label("");
    ui.end_row();
}
