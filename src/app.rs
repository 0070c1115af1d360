use crate::components::automation_panel::{self, AutomationAction};
use crate::components::dialogs::{AboutDialog, SettingsDialog};
use crate::components::signer_panel::{SignerAction, SignerPanel};
use crate::ipc::{SignerDispatcher, SignerMessage};
use crate::ops::automation::{self, AutomationMessage, AutomationState};
use crate::ops::bridge::{Notification, ScriptBackend, SignatureBackend};
use crate::session::SignerSession;
use crate::settings::AppSettings;
use eframe::egui;
use std::sync::{Arc, mpsc};
use std::time::Duration;

/// Poll interval while background work is outstanding.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct MtrDeskApp {
    settings: AppSettings,

    // -- MTR automation window --
    automation: AutomationState,
    automation_sender: mpsc::Sender<AutomationMessage>,
    automation_receiver: mpsc::Receiver<AutomationMessage>,

    // -- Signature placement window --
    signer_open: bool,
    signer: SignerSession,
    signer_panel: SignerPanel,
    dispatcher: SignerDispatcher,
    notification_sender: mpsc::Sender<Notification>,
    notification_receiver: mpsc::Receiver<Notification>,

    about: AboutDialog,
    settings_dialog: SettingsDialog,
}

impl MtrDeskApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        let (automation_sender, automation_receiver) = mpsc::channel();
        let (notification_sender, notification_receiver) = mpsc::channel();
        let dispatcher = SignerDispatcher::new(build_backend(&settings, &notification_sender));

        let mut automation = AutomationState::new();
        automation.log_info(t!("automation.log.ready"));

        Self {
            settings,
            automation,
            automation_sender,
            automation_receiver,
            signer_open: false,
            signer: SignerSession::new(),
            signer_panel: SignerPanel::default(),
            dispatcher,
            notification_sender,
            notification_receiver,
            about: AboutDialog::default(),
            settings_dialog: SettingsDialog::default(),
        }
    }

    fn open_signer(&mut self) {
        if self.signer_open {
            return;
        }
        crate::log_info!("Opening signature placement window");
        self.signer_open = true;
        self.reload_signer_config();
    }

    fn reload_signer_config(&mut self) {
        self.signer.begin_config_load();
        self.dispatcher.load_config();
    }

    fn apply_settings(&mut self, settings: AppSettings) {
        if settings.language.is_empty() {
            crate::i18n::set_language(&crate::i18n::detect_system_language());
        } else {
            crate::i18n::set_language(&settings.language);
        }
        settings.save();
        self.dispatcher
            .set_backend(build_backend(&settings, &self.notification_sender));
        self.settings = settings;
        self.automation.log_info(t!("settings.saved"));
    }

    fn handle_automation_action(&mut self, action: AutomationAction) {
        match action {
            AutomationAction::Start(config) => {
                automation::start(&self.settings, &config, self.automation_sender.clone());
            }
            AutomationAction::OpenSigner => self.open_signer(),
            AutomationAction::ShowAbout => self.about.open = true,
            AutomationAction::ShowSettings => self.settings_dialog.open_with(&self.settings),
        }
    }

    fn handle_signer_action(&mut self, action: SignerAction) {
        match action {
            SignerAction::ReloadConfig => self.reload_signer_config(),
            SignerAction::Preview(ticket) => self.dispatcher.request_preview(ticket),
            SignerAction::Save(request) => self.dispatcher.save(request),
            SignerAction::Process(request) => self.dispatcher.process(request),
        }
    }

    /// Drain every channel. All session mutation happens here or in the panels.
    fn poll_background(&mut self) {
        while let Ok(msg) = self.automation_receiver.try_recv() {
            self.automation.handle(msg);
        }

        while let Some(msg) = self.dispatcher.try_recv() {
            match msg {
                SignerMessage::ConfigLoaded(result) => self.signer.finish_config_load(result),
                SignerMessage::PreviewLoaded { ticket, result } => {
                    self.signer.finish_preview(&ticket, result);
                }
                SignerMessage::PositionSaved(result) => {
                    if self.signer.finish_save(result) {
                        self.reload_signer_config();
                    }
                }
                SignerMessage::DocumentsProcessed(result) => self.signer.finish_process(result),
            }
        }

        while let Ok(notification) = self.notification_receiver.try_recv() {
            match notification {
                Notification::Status(message) => self.signer.push_status(message),
                Notification::Error(message) => self.signer.push_error(message),
            }
        }
    }
}

fn build_backend(
    settings: &AppSettings,
    notifications: &mpsc::Sender<Notification>,
) -> Arc<dyn SignatureBackend> {
    Arc::new(ScriptBackend::new(settings, Some(notifications.clone())))
}

impl eframe::App for MtrDeskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_background();

        // --- Main window: MTR automation form ---
        let mut automation_action = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            automation_action = automation_panel::show(ui, &mut self.automation);
        });
        if let Some(action) = automation_action {
            self.handle_automation_action(action);
        }

        // --- Floating window: signature placement ---
        if self.signer_open {
            let mut open = self.signer_open;
            let mut signer_actions = Vec::new();
            egui::Window::new(t!("signer.title"))
                .id(egui::Id::new("signer_window"))
                .open(&mut open)
                .default_size([980.0, 760.0])
                .resizable(true)
                .show(ctx, |ui| {
                    signer_actions = self.signer_panel.show(ui, &mut self.signer);
                });
            for action in signer_actions {
                self.handle_signer_action(action);
            }
            if !open {
                self.signer.pointer_up();
                self.signer_open = false;
                crate::log_info!("Signature placement window closed");
            }
        }

        self.about.show(ctx);
        if let Some(settings) = self.settings_dialog.show(ctx) {
            self.apply_settings(settings);
        }

        if self.automation.is_running() || self.dispatcher.has_pending() {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
    }
}
