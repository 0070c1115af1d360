//! MTR download automation — launches the portal script and streams its output.
//!
//! The script reads one JSON object (credentials + paths) from stdin and
//! answers with newline-delimited JSON on stdout:
//!
//! ```text
//! {"type":"log","payload":{"message":"...","level":"info"}}
//! {"type":"progress","payload":{"current":3,"total":10,"message":"..."}}
//! ```
//!
//! Anything else on stdout is ignored. stderr is surfaced as error log lines.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bridge::{BridgeError, interpreter_available};
use crate::session::{ActivityLog, LogLevel};
use crate::settings::AppSettings;

// ============================================================================
// CONFIGURATION SENT TO THE SCRIPT
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AutomationConfig {
    #[serde(rename = "CNPJ_EMPRESA")]
    pub cnpj_empresa: String,
    #[serde(rename = "CODIGO_OBRA")]
    pub codigo_obra: String,
    #[serde(rename = "CPF_USUARIO")]
    pub cpf_usuario: String,
    #[serde(rename = "SENHA_USUARIO")]
    pub senha_usuario: String,
    pub caminho_arquivo_excel: String,
    pub pasta_raiz_motoristas: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AutomationError {
    #[error("field \"{0}\" is required")]
    MissingField(&'static str),
}

impl AutomationConfig {
    /// `(wire key, value)` in form order.
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("CNPJ_EMPRESA", &self.cnpj_empresa),
            ("CODIGO_OBRA", &self.codigo_obra),
            ("CPF_USUARIO", &self.cpf_usuario),
            ("SENHA_USUARIO", &self.senha_usuario),
            ("caminho_arquivo_excel", &self.caminho_arquivo_excel),
            ("pasta_raiz_motoristas", &self.pasta_raiz_motoristas),
        ]
    }

    /// Every field is required. Reports the first empty one.
    pub fn validate(&self) -> Result<(), AutomationError> {
        match self.fields().into_iter().find(|(_, v)| v.is_empty()) {
            Some((key, _)) => Err(AutomationError::MissingField(key)),
            None => Ok(()),
        }
    }
}

// ============================================================================
// MESSAGES FROM THE SCRIPT
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(current: u64, total: u64, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            message: message.into(),
        }
    }

    /// 0–100. Zero when the total is unknown.
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64 / self.total as f64 * 100.0) as f32
        }
    }

    /// `current/total (P%)`
    pub fn label(&self) -> String {
        format!("{}/{} ({:.0}%)", self.current, self.total, self.percentage())
    }
}

#[derive(Deserialize)]
struct LogPayload {
    message: String,
    #[serde(default = "default_level")]
    level: String,
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
enum StdoutLine {
    Log(LogPayload),
    Progress(ProgressUpdate),
}

/// Event delivered from the automation thread to the UI.
#[derive(Clone, Debug, PartialEq)]
pub enum AutomationMessage {
    Log { message: String, level: String },
    Progress(ProgressUpdate),
    /// The process exited (exit code, if any). Always the last message of a run.
    Finished(Option<i32>),
}

/// Parse one stdout line. Blank, non-JSON and unknown-type lines give `None`.
pub fn parse_stdout_line(line: &str) -> Option<AutomationMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<StdoutLine>(line).ok()? {
        StdoutLine::Log(p) => Some(AutomationMessage::Log {
            message: p.message,
            level: p.level,
        }),
        StdoutLine::Progress(p) => Some(AutomationMessage::Progress(p)),
    }
}

// ============================================================================
// RUNNER
// ============================================================================

/// Launch the automation on a background thread. Every outcome — including
/// a missing interpreter or script — ends with `Finished` on `sender`.
pub fn start(settings: &AppSettings, config: &AutomationConfig, sender: mpsc::Sender<AutomationMessage>) {
    let python = settings.python_executable();
    let script = settings.automation_script();
    let payload = match serde_json::to_string(config) {
        Ok(p) => p,
        Err(e) => {
            let _ = sender.send(error_line(format!("Could not encode configuration: {e}")));
            let _ = sender.send(AutomationMessage::Finished(None));
            return;
        }
    };

    std::thread::spawn(move || {
        let code = match run(&python, &script, &payload, &sender) {
            Ok(code) => {
                let _ = sender.send(AutomationMessage::Log {
                    message: format!(
                        "MTR script finished with code {}.",
                        code.map_or_else(|| "?".to_string(), |c| c.to_string())
                    ),
                    level: "info".to_string(),
                });
                code
            }
            Err(e) => {
                let _ = sender.send(error_line(format!("[MtrDesk Error]: {e}")));
                None
            }
        };
        crate::log_info!("Automation run ended ({:?})", code);
        let _ = sender.send(AutomationMessage::Finished(code));
    });
}

fn error_line(message: String) -> AutomationMessage {
    AutomationMessage::Log {
        message,
        level: "error".to_string(),
    }
}

fn run(
    python: &Path,
    script: &Path,
    payload: &str,
    sender: &mpsc::Sender<AutomationMessage>,
) -> Result<Option<i32>, BridgeError> {
    if !interpreter_available(python) {
        return Err(BridgeError::InterpreterNotFound(python.to_path_buf()));
    }
    if !script.exists() {
        return Err(BridgeError::ScriptNotFound(PathBuf::from(script)));
    }

    crate::log_info!("Starting automation: {} {}", python.display(), script.display());
    let mut child = Command::new(python)
        .arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(BridgeError::Spawn)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(payload.as_bytes())?;
        // dropping stdin closes it so the script sees EOF
    }

    let stderr_thread = child.stderr.take().map(|mut stderr| {
        let tx = sender.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            while let Ok(n) = stderr.read(&mut buf) {
                if n == 0 {
                    break;
                }
                let chunk = String::from_utf8_lossy(&buf[..n]);
                let _ = tx.send(error_line(format!("[Python MTR Error]: {chunk}")));
            }
        })
    });

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if let Some(msg) = parse_stdout_line(&line) {
                let _ = sender.send(msg);
            }
        }
    }

    let status = child.wait()?;
    if let Some(handle) = stderr_thread {
        let _ = handle.join();
    }
    Ok(status.code())
}

// ============================================================================
// FORM STATE
// ============================================================================

/// State behind the automation window.
#[derive(Default)]
pub struct AutomationState {
    pub form: AutomationConfig,
    running: bool,
    pub progress: ProgressUpdate,
    pub log: ActivityLog,
}

impl AutomationState {
    pub fn new() -> Self {
        Self {
            progress: ProgressUpdate::new(0, 0, t!("automation.progress.waiting")),
            ..Default::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Validate the form and mark the run as started. Returns the config to
    /// hand to [`start`], or `None` if the form is incomplete or a run is active.
    pub fn begin_run(&mut self) -> Option<AutomationConfig> {
        if self.running {
            return None;
        }
        if let Err(AutomationError::MissingField(key)) = self.form.validate() {
            self.log
                .push(LogLevel::Error, t!("automation.log.missing_field", field = key));
            return None;
        }
        self.running = true;
        self.log.push(LogLevel::Success, t!("automation.log.starting"));
        self.progress = ProgressUpdate::new(0, 0, t!("automation.progress.starting"));
        Some(self.form.clone())
    }

    pub fn handle(&mut self, msg: AutomationMessage) {
        match msg {
            AutomationMessage::Log { message, level } => {
                self.log.push(LogLevel::from_script(&level), message);
            }
            AutomationMessage::Progress(p) => self.progress = p,
            AutomationMessage::Finished(_) => {
                self.running = false;
                self.progress = ProgressUpdate::new(0, 0, t!("automation.progress.finished"));
            }
        }
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.log.push(LogLevel::Info, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> AutomationConfig {
        AutomationConfig {
            cnpj_empresa: "00.000.000/0001-00".into(),
            codigo_obra: "42".into(),
            cpf_usuario: "000.000.000-00".into(),
            senha_usuario: "secret".into(),
            caminho_arquivo_excel: "/tmp/mtr.xlsx".into(),
            pasta_raiz_motoristas: "/tmp/motoristas".into(),
        }
    }

    #[test]
    fn config_serialises_with_wire_keys() {
        let json: serde_json::Value = serde_json::to_value(filled()).unwrap();
        assert_eq!(json["CNPJ_EMPRESA"], "00.000.000/0001-00");
        assert_eq!(json["SENHA_USUARIO"], "secret");
        assert_eq!(json["pasta_raiz_motoristas"], "/tmp/motoristas");
        assert_eq!(json.as_object().unwrap().len(), 6);
    }

    #[test]
    fn first_missing_field_is_reported() {
        assert_eq!(filled().validate(), Ok(()));
        let mut cfg = filled();
        cfg.cpf_usuario.clear();
        cfg.pasta_raiz_motoristas.clear();
        assert_eq!(cfg.validate(), Err(AutomationError::MissingField("CPF_USUARIO")));
    }

    #[test]
    fn stdout_lines_are_parsed_or_ignored() {
        assert_eq!(
            parse_stdout_line(r#"{"type":"log","payload":{"message":"hi","level":"warning"}}"#),
            Some(AutomationMessage::Log {
                message: "hi".into(),
                level: "warning".into()
            })
        );
        assert_eq!(
            parse_stdout_line(r#"{"type":"progress","payload":{"current":3,"total":4,"message":"MTR 3"}}"#),
            Some(AutomationMessage::Progress(ProgressUpdate::new(3, 4, "MTR 3")))
        );
        assert_eq!(
            parse_stdout_line(r#"{"type":"log","payload":{"message":"no level"}}"#),
            Some(AutomationMessage::Log {
                message: "no level".into(),
                level: "info".into()
            })
        );
        assert_eq!(parse_stdout_line(""), None);
        assert_eq!(parse_stdout_line("Traceback (most recent call last):"), None);
        assert_eq!(parse_stdout_line(r#"{"type":"other","payload":{}}"#), None);
    }

    #[test]
    fn progress_label_handles_unknown_total() {
        assert_eq!(ProgressUpdate::new(0, 0, "").label(), "0/0 (0%)");
        assert_eq!(ProgressUpdate::new(1, 3, "").label(), "1/3 (33%)");
        assert_eq!(ProgressUpdate::new(4, 4, "").percentage(), 100.0);
    }

    #[test]
    fn incomplete_form_never_starts() {
        let mut state = AutomationState::new();
        assert!(state.begin_run().is_none());
        assert!(!state.is_running());
        assert_eq!(state.log.latest().unwrap().level, LogLevel::Error);
    }

    #[test]
    fn run_lifecycle_toggles_controls() {
        let mut state = AutomationState::new();
        state.form = filled();
        assert_eq!(state.begin_run(), Some(filled()));
        assert!(state.is_running());
        assert!(state.begin_run().is_none());

        state.handle(AutomationMessage::Progress(ProgressUpdate::new(2, 5, "MTR 2")));
        assert_eq!(state.progress.current, 2);
        state.handle(AutomationMessage::Log {
            message: "portal down".into(),
            level: "error".into(),
        });
        assert_eq!(state.log.latest().unwrap().level, LogLevel::Error);

        state.handle(AutomationMessage::Finished(Some(0)));
        assert!(!state.is_running());
        assert_eq!((state.progress.current, state.progress.total), (0, 0));
    }

    #[test]
    fn missing_script_still_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings {
            python_executable: "python3".into(),
            automation_script: dir.path().join("absent.py").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel();
        start(&settings, &filled(), tx);
        let messages: Vec<AutomationMessage> = rx.iter().collect();
        assert!(matches!(messages.last(), Some(AutomationMessage::Finished(None))));
        assert!(messages.iter().any(|m| matches!(m, AutomationMessage::Log { level, .. } if level == "error")));
    }
}
