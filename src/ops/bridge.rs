//! Bridge to the signature collaborator script.
//!
//! The collaborator owns PDF rendering, stamping and the on-disk position
//! records. We only hand it positional arguments and read back its last
//! stdout line (JSON for queries, a confirmation sentence for commands).
//! Everything it prints on stderr while running is forwarded as a status
//! notification.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{PageGeometry, SignaturePlacement};
use crate::settings::AppSettings;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Python interpreter not found at {}", .0.display())]
    InterpreterNotFound(PathBuf),
    #[error("collaborator script not found at {}", .0.display())]
    ScriptNotFound(PathBuf),
    #[error("failed to start collaborator: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Collaborator's own message, shown verbatim.
    #[error("{0}")]
    ScriptFailed(String),
    #[error("invalid collaborator response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("invalid image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),
}

// ============================================================================
// SIGNERS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerKind {
    Driver,
    Responsavel,
}

impl SignerKind {
    /// Value passed to the collaborator as the signature type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignerKind::Driver => "driver",
            SignerKind::Responsavel => "responsavel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driver" | "motorista" => Some(SignerKind::Driver),
            "responsavel" | "responsável" => Some(SignerKind::Responsavel),
            _ => None,
        }
    }
}

/// Identity of a signer: the name the collaborator knows it by plus its category.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignerRef {
    pub name: String,
    pub kind: SignerKind,
}

impl SignerRef {
    pub fn new(name: impl Into<String>, kind: SignerKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignerEntry {
    pub name: String,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub has_position_defined: bool,
}

impl SignerEntry {
    /// Drivers are listed by file stem, responsible parties by display name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignerConfig {
    #[serde(default)]
    pub drivers: Vec<SignerEntry>,
    #[serde(default)]
    pub responsaveis: Vec<SignerEntry>,
}

impl SignerConfig {
    pub fn find(&self, signer: &SignerRef) -> Option<&SignerEntry> {
        let list = match signer.kind {
            SignerKind::Driver => &self.drivers,
            SignerKind::Responsavel => &self.responsaveis,
        };
        list.iter().find(|e| e.name == signer.name)
    }
}

// ============================================================================
// PREVIEW PAYLOAD
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl From<PositionRecord> for SignaturePlacement {
    fn from(p: PositionRecord) -> Self {
        SignaturePlacement::new(p.x, p.y, p.w, p.h)
    }
}

/// Raw `get_preview` response.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PreviewPayload {
    #[serde(default)]
    pub page_base64: Option<String>,
    #[serde(default)]
    pub page_width: Option<f32>,
    #[serde(default)]
    pub page_height: Option<f32>,
    #[serde(default)]
    pub position: Option<PositionRecord>,
    #[serde(default)]
    pub signature_base64: Option<String>,
}

/// Decoded RGBA pixels, ready to become a texture.
#[derive(Clone, Debug, PartialEq)]
pub struct RgbaPreview {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A preview with its images decoded off the UI thread.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedPreview {
    /// `None` when no source PDF is available.
    pub page: Option<RgbaPreview>,
    pub geometry: Option<PageGeometry>,
    pub position: Option<SignaturePlacement>,
    pub signature: Option<RgbaPreview>,
}

impl LoadedPreview {
    /// Geometry is only usable when a page image came with it.
    pub fn page_geometry(&self) -> Option<PageGeometry> {
        self.page.as_ref().and(self.geometry)
    }
}

fn decode_image(b64: &str) -> Result<RgbaPreview, BridgeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(b64.trim().as_bytes())?;
    let img = image::load_from_memory(&bytes)?.into_rgba8();
    let (width, height) = img.dimensions();
    Ok(RgbaPreview {
        width,
        height,
        pixels: img.into_raw(),
    })
}

impl PreviewPayload {
    /// Decode both images. An empty `page_base64` counts as absent.
    pub fn decode(self) -> Result<LoadedPreview, BridgeError> {
        let page = match self.page_base64.as_deref() {
            Some(b64) if !b64.is_empty() => Some(decode_image(b64)?),
            _ => None,
        };
        let signature = match self.signature_base64.as_deref() {
            Some(b64) if !b64.is_empty() => Some(decode_image(b64)?),
            _ => None,
        };
        let geometry = match (self.page_width, self.page_height) {
            (Some(w), Some(h)) => PageGeometry::new(w, h),
            _ => None,
        };
        Ok(LoadedPreview {
            page,
            geometry,
            position: self.position.map(SignaturePlacement::from),
            signature,
        })
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest {
    pub signer: SignerRef,
    /// `[x, y, w, h]` with two decimals.
    pub position: [String; 4],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessRequest {
    pub emissor_file: String,
    pub receptor_file: String,
}

/// Free-text notification pushed by a collaborator while it runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Status(String),
    Error(String),
}

impl Notification {
    /// Python's logging and tracebacks mark failures with a leading
    /// `ERROR`/`ERRO`/`Traceback`; everything else is progress chatter.
    pub fn from_stderr_line(line: &str) -> Self {
        let upper = line.trim_start().to_uppercase();
        if upper.starts_with("ERRO") || upper.starts_with("TRACEBACK") {
            Notification::Error(line.to_string())
        } else {
            Notification::Status(line.to_string())
        }
    }
}

/// The four operations the signer window depends on.
pub trait SignatureBackend: Send + Sync {
    fn initial_data(&self) -> Result<SignerConfig, BridgeError>;
    fn preview(&self, signer: &SignerRef) -> Result<PreviewPayload, BridgeError>;
    fn save_position(&self, request: &SaveRequest) -> Result<String, BridgeError>;
    fn process_documents(&self, request: &ProcessRequest) -> Result<String, BridgeError>;
}

// ============================================================================
// FOLDER LAYOUT
// ============================================================================

pub const RESPONSAVEIS_DIR: &str = "0 - RESPONSÁVEIS";
pub const MOTORISTAS_DIR: &str = "MOTORISTAS";

/// Working folders shared with the collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerFolders {
    pub input: PathBuf,
    pub output: PathBuf,
    pub subscriptions: PathBuf,
    pub driver_positions: PathBuf,
    pub responsavel_positions: PathBuf,
}

impl SignerFolders {
    pub fn under(base: &Path) -> Self {
        let data = base.join("data");
        Self {
            input: base.join("pdfs_entrada"),
            output: base.join("pdfs_saida"),
            subscriptions: base.join("assinaturas"),
            driver_positions: data.join("posicoes.txt"),
            responsavel_positions: data.join("responsaveis_posicoes.json"),
        }
    }

    /// Create every folder and seed empty position files. Existing files are left alone.
    pub fn ensure(base: &Path) -> Result<Self, BridgeError> {
        let folders = Self::under(base);
        std::fs::create_dir_all(&folders.input)?;
        std::fs::create_dir_all(&folders.output)?;
        std::fs::create_dir_all(folders.subscriptions.join(RESPONSAVEIS_DIR))?;
        std::fs::create_dir_all(folders.subscriptions.join(MOTORISTAS_DIR))?;
        if let Some(data) = folders.driver_positions.parent() {
            std::fs::create_dir_all(data)?;
        }
        if !folders.driver_positions.exists() {
            std::fs::write(&folders.driver_positions, "")?;
        }
        if !folders.responsavel_positions.exists() {
            std::fs::write(&folders.responsavel_positions, "{}")?;
        }
        Ok(folders)
    }

    pub fn position_file(&self, kind: SignerKind) -> &Path {
        match kind {
            SignerKind::Driver => &self.driver_positions,
            SignerKind::Responsavel => &self.responsavel_positions,
        }
    }
}

// ============================================================================
// SCRIPT BACKEND
// ============================================================================

/// Runs the collaborator as `<python> <script> <command> <args...>`.
pub struct ScriptBackend {
    python: PathBuf,
    script: PathBuf,
    base_dir: PathBuf,
    notifications: Option<mpsc::Sender<Notification>>,
}

impl ScriptBackend {
    pub fn new(settings: &AppSettings, notifications: Option<mpsc::Sender<Notification>>) -> Self {
        Self {
            python: settings.python_executable(),
            script: settings.signer_script(),
            base_dir: settings.signer_base_dir(),
            notifications,
        }
    }

    fn folders(&self) -> Result<SignerFolders, BridgeError> {
        SignerFolders::ensure(&self.base_dir)
    }

    fn run(&self, args: &[&str]) -> Result<String, BridgeError> {
        run_collaborator(&self.python, &self.script, args, self.notifications.as_ref())
    }
}

impl SignatureBackend for ScriptBackend {
    fn initial_data(&self) -> Result<SignerConfig, BridgeError> {
        let f = self.folders()?;
        let out = self.run(&[
            "get_signature_config",
            &f.subscriptions.to_string_lossy(),
            &f.driver_positions.to_string_lossy(),
            &f.responsavel_positions.to_string_lossy(),
        ])?;
        Ok(serde_json::from_str(&out)?)
    }

    fn preview(&self, signer: &SignerRef) -> Result<PreviewPayload, BridgeError> {
        let f = self.folders()?;
        let out = self.run(&[
            "get_preview",
            &signer.name,
            signer.kind.as_str(),
            &f.input.to_string_lossy(),
            &f.subscriptions.to_string_lossy(),
            &f.driver_positions.to_string_lossy(),
            &f.responsavel_positions.to_string_lossy(),
        ])?;
        Ok(serde_json::from_str(&out)?)
    }

    fn save_position(&self, request: &SaveRequest) -> Result<String, BridgeError> {
        let f = self.folders()?;
        let [x, y, w, h] = &request.position;
        self.run(&[
            "save_position",
            &request.signer.name,
            request.signer.kind.as_str(),
            x,
            y,
            w,
            h,
            &f.position_file(request.signer.kind).to_string_lossy(),
        ])
    }

    fn process_documents(&self, request: &ProcessRequest) -> Result<String, BridgeError> {
        let f = self.folders()?;
        self.run(&[
            "process_pdfs",
            &f.input.to_string_lossy(),
            &f.output.to_string_lossy(),
            &f.subscriptions.to_string_lossy(),
            &f.driver_positions.to_string_lossy(),
            &f.responsavel_positions.to_string_lossy(),
            &request.emissor_file,
            &request.receptor_file,
        ])
    }
}

/// The collaborator's answer: last line of its trimmed stdout.
pub fn last_output_line(stdout: &str) -> String {
    stdout
        .trim()
        .lines()
        .last()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or("Process completed.")
        .to_string()
}

/// Spawn one collaborator command and wait for it.
///
/// Exit code 0 yields [`last_output_line`]; anything else yields
/// `ScriptFailed` with the accumulated stderr (or the exit code when
/// stderr was empty).
pub fn run_collaborator(
    python: &Path,
    script: &Path,
    args: &[&str],
    notifications: Option<&mpsc::Sender<Notification>>,
) -> Result<String, BridgeError> {
    if !interpreter_available(python) {
        return Err(BridgeError::InterpreterNotFound(python.to_path_buf()));
    }
    if !script.exists() {
        return Err(BridgeError::ScriptNotFound(script.to_path_buf()));
    }

    crate::log_info!(
        "Collaborator: {} {} {}",
        python.display(),
        script.display(),
        args.first().copied().unwrap_or("")
    );

    let mut child = Command::new(python)
        .arg(script)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(BridgeError::Spawn)?;

    // stderr is drained on its own thread so a chatty collaborator can't
    // deadlock against a full stdout pipe.
    let stderr_reader = child.stderr.take().map(|stderr| {
        let tx = notifications.cloned();
        std::thread::spawn(move || {
            let mut collected = String::new();
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                let trimmed = line.trim();
                if !trimmed.is_empty()
                    && let Some(tx) = &tx
                {
                    let _ = tx.send(Notification::from_stderr_line(trimmed));
                }
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        })
    });

    let mut stdout = String::new();
    if let Some(mut out) = child.stdout.take() {
        out.read_to_string(&mut stdout)?;
    }
    let status = child.wait()?;
    let stderr = stderr_reader
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    crate::log_info!("Collaborator exited with {:?}", status.code());

    if status.success() {
        Ok(last_output_line(&stdout))
    } else {
        let stderr = stderr.trim();
        Err(BridgeError::ScriptFailed(if stderr.is_empty() {
            format!(
                "Python process failed with code {}",
                status.code().map_or_else(|| "?".to_string(), |c| c.to_string())
            )
        } else {
            stderr.to_string()
        }))
    }
}

/// Absolute / relative paths must exist; a bare program name is left to PATH lookup.
pub fn interpreter_available(python: &Path) -> bool {
    let bare = python.parent().is_none_or(|p| p.as_os_str().is_empty());
    bare || python.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_png_base64(width: u32, height: u32) -> String {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageOutputFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(buf)
    }

    #[test]
    fn config_parses_collaborator_json() {
        let json = r#"{"responsaveis":[{"name":"ana.png","displayName":"ana","has_position_defined":true}],
                       "drivers":[{"name":"JOAO","has_position_defined":false}]}"#;
        let cfg: SignerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.responsaveis[0].label(), "ana");
        assert_eq!(cfg.drivers[0].label(), "JOAO");
        assert!(!cfg.drivers[0].has_position_defined);
        assert!(cfg.find(&SignerRef::new("ana.png", SignerKind::Responsavel)).is_some());
        assert!(cfg.find(&SignerRef::new("ana.png", SignerKind::Driver)).is_none());
    }

    #[test]
    fn preview_without_page_decodes_to_no_geometry() {
        let json = r#"{"page_base64":null,"page_width":0,"page_height":0,"signature_base64":null,"position":null}"#;
        let payload: PreviewPayload = serde_json::from_str(json).unwrap();
        let loaded = payload.decode().unwrap();
        assert!(loaded.page.is_none());
        assert!(loaded.page_geometry().is_none());
        assert!(loaded.position.is_none());
    }

    #[test]
    fn preview_with_page_decodes_images_and_position() {
        let page_png = red_png_base64(3, 2);
        let sig_png = red_png_base64(1, 1);
        let json = format!(
            r#"{{"page_base64":"{page_png}","page_width":595.0,"page_height":842.0,
                "signature_base64":"{sig_png}","position":{{"x":1.5,"y":2,"w":3,"h":4}}}}"#
        );
        let payload: PreviewPayload = serde_json::from_str(&json).unwrap();
        let loaded = payload.decode().unwrap();
        let page = loaded.page.as_ref().unwrap();
        assert_eq!((page.width, page.height), (3, 2));
        assert_eq!(&page.pixels[..4], &[255, 0, 0, 255]);
        assert_eq!(loaded.page_geometry(), PageGeometry::new(595.0, 842.0));
        assert_eq!(loaded.position, Some(SignaturePlacement::new(1.5, 2.0, 3.0, 4.0)));
        assert!(loaded.signature.is_some());
    }

    #[test]
    fn bad_base64_is_reported() {
        let payload = PreviewPayload {
            page_base64: Some("not base64!!".into()),
            ..Default::default()
        };
        assert!(matches!(payload.decode(), Err(BridgeError::Base64(_))));
    }

    #[test]
    fn folders_are_created_once_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let folders = SignerFolders::ensure(dir.path()).unwrap();
        assert!(folders.input.is_dir());
        assert!(folders.output.is_dir());
        assert!(folders.subscriptions.join(RESPONSAVEIS_DIR).is_dir());
        assert!(folders.subscriptions.join(MOTORISTAS_DIR).is_dir());
        assert_eq!(std::fs::read_to_string(&folders.responsavel_positions).unwrap(), "{}");
        assert_eq!(std::fs::read_to_string(&folders.driver_positions).unwrap(), "");

        std::fs::write(&folders.driver_positions, "JOAO;1;2;3;4\n").unwrap();
        SignerFolders::ensure(dir.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&folders.driver_positions).unwrap(),
            "JOAO;1;2;3;4\n"
        );
        assert_eq!(folders.position_file(SignerKind::Driver), folders.driver_positions.as_path());
    }

    #[test]
    fn last_line_is_the_answer() {
        assert_eq!(last_output_line("working\nSaved.\n\n"), "Saved.");
        assert_eq!(last_output_line("   \n"), "Process completed.");
    }

    #[test]
    fn missing_script_is_reported_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_collaborator(
            Path::new("python3"),
            &dir.path().join("missing.py"),
            &["get_signature_config"],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::ScriptNotFound(_)));

        let err = run_collaborator(&dir.path().join("no-python"), &dir.path().join("x.py"), &[], None)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InterpreterNotFound(_)));
    }

    #[test]
    fn stderr_lines_are_classified() {
        assert_eq!(
            Notification::from_stderr_line("Processando 3 de 10"),
            Notification::Status("Processando 3 de 10".into())
        );
        assert!(matches!(Notification::from_stderr_line("ERROR:root:bad pdf"), Notification::Error(_)));
        assert!(matches!(Notification::from_stderr_line("Erro ao abrir"), Notification::Error(_)));
        assert!(matches!(
            Notification::from_stderr_line("Traceback (most recent call last):"),
            Notification::Error(_)
        ));
    }

    #[test]
    fn signer_kind_wire_names() {
        assert_eq!(SignerKind::Driver.as_str(), "driver");
        assert_eq!(SignerKind::parse("Responsavel"), Some(SignerKind::Responsavel));
        assert_eq!(SignerKind::parse("other"), None);
    }
}
