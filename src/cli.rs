// ============================================================================
// MtrDesk CLI — headless access to the signature collaborator
// ============================================================================
//
// Usage examples:
//   MtrDesk --list-signers
//   MtrDesk --save-position --signer joao.png --kind driver --x 120 --y 640 --w 150 --h 75
//   MtrDesk --process --emissor "Maria.png" --receptor "Jose.png" --verbose
//
// No window is opened in CLI mode. Each command runs the collaborator once,
// synchronously, and maps its result to the process exit code.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;

use clap::Parser;

use crate::ops::bridge::{
    Notification, ProcessRequest, SaveRequest, ScriptBackend, SignatureBackend, SignerEntry,
    SignerKind, SignerRef,
};
use crate::ops::geometry::SignaturePlacement;
use crate::settings::AppSettings;

/// MtrDesk headless signature tool.
#[derive(Parser, Debug)]
#[command(
    name = "MtrDesk",
    about = "MtrDesk headless signature placement and batch stamping",
    group(
        clap::ArgGroup::new("mode")
            .required(true)
            .args(["list_signers", "process", "save_position"])
    )
)]
pub struct CliArgs {
    /// List driver and responsible signers. Entries without a stored position are marked.
    #[arg(long)]
    pub list_signers: bool,

    /// Stamp every PDF in the input folder using the emitter and receiver signatures.
    #[arg(long, requires_all = ["emissor", "receptor"])]
    pub process: bool,

    /// Emitter signature file (a responsible signer).
    #[arg(long, value_name = "FILE")]
    pub emissor: Option<String>,

    /// Receiver signature file (a responsible signer).
    #[arg(long, value_name = "FILE")]
    pub receptor: Option<String>,

    /// Persist a signature placement in document units.
    #[arg(long, requires_all = ["signer", "kind", "x", "y", "w", "h"])]
    pub save_position: bool,

    /// Signer name as listed by --list-signers.
    #[arg(long, value_name = "NAME")]
    pub signer: Option<String>,

    /// driver or responsavel.
    #[arg(long, value_name = "KIND")]
    pub kind: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub x: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    pub y: Option<f32>,
    #[arg(long)]
    pub w: Option<f32>,
    #[arg(long)]
    pub h: Option<f32>,

    /// Override the signature tool's working folder.
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Print collaborator status lines to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| matches!(a.as_str(), "--list-signers" | "--process" | "--save-position"))
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one CLI command and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let mut settings = AppSettings::load();
    if let Some(dir) = &args.base_dir {
        settings.signer_base_dir = dir.to_string_lossy().into_owned();
    }

    let (tx, rx) = mpsc::channel();
    let printer = args.verbose.then(|| {
        std::thread::spawn(move || {
            for notification in rx {
                eprintln!("{}", notification_line(&notification));
            }
        })
    });
    let backend = ScriptBackend::new(&settings, args.verbose.then_some(tx));

    let result = execute(&args, &backend);
    drop(backend);
    if let Some(handle) = printer {
        let _ = handle.join();
    }

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            crate::log_err!("CLI command failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Execute the selected command against `backend` and return what should be printed.
pub fn execute(args: &CliArgs, backend: &dyn SignatureBackend) -> Result<String, String> {
    if args.list_signers {
        let config = backend.initial_data().map_err(|e| e.to_string())?;
        let mut out = String::from("Drivers:\n");
        push_entries(&mut out, &config.drivers);
        out.push_str("Responsible:\n");
        push_entries(&mut out, &config.responsaveis);
        return Ok(out.trim_end().to_string());
    }

    if args.save_position {
        let signer = args.signer.clone().ok_or("--signer is required")?;
        let kind_text = args.kind.as_deref().ok_or("--kind is required")?;
        let kind = SignerKind::parse(kind_text)
            .ok_or_else(|| format!("unknown signer kind '{}' (expected driver or responsavel)", kind_text))?;
        let (Some(x), Some(y), Some(w), Some(h)) = (args.x, args.y, args.w, args.h) else {
            return Err("--x, --y, --w and --h are required".to_string());
        };
        if w <= 0.0 || h <= 0.0 {
            return Err("--w and --h must be positive".to_string());
        }
        let request = SaveRequest {
            signer: SignerRef::new(signer, kind),
            position: SignaturePlacement::new(x, y, w, h).to_position_args(),
        };
        return backend.save_position(&request).map_err(|e| e.to_string());
    }

    if args.process {
        let (Some(emissor), Some(receptor)) = (args.emissor.clone(), args.receptor.clone()) else {
            return Err("--emissor and --receptor are required".to_string());
        };
        let request = ProcessRequest {
            emissor_file: emissor,
            receptor_file: receptor,
        };
        return backend.process_documents(&request).map_err(|e| e.to_string());
    }

    Err("no command given".to_string())
}

fn notification_line(notification: &Notification) -> String {
    match notification {
        Notification::Status(message) => format!("  {}", message),
        Notification::Error(message) => format!("  error: {}", message),
    }
}

fn push_entries(out: &mut String, entries: &[SignerEntry]) {
    if entries.is_empty() {
        out.push_str("  (none)\n");
    }
    for entry in entries {
        let marker = if entry.has_position_defined { "" } else { "  (no position)" };
        out.push_str(&format!("  {}{}\n", entry.label(), marker));
    }
}
