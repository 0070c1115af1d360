//! MtrDesk session log.
//!
//! One file per launch, truncated on open:
//!   Windows:  `%APPDATA%\MtrDesk\mtrdesk.log`
//!   Linux:    `$XDG_DATA_HOME/MtrDesk/mtrdesk.log` (or `~/.local/share/...`)
//!   macOS:    `~/Library/Application Support/MtrDesk/mtrdesk.log`
//!
//! Both windows mirror their activity logs here, and collaborator failures
//! are recorded even when no window shows them. Calls made before `init()`
//! (CLI mode, unit tests) go nowhere.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static SINK: OnceLock<Mutex<File>> = OnceLock::new();
static SINK_PATH: OnceLock<PathBuf> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

/// Where this session is logging, once `init()` succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK_PATH.get()
}

/// Append a raw line. I/O errors are dropped.
pub fn write_line(line: &str) {
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

pub fn write(level: Level, msg: &str) {
    write_line(&format_entry(unix_secs(), level, msg));
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    };
}

/// Open the log for this session and hook panics into it.
pub fn init() {
    let path = data_dir().join("MtrDesk").join("mtrdesk.log");
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("MtrDesk: cannot open log {}: {}", path.display(), e);
            return;
        }
    };
    let _ = SINK.set(Mutex::new(file));
    let _ = SINK_PATH.set(path.clone());

    write_line(&format!(
        "MtrDesk {} | unix {} | {}",
        env!("CARGO_PKG_VERSION"),
        unix_secs().unwrap_or(0),
        path.display()
    ));

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        previous(info);
    }));
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn unix_secs() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

fn format_entry(secs: Option<u64>, level: Level, msg: &str) -> String {
    let clock = secs.map_or_else(|| "--:--:--".to_string(), format_clock);
    format!("{} {:<5} {}", clock, level.tag(), msg)
}

/// UTC `HH:MM:SS`.
fn format_clock(secs: u64) -> String {
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, (day % 3600) / 60, day % 60)
}
