// GUI-subsystem binary: no console window is ever allocated by Windows.
// • GUI mode: nothing extra needed.
// • CLI mode (--list-signers / --process / --save-position): AttachConsole(ATTACH_PARENT_PROCESS)
//   attaches to the launching terminal, then CONOUT$/CONIN$ are reopened so println!/eprintln!
//   reach it (SUBSYSTEM:WINDOWS leaves the std handles invalid).
#![windows_subsystem = "windows"]

use eframe::egui;
use mtrdesk::app::MtrDeskApp;
use mtrdesk::settings::AppSettings;
use mtrdesk::{cli, i18n, logger};

fn main() -> Result<(), eframe::Error> {
    // -- Windows console management ------------------------------------
    #[cfg(target_os = "windows")]
    if cli::CliArgs::is_cli_mode() {
        attach_parent_console();
    }

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        i18n::init(&AppSettings::load().language);
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = AppSettings::load();
    i18n::init(&settings.language);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([850.0, 950.0])
            .with_min_inner_size([640.0, 560.0])
            .with_title("MtrDesk"),
        ..Default::default()
    };

    eframe::run_native(
        "MtrDesk",
        options,
        Box::new(move |cc| Box::new(MtrDeskApp::new(cc, settings))),
    )
}

/// Attach to the launching terminal and reconnect the std handles so that
/// println!/eprintln! reach it from a SUBSYSTEM:WINDOWS binary.
#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(dwProcessId: u32) -> i32;
        fn SetStdHandle(nStdHandle: u32, hHandle: isize) -> i32;
        fn CreateFileW(
            lpFileName: *const u16,
            dwDesiredAccess: u32,
            dwShareMode: u32,
            lpSecurityAttributes: *const std::ffi::c_void,
            dwCreationDisposition: u32,
            dwFlagsAndAttributes: u32,
            hTemplateFile: isize,
        ) -> isize;
    }
    const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
    const GENERIC_READ: u32 = 0x8000_0000;
    const GENERIC_WRITE: u32 = 0x4000_0000;
    const FILE_SHARE_READ_WRITE: u32 = 0x0000_0003;
    const OPEN_EXISTING: u32 = 3;
    const STD_INPUT_HANDLE: u32 = 0xFFFF_FFF6_u32; // -10
    const STD_OUTPUT_HANDLE: u32 = 0xFFFF_FFF5_u32; // -11
    const STD_ERROR_HANDLE: u32 = 0xFFFF_FFF4_u32; // -12
    const INVALID_HANDLE_VALUE: isize = -1;
    unsafe {
        AttachConsole(ATTACH_PARENT_PROCESS);
        // Reopen CONOUT$ / CONIN$ so the process's std handles are valid.
        let conout: Vec<u16> = "CONOUT$\0".encode_utf16().collect();
        let conin: Vec<u16> = "CONIN$\0".encode_utf16().collect();
        let hout = CreateFileW(
            conout.as_ptr(),
            GENERIC_WRITE,
            FILE_SHARE_READ_WRITE,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            0,
        );
        if hout != INVALID_HANDLE_VALUE {
            SetStdHandle(STD_OUTPUT_HANDLE, hout);
            SetStdHandle(STD_ERROR_HANDLE, hout);
        }
        let hin = CreateFileW(
            conin.as_ptr(),
            GENERIC_READ,
            FILE_SHARE_READ_WRITE,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            0,
        );
        if hin != INVALID_HANDLE_VALUE {
            SetStdHandle(STD_INPUT_HANDLE, hin);
        }
    }
}
