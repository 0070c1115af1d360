// ============================================================================
// COMPONENTS — egui widgets and panels
// ============================================================================
//
//   dialogs.rs          — shared panel styling, About and Settings windows
//   log_view.rs         — newest-first activity log widget
//   automation_panel.rs — MTR credentials form, progress, log
//   signer_panel.rs     — signer pickers, position fields, preview canvas
// ============================================================================

pub mod automation_panel;
pub mod dialogs;
pub mod log_view;
pub mod signer_panel;
