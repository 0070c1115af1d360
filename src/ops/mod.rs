// ============================================================================
// OPS MODULE — headless logic behind both windows
// ============================================================================
//
//   geometry.rs    — letterbox layout, document ⇄ screen mapping
//   interaction.rs — drag / 8-handle resize state machine and clamping
//   bridge.rs      — signature collaborator: folders, commands, payloads
//   automation.rs  — MTR download script runner and its form state
// ============================================================================

pub mod automation;
pub mod bridge;
pub mod geometry;
pub mod interaction;
