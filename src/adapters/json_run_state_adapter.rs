//! Writes the run state as pretty-printed JSON.

use std::fs;
use std::path::Path;

use crate::domain::error::DeskError;
use crate::domain::run_state::RunState;
use crate::ports::run_state_port::RunStatePort;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRunStateAdapter;

impl RunStatePort for JsonRunStateAdapter {
    fn write(&self, state: &RunState, output_path: &str) -> Result<(), DeskError> {
        let json = serde_json::to_string_pretty(state)?;
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DeskError::RunState {
                reason: format!("failed to create {}: {e}", parent.display()),
            })?;
        }
        fs::write(path, json).map_err(|e| DeskError::RunState {
            reason: format!("failed to write {output_path}: {e}"),
        })
    }
}
