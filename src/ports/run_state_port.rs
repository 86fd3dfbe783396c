//! Run state persistence port trait.

use crate::domain::error::DeskError;
use crate::domain::run_state::RunState;

pub trait RunStatePort {
    fn write(&self, state: &RunState, output_path: &str) -> Result<(), DeskError>;
}
