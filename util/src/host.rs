//! Host platform utility functions

use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "CENTERLINE_SW_ROOT";

/// Get the root directory of the software from the environment.
///
/// Sessions, parameter files and archives are all located relative to this
/// directory.
pub fn get_centerline_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
