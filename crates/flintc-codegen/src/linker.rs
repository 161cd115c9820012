//! System linker integration for producing executables from object files.
//!
//! Links LLVM-generated `.o` files into standalone executables using
//! the system `cc` command with platform-specific flags. This module was
//! declared but never filled in before object emission existed; DESIGN.md
//! records the "shell out to the platform linker driver" grounding.

use std::path::Path;
use std::process::Command;

use crate::error::CodegenError;

/// Invokes the system `cc` to link a single object file into an executable.
///
/// `cc` is used rather than driving `ld` directly: it supplies the correct
/// C runtime startup objects and libc search paths for the host platform,
/// which the generated object needs for the libc externs declared in
/// `runtime.rs` (`printf`, `malloc`, `getenv`, ...).
pub fn link_executable(object_path: &Path, output_path: &Path, debug_symbols: bool) -> Result<(), CodegenError> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut cmd = Command::new("cc");
    cmd.arg(object_path).arg("-o").arg(output_path).arg("-lm");
    if debug_symbols {
        cmd.arg("-g");
    } else {
        cmd.arg("-s");
    }

    let output = cmd
        .output()
        .map_err(|e| CodegenError::LinkerFailed(format!("failed to invoke `cc`: {}", e)))?;

    if !output.status.success() {
        return Err(CodegenError::LinkerFailed(format!(
            "cc exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_object_file_reports_linker_failure() {
        let result = link_executable(&PathBuf::from("/nonexistent/does-not-exist.o"), &PathBuf::from("/tmp/flintc-link-test-out"), false);
        assert!(result.is_err());
    }
}
