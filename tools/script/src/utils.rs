use std::fs;
use std::os::unix::prelude::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Files capturing the output of a run script.
#[derive(Clone, Debug)]
pub struct OutputFiles {
    /// Captured standard output.
    pub stdout: PathBuf,
    /// Captured standard error.
    pub stderr: PathBuf,
}

/// Writes `contents` to `path` as an executable script.
pub fn write_run_script(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, contents)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Runs the script at `path` with bash from `work_dir`, capturing its output
/// in `<output_prefix>.out` and `<output_prefix>.err`.
pub fn execute_run_script(
    path: impl AsRef<Path>,
    work_dir: impl AsRef<Path>,
    output_prefix: &str,
) -> Result<OutputFiles> {
    let path = path.as_ref();
    let work_dir = work_dir.as_ref();

    let stdout = work_dir.join(format!("{output_prefix}.out"));
    let stderr = work_dir.join(format!("{output_prefix}.err"));
    let out_file = fs::File::create(&stdout)?;
    let err_file = fs::File::create(&stderr)?;

    let status = Command::new("bash")
        .arg(path)
        .current_dir(work_dir)
        .stdout(out_file)
        .stderr(err_file)
        .status()?;

    if !status.success() {
        tracing::error!(script = ?path, %status, stderr = ?stderr, "run script failed");
        return Err(Error::Failed {
            script: path.to_path_buf(),
            status,
        });
    }

    Ok(OutputFiles { stdout, stderr })
}
