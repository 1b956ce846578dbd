use std::path::Path;

use anyhow::Result;

/// Creates the directory a file will be placed in, if it is missing
pub fn ensure_parent_exists(file: &Path) -> Result<()> {
    let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.exists() {
        if !parent.canonicalize()?.is_dir() {
            error!("{parent:?} already exists, and is a file!");
            bail!("parent of {file:?} is not a directory");
        }
    } else {
        info!("Creating directory {parent:?}");
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
