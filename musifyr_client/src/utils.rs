use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::artifact::{ArtifactHandle, ArtifactStore};

/// Writes the bytes behind `handle` to `path`. Fails if the handle has
/// already been released.
pub fn save_audio(
    store: &ArtifactStore,
    handle: &ArtifactHandle,
    path: &Path,
) -> Result<usize, Box<dyn std::error::Error>> {
    let bytes = store
        .resolve(handle)
        .ok_or_else(|| format!("{} has already been released", handle.uri()))?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    println!("✅ {} written ({} bytes).", path.display(), bytes.len());
    Ok(bytes.len())
}
