use crate::libdeck::db::{self, PackageIds};
use crate::libdeck::deck::DeckSpec;
use crate::libdeck::Result;
use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const COLLECTION_ENTRY: &str = "collection.anki2";
pub const MEDIA_ENTRY: &str = "media";

/// Writes `deck` to `output` as an `.apkg`.
///
/// The archive is assembled next to `output` and renamed into place once it
/// is complete, so a failed run never leaves a truncated package behind.
pub fn write_package(deck: &DeckSpec, output: &Path, ids: PackageIds) -> Result<()> {
    let now = Instant::now();
    let scratch = tempfile::tempdir()?;
    let collection_path = scratch.path().join(COLLECTION_ENTRY);
    db::create_db(&collection_path, deck, ids)?;
    let collection = fs::read(&collection_path)?;
    debug!("[Package] Collection is {} bytes", collection.len());

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let archive = create_archive(dir, output)?;
    let mut zip = ZipWriter::new(archive.as_file());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(COLLECTION_ENTRY, options)?;
    zip.write_all(&collection)?;
    zip.start_file(MEDIA_ENTRY, options)?;
    zip.write_all(b"{}")?;
    zip.finish()?;

    archive.persist(output)?;
    info!(
        "[Package] Wrote {} notes to {:?} in {} ms",
        deck.notes.len(),
        output,
        now.elapsed().as_millis()
    );
    Ok(())
}

/// Temp file for the archive that ends up with the mode a plain create would
/// give it (`0o666` less the umask), or the mode of the file it replaces.
fn create_archive(dir: &Path, output: &Path) -> Result<NamedTempFile> {
    #[allow(unused_mut)]
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let archive = builder.tempfile_in(dir)?;
    if let Ok(existing) = fs::metadata(output) {
        debug!("[Package] Keeping permissions of existing {:?}", output);
        archive.as_file().set_permissions(existing.permissions())?;
    }
    Ok(archive)
}
