use std::fs::File;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;
use zip::ZipArchive;

use super::error::DependencyError;
use super::paths::ArchiveKind;

/// 从压缩包中解出唯一的可执行文件到 `output`（阻塞调用）
pub fn extract_executable(
    archive_path: &Path,
    kind: &ArchiveKind,
    output: &Path,
) -> Result<(), DependencyError> {
    match kind {
        ArchiveKind::Zip { entry } => extract_zip_entry(archive_path, entry, output),
        ArchiveKind::Gzip => extract_gzip(archive_path, output),
    }
}

fn extract_zip_entry(
    archive_path: &Path,
    entry_name: &str,
    output: &Path,
) -> Result<(), DependencyError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let wanted = entry_name.to_lowercase();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if !entry.is_file() {
            continue;
        }

        // 压缩包里可能是 ffmpeg-xxx/bin/ffmpeg.exe 这种带目录的路径
        let normalized = entry.name().replace('\\', "/").to_lowercase();
        let file_name = normalized.rsplit('/').next().unwrap_or(&normalized);
        if file_name != wanted {
            continue;
        }

        debug!("解压 {} -> {:?}", entry.name(), output);
        let mut out = File::create(output)?;
        io::copy(&mut entry, &mut out)?;
        return Ok(());
    }

    Err(DependencyError::EntryNotFound {
        entry: entry_name.to_string(),
        archive: archive_path.to_path_buf(),
    })
}

fn extract_gzip(archive_path: &Path, output: &Path) -> Result<(), DependencyError> {
    let file = File::open(archive_path)?;
    let mut decoder = GzDecoder::new(file);
    let mut out = File::create(output)?;
    io::copy(&mut decoder, &mut out)?;
    debug!("gzip 解压完成 -> {:?}", output);
    Ok(())
}
