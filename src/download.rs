use crate::types::ArchiveFormat;
use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::Archive;

/// Streams `url` into `local_path`. A non-success status or a body shorter
/// than the announced length is an error; nothing is retried.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    local_path: &Path,
    show_progress: bool,
) -> Result<u64> {
    tracing::info!("Downloading {}", url);

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("Server responded with {}", status));
    }
    let total_size = response.content_length();

    let pb = if show_progress {
        ProgressBar::new(total_size.unwrap_or(0))
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message("Downloading");

    let mut file = fs::File::create(local_path)
        .with_context(|| format!("Could not create {}", local_path.display()))?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush()?;

    if let Some(expected) = total_size {
        if downloaded != expected {
            pb.abandon_with_message("Download truncated");
            return Err(anyhow!(
                "Download truncated: received {} of {} bytes",
                downloaded,
                expected
            ));
        }
    }

    pb.finish_with_message("Download complete");
    tracing::debug!("Downloaded {} bytes to {}", downloaded, local_path.display());
    Ok(downloaded)
}

pub fn extract_archive(archive_path: &Path, extract_dir: &Path, format: ArchiveFormat) -> Result<()> {
    tracing::info!(
        "Extracting {}",
        archive_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    );

    fs::create_dir_all(extract_dir)?;
    match format {
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, extract_dir),
        ArchiveFormat::Zip => extract_zip(archive_path, extract_dir),
    }
    .with_context(|| format!("Could not unpack {}", archive_path.display()))
}

fn extract_tar_gz(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    archive.unpack(extract_dir)?;

    Ok(())
}

fn extract_zip(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            tracing::warn!("Skipping unsafe path in zip: {}", entry.name());
            continue;
        };
        let outpath = extract_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
    }

    Ok(())
}

/// The top-level directory the archive unpacked into. GitHub names it
/// `<repo>-<ref>`, so the first directory starting with the package name wins.
pub fn find_extracted_root(extract_dir: &Path, package_name: &str) -> Result<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(extract_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with(package_name))
        .map(|e| e.path())
        .collect();
    matches.sort();

    match matches.len() {
        0 => Err(anyhow!(
            "Extraction structure unexpected: no directory starting with '{}' in archive",
            package_name
        )),
        1 => Ok(matches.remove(0)),
        n => {
            tracing::warn!(
                "Archive has {} directories starting with '{}'; using {}",
                n,
                package_name,
                matches[0].display()
            );
            Ok(matches.remove(0))
        }
    }
}
