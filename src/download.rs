use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::classify;
use crate::request::WireRequest;
use crate::transport::{Fetched, Transport};
use crate::util::guess_filename_from_url;

fn resolve_target(url: &str, target: &Path) -> PathBuf {
    if target.as_os_str().is_empty() {
        guess_filename_from_url(url)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("download.csv"))
    } else {
        target.to_path_buf()
    }
}

/// Result links are pre-signed, so the request carries no credential.
pub(crate) fn download_to(
    transport: &dyn Transport,
    url: &str,
    target: &Path,
    progress: bool,
) -> Result<PathBuf> {
    let target = resolve_target(url, target);

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let pb = if progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
            )
            .context("invalid progress bar template")?
            .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    debug!(%url, target = %target.display(), "downloading");
    let mut out = File::create(&target)
        .with_context(|| format!("failed to open {}", target.display()))?;
    let fetched = transport.fetch_to(&WireRequest::get(url), &mut out, &mut |done, total| {
        if let Some(pb) = &pb {
            if let Some(total) = total {
                pb.set_length(total);
            }
            pb.set_position(done);
        }
    });
    drop(out);

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let bytes = match fetched {
        Ok(Fetched::Written(bytes)) => bytes,
        Ok(Fetched::Failed(resp)) => {
            discard(&target);
            let record = classify(resp.status, &resp.body, None);
            bail!("download failed: {} ({})", record, url);
        }
        Err(err) => {
            discard(&target);
            return Err(err).with_context(|| format!("download request failed ({})", url));
        }
    };

    info!(bytes, target = %target.display(), "download complete");
    Ok(target)
}

fn discard(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!(path = %path.display(), %err, "could not remove partial download");
    }
}
