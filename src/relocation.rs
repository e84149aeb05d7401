//! Terminal relocation of a (payload, sidecar) pair into `Complete/` or `Error/`.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("cannot create {}: {source}", dir.display())]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where a relocated pair ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocated {
    pub payload: PathBuf,
    pub sidecar: PathBuf,
}

fn target_in(dir: &Path, file: &Path) -> PathBuf {
    match file.file_name() {
        Some(name) => dir.join(name),
        None => dir.to_path_buf(),
    }
}

/// Move payload and sidecar into `dest_dir`, creating it if needed.
///
/// The pair moves together: if the sidecar cannot follow, the payload is moved
/// back to its origin before the error is returned. An existing file with the
/// same name in `dest_dir` is replaced.
pub async fn relocate_pair(
    payload: &Path,
    sidecar: &Path,
    dest_dir: &Path,
) -> Result<Relocated, RelocationError> {
    fs::create_dir_all(dest_dir)
        .await
        .map_err(|source| RelocationError::CreateDir {
            dir: dest_dir.to_path_buf(),
            source,
        })?;

    let payload_target = target_in(dest_dir, payload);
    let sidecar_target = target_in(dest_dir, sidecar);

    fs::rename(payload, &payload_target)
        .await
        .map_err(|source| RelocationError::Move {
            from: payload.to_path_buf(),
            to: payload_target.clone(),
            source,
        })?;

    if let Err(source) = fs::rename(sidecar, &sidecar_target).await {
        if let Err(rollback) = fs::rename(&payload_target, payload).await {
            error!(
                payload = %payload_target.display(),
                error = %rollback,
                "could not return payload after failed sidecar move; pair is split"
            );
        }
        return Err(RelocationError::Move {
            from: sidecar.to_path_buf(),
            to: sidecar_target,
            source,
        });
    }

    info!(
        payload = %payload_target.display(),
        sidecar = %sidecar_target.display(),
        "relocated job files"
    );
    Ok(Relocated {
        payload: payload_target,
        sidecar: sidecar_target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pair(root: &Path) -> (PathBuf, PathBuf) {
        let payload = root.join("report.pdf");
        let sidecar = root.join("report.pdf.ini");
        std::fs::write(&payload, b"%PDF-1.4").unwrap();
        std::fs::write(&sidecar, b"[PrintSettings]\n").unwrap();
        (payload, sidecar)
    }

    #[tokio::test]
    async fn moves_both_files_and_creates_folder() {
        let tmp = TempDir::new().unwrap();
        let (payload, sidecar) = pair(tmp.path());
        let dest = tmp.path().join("Complete");

        let moved = relocate_pair(&payload, &sidecar, &dest).await.unwrap();

        assert_eq!(moved.payload, dest.join("report.pdf"));
        assert_eq!(moved.sidecar, dest.join("report.pdf.ini"));
        assert!(moved.payload.exists());
        assert!(moved.sidecar.exists());
        assert!(!payload.exists());
        assert!(!sidecar.exists());
    }

    #[tokio::test]
    async fn existing_destination_folder_is_fine() {
        let tmp = TempDir::new().unwrap();
        let (payload, sidecar) = pair(tmp.path());
        let dest = tmp.path().join("Error");
        std::fs::create_dir(&dest).unwrap();

        relocate_pair(&payload, &sidecar, &dest).await.unwrap();
        assert!(dest.join("report.pdf").exists());
    }

    #[tokio::test]
    async fn second_relocation_of_same_pair_fails_without_side_effects() {
        let tmp = TempDir::new().unwrap();
        let (payload, sidecar) = pair(tmp.path());
        let dest = tmp.path().join("Complete");

        relocate_pair(&payload, &sidecar, &dest).await.unwrap();
        let err = relocate_pair(&payload, &sidecar, &dest).await.unwrap_err();

        assert!(matches!(err, RelocationError::Move { .. }));
        assert!(dest.join("report.pdf").exists());
        assert!(dest.join("report.pdf.ini").exists());
    }

    #[tokio::test]
    async fn missing_sidecar_rolls_payload_back() {
        let tmp = TempDir::new().unwrap();
        let (payload, sidecar) = pair(tmp.path());
        std::fs::remove_file(&sidecar).unwrap();
        let dest = tmp.path().join("Error");

        let err = relocate_pair(&payload, &sidecar, &dest).await.unwrap_err();

        assert!(matches!(err, RelocationError::Move { .. }));
        assert!(payload.exists());
        assert!(!dest.join("report.pdf").exists());
    }
}
