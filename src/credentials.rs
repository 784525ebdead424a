// Credential file helpers. The file holds the exact JSON body posted to the
// OAuth endpoint, so a successful first login can be replayed on later runs
// without prompting.

use crate::error::CredentialsError;
use crate::models::LoginCredentials;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Read credentials from `path`.
///
/// A missing file, a file with an empty username or password, and a file that
/// does not parse are reported separately so the caller can decide whether to
/// prompt for new credentials.
pub fn load(path: &Path) -> Result<LoginCredentials, CredentialsError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CredentialsError::Missing(path.to_path_buf()))
        }
        Err(source) => {
            return Err(CredentialsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let creds: LoginCredentials =
        serde_json::from_str(&data).map_err(|source| CredentialsError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

    if !creds.is_complete() {
        return Err(CredentialsError::Incomplete(path.to_path_buf()));
    }
    Ok(creds)
}

/// Write credentials to `path`, creating parent directories as needed. On
/// Unix the file is readable by the owner only.
pub fn store(path: &Path, creds: &LoginCredentials) -> Result<(), CredentialsError> {
    let io_err = |source| CredentialsError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }

    let body = serde_json::to_string_pretty(creds).map_err(CredentialsError::Encode)?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(io_err)?;

    // `mode` only applies to new files; tighten one left by an older run.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(io_err)?;
    }
    file.write_all(body.as_bytes()).map_err(io_err)?;

    tracing::debug!(path = %path.display(), "stored credentials");
    Ok(())
}
