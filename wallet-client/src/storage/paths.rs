use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::errors::{WalletError, WalletResult};

/// Manages filesystem paths used by the wallet client.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    /// Root directory for wallet data.
    root_dir: PathBuf,
    /// Directory holding one encrypted file per keychain item.
    keychain_dir: PathBuf,
    /// Directory for keychain snapshots.
    backup_dir: PathBuf,
    /// Path to persisted wallet configuration.
    config_file: PathBuf,
}

impl WalletPaths {
    /// Salt and KDF parameters of the file keychain, stored inside the keychain directory.
    pub const KEYCHAIN_SALT_FILENAME: &'static str = "keychain.salt";
    /// Prefix of snapshot directories under the backup directory.
    pub const BACKUP_PREFIX: &'static str = "keychain_";

    /// Create a new path manager rooted at the provided directory.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Wallet root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            keychain_dir: root_dir.join("keychain"),
            backup_dir: root_dir.join("backups"),
            config_file: root_dir.join("wallet.config"),
            root_dir,
        })
    }

    /// Ensure the directory structure exists, creating missing folders.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        fs::create_dir_all(&self.keychain_dir)?;
        fs::create_dir_all(&self.backup_dir)?;
        Ok(())
    }

    pub fn keychain_dir(&self) -> &Path {
        &self.keychain_dir
    }

    pub fn keychain_salt_file(&self) -> PathBuf {
        self.keychain_dir.join(Self::KEYCHAIN_SALT_FILENAME)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Path to persisted wallet configuration file.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Root directory for all wallet-managed data.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Copy the whole keychain directory into a timestamped snapshot.
    /// Returns the path to the created snapshot directory.
    pub fn create_keychain_backup(&self) -> WalletResult<PathBuf> {
        if !self.keychain_dir.exists() {
            return Err(WalletError::NotFound(
                "Keychain directory does not exist, cannot create backup".to_string(),
            ));
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let backup_path = self
            .backup_dir
            .join(format!("{}{}", Self::BACKUP_PREFIX, timestamp));
        copy_dir(&self.keychain_dir, &backup_path)?;

        // Verify the snapshot holds as many bytes as the source
        let original_size = dir_size(&self.keychain_dir)?;
        let backup_size = dir_size(&backup_path)?;
        if original_size != backup_size {
            fs::remove_dir_all(&backup_path)?;
            return Err(WalletError::StorageError(
                "Backup verification failed: size mismatch".to_string(),
            ));
        }

        Ok(backup_path)
    }

    /// List all keychain snapshots, newest first.
    pub fn list_backups(&self) -> WalletResult<Vec<PathBuf>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            let is_snapshot = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(Self::BACKUP_PREFIX))
                .unwrap_or(false);
            if path.is_dir() && is_snapshot {
                backups.push(path);
            }
        }

        // Snapshot names embed a sortable timestamp
        backups.sort();
        backups.reverse();
        Ok(backups)
    }

    /// Delete old snapshots, keeping only the N most recent.
    pub fn prune_old_backups(&self, keep_count: usize) -> WalletResult<usize> {
        let backups = self.list_backups()?;
        let mut deleted_count = 0;

        for backup_path in backups.iter().skip(keep_count) {
            fs::remove_dir_all(backup_path)?;
            deleted_count += 1;
        }

        Ok(deleted_count)
    }
}

fn copy_dir(from: &Path, to: &Path) -> WalletResult<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

fn dir_size(dir: &Path) -> WalletResult<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_is_rooted() {
        let temp = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp.path()).unwrap();
        assert_eq!(paths.config_file(), temp.path().join("wallet.config"));
        assert_eq!(paths.keychain_dir(), temp.path().join("keychain"));
        assert!(paths.keychain_salt_file().starts_with(paths.keychain_dir()));
        assert!(WalletPaths::new("").is_err());
    }

    #[test]
    fn backup_requires_keychain() {
        let temp = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp.path().join("missing")).unwrap();
        assert!(matches!(
            paths.create_keychain_backup(),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn backups_copy_nested_items_and_prune() {
        let temp = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp.path()).unwrap();
        paths.ensure_directories().unwrap();
        let service_dir = paths.keychain_dir().join("service");
        fs::create_dir_all(&service_dir).unwrap();
        fs::write(service_dir.join("item"), b"sealed").unwrap();

        let first = paths.create_keychain_backup().unwrap();
        assert_eq!(fs::read(first.join("service").join("item")).unwrap(), b"sealed");

        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = paths.create_keychain_backup().unwrap();

        let backups = paths.list_backups().unwrap();
        assert_eq!(backups, vec![second.clone(), first.clone()]);

        assert_eq!(paths.prune_old_backups(1).unwrap(), 1);
        assert!(!first.exists());
        assert!(second.exists());
    }
}
