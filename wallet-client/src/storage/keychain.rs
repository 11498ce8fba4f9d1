use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use blake3::Hasher as Blake3;
use parking_lot::{Mutex, RwLock};
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::WalletPaths;
use crate::errors::{WalletError, WalletResult};

const ITEM_MAGIC: &[u8; 8] = b"GRXKCHN1";
const ITEM_VERSION: u16 = 1;
const ITEM_EXTENSION: &str = "item";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const VERIFIER_CONTEXT: &[u8] = b"grapherex keychain verifier";

/// Secret bytes keyed by `(service, key)`, the shape of the platform keychain.
///
/// Every write replaces exactly one item, so concurrent writers to different keys never
/// clobber each other.
pub trait SecureStorage: Send + Sync {
    fn load(&self, service: &str, key: &str) -> WalletResult<Option<Zeroizing<Vec<u8>>>>;

    fn store(&self, service: &str, key: &str, value: &[u8]) -> WalletResult<()>;

    /// Returns whether an item was present.
    fn remove(&self, service: &str, key: &str) -> WalletResult<bool>;

    /// Keys stored under `service`, sorted.
    fn keys(&self, service: &str) -> WalletResult<Vec<String>>;
}

/// Process-local keychain; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    items: RwLock<HashMap<(String, String), Zeroizing<Vec<u8>>>>,
}

impl MemoryKeychain {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStorage for MemoryKeychain {
    fn load(&self, service: &str, key: &str) -> WalletResult<Option<Zeroizing<Vec<u8>>>> {
        let items = self.items.read();
        Ok(items
            .get(&(service.to_string(), key.to_string()))
            .map(|value| Zeroizing::new(value.to_vec())))
    }

    fn store(&self, service: &str, key: &str, value: &[u8]) -> WalletResult<()> {
        self.items.write().insert(
            (service.to_string(), key.to_string()),
            Zeroizing::new(value.to_vec()),
        );
        Ok(())
    }

    fn remove(&self, service: &str, key: &str) -> WalletResult<bool> {
        Ok(self
            .items
            .write()
            .remove(&(service.to_string(), key.to_string()))
            .is_some())
    }

    fn keys(&self, service: &str) -> WalletResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .items
            .read()
            .keys()
            .filter(|(s, _)| s == service)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Argon2id cost parameters for deriving the keychain key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParameters {
    pub m_cost_kib: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParameters {
    fn default() -> Self {
        Self {
            m_cost_kib: 64 * 1024, // 64 MiB
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParameters {
    /// Cheap parameters for throwaway keychains in test environments.
    pub fn light() -> Self {
        Self {
            m_cost_kib: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SaltFile {
    version: u16,
    salt: [u8; SALT_LEN],
    kdf: KdfParameters,
    /// Keyed BLAKE3 tag proving a passphrase derives the same key.
    verifier: [u8; 32],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemFile {
    magic: [u8; 8],
    version: u16,
    nonce: [u8; NONCE_LEN],
    checksum: [u8; 32],
    ciphertext: Vec<u8>,
}

/// Keychain persisted as one AES-256-GCM sealed file per item.
///
/// Layout: `<dir>/<hex(service)>/<hex(key)>.item`. The key is derived once, at open, from the
/// passphrase and a random salt persisted next to the items. `(service, key)` is bound into the
/// AEAD associated data so an item file moved to another name fails to open.
pub struct FileKeychain {
    dir: PathBuf,
    key: Zeroizing<[u8; KEY_LEN]>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for FileKeychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeychain")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl FileKeychain {
    pub fn from_paths(
        paths: &WalletPaths,
        passphrase: &SecretString,
        kdf: KdfParameters,
    ) -> WalletResult<Self> {
        Self::open(paths.keychain_dir(), passphrase, kdf)
    }

    /// Open (or create) the keychain in `dir`. `kdf` applies only when the keychain is new;
    /// an existing keychain keeps the parameters it was created with.
    pub fn open(
        dir: impl AsRef<Path>,
        passphrase: &SecretString,
        kdf: KdfParameters,
    ) -> WalletResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let salt_path = dir.join(WalletPaths::KEYCHAIN_SALT_FILENAME);

        let key = if salt_path.exists() {
            let salt_file: SaltFile =
                serde_json::from_slice(&fs::read(&salt_path)?).map_err(|e| {
                    WalletError::StorageError(format!("Unreadable keychain salt file: {}", e))
                })?;
            if salt_file.version != ITEM_VERSION {
                return Err(WalletError::ValidationError(format!(
                    "Unsupported keychain version: {}",
                    salt_file.version
                )));
            }
            let key = derive_key(passphrase, &salt_file.salt, &salt_file.kdf)?;
            if verifier(&key) != salt_file.verifier {
                return Err(WalletError::CryptoError(
                    "Keychain passphrase does not match".to_string(),
                ));
            }
            key
        } else {
            let mut salt = [0u8; SALT_LEN];
            OsRng.fill_bytes(&mut salt);
            let key = derive_key(passphrase, &salt, &kdf)?;
            let salt_file = SaltFile {
                version: ITEM_VERSION,
                salt,
                kdf,
                verifier: verifier(&key),
            };
            write_atomic(&salt_path, &serde_json::to_vec_pretty(&salt_file)?)?;
            log::info!("Created keychain at {}", dir.display());
            key
        };

        Ok(Self {
            dir,
            key,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn service_dir(&self, service: &str) -> PathBuf {
        self.dir.join(hex::encode(service))
    }

    fn item_path(&self, service: &str, key: &str) -> PathBuf {
        self.service_dir(service)
            .join(format!("{}.{}", hex::encode(key), ITEM_EXTENSION))
    }

    fn sealing_key(&self) -> WalletResult<LessSafeKey> {
        let unbound_key = UnboundKey::new(&aead::AES_256_GCM, self.key.as_ref())
            .map_err(|e| WalletError::CryptoError(format!("Invalid encryption key: {e}")))?;
        Ok(LessSafeKey::new(unbound_key))
    }
}

impl SecureStorage for FileKeychain {
    fn load(&self, service: &str, key: &str) -> WalletResult<Option<Zeroizing<Vec<u8>>>> {
        let path = self.item_path(service, key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let item: ItemFile = serde_json::from_slice(&bytes).map_err(|e| {
            WalletError::StorageError(format!("Unreadable keychain item {}: {}", path.display(), e))
        })?;
        if &item.magic != ITEM_MAGIC {
            return Err(WalletError::ValidationError(
                "Invalid keychain item marker".to_string(),
            ));
        }
        if item.version != ITEM_VERSION {
            return Err(WalletError::ValidationError(format!(
                "Unsupported keychain item version: {}",
                item.version
            )));
        }
        if item.ciphertext.len() < aead::AES_256_GCM.tag_len() {
            return Err(WalletError::CryptoError(
                "Ciphertext shorter than authentication tag".to_string(),
            ));
        }

        let sealing_key = self.sealing_key()?;
        let mut in_out = Zeroizing::new(item.ciphertext);
        let plaintext_len = sealing_key
            .open_in_place(
                Nonce::assume_unique_for_key(item.nonce),
                Aad::from(associated_data(service, key)),
                &mut in_out,
            )
            .map_err(|_| WalletError::CryptoError("Decryption failure".to_string()))?
            .len();
        in_out.truncate(plaintext_len);

        if blake3_checksum(&in_out) != item.checksum {
            return Err(WalletError::CryptoError(
                "Keychain item checksum mismatch".to_string(),
            ));
        }
        Ok(Some(in_out))
    }

    fn store(&self, service: &str, key: &str, value: &[u8]) -> WalletResult<()> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let mut in_out = value.to_vec();
        self.sealing_key()?
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(associated_data(service, key)),
                &mut in_out,
            )
            .map_err(|_| WalletError::CryptoError("Encryption failure".to_string()))?;

        let item = ItemFile {
            magic: *ITEM_MAGIC,
            version: ITEM_VERSION,
            nonce: nonce_bytes,
            checksum: blake3_checksum(value),
            ciphertext: in_out,
        };

        let _guard = self.write_lock.lock();
        write_atomic(&self.item_path(service, key), &serde_json::to_vec(&item)?)
    }

    fn remove(&self, service: &str, key: &str) -> WalletResult<bool> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.item_path(service, key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self, service: &str) -> WalletResult<Vec<String>> {
        let service_dir = self.service_dir(service);
        if !service_dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(service_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ITEM_EXTENSION) {
                continue;
            }
            let decoded = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| hex::decode(stem).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(key) => keys.push(key),
                None => log::warn!("Skipping unrecognised keychain file {}", path.display()),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn associated_data(service: &str, key: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(service.len() + key.len() + 1);
    aad.extend_from_slice(service.as_bytes());
    aad.push(0);
    aad.extend_from_slice(key.as_bytes());
    aad
}

fn derive_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_LEN],
    params: &KdfParameters,
) -> WalletResult<Zeroizing<[u8; KEY_LEN]>> {
    let argon_params = Params::new(
        params.m_cost_kib,
        params.t_cost,
        params.p_cost,
        Some(KEY_LEN),
    )
    .map_err(|e| WalletError::CryptoError(format!("Invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, key.as_mut())
        .map_err(|e| WalletError::CryptoError(format!("KDF failed: {e}")))?;
    Ok(key)
}

fn verifier(key: &Zeroizing<[u8; KEY_LEN]>) -> [u8; 32] {
    *blake3::keyed_hash(key, VERIFIER_CONTEXT).as_bytes()
}

fn blake3_checksum(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake3::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    output
}

fn write_atomic(path: &Path, bytes: &[u8]) -> WalletResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| WalletError::StorageError("Invalid keychain path".to_string()))?;
    fs::create_dir_all(dir)?;
    let tmp_path = path.with_extension("new");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
