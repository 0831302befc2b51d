use crate::SeqsumError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable keyed object store. Partial summaries are append-only under their
/// unit key; the final summary slot is overwritten whole-value. Listing must
/// be monotonic: a key observed present stays present.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), SeqsumError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqsumError>;
    fn list(&self, prefix: &str) -> Result<Vec<String>, SeqsumError>;
}

pub fn chunk_key(batch: &str, index: usize) -> String {
    format!("chunks/{}/{:04}", batch, index)
}

pub fn partial_key(batch: &str, index: usize) -> String {
    format!("summaries/{}/{:04}.json", batch, index)
}

pub fn partial_prefix(batch: &str) -> String {
    format!("summaries/{}/", batch)
}

pub fn final_key(batch: &str) -> String {
    format!("summaries/{}/final.json", batch)
}

pub fn descriptor_key(batch: &str) -> String {
    format!("batches/{}.json", batch)
}

/// Extract the unit index from a partial-summary key. Returns `None` for the
/// final summary slot and anything else that is not a per-unit record, so a
/// listing of `summaries/{batch}/` can be filtered in one pass.
pub fn parse_partial_index(key: &str) -> Option<usize> {
    let name = key.rsplit('/').next()?;
    let stem = name.strip_suffix(".json")?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// In-memory store for tests and simulations.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), SeqsumError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqsumError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, SeqsumError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// Filesystem-backed store used by the local pipeline runner. Keys map to
/// paths under the base directory.
pub struct DirStore {
    base_dir: PathBuf,
}

impl DirStore {
    pub fn new(base_dir: &Path) -> Result<Self, SeqsumError> {
        fs::create_dir_all(base_dir).map_err(SeqsumError::Io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(key.trim_start_matches('/'))
    }
}

impl ObjectStore for DirStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), SeqsumError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(SeqsumError::Io)?;
        }
        fs::write(&path, bytes).map_err(SeqsumError::Io)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SeqsumError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SeqsumError::Io(e)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, SeqsumError> {
        let mut keys = Vec::new();
        for path in walk(&self.base_dir)? {
            let relative = path
                .strip_prefix(&self.base_dir)
                .map_err(|e| SeqsumError::Other(format!("path outside store: {}", e)))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn walk(path: &Path) -> Result<Vec<PathBuf>, SeqsumError> {
    let mut files = Vec::new();
    if !path.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(path).map_err(SeqsumError::Io)? {
        let entry = entry.map_err(SeqsumError::Io)?;
        let p = entry.path();
        if p.is_dir() {
            files.extend(walk(&p)?);
        } else {
            files.push(p);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(chunk_key("b1", 7), "chunks/b1/0007");
        assert_eq!(partial_key("b1", 12), "summaries/b1/0012.json");
        assert_eq!(final_key("b1"), "summaries/b1/final.json");
        assert_eq!(descriptor_key("b1"), "batches/b1.json");
    }

    #[test]
    fn test_parse_partial_index() {
        assert_eq!(parse_partial_index("summaries/b1/0012.json"), Some(12));
        assert_eq!(parse_partial_index("summaries/b1/0000.json"), Some(0));
        assert_eq!(parse_partial_index("summaries/b1/final.json"), None);
        assert_eq!(parse_partial_index("summaries/b1/0012.csv"), None);
        assert_eq!(parse_partial_index("chunks/b1/0012"), None);
    }

    #[test]
    fn test_memory_store_put_get_list() {
        let store = MemoryStore::new();
        store.put("summaries/b1/0000.json", b"a".to_vec()).unwrap();
        store.put("summaries/b1/0001.json", b"b".to_vec()).unwrap();
        store.put("summaries/b2/0000.json", b"c".to_vec()).unwrap();

        assert_eq!(store.get("summaries/b1/0001.json").unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.get("summaries/b1/0009.json").unwrap(), None);

        let keys = store.list("summaries/b1/").unwrap();
        assert_eq!(keys, vec!["summaries/b1/0000.json", "summaries/b1/0001.json"]);
    }

    #[test]
    fn test_dir_store_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(temp_dir.path()).unwrap();

        store.put("summaries/b1/0000.json", b"x".to_vec()).unwrap();
        store.put("chunks/b1/0000", b"ACGT".to_vec()).unwrap();

        assert_eq!(store.get("chunks/b1/0000").unwrap(), Some(b"ACGT".to_vec()));
        assert_eq!(store.get("chunks/b1/0001").unwrap(), None);

        let keys = store.list("summaries/").unwrap();
        assert_eq!(keys, vec!["summaries/b1/0000.json"]);
    }

    #[test]
    fn test_dir_store_overwrite_replaces_value() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(temp_dir.path()).unwrap();

        store.put("summaries/b1/final.json", b"one".to_vec()).unwrap();
        store.put("summaries/b1/final.json", b"two".to_vec()).unwrap();
        assert_eq!(
            store.get("summaries/b1/final.json").unwrap(),
            Some(b"two".to_vec())
        );
        assert_eq!(store.list("summaries/b1/").unwrap().len(), 1);
    }
}
