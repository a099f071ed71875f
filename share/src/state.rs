use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

const LATEST_BLOCK_NUM: &str = "latest_block_num";
const LATEST_STATE_ROOT: &str = "latest_state_root";

/// Sled-backed snapshot store.
pub struct StateDB {
    pub db: sled::Db,
}

impl StateDB {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = sled::open(db_path).with_context(|| format!("open state db at {}", db_path))?;
        Ok(Self { db })
    }

    /// In-memory store that is dropped with the handle.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .context("open temporary state db")?;
        Ok(Self { db })
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = bincode::serialize(value).with_context(|| format!("serialize {}", key))?;
        self.db.insert(key, data)?;
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key)? {
            Some(data) => {
                let value =
                    bincode::deserialize(&data).with_context(|| format!("deserialize {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Records the head of the chain and flushes to disk.
    pub fn commit_head(&self, block_num: u64, state_root: [u8; 32]) -> Result<()> {
        self.db.insert(LATEST_BLOCK_NUM, &block_num.to_be_bytes()[..])?;
        self.db.insert(LATEST_STATE_ROOT, &state_root[..])?;
        self.db.flush()?;
        Ok(())
    }

    pub fn latest_block_num(&self) -> Result<u64> {
        match self.db.get(LATEST_BLOCK_NUM)? {
            Some(bytes) => {
                let num_bytes: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| anyhow!("Invalid block number format"))?;
                Ok(u64::from_be_bytes(num_bytes))
            }
            None => Ok(0),
        }
    }

    pub fn latest_state_root(&self) -> Result<[u8; 32]> {
        match self.db.get(LATEST_STATE_ROOT)? {
            Some(bytes) => bytes
                .as_ref()
                .try_into()
                .map_err(|_| anyhow!("Invalid latest state root format")),
            None => Ok(Default::default()),
        }
    }
}

/// Commitment to a serialized snapshot.
pub fn calculate_state_root(snapshot: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(snapshot);
    hasher.finalize().into()
}
