use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{IVec, Transactional};
use uuid::Uuid;

use super::{StoreError, TradeJournalStore};
use crate::engine::{ActorId, InventorySnapshot, ItemView};
use crate::trade::TradeReceipt;

const TREE_PLAYERS: &str = "players";
const TREE_TRADES: &str = "trades";

pub const PLAYER_SCHEMA_VERSION: u8 = 1;

/// Persisted inventory and gold for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub schema_version: u8,
    pub actor: ActorId,
    pub gold: u64,
    pub items: Vec<ItemView>,
    pub updated_at: DateTime<Utc>,
}

impl From<&InventorySnapshot> for PlayerRecord {
    fn from(snapshot: &InventorySnapshot) -> Self {
        Self {
            schema_version: PLAYER_SCHEMA_VERSION,
            actor: snapshot.actor,
            gold: snapshot.gold,
            items: snapshot.items.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct TradeStoreBuilder {
    path: PathBuf,
    temporary: bool,
}

impl TradeStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temporary: false,
        }
    }

    /// Delete the database when the store is dropped.
    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn open(self) -> Result<TradeStore, StoreError> {
        TradeStore::open_with_options(&self.path, self.temporary)
    }
}

/// Sled-backed persistence for completed trades.
pub struct TradeStore {
    _db: sled::Db,
    players: sled::Tree,
    trades: sled::Tree,
}

impl TradeStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_options(path.as_ref(), false)
    }

    fn open_with_options(path: &Path, temporary: bool) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)?;
        let db = sled::Config::new()
            .path(path)
            .temporary(temporary)
            .open()?;
        let players = db.open_tree(TREE_PLAYERS)?;
        let trades = db.open_tree(TREE_TRADES)?;
        Ok(Self {
            _db: db,
            players,
            trades,
        })
    }

    fn player_key(actor: ActorId) -> Vec<u8> {
        format!("players:{}", actor.0).into_bytes()
    }

    fn trade_key(id: &Uuid) -> Vec<u8> {
        format!("trades:{}", id).into_bytes()
    }

    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, StoreError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    pub fn get_player(&self, actor: ActorId) -> Result<PlayerRecord, StoreError> {
        let Some(bytes) = self.players.get(Self::player_key(actor))? else {
            return Err(StoreError::NotFound(format!("player: {}", actor)));
        };
        let record: PlayerRecord = Self::deserialize(bytes)?;
        if record.schema_version != PLAYER_SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "player",
                expected: PLAYER_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }

    pub fn get_trade(&self, id: &Uuid) -> Result<TradeReceipt, StoreError> {
        let Some(bytes) = self.trades.get(Self::trade_key(id))? else {
            return Err(StoreError::NotFound(format!("trade: {}", id)));
        };
        let receipt: TradeReceipt = Self::deserialize(bytes)?;
        if receipt.schema_version != TradeReceipt::SCHEMA_VERSION {
            return Err(StoreError::SchemaMismatch {
                entity: "trade",
                expected: TradeReceipt::SCHEMA_VERSION,
                found: receipt.schema_version,
            });
        }
        Ok(receipt)
    }

    /// Every stored receipt, oldest completion first.
    pub fn list_trades(&self) -> Result<Vec<TradeReceipt>, StoreError> {
        let mut receipts = Vec::new();
        for entry in self.trades.scan_prefix(b"trades:") {
            let (_, bytes) = entry?;
            receipts.push(Self::deserialize::<TradeReceipt>(bytes)?);
        }
        receipts.sort_by_key(|r| r.completed_at);
        Ok(receipts)
    }

    /// Receipts of trades `actor` took part in.
    pub fn trades_for(&self, actor: ActorId) -> Result<Vec<TradeReceipt>, StoreError> {
        Ok(self
            .list_trades()?
            .into_iter()
            .filter(|r| r.involves(actor))
            .collect())
    }
}

impl TradeJournalStore for TradeStore {
    fn commit_trade(
        &self,
        receipt: &TradeReceipt,
        participants: &[InventorySnapshot],
    ) -> Result<(), StoreError> {
        // Encode outside the transaction closure, which may be retried.
        let mut player_rows = Vec::with_capacity(participants.len());
        for snapshot in participants {
            let record = PlayerRecord::from(snapshot);
            player_rows.push((Self::player_key(snapshot.actor), Self::serialize(&record)?));
        }
        let trade_row = (Self::trade_key(&receipt.id), Self::serialize(receipt)?);

        (&self.players, &self.trades)
            .transaction(|(players, trades)| {
                for (key, bytes) in &player_rows {
                    players.insert(key.as_slice(), bytes.as_slice())?;
                }
                trades.insert(trade_row.0.as_slice(), trade_row.1.as_slice())?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(()) => StoreError::Aborted,
                TransactionError::Storage(e) => StoreError::Sled(e),
            })?;

        self.players.flush()?;
        self.trades.flush()?;
        debug!(
            "persisted trade {} for {} participant(s)",
            receipt.id,
            participants.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ItemId;
    use crate::trade::ReceiptSide;
    use tempfile::TempDir;

    fn receipt(a: ActorId, b: ActorId) -> TradeReceipt {
        TradeReceipt {
            schema_version: TradeReceipt::SCHEMA_VERSION,
            id: Uuid::new_v4(),
            opened_at: Utc::now(),
            completed_at: Utc::now(),
            sides: [
                ReceiptSide {
                    actor: a,
                    money: 100,
                    items: vec![],
                    spell: None,
                },
                ReceiptSide {
                    actor: b,
                    money: 0,
                    items: vec![ItemId(7)],
                    spell: None,
                },
            ],
        }
    }

    fn snapshot(actor: ActorId, gold: u64) -> InventorySnapshot {
        InventorySnapshot {
            actor,
            gold,
            items: vec![],
        }
    }

    #[test]
    fn commit_writes_both_players_and_receipt() {
        let dir = TempDir::new().expect("tempdir");
        let store = TradeStoreBuilder::new(dir.path()).open().expect("store");
        let r = receipt(ActorId(1), ActorId(2));
        store
            .commit_trade(&r, &[snapshot(ActorId(1), 0), snapshot(ActorId(2), 100)])
            .expect("commit");

        assert_eq!(store.get_player(ActorId(1)).expect("p1").gold, 0);
        assert_eq!(store.get_player(ActorId(2)).expect("p2").gold, 100);
        assert_eq!(store.get_trade(&r.id).expect("receipt"), r);
        assert_eq!(store.trades_for(ActorId(2)).expect("list").len(), 1);
        assert!(store.trades_for(ActorId(3)).expect("list").is_empty());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let r = receipt(ActorId(1), ActorId(2));
        {
            let store = TradeStoreBuilder::new(dir.path()).open().expect("store");
            store
                .commit_trade(&r, &[snapshot(ActorId(1), 5), snapshot(ActorId(2), 6)])
                .expect("commit");
        }
        let store = TradeStoreBuilder::new(dir.path()).open().expect("reopen");
        assert_eq!(store.list_trades().expect("list"), vec![r]);
        assert_eq!(store.get_player(ActorId(2)).expect("p2").gold, 6);
    }

    #[test]
    fn missing_player_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let store = TradeStoreBuilder::new(dir.path()).open().expect("store");
        assert!(matches!(
            store.get_player(ActorId(9)),
            Err(StoreError::NotFound(_))
        ));
    }
}
