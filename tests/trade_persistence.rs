use std::sync::Arc;

use realmkeep::config::TradeConfig;
use realmkeep::engine::{EngineServices, ItemSpec, MemoryWorld};
use realmkeep::storage::{StoreError, TradeStore, TradeStoreBuilder};
use realmkeep::trade::{TradeManager, TradeProgress};
use tempfile::TempDir;

#[test]
fn completed_trade_persists_both_players_and_receipt() {
    let dir = TempDir::new().expect("tempdir");
    let world = Arc::new(MemoryWorld::new());
    let buyer = world.add_player("Aelric");
    let seller = world.add_player("Brannoc");
    world.set_gold(buyer, 300);
    let cloak = world.give_item(seller, ItemSpec::new(14152, "Robe of the Archmage"));

    let receipt = {
        let store = Arc::new(TradeStoreBuilder::new(dir.path()).open().expect("store"));
        let trades = TradeManager::new(EngineServices::from_world(world.clone()), TradeConfig::default())
            .with_store(store);
        trades.initiate(buyer, seller).unwrap();
        trades.begin(seller).unwrap();
        trades.set_money(buyer, 250).unwrap();
        trades.set_item(seller, 0, cloak).unwrap();
        trades.accept(seller).unwrap();
        match trades.accept(buyer).unwrap() {
            TradeProgress::Completed(receipt) => receipt,
            other => panic!("expected commit, got {:?}", other),
        }
    };

    let store = TradeStore::open(dir.path()).expect("reopen");
    let buyer_row = store.get_player(buyer).expect("buyer row");
    let seller_row = store.get_player(seller).expect("seller row");
    assert_eq!(buyer_row.gold, 50);
    assert_eq!(seller_row.gold, 250);
    assert!(buyer_row.items.iter().any(|i| i.id == cloak));
    assert!(seller_row.items.iter().all(|i| i.id != cloak));

    assert_eq!(store.get_trade(&receipt.id).expect("receipt"), receipt);
    assert_eq!(store.trades_for(seller).expect("list").len(), 1);
}

#[test]
fn refused_commit_writes_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let world = Arc::new(MemoryWorld::new());
    let buyer = world.add_player("Aelric");
    let seller = world.add_player("Brannoc");
    world.set_gold(buyer, 300);
    world.fill_bags(buyer);
    let cloak = world.give_item(seller, ItemSpec::new(14152, "Robe of the Archmage"));

    let store = Arc::new(TradeStoreBuilder::new(dir.path()).open().expect("store"));
    let trades = TradeManager::new(EngineServices::from_world(world.clone()), TradeConfig::default())
        .with_store(store.clone());
    trades.initiate(buyer, seller).unwrap();
    trades.set_item(seller, 0, cloak).unwrap();
    trades.accept(seller).unwrap();
    assert!(trades.accept(buyer).is_err());

    assert!(matches!(store.get_player(buyer), Err(StoreError::NotFound(_))));
    assert!(store.list_trades().expect("list").is_empty());
}
