use std::thread;

use erc777_integration_tests::init_tracing;
use erc777_ledger::ledger::{Ledger, LedgerError};
use erc777_ledger::shared::SharedLedger;
use fvm_ipld_blockstore::MemoryBlockstore;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;

#[test]
fn readers_never_see_half_applied_mints() {
    init_tracing();
    let ledger = SharedLedger::new(Ledger::new(MemoryBlockstore::default(), 1).unwrap());
    let minter_holder = Address::new_id(3000);

    let writer = {
        let ledger = ledger.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                ledger.mint(&minter_holder, &TokenAmount::from_atto(3)).unwrap();
                let err = ledger.mint(&minter_holder, &TokenAmount::zero()).unwrap_err();
                assert!(matches!(err, LedgerError::InvalidAmount { .. }));
            }
        })
    };
    let reader = {
        let ledger = ledger.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                // a single holder owns everything, so balance and supply always agree
                let snapshot = ledger.snapshot(&minter_holder).unwrap();
                assert_eq!(snapshot.balance, snapshot.supply);
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();

    assert_eq!(ledger.total_supply().unwrap(), TokenAmount::from_atto(600));
    ledger.assert_invariants().unwrap();
}
