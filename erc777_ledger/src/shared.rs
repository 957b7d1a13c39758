use std::sync::{Arc, Mutex, MutexGuard};

use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;

use crate::ledger::types::MintReturn;
use crate::ledger::{Ledger, LedgerError};

type Result<T> = std::result::Result<T, LedgerError>;

/// A ledger that can be shared between threads
///
/// Every operation holds the one lock for its whole duration, so a reader can never see a
/// holder's balance without the supply change that came with it. Clones share the same ledger.
pub struct SharedLedger<BS>
where
    BS: Blockstore,
{
    inner: Arc<Mutex<Ledger<BS>>>,
}

impl<BS> Clone for SharedLedger<BS>
where
    BS: Blockstore,
{
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<BS> SharedLedger<BS>
where
    BS: Blockstore,
{
    pub fn new(ledger: Ledger<BS>) -> Self {
        Self { inner: Arc::new(Mutex::new(ledger)) }
    }

    pub fn mint(&self, holder: &Address, amount: &TokenAmount) -> Result<MintReturn> {
        self.lock()?.mint(holder, amount)
    }

    pub fn balance_of(&self, holder: &Address) -> Result<TokenAmount> {
        self.lock()?.balance_of(holder)
    }

    pub fn total_supply(&self) -> Result<TokenAmount> {
        Ok(self.lock()?.total_supply())
    }

    pub fn granularity(&self) -> Result<u64> {
        Ok(self.lock()?.granularity())
    }

    /// Reads a holder's balance and the total supply under a single lock
    pub fn snapshot(&self, holder: &Address) -> Result<MintReturn> {
        let ledger = self.lock()?;
        Ok(MintReturn { balance: ledger.balance_of(holder)?, supply: ledger.total_supply() })
    }

    pub fn flush(&self) -> Result<Cid> {
        self.lock()?.flush()
    }

    /// Checks the state invariants, returning the first violation found
    pub fn assert_invariants(&self) -> Result<()> {
        let ledger = self.lock()?;
        match ledger.assert_invariants() {
            Ok(_) => Ok(()),
            Err(mut errors) => Err(LedgerError::StateInvariant(errors.remove(0))),
        }
    }

    /// Takes the ledger back out, if this is the last handle to it
    pub fn try_unwrap(self) -> std::result::Result<Ledger<BS>, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger<BS>>> {
        self.inner.lock().map_err(|_| LedgerError::Poisoned)
    }
}
