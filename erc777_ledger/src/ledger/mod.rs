use cid::Cid;
pub use error::LedgerError;
use fvm_ipld_blockstore::Blockstore;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;

pub use self::state::StateError as LedgerStateError;
use self::state::{LedgerState, StateInvariantError, StateSummary};
use self::types::MintReturn;
use crate::holder::is_null_holder;

mod error;
pub mod state;
pub mod types;

/// Ratio of integral units to interpretation as whole token units. Aka "18 decimals".
pub const TOKEN_PRECISION: u64 = 1_000_000_000_000_000_000;

/// Decimals reported to ERC20 clients
pub const TOKEN_DECIMALS: u8 = 18;

type Result<T> = std::result::Result<T, LedgerError>;

/// Balance and supply accounting for a mint-only fungible token
///
/// Owns the blockstore backing the balances map, the state tree and the granularity. All
/// mutation goes through [`Ledger::mint`], which credits a holder and grows the supply in a single
/// atomic step.
pub struct Ledger<BS>
where
    BS: Blockstore,
{
    /// Backing store for the balances Hamt
    store: BS,
    /// Token state that will be inspected/mutated
    state: LedgerState,
    /// Minimum granularity of token amounts.
    /// All balances and mint amounts must be a multiple of this granularity.
    /// Set to 1 for standard 18-dp precision, TOKEN_PRECISION for whole units only, or some
    /// value in between.
    granularity: u64,
}

impl<BS> Ledger<BS>
where
    BS: Blockstore,
{
    /// Creates a ledger with a fresh, empty state tree
    ///
    /// Granularity must be at least 1.
    pub fn new(store: BS, granularity: u64) -> Result<Self> {
        check_granularity(granularity)?;
        let state = LedgerState::new(&store)?;
        Self::wrap(store, granularity, state)
    }

    /// Creates a ledger with a fresh state tree, specifying the underlying Hamt bit width
    pub fn new_with_bit_width(store: BS, granularity: u64, hamt_bit_width: u32) -> Result<Self> {
        check_granularity(granularity)?;
        let state = LedgerState::new_with_bit_width(&store, hamt_bit_width)?;
        Self::wrap(store, granularity, state)
    }

    /// Wrap an existing ledger state
    pub fn wrap(store: BS, granularity: u64, state: LedgerState) -> Result<Self> {
        check_granularity(granularity)?;
        Ok(Self { store, state, granularity })
    }

    /// For an already initialised state tree, loads the state tree from the blockstore at a Cid
    pub fn load(store: BS, granularity: u64, state_cid: &Cid) -> Result<Self> {
        check_granularity(granularity)?;
        let state = LedgerState::load(&store, state_cid)?;
        Self::wrap(store, granularity, state)
    }

    /// Replace the current state with another
    /// The previous state is returned and can be safely dropped
    pub fn replace(&mut self, state: LedgerState) -> LedgerState {
        std::mem::replace(&mut self.state, state)
    }

    /// Loads a fresh copy of the state from the blockstore at a given cid, replacing existing state
    /// The old state is returned to enable comparisons and the like but can be safely dropped
    pub fn load_replace(&mut self, cid: &Cid) -> Result<LedgerState> {
        let new_state = LedgerState::load(&self.store, cid)?;
        Ok(std::mem::replace(&mut self.state, new_state))
    }

    /// Flush state and return Cid for root
    pub fn flush(&mut self) -> Result<Cid> {
        Ok(self.state.save(&self.store)?)
    }

    /// Get a reference to the wrapped state tree
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Get a reference to the backing blockstore
    pub fn store(&self) -> &BS {
        &self.store
    }

    /// Unwraps the ledger into its store and state
    pub fn into_parts(self) -> (BS, LedgerState) {
        (self.store, self.state)
    }

    /// Opens an atomic transaction on LedgerState which allows a closure to make multiple
    /// modifications to the state tree.
    ///
    /// If the closure returns an error, the transaction is dropped atomically and no change is
    /// observed on ledger state.
    fn transaction<F, Res>(&mut self, f: F) -> Result<Res>
    where
        F: FnOnce(&mut LedgerState, &BS) -> Result<Res>,
    {
        let mut mutable_state = self.state.clone();
        let res = f(&mut mutable_state, &self.store)?;
        // if closure didn't error, save state
        self.state = mutable_state;
        Ok(res)
    }
}

impl<BS> Ledger<BS>
where
    BS: Blockstore,
{
    /// Returns the smallest amount of tokens which is indivisible
    ///
    /// Mints and balances must be in multiples of granularity. Granularity never changes after it
    /// is initially set
    pub fn granularity(&self) -> u64 {
        self.granularity
    }

    /// Mints the specified value of tokens into a holder's account
    ///
    /// The amount must be strictly positive and a multiple of the granularity, and the holder
    /// must not be a null address. The checks run in that order and a rejected mint leaves the
    /// ledger untouched.
    ///
    /// Returns the holder's new balance and the new total supply.
    pub fn mint(&mut self, holder: &Address, amount: &TokenAmount) -> Result<MintReturn> {
        let amount = validate_mint_amount(amount, "mint", self.granularity)?;
        if is_null_holder(holder) {
            return Err(LedgerError::InvalidHolder(*holder));
        }

        // balance and supply move together or not at all
        self.transaction(|state, bs| {
            let balance = state.change_balance_by(bs, holder, amount)?;
            let supply = state.change_supply_by(amount)?.clone();
            Ok(MintReturn { balance, supply })
        })
    }

    /// Gets the total number of tokens in existence
    ///
    /// This equals the sum of `balance_of` called on all addresses, which equals the sum of all
    /// successful `mint` calls
    pub fn total_supply(&self) -> TokenAmount {
        self.state.supply.clone()
    }

    /// Returns the balance associated with a particular address
    ///
    /// Holders that have never been minted to implicitly have a zero-balance
    pub fn balance_of(&self, holder: &Address) -> Result<TokenAmount> {
        Ok(self.state.get_balance(&self.store, holder)?)
    }

    /// Returns the number of holders with a non-zero balance
    pub fn count_holders(&self) -> Result<usize> {
        Ok(self.state.count_balances(&self.store)?)
    }

    /// Checks the state invariants, throwing an error if they are not met
    pub fn assert_invariants(&self) -> std::result::Result<StateSummary, Vec<StateInvariantError>> {
        let (summary, errors) = self.check_invariants();
        match errors.is_empty() {
            true => Ok(summary),
            false => Err(errors),
        }
    }

    /// Checks the state invariants, returning a state summary and list of errors
    pub fn check_invariants(&self) -> (StateSummary, Vec<StateInvariantError>) {
        self.state.check_invariants(&self.store, self.granularity)
    }
}

fn check_granularity(granularity: u64) -> Result<()> {
    if granularity == 0 {
        return Err(LedgerError::InvalidGranularity(granularity));
    }
    Ok(())
}

/// Validates that a token amount for minting is strictly positive, and an integer multiple of
/// granularity.
///
/// Positivity is checked first, so zero is rejected as [`LedgerError::InvalidAmount`] even though
/// it is aligned to every granularity.
///
/// Returns the argument, or an error.
pub fn validate_mint_amount<'a>(
    a: &'a TokenAmount,
    name: &'static str,
    granularity: u64,
) -> Result<&'a TokenAmount> {
    if a.is_negative() || a.is_zero() {
        return Err(LedgerError::InvalidAmount { name, amount: a.clone() });
    }
    let (_, modulus) = a.div_rem(granularity);
    if !modulus.is_zero() {
        return Err(LedgerError::SubGranularAmount { name, amount: a.clone(), granularity });
    }
    Ok(a)
}
