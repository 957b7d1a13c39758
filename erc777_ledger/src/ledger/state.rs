use std::collections::HashMap;

use cid::multihash::Code;
use cid::Cid;
use fvm_ipld_blockstore::Block;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use fvm_ipld_encoding::CborStore;
use fvm_ipld_encoding::DAG_CBOR;
use fvm_ipld_hamt::Hamt;
use fvm_ipld_hamt::{BytesKey, Error as HamtError};
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use num_traits::Zero;
use thiserror::Error;

use crate::holder::{decode_holder_key, holder_key};

/// This value has been chosen to keep the balances map shallow for ledgers with a modest number of
/// holders. Ledgers with very many holders may find a wider HAMT cheaper to walk.
pub const DEFAULT_HAMT_BIT_WIDTH: u32 = 3;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("ipld hamt error: {0}")]
    IpldHamt(#[from] HamtError),
    #[error("missing state at cid: {0}")]
    MissingState(Cid),
    #[error("underlying serialization error: {0}")]
    Serialization(String),
    #[error("negative balance caused by changing {holder}'s balance of {balance:?} by {delta:?}")]
    InsufficientBalance { holder: Address, balance: TokenAmount, delta: TokenAmount },
    #[error("total_supply cannot be negative, cannot apply delta of {delta:?} to {supply:?}")]
    NegativeTotalSupply { supply: TokenAmount, delta: TokenAmount },
}

#[derive(Error, Debug)]
pub enum StateInvariantError {
    #[error("total supply was negative: {0}")]
    SupplyNegative(TokenAmount),
    #[error("the account for {holder} had a negative balance of {balance:?}")]
    BalanceNegative { holder: Address, balance: TokenAmount },
    #[error("the total supply {supply:?} does not match the sum of all balances {balance_sum:?}")]
    BalanceSupplyMismatch { supply: TokenAmount, balance_sum: TokenAmount },
    #[error("stored a zero balance which should have been removed for {0}")]
    ExplicitZeroBalance(Address),
    #[error("invalid serialized holder key {0:?}")]
    InvalidHolderKey(BytesKey),
    #[error("balance {balance:?} of {holder} is not a multiple of granularity {granularity}")]
    InvalidGranularity { holder: Address, balance: TokenAmount, granularity: u64 },
    #[error("underlying state error {0}")]
    State(#[from] StateError),
}

type Result<T> = std::result::Result<T, StateError>;

type BalanceMap<'bs, BS> = Hamt<&'bs BS, TokenAmount, BytesKey>;

/// Ledger state IPLD structure
#[derive(Serialize_tuple, Deserialize_tuple, PartialEq, Eq, Clone, Debug)]
pub struct LedgerState {
    /// Total supply of token
    pub supply: TokenAmount,
    /// Map<Address, TokenAmount> of balances as a Hamt
    pub balances: Cid,
    /// Bit-width to use when loading Hamts
    hamt_bit_width: u32,
}

/// An abstraction over the IPLD layer to read and modify balances without dealing with HAMTs.
///
/// This is a plain wrapper of state and does not apply mint rules such as positivity or
/// granularity; callers handle those. It does refuse to store a negative balance or supply.
impl LedgerState {
    /// Create a new ledger state-tree, without committing it (the root cid) to a blockstore
    pub fn new<BS: Blockstore>(store: &BS) -> Result<Self> {
        Self::new_with_bit_width(store, DEFAULT_HAMT_BIT_WIDTH)
    }

    /// Create a new ledger state-tree, without committing it (the root cid) to a blockstore
    ///
    /// Explicitly sets the bit width of the balances Hamt. Caller must ensure
    /// 1 <= hamt_bit_width <= 8.
    pub fn new_with_bit_width<BS: Blockstore>(store: &BS, hamt_bit_width: u32) -> Result<Self> {
        // blockstore is still needed to create a valid Cid for the empty Hamt
        let empty_balance_map = BalanceMap::new_with_bit_width(store, hamt_bit_width).flush()?;

        Ok(Self { supply: Default::default(), balances: empty_balance_map, hamt_bit_width })
    }

    /// Loads a fresh copy of the state from a blockstore from a given cid
    pub fn load<BS: Blockstore>(bs: &BS, cid: &Cid) -> Result<Self> {
        match bs.get_cbor::<Self>(cid) {
            Ok(Some(state)) => Ok(state),
            Ok(None) => Err(StateError::MissingState(*cid)),
            Err(err) => Err(StateError::Serialization(err.to_string())),
        }
    }

    /// Saves the current state to the blockstore, returning the cid
    pub fn save<BS: Blockstore>(&self, bs: &BS) -> Result<Cid> {
        let serialized = fvm_ipld_encoding::to_vec(self)
            .map_err(|err| StateError::Serialization(err.to_string()))?;
        let block = Block { codec: DAG_CBOR, data: serialized };
        bs.put(Code::Blake2b256, &block).map_err(|err| StateError::Serialization(err.to_string()))
    }

    pub fn hamt_bit_width(&self) -> u32 {
        self.hamt_bit_width
    }

    /// Get the balance of a holder from the currently stored state
    pub fn get_balance<BS: Blockstore>(&self, bs: &BS, holder: &Address) -> Result<TokenAmount> {
        let balances = self.get_balance_map(bs)?;

        let balance = match balances.get(&holder_key(holder))? {
            Some(amount) => amount.clone(),
            None => TokenAmount::zero(),
        };

        Ok(balance)
    }

    /// Changes the balance of the specified holder by the delta
    ///
    /// Caller must ensure that the delta is consistent with mint rules. Returns the new balance of
    /// the holder.
    pub fn change_balance_by<BS: Blockstore>(
        &mut self,
        bs: &BS,
        holder: &Address,
        delta: &TokenAmount,
    ) -> Result<TokenAmount> {
        if delta.is_zero() {
            return self.get_balance(bs, holder);
        }

        let mut balance_map = self.get_balance_map(bs)?;
        let key = holder_key(holder);
        let balance = match balance_map.get(&key)? {
            Some(amount) => amount.clone(),
            None => TokenAmount::zero(),
        };

        let new_balance = &balance + delta;
        if new_balance.is_negative() {
            return Err(StateError::InsufficientBalance {
                holder: *holder,
                balance,
                delta: delta.clone(),
            });
        }

        // zero balances are implicit
        if new_balance.is_zero() {
            balance_map.delete(&key)?;
        } else {
            balance_map.set(key, new_balance.clone())?;
        }

        self.balances = balance_map.flush()?;

        Ok(new_balance)
    }

    /// Retrieve the balance map as a HAMT
    pub fn get_balance_map<'bs, BS: Blockstore>(&self, bs: &'bs BS) -> Result<BalanceMap<'bs, BS>> {
        Ok(BalanceMap::load_with_bit_width(&self.balances, bs, self.hamt_bit_width)?)
    }

    /// Retrieve the number of holders with a non-zero balance
    ///
    /// This involves iterating through the entire HAMT
    pub fn count_balances<BS: Blockstore>(&self, bs: &BS) -> Result<usize> {
        let balance_map = self.get_balance_map(bs)?;
        let mut count = 0;
        balance_map.for_each(|_, _| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    /// Increase/decrease the total supply by the specified value
    ///
    /// Returns the new total supply
    pub fn change_supply_by(&mut self, delta: &TokenAmount) -> Result<&TokenAmount> {
        let new_supply = &self.supply + delta;
        if new_supply.is_negative() {
            return Err(StateError::NegativeTotalSupply {
                supply: self.supply.clone(),
                delta: delta.clone(),
            });
        }

        self.supply = new_supply;
        Ok(&self.supply)
    }

    /// Checks that the current state obeys all ledger invariants
    ///
    /// Checks that no zero balances are explicitly stored, that balances and total supply are
    /// never negative, that every balance is a multiple of the granularity and that the sum of all
    /// balances matches the total supply.
    ///
    /// Returns a state summary that can be used to check application specific invariants, along
    /// with every violation found.
    pub fn check_invariants<BS: Blockstore>(
        &self,
        bs: &BS,
        granularity: u64,
    ) -> (StateSummary, Vec<StateInvariantError>) {
        let mut errors: Vec<StateInvariantError> = vec![];

        if self.supply.is_negative() {
            errors.push(StateInvariantError::SupplyNegative(self.supply.clone()));
        }

        let (balance_map, balance_sum) = match self.get_balance_map(bs) {
            Ok(map) => {
                let mut balances = HashMap::new();
                let mut balance_sum = TokenAmount::zero();
                let res = map.for_each(|key, balance| {
                    let holder = match decode_holder_key(key) {
                        Some(holder) => holder,
                        None => {
                            errors.push(StateInvariantError::InvalidHolderKey(key.clone()));
                            return Ok(());
                        }
                    };

                    if balance.is_negative() {
                        errors.push(StateInvariantError::BalanceNegative {
                            holder,
                            balance: balance.clone(),
                        });
                    }
                    if balance.is_zero() {
                        errors.push(StateInvariantError::ExplicitZeroBalance(holder));
                    }
                    let (_, modulus) = balance.div_rem(granularity);
                    if !modulus.is_zero() {
                        errors.push(StateInvariantError::InvalidGranularity {
                            holder,
                            balance: balance.clone(),
                            granularity,
                        });
                    }

                    balance_sum = &balance_sum + balance;
                    balances.insert(holder, balance.clone());
                    Ok(())
                });

                match res {
                    Ok(()) => (Some(balances), Some(balance_sum)),
                    Err(e) => {
                        errors.push(StateError::from(e).into());
                        (None, None)
                    }
                }
            }
            Err(e) => {
                errors.push(e.into());
                (None, None)
            }
        };

        if let Some(balance_sum) = balance_sum {
            if balance_sum != self.supply {
                errors.push(StateInvariantError::BalanceSupplyMismatch {
                    supply: self.supply.clone(),
                    balance_sum,
                });
            }
        }

        (StateSummary { balance_map, total_supply: self.supply.clone() }, errors)
    }
}

/// A summary of the current state to allow checking application specific invariants
///
/// `balance_map` is `None` if the balances Hamt could not be walked.
#[derive(Clone, Debug)]
pub struct StateSummary {
    pub balance_map: Option<HashMap<Address, TokenAmount>>,
    pub total_supply: TokenAmount,
}
