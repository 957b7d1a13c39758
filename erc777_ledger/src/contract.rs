//! Contract front-end over a [`Ledger`].
//!
//! [`TokenContract`] plays the part of the deployed token: it owns the ledger, only lets its owner
//! mint, keeps the ERC20 compatibility switch and an event log, and turns every rejected call into
//! an exit code the way a reverted transaction would surface to a client.

use cid::multihash::Code;
use cid::Cid;
use fvm_ipld_blockstore::{Block, Blockstore};
use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_ipld_encoding::{CborStore, RawBytes, DAG_CBOR};
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, LedgerConfig};
use crate::events::TokenEvent;
use crate::ledger::state::LedgerState;
use crate::ledger::types::{
    BalanceReturn, DecimalsReturn, GranularityReturn, MintParams, MintReturn, TotalSupplyReturn,
};
use crate::ledger::{Ledger, LedgerError, TOKEN_DECIMALS};

/// Errors that can occur while executing a contract call
#[derive(Error, Debug)]
pub enum ContractError {
    /// Error from the underlying ledger
    #[error("error in ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("{caller} is not authorised to {action}")]
    Unauthorized { caller: Address, action: &'static str },
    #[error("token is not ERC20 compatible")]
    Erc20Disabled,
    /// Error from (de)serialising call params or returns
    #[error("ipld encoding error: {0}")]
    Encoding(#[from] fvm_ipld_encoding::Error),
    // deserialisation error when loading state
    #[error("error loading contract state {0}")]
    Deserialization(String),
    // serialisation error when saving state
    #[error("error saving contract state {0}")]
    Serialization(String),
    #[error("invalid token config: {0}")]
    Config(#[from] ConfigError),
}

impl From<&ContractError> for ExitCode {
    fn from(error: &ContractError) -> Self {
        match error {
            ContractError::Ledger(e) => e.into(),
            ContractError::Unauthorized { caller: _, action: _ } | ContractError::Erc20Disabled => {
                ExitCode::USR_FORBIDDEN
            }
            ContractError::Encoding(_)
            | ContractError::Deserialization(_)
            | ContractError::Serialization(_) => ExitCode::USR_SERIALIZATION,
            ContractError::Config(_) => ExitCode::USR_ILLEGAL_ARGUMENT,
        }
    }
}

type Result<T> = std::result::Result<T, ContractError>;

/// Outcome of a mint transaction as seen from outside the contract
///
/// A rejected mint carries only its exit code; the reason it was rejected is not exposed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MintReceipt {
    Committed(MintReturn),
    Reverted(ExitCode),
}

impl MintReceipt {
    pub fn is_committed(&self) -> bool {
        matches!(self, MintReceipt::Committed(_))
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            MintReceipt::Committed(_) => ExitCode::OK,
            MintReceipt::Reverted(code) => *code,
        }
    }
}

/// Persisted form of a token contract
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct ContractState {
    pub name: String,
    pub symbol: String,
    pub granularity: u64,
    /// The only address allowed to mint or flip the ERC20 switch
    pub owner: Address,
    pub erc20_compatible: bool,
    pub ledger: LedgerState,
}

pub struct TokenContract<BS>
where
    BS: Blockstore,
{
    ledger: Ledger<BS>,
    name: String,
    symbol: String,
    owner: Address,
    erc20_compatible: bool,
    /// Events emitted since construction or the last `take_events`
    events: Vec<TokenEvent>,
}

impl<BS> TokenContract<BS>
where
    BS: Blockstore,
{
    /// Constructs a token with an empty ledger
    pub fn new(store: BS, owner: Address, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let ledger = Ledger::new_with_bit_width(store, config.granularity, config.hamt_bit_width)?;
        debug!(
            name = %config.name,
            symbol = %config.symbol,
            granularity = config.granularity,
            "token constructed"
        );
        Ok(Self {
            ledger,
            name: config.name,
            symbol: config.symbol,
            owner,
            erc20_compatible: config.erc20_compatible,
            events: vec![],
        })
    }

    /// Reopens a contract previously saved at `cid`
    ///
    /// The event log is not persisted and starts out empty.
    pub fn load(store: BS, cid: &Cid) -> Result<Self> {
        let state = match store.get_cbor::<ContractState>(cid) {
            Ok(Some(s)) => s,
            Ok(None) => return Err(ContractError::Deserialization("no data found".into())),
            Err(e) => return Err(ContractError::Deserialization(e.to_string())),
        };
        Ok(Self {
            ledger: Ledger::wrap(store, state.granularity, state.ledger)?,
            name: state.name,
            symbol: state.symbol,
            owner: state.owner,
            erc20_compatible: state.erc20_compatible,
            events: vec![],
        })
    }

    /// Saves the contract state to its blockstore, returning the root cid
    pub fn save(&self) -> Result<Cid> {
        let state = ContractState {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            granularity: self.ledger.granularity(),
            owner: self.owner,
            erc20_compatible: self.erc20_compatible,
            ledger: self.ledger.state().clone(),
        };
        let serialized = fvm_ipld_encoding::to_vec(&state)
            .map_err(|err| ContractError::Serialization(err.to_string()))?;
        let block = Block { codec: DAG_CBOR, data: serialized };
        self.ledger
            .store()
            .put(Code::Blake2b256, &block)
            .map_err(|err| ContractError::Serialization(err.to_string()))
    }

    pub fn name(&self) -> String {
        self.name.clone()
    }

    pub fn symbol(&self) -> String {
        self.symbol.clone()
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn granularity(&self) -> GranularityReturn {
        self.ledger.granularity()
    }

    /// Number of decimals, part of the ERC20 view only
    pub fn decimals(&self) -> Result<DecimalsReturn> {
        if !self.erc20_compatible {
            return Err(ContractError::Erc20Disabled);
        }
        Ok(TOKEN_DECIMALS)
    }

    pub fn is_erc20_compatible(&self) -> bool {
        self.erc20_compatible
    }

    pub fn total_supply(&self) -> TotalSupplyReturn {
        self.ledger.total_supply()
    }

    pub fn balance_of(&self, holder: &Address) -> Result<BalanceReturn> {
        Ok(self.ledger.balance_of(holder)?)
    }

    pub fn ledger(&self) -> &Ledger<BS> {
        &self.ledger
    }

    /// Mints new tokens to `params.holder`
    ///
    /// Only the owner may mint. On success a `Minted` event is recorded, followed by an ERC20
    /// `Transfer` from nobody when the ERC20 view is enabled.
    pub fn mint(&mut self, caller: &Address, params: MintParams) -> Result<MintReturn> {
        self.require_owner(caller, "mint")?;

        let ret = self.ledger.mint(&params.holder, &params.amount)?;

        self.events.push(TokenEvent::Minted {
            operator: *caller,
            to: params.holder,
            amount: params.amount.clone(),
            operator_data: params.operator_data,
        });
        if self.erc20_compatible {
            self.events.push(TokenEvent::Transfer {
                from: None,
                to: params.holder,
                amount: params.amount,
            });
        }

        Ok(ret)
    }

    /// Runs a mint as a transaction, collapsing any failure into a reverted receipt
    pub fn submit_mint(&mut self, caller: &Address, params: MintParams) -> MintReceipt {
        let holder = params.holder;
        let amount = params.amount.clone();
        match self.mint(caller, params) {
            Ok(ret) => {
                info!(%caller, %holder, %amount, supply = %ret.supply, "mint committed");
                MintReceipt::Committed(ret)
            }
            Err(e) => {
                let exit_code = ExitCode::from(&e);
                warn!(%caller, %holder, %amount, ?exit_code, error = %e, "mint reverted");
                MintReceipt::Reverted(exit_code)
            }
        }
    }

    /// Runs a mint from CBOR encoded [`MintParams`], returning the CBOR encoded [`MintReturn`]
    ///
    /// Malformed params revert with `USR_SERIALIZATION`.
    pub fn submit_mint_raw(
        &mut self,
        caller: &Address,
        params: &RawBytes,
    ) -> std::result::Result<RawBytes, ExitCode> {
        let params: MintParams = params.deserialize().map_err(|e| {
            let e = ContractError::from(e);
            warn!(%caller, error = %e, "mint reverted");
            ExitCode::from(&e)
        })?;
        match self.submit_mint(caller, params) {
            MintReceipt::Committed(ret) => {
                RawBytes::serialize(ret).map_err(|e| ExitCode::from(&ContractError::from(e)))
            }
            MintReceipt::Reverted(code) => Err(code),
        }
    }

    /// Turns the ERC20 view back on
    pub fn enable_erc20(&mut self, caller: &Address) -> Result<()> {
        self.require_owner(caller, "enable erc20")?;
        self.erc20_compatible = true;
        info!(%caller, "erc20 compatibility enabled");
        Ok(())
    }

    /// Turns the ERC20 view off. Mints keep working but no longer emit `Transfer` events
    pub fn disable_erc20(&mut self, caller: &Address) -> Result<()> {
        self.require_owner(caller, "disable erc20")?;
        self.erc20_compatible = false;
        info!(%caller, "erc20 compatibility disabled");
        Ok(())
    }

    pub fn events(&self) -> &[TokenEvent] {
        &self.events
    }

    /// Drains the event log
    pub fn take_events(&mut self) -> Vec<TokenEvent> {
        std::mem::take(&mut self.events)
    }

    fn require_owner(&self, caller: &Address, action: &'static str) -> Result<()> {
        if *caller != self.owner {
            return Err(ContractError::Unauthorized { caller: *caller, action });
        }
        Ok(())
    }
}

/// Mint params for `amount` to `holder` with no operator data
pub fn mint_params(holder: Address, amount: TokenAmount) -> MintParams {
    MintParams { holder, amount, operator_data: RawBytes::default() }
}

#[cfg(test)]
mod test {
    use cid::multihash::Code;
    use fvm_actor_utils::shared_blockstore::SharedMemoryBlockstore;
    use fvm_ipld_blockstore::MemoryBlockstore;
    use fvm_ipld_encoding::{CborStore, RawBytes};
    use fvm_shared::address::Address;
    use fvm_shared::econ::TokenAmount;
    use fvm_shared::error::ExitCode;
    use num_traits::Zero;

    use super::{mint_params, ContractError, ContractState, MintReceipt, TokenContract};
    use crate::config::LedgerConfig;
    use crate::events::TokenEvent;
    use crate::ledger::state::LedgerState;
    use crate::ledger::types::{MintParams, MintReturn};
    use crate::ledger::{LedgerError, TOKEN_PRECISION};

    const OWNER: &Address = &Address::new_id(100);
    const ALICE: &Address = &Address::new_id(101);
    const BOB: &Address = &Address::new_id(102);

    fn new_contract() -> TokenContract<MemoryBlockstore> {
        let config = LedgerConfig::new("Test Token", "TEST", TOKEN_PRECISION / 100);
        TokenContract::new(MemoryBlockstore::default(), *OWNER, config).unwrap()
    }

    #[test]
    fn it_exposes_metadata() {
        let contract = new_contract();
        assert_eq!(contract.name(), "Test Token");
        assert_eq!(contract.symbol(), "TEST");
        assert_eq!(contract.granularity(), TOKEN_PRECISION / 100);
        assert_eq!(contract.owner(), *OWNER);
        assert_eq!(contract.decimals().unwrap(), 18);
        assert_eq!(contract.total_supply(), TokenAmount::zero());
    }

    #[test]
    fn it_refuses_invalid_config() {
        let config = LedgerConfig { granularity: 0, ..Default::default() };
        let err = TokenContract::new(MemoryBlockstore::default(), *OWNER, config).err().unwrap();
        assert!(matches!(err, ContractError::Config(_)));
        assert_eq!(ExitCode::from(&err), ExitCode::USR_ILLEGAL_ARGUMENT);
    }

    #[test]
    fn it_mints_and_records_events() {
        let mut contract = new_contract();
        let params = MintParams {
            holder: *ALICE,
            amount: TokenAmount::from_whole(10),
            operator_data: RawBytes::new(vec![1, 2, 3]),
        };

        let ret = contract.mint(OWNER, params).unwrap();
        assert_eq!(ret.balance, TokenAmount::from_whole(10));
        assert_eq!(ret.supply, TokenAmount::from_whole(10));

        assert_eq!(
            contract.take_events(),
            vec![
                TokenEvent::Minted {
                    operator: *OWNER,
                    to: *ALICE,
                    amount: TokenAmount::from_whole(10),
                    operator_data: RawBytes::new(vec![1, 2, 3]),
                },
                TokenEvent::Transfer {
                    from: None,
                    to: *ALICE,
                    amount: TokenAmount::from_whole(10)
                },
            ]
        );
        assert!(contract.events().is_empty());
    }

    #[test]
    fn it_only_lets_the_owner_mint() {
        let mut contract = new_contract();

        let params = mint_params(*ALICE, TokenAmount::from_whole(1));
        let err = contract.mint(ALICE, params).unwrap_err();
        match &err {
            ContractError::Unauthorized { caller, action } => {
                assert_eq!(*caller, *ALICE);
                assert_eq!(*action, "mint");
            }
            e => panic!("unexpected error {e:?}"),
        }
        assert_eq!(ExitCode::from(&err), ExitCode::USR_FORBIDDEN);

        assert_eq!(contract.balance_of(ALICE).unwrap(), TokenAmount::zero());
        assert_eq!(contract.total_supply(), TokenAmount::zero());
        assert!(contract.events().is_empty());
    }

    #[test]
    fn it_collapses_rejections_into_reverts() {
        let mut contract = new_contract();

        let negative =
            contract.submit_mint(OWNER, mint_params(*ALICE, TokenAmount::from_whole(-10)));
        let sub_granular =
            contract.submit_mint(OWNER, mint_params(*ALICE, TokenAmount::from_nano(7_000_000)));

        assert_eq!(negative, MintReceipt::Reverted(ExitCode::USR_ILLEGAL_ARGUMENT));
        assert_eq!(negative, sub_granular);
        assert!(!negative.is_committed());

        assert_eq!(contract.balance_of(ALICE).unwrap(), TokenAmount::zero());
        assert_eq!(contract.total_supply(), TokenAmount::zero());
        assert!(contract.events().is_empty());

        let ok = contract.submit_mint(OWNER, mint_params(*ALICE, TokenAmount::from_whole(1)));
        assert!(ok.is_committed());
        assert_eq!(ok.exit_code(), ExitCode::OK);
        assert_eq!(contract.events().len(), 2);
        for event in contract.events() {
            assert_eq!(event.recipient(), ALICE);
            assert_eq!(event.amount(), &TokenAmount::from_whole(1));
        }
    }

    #[test]
    fn it_skips_erc20_events_when_disabled() {
        let mut contract = new_contract();

        contract.disable_erc20(ALICE).unwrap_err();
        contract.disable_erc20(OWNER).unwrap();
        assert!(!contract.is_erc20_compatible());
        assert!(matches!(contract.decimals().unwrap_err(), ContractError::Erc20Disabled));

        contract.mint(OWNER, mint_params(*BOB, TokenAmount::from_whole(10))).unwrap();
        assert_eq!(contract.balance_of(BOB).unwrap(), TokenAmount::from_whole(10));
        assert_eq!(contract.total_supply(), TokenAmount::from_whole(10));

        let events = contract.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], TokenEvent::Minted { .. }));

        contract.enable_erc20(OWNER).unwrap();
        contract.mint(OWNER, mint_params(*BOB, TokenAmount::from_whole(10))).unwrap();
        assert_eq!(contract.take_events().len(), 2);
    }

    #[test]
    fn it_mints_from_raw_params() {
        let mut contract = new_contract();

        let params = RawBytes::serialize(mint_params(*ALICE, TokenAmount::from_whole(3))).unwrap();
        let ret: MintReturn =
            contract.submit_mint_raw(OWNER, &params).unwrap().deserialize().unwrap();
        assert_eq!(ret.balance, TokenAmount::from_whole(3));

        let code = contract.submit_mint_raw(OWNER, &RawBytes::new(vec![0xff])).unwrap_err();
        assert_eq!(code, ExitCode::USR_SERIALIZATION);

        let params = RawBytes::serialize(mint_params(*ALICE, TokenAmount::zero())).unwrap();
        let code = contract.submit_mint_raw(OWNER, &params).unwrap_err();
        assert_eq!(code, ExitCode::USR_ILLEGAL_ARGUMENT);
        assert_eq!(contract.total_supply(), TokenAmount::from_whole(3));
    }

    #[test]
    fn it_saves_and_reloads() {
        let store = SharedMemoryBlockstore::new();
        let config = LedgerConfig::new("Saved Token", "SAVE", 1);
        let mut contract = TokenContract::new(store.clone(), *OWNER, config).unwrap();
        contract.mint(OWNER, mint_params(*ALICE, TokenAmount::from_atto(500))).unwrap();
        contract.disable_erc20(OWNER).unwrap();
        let cid = contract.save().unwrap();

        let reloaded = TokenContract::load(store, &cid).unwrap();
        assert_eq!(reloaded.name(), "Saved Token");
        assert_eq!(reloaded.owner(), *OWNER);
        assert!(!reloaded.is_erc20_compatible());
        assert_eq!(reloaded.balance_of(ALICE).unwrap(), TokenAmount::from_atto(500));
        assert_eq!(reloaded.total_supply(), TokenAmount::from_atto(500));
        assert!(reloaded.events().is_empty());
        reloaded.ledger().assert_invariants().unwrap();
    }

    #[test]
    fn it_refuses_to_load_zero_granularity() {
        let store = SharedMemoryBlockstore::new();
        let state = ContractState {
            name: "Broken Token".into(),
            symbol: "BRK".into(),
            granularity: 0,
            owner: *OWNER,
            erc20_compatible: true,
            ledger: LedgerState::new(&store).unwrap(),
        };
        let cid = store.put_cbor(&state, Code::Blake2b256).unwrap();

        let err = TokenContract::load(store, &cid).err().unwrap();
        assert!(matches!(err, ContractError::Ledger(LedgerError::InvalidGranularity(0))));
        assert_eq!(ExitCode::from(&err), ExitCode::USR_ILLEGAL_ARGUMENT);
    }
}
