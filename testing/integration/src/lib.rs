//! Shared helpers for driving a token contract from integration tests.

use erc777_ledger::config::LedgerConfig;
use erc777_ledger::contract::{mint_params, MintReceipt, TokenContract};
use erc777_ledger::ledger::types::MintReturn;
use fvm_ipld_blockstore::{Blockstore, MemoryBlockstore};
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use num_traits::Zero;
use tracing_subscriber::EnvFilter;

/// Address that constructs, and is allowed to mint on, every test token
pub const TOKEN_OWNER: Address = Address::new_id(100);

/// Installs a test-friendly tracing subscriber, filtered by `RUST_LOG`
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Construct a token contract over a fresh in-memory blockstore
pub fn construct_token(granularity: u64) -> TokenContract<MemoryBlockstore> {
    construct_token_with_config(LedgerConfig::new("Test Token", "TEST", granularity))
}

pub fn construct_token_with_config(config: LedgerConfig) -> TokenContract<MemoryBlockstore> {
    init_tracing();
    TokenContract::new(MemoryBlockstore::default(), TOKEN_OWNER, config).unwrap()
}

/// Helper routines to simplify common token operations
pub trait TokenHelper {
    /// Mint tokens to target as the token owner
    fn mint_tokens(&mut self, target: Address, amount: TokenAmount) -> MintReceipt;

    /// Mint tokens to target and assert a successful result
    fn mint_tokens_ok(&mut self, target: Address, amount: TokenAmount) -> MintReturn;

    /// Mint tokens to target and assert the mint reverted with the given exit code
    fn mint_tokens_reverted(&mut self, target: Address, amount: TokenAmount, code: ExitCode);

    /// Check token balance, asserting that balance matches the provided amount
    fn assert_token_balance(&self, target: Address, amount: TokenAmount);

    /// Check token balance, asserting a zero balance
    fn assert_token_balance_zero(&self, target: Address);

    fn assert_total_supply(&self, amount: TokenAmount);
}

impl<BS: Blockstore> TokenHelper for TokenContract<BS> {
    fn mint_tokens(&mut self, target: Address, amount: TokenAmount) -> MintReceipt {
        self.submit_mint(&TOKEN_OWNER, mint_params(target, amount))
    }

    fn mint_tokens_ok(&mut self, target: Address, amount: TokenAmount) -> MintReturn {
        match self.mint_tokens(target, amount) {
            MintReceipt::Committed(ret) => ret,
            MintReceipt::Reverted(code) => panic!("mint to {target} reverted with {code:?}"),
        }
    }

    fn mint_tokens_reverted(&mut self, target: Address, amount: TokenAmount, code: ExitCode) {
        let receipt = self.mint_tokens(target, amount);
        assert_eq!(receipt, MintReceipt::Reverted(code));
    }

    fn assert_token_balance(&self, target: Address, amount: TokenAmount) {
        let balance = self.balance_of(&target).unwrap();
        assert_eq!(balance, amount);
    }

    fn assert_token_balance_zero(&self, target: Address) {
        self.assert_token_balance(target, TokenAmount::zero());
    }

    fn assert_total_supply(&self, amount: TokenAmount) {
        assert_eq!(self.total_supply(), amount);
    }
}
