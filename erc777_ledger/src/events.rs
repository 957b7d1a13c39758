use fvm_ipld_encoding::RawBytes;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use serde::{Deserialize, Serialize};

/// Events recorded by a token contract for each committed state change
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum TokenEvent {
    /// ERC777 mint notification, always recorded
    Minted { operator: Address, to: Address, amount: TokenAmount, operator_data: RawBytes },
    /// ERC20 transfer notification, only recorded while the ERC20 view is enabled
    ///
    /// `from` is `None` for newly minted tokens.
    Transfer { from: Option<Address>, to: Address, amount: TokenAmount },
}

impl TokenEvent {
    /// The holder credited by this event
    pub fn recipient(&self) -> &Address {
        match self {
            TokenEvent::Minted { to, .. } | TokenEvent::Transfer { to, .. } => to,
        }
    }

    pub fn amount(&self) -> &TokenAmount {
        match self {
            TokenEvent::Minted { amount, .. } | TokenEvent::Transfer { amount, .. } => amount,
        }
    }
}
