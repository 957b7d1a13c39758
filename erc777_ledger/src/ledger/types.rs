use fvm_ipld_encoding::tuple::{Deserialize_tuple, Serialize_tuple};
use fvm_ipld_encoding::RawBytes;
use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;

pub type GranularityReturn = u64;
pub type TotalSupplyReturn = TokenAmount;
pub type BalanceReturn = TokenAmount;
pub type DecimalsReturn = u8;

/// Instruction to mint new tokens to a holder
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct MintParams {
    pub holder: Address,
    /// A strictly positive amount, in multiples of the granularity
    pub amount: TokenAmount,
    /// Arbitrary data recorded alongside the mint
    pub operator_data: RawBytes,
}

/// Return value after a successful mint
#[derive(Serialize_tuple, Deserialize_tuple, Clone, Debug, PartialEq, Eq)]
pub struct MintReturn {
    /// The new balance of the holder
    pub balance: TokenAmount,
    /// The new total supply
    pub supply: TokenAmount,
}
