use fvm_shared::address::Address;
use fvm_shared::econ::TokenAmount;
use fvm_shared::error::ExitCode;
use thiserror::Error;

use crate::ledger::state::StateError as LedgerStateError;
use crate::ledger::state::StateInvariantError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("error in underlying state {0}")]
    LedgerState(#[from] LedgerStateError),
    #[error("amount {amount:?} for {name:?} must be strictly positive")]
    InvalidAmount { name: &'static str, amount: TokenAmount },
    #[error("amount {amount:?} for {name:?} must be a multiple of {granularity:?}")]
    SubGranularAmount { name: &'static str, amount: TokenAmount, granularity: u64 },
    #[error("{0} cannot hold tokens")]
    InvalidHolder(Address),
    #[error("granularity must be at least 1, got {0}")]
    InvalidGranularity(u64),
    #[error("error in state invariants {0}")]
    StateInvariant(#[from] StateInvariantError),
    #[error("ledger lock was poisoned by a panicking writer")]
    Poisoned,
}

impl From<&LedgerError> for ExitCode {
    fn from(error: &LedgerError) -> Self {
        match error {
            // rejected mints all look the same to the caller
            LedgerError::InvalidAmount { name: _, amount: _ }
            | LedgerError::SubGranularAmount { name: _, amount: _, granularity: _ }
            | LedgerError::InvalidHolder(_) => ExitCode::USR_ILLEGAL_ARGUMENT,
            LedgerError::InvalidGranularity(_) => ExitCode::USR_ILLEGAL_ARGUMENT,
            LedgerError::StateInvariant(_) | LedgerError::Poisoned => ExitCode::USR_ILLEGAL_STATE,
            LedgerError::LedgerState(state_error) => match state_error {
                LedgerStateError::IpldHamt(_) | LedgerStateError::Serialization(_) => {
                    ExitCode::USR_SERIALIZATION
                }
                LedgerStateError::MissingState(_)
                | LedgerStateError::NegativeTotalSupply { supply: _, delta: _ } => {
                    ExitCode::USR_ILLEGAL_STATE
                }
                LedgerStateError::InsufficientBalance { holder: _, balance: _, delta: _ } => {
                    ExitCode::USR_INSUFFICIENT_FUNDS
                }
            },
        }
    }
}

#[cfg(test)]
mod test {
    use fvm_shared::address::Address;
    use fvm_shared::econ::TokenAmount;
    use fvm_shared::error::ExitCode;

    use crate::ledger::LedgerError;
    use crate::ledger::LedgerStateError;

    #[test]
    fn it_creates_exit_codes() {
        let error = LedgerError::LedgerState(LedgerStateError::MissingState(cid::Cid::default()));
        let msg = error.to_string();
        let exit_code = ExitCode::from(&error);
        // taking the exit code doesn't consume the error
        println!("{}: {:?}", msg, exit_code);
        assert_eq!(exit_code, ExitCode::USR_ILLEGAL_STATE);
    }

    #[test]
    fn rejected_mints_share_an_exit_code() {
        let negative =
            LedgerError::InvalidAmount { name: "mint", amount: TokenAmount::from_atto(-10) };
        let sub_granular = LedgerError::SubGranularAmount {
            name: "mint",
            amount: TokenAmount::from_atto(7),
            granularity: 100,
        };
        let null_holder = LedgerError::InvalidHolder(Address::new_id(0));

        assert_eq!(ExitCode::from(&negative), ExitCode::USR_ILLEGAL_ARGUMENT);
        assert_eq!(ExitCode::from(&negative), ExitCode::from(&sub_granular));
        assert_eq!(ExitCode::from(&sub_granular), ExitCode::from(&null_holder));
    }
}
