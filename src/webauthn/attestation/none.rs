use super::{ProviderOutput, StatementContext};
use crate::webauthn::types::VerifyError;

/// `none`: nothing to check beyond an empty statement. The key stays the
/// COSE_Key from authenticator data.
pub fn verify(ctx: &StatementContext<'_>) -> Result<ProviderOutput, VerifyError> {
    if !ctx.statement.is_empty() {
        return Err(VerifyError::UnexpectedAttestationStatement);
    }
    Ok(ProviderOutput::default())
}
