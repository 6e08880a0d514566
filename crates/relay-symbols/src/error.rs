//! Symbol resolution error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("No usable mapping for master symbol {symbol}")]
    Unresolved { symbol: String },

    #[error("Mapping for {symbol} is disabled")]
    Disabled { symbol: String },

    #[error(
        "Mapping for {symbol} has confidence {confidence} below the usable \
         threshold and no manual confirmation"
    )]
    BelowConfidence { symbol: String, confidence: u8 },
}

pub type SymbolResult<T> = Result<T, SymbolError>;
