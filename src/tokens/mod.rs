pub mod issuer;

pub use issuer::{Claims, TokenError, TokenIssuer, TokenKind, TokenPair};
