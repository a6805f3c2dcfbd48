use serde::{Deserialize, Serialize};

/// JWT payload used for authentication. `sub` is the numeric user id;
/// all caller identity flows through this one representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,    // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}
