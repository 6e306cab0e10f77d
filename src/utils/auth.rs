use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Capability names checked by the gateways
pub mod capabilities {
    pub const DONOR_READ: &str = "donor.read";
    pub const DONOR_UPDATE: &str = "donor.update";
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user_id
    pub exp: usize,
    pub jti: String,
    /// Capabilities granted to the user by the issuing application
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Claims {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.permissions.iter().any(|p| p == capability)
    }
}

pub fn create_jwt(
    user_id: &str,
    permissions: &[String],
    secret: &str,
    ttl: Duration,
) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| anyhow::anyhow!("token expiry overflows"))?
        .timestamp();

    let claims = Claims {
        sub: user_id.to_owned(),
        exp: expiration as usize,
        jti: uuid::Uuid::new_v4().to_string(),
        permissions: permissions.to_vec(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok(token)
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}
