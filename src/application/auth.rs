//! Bearer-token authentication and role checks for write operations.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::domain::types::Role;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed authorization header")]
    Malformed,
    #[error("unknown token")]
    Invalid,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("authentication required for `{required}` access")]
    Unauthenticated { required: Role },
    #[error("`{name}` has role `{actual}` but `{required}` is required")]
    Forbidden {
        name: String,
        actual: Role,
        required: Role,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    token_sha256: Vec<u8>,
}

impl Credential {
    pub fn new(
        name: impl Into<String>,
        email: Option<String>,
        role: Role,
        token_sha256_hex: &str,
    ) -> Result<Self, hex::FromHexError> {
        let token_sha256 = hex::decode(token_sha256_hex.trim())?;
        if token_sha256.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self {
            name: name.into(),
            email,
            role,
            token_sha256,
        })
    }

    fn principal(&self) -> Principal {
        Principal {
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[derive(Clone, Default)]
pub struct Authenticator {
    credentials: Arc<Vec<Credential>>,
}

impl Authenticator {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            credentials: Arc::new(credentials),
        }
    }

    /// Authenticate the value of an `Authorization` header.
    pub fn authenticate_header(&self, header: &str) -> Result<Principal, AuthError> {
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::Malformed)?;
        self.authenticate(token)
    }

    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let digest = digest_token(token);
        let mut matched = None;
        for credential in self.credentials.iter() {
            if credential.token_sha256.ct_eq(&digest).unwrap_u8() == 1 && matched.is_none() {
                matched = Some(credential);
            }
        }
        matched.map(Credential::principal).ok_or(AuthError::Invalid)
    }
}

/// Check a (possibly anonymous) viewer against an action's required role.
pub fn authorize(principal: Option<&Principal>, required: Option<Role>) -> Result<(), AccessDenied> {
    let Some(required) = required else {
        return Ok(());
    };
    match principal {
        None => Err(AccessDenied::Unauthenticated { required }),
        Some(principal) if principal.role.satisfies(required) => Ok(()),
        Some(principal) => Err(AccessDenied::Forbidden {
            name: principal.name.clone(),
            actual: principal.role,
            required,
        }),
    }
}

/// Hex SHA-256 of a token, the form stored in configuration.
pub fn hash_token(token: &str) -> String {
    hex::encode(digest_token(token))
}

fn digest_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(vec![
            Credential::new("reader", None, Role::User, &hash_token("user-token")).unwrap(),
            Credential::new(
                "owner",
                Some("owner@example.com".to_string()),
                Role::Admin,
                &hash_token("admin-token"),
            )
            .unwrap(),
        ])
    }

    #[test]
    fn hash_token_is_hex_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn bearer_tokens_map_to_principals() {
        let auth = authenticator();
        let principal = auth.authenticate_header("Bearer admin-token").unwrap();
        assert_eq!(principal.name, "owner");
        assert_eq!(principal.role, Role::Admin);

        assert_eq!(
            auth.authenticate_header("Bearer nope"),
            Err(AuthError::Invalid)
        );
        assert_eq!(
            auth.authenticate_header("Basic Zm9vOmJhcg=="),
            Err(AuthError::Malformed)
        );
    }

    #[test]
    fn credentials_reject_bad_digests() {
        assert!(Credential::new("x", None, Role::User, "zz").is_err());
        assert!(Credential::new("x", None, Role::User, "abcd").is_err());
    }

    #[test]
    fn roles_gate_access() {
        let auth = authenticator();
        let user = auth.authenticate("user-token").unwrap();
        let admin = auth.authenticate("admin-token").unwrap();

        assert!(authorize(None, None).is_ok());
        assert_eq!(
            authorize(None, Some(Role::User)),
            Err(AccessDenied::Unauthenticated {
                required: Role::User
            })
        );
        assert!(authorize(Some(&user), Some(Role::User)).is_ok());
        assert!(matches!(
            authorize(Some(&user), Some(Role::Admin)),
            Err(AccessDenied::Forbidden { .. })
        ));
        assert!(authorize(Some(&admin), Some(Role::User)).is_ok());
    }
}
