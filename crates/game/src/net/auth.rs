//! Pluggable auth provider (C4), grounded on
//! `original_source/src/server/auth/auth_provider.cpp`'s disabled/stub
//! strategies.

pub struct AuthDecision {
    pub ok: bool,
    pub user_id: String,
    pub reason: String,
}

pub trait AuthProvider: Send + Sync {
    fn authenticate(&self, token: &str) -> AuthDecision;
}

/// Accepts any token. `user_id` is the token's first 8 characters, or
/// `"anon"` for an empty token.
pub struct DisabledAuth;

impl AuthProvider for DisabledAuth {
    fn authenticate(&self, token: &str) -> AuthDecision {
        let user_id = if token.is_empty() {
            "anon".to_string()
        } else {
            token.chars().take(8).collect()
        };
        AuthDecision {
            ok: true,
            user_id,
            reason: String::new(),
        }
    }
}

/// Rejects empty tokens; otherwise returns `prefix + token[0..10]`.
pub struct StubAuth {
    pub prefix: String,
}

impl StubAuth {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl AuthProvider for StubAuth {
    fn authenticate(&self, token: &str) -> AuthDecision {
        if token.is_empty() {
            return AuthDecision {
                ok: false,
                user_id: String::new(),
                reason: "empty token".to_string(),
            };
        }
        let suffix: String = token.chars().take(10).collect();
        AuthDecision {
            ok: true,
            user_id: format!("{}{}", self.prefix, suffix),
            reason: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_accepts_everything() {
        let auth = DisabledAuth;
        assert!(auth.authenticate("").ok);
        assert_eq!(auth.authenticate("").user_id, "anon");
        assert!(auth.authenticate("longtoken123").ok);
    }

    #[test]
    fn stub_rejects_empty() {
        let auth = StubAuth::new("user_");
        let decision = auth.authenticate("");
        assert!(!decision.ok);
    }

    #[test]
    fn stub_prefixes_accepted_tokens() {
        let auth = StubAuth::new("user_");
        let decision = auth.authenticate("abcdefghijklmnop");
        assert!(decision.ok);
        assert_eq!(decision.user_id, "user_abcdefghij");
    }
}
