use serde::Serialize;

/// An authenticated subject and the authorities granted to it.
///
/// Built per request, either from a decoded access token or from a stored
/// account. The credential is opaque: empty for token-derived principals,
/// the stored password hash for account-derived ones.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    subject: String,
    authorities: Vec<String>,
    #[serde(skip)]
    credential: String,
}

impl Principal {
    /// Empty authority strings are dropped and duplicates collapsed,
    /// keeping first-seen order.
    pub fn new<I, S>(subject: impl Into<String>, authorities: I, credential: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for authority in authorities.into_iter().map(Into::into) {
            if !authority.is_empty() && !unique.contains(&authority) {
                unique.push(authority);
            }
        }

        Self {
            subject: subject.into(),
            authorities: unique,
            credential: credential.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("subject", &self.subject)
            .field("authorities", &self.authorities)
            .field("credential", &"[hidden]")
            .finish()
    }
}
