use emberchat_backend::IdentityProvider;

/// Emitted by the sign-in view when a provider button is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignInRequested {
    pub provider: IdentityProvider,
}

/// Emitted by the composer when the user submits a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub text: String,
}

impl Submit {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
