use thiserror::Error;

/// Everything that can stop a signup. Collapsed into a [`SignupOutcome`]
/// at the service boundary; callers never see these as errors.
///
/// [`SignupOutcome`]: crate::iam::dto::SignupOutcome
#[derive(Debug, Error)]
pub enum SignupError {
    #[error("signup payload is incomplete")]
    InvalidPayload,

    #[error("email {0} is already registered")]
    EmailTaken(String),

    #[error("username {0} is already registered")]
    UsernameTaken(String),

    #[error("target schema could not be provisioned")]
    Provisioning,

    #[error("unsupported db flavour {0:?}")]
    UnsupportedFlavour(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl SignupError {
    /// The human-readable message carried back over the wire.
    pub fn user_message(&self) -> String {
        match self {
            SignupError::InvalidPayload => {
                "Signup is unsuccessful. Input payload / Signup payload is incomplete.".into()
            }
            SignupError::EmailTaken(email) => {
                format!("User with email {email} already exist. Please try login.")
            }
            SignupError::UsernameTaken(user_name) => {
                format!(
                    "Username {user_name} already exist. Please try with another unique username."
                )
            }
            SignupError::Provisioning => {
                "Signup is unsuccessful due to incomplete database.".into()
            }
            SignupError::UnsupportedFlavour(_) => {
                "PROTON only supports sqlite and postgresql. Do you have a valid db_flavour in your payload?".into()
            }
            SignupError::Unexpected(_) => {
                "Signup is unsuccessful due to server side error.".into()
            }
        }
    }
}
