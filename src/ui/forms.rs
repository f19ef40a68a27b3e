use std::sync::LazyLock;

use regex::Regex;

use crate::common::ChatCommand;
use crate::error::ValidationError;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

fn check_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_PATTERN.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

#[derive(Debug, Default, Clone)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
    pub error: Option<String>,
    pub submitting: bool,
}

impl SignInForm {
    pub fn validate(&self) -> Result<ChatCommand, ValidationError> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        check_email(email)?;

        Ok(ChatCommand::SignIn {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }

    /// Validated command, or `None` with the inline error set.
    pub fn submit(&mut self) -> Option<ChatCommand> {
        match self.validate() {
            Ok(command) => {
                self.error = None;
                self.submitting = true;
                Some(command)
            }
            Err(err) => {
                self.error = Some(err.to_string());
                None
            }
        }
    }

    pub fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.submitting = false;
    }
}

#[derive(Debug, Default, Clone)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub error: Option<String>,
    pub submitting: bool,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<ChatCommand, ValidationError> {
        let name = self.name.trim();
        let email = self.email.trim();
        if name.is_empty()
            || email.is_empty()
            || self.password.is_empty()
            || self.confirm_password.is_empty()
        {
            return Err(ValidationError::MissingFields);
        }
        check_email(email)?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }

        Ok(ChatCommand::SignUp {
            name: name.to_string(),
            email: email.to_string(),
            password: self.password.clone(),
        })
    }

    pub fn submit(&mut self) -> Option<ChatCommand> {
        match self.validate() {
            Ok(command) => {
                self.error = None;
                self.submitting = true;
                Some(command)
            }
            Err(err) => {
                self.error = Some(err.to_string());
                None
            }
        }
    }

    pub fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.submitting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_requires_both_fields() {
        let mut form = SignInForm {
            email: "alice@example.com".into(),
            ..Default::default()
        };
        assert_eq!(form.submit(), None);
        assert_eq!(form.error.as_deref(), Some("Please fill in all fields"));
        assert!(!form.submitting);
    }

    #[test]
    fn sign_in_trims_email_and_clears_error() {
        let mut form = SignInForm {
            email: "  alice@example.com ".into(),
            password: "secret".into(),
            error: Some("old".into()),
            submitting: false,
        };
        assert_eq!(
            form.submit(),
            Some(ChatCommand::SignIn {
                email: "alice@example.com".into(),
                password: "secret".into(),
            })
        );
        assert!(form.error.is_none());
        assert!(form.submitting);
    }

    #[test]
    fn sign_in_rejects_malformed_email() {
        let form = SignInForm {
            email: "alice.example.com".into(),
            password: "secret".into(),
            ..Default::default()
        };
        assert_eq!(form.validate(), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn sign_up_checks_missing_fields_before_mismatch() {
        let form = SignUpForm {
            name: "".into(),
            email: "bob@example.com".into(),
            password: "a".into(),
            confirm_password: "b".into(),
            ..Default::default()
        };
        assert_eq!(form.validate(), Err(ValidationError::MissingFields));
    }

    #[test]
    fn sign_up_reports_password_mismatch() {
        let mut form = SignUpForm {
            name: "Bob".into(),
            email: "bob@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
            ..Default::default()
        };
        assert_eq!(form.submit(), None);
        assert_eq!(form.error.as_deref(), Some("Passwords do not match"));
    }

    #[test]
    fn sign_up_builds_command() {
        let form = SignUpForm {
            name: " Bob ".into(),
            email: "bob@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            ..Default::default()
        };
        assert_eq!(
            form.validate(),
            Ok(ChatCommand::SignUp {
                name: "Bob".into(),
                email: "bob@example.com".into(),
                password: "secret1".into(),
            })
        );
    }
}
