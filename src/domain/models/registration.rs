use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// Syntactically valid email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(DomainError::EmptyEmail);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidEmail);
        }

        let (local, domain) = value.split_once('@').ok_or(DomainError::InvalidEmail)?;
        if local.is_empty() || domain.contains('@') {
            return Err(DomainError::InvalidEmail);
        }
        // domain needs at least one dot with a label on both sides
        match domain.rsplit_once('.') {
            Some((host, tld)) if !host.is_empty() && !tld.is_empty() => {}
            _ => return Err(DomainError::InvalidEmail),
        }
        if domain.split('.').any(str::is_empty) {
            return Err(DomainError::InvalidEmail);
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plain text password on its way to the identity provider. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::EmptyPassword);
        }
        Ok(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "" => Err(DomainError::MissingGender),
            _ => Err(DomainError::InvalidGender(s.to_string())),
        }
    }
}

/// Image picked by the user, kept in memory until submission
#[derive(Clone, PartialEq, Eq)]
pub struct Avatar {
    filename: String,
    bytes: Vec<u8>,
}

impl Avatar {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DomainError> {
        if bytes.is_empty() {
            return Err(DomainError::EmptyAvatar);
        }
        Ok(Self {
            filename: filename.into(),
            bytes,
        })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lower-cased text after the last dot of the filename, `bin` when there is none.
    pub fn extension(&self) -> String {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "bin".to_string())
    }

    pub fn content_type(&self) -> &'static str {
        match self.extension().as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "avif" => "image/avif",
            "heic" => "image/heic",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Debug for Avatar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Avatar")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Validated registration form, ready for the provisioning pipeline
#[derive(Debug, Clone)]
pub struct RegistrationInput {
    full_name: String,
    email: EmailAddress,
    password: Password,
    gender: Gender,
    avatar: Option<Avatar>,
}

impl RegistrationInput {
    pub fn new(
        full_name: impl Into<String>,
        email: EmailAddress,
        password: Password,
        gender: Gender,
        avatar: Option<Avatar>,
    ) -> Result<Self, DomainError> {
        let full_name = full_name.into().trim().to_string();
        if full_name.is_empty() {
            return Err(DomainError::EmptyFullName);
        }
        Ok(Self {
            full_name,
            email,
            password,
            gender,
            avatar,
        })
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }
    pub fn password(&self) -> &Password {
        &self.password
    }
    pub fn gender(&self) -> Gender {
        self.gender
    }
    pub fn avatar(&self) -> Option<&Avatar> {
        self.avatar.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("you@example.com")]
    #[case("  first.last+diary@mail.example.co.th ")]
    fn accepts_valid_email(#[case] raw: &str) {
        let email = EmailAddress::new(raw).unwrap();
        assert_eq!(email.as_str(), raw.trim());
    }

    #[rstest]
    #[case("", DomainError::EmptyEmail)]
    #[case("no-at-sign.com", DomainError::InvalidEmail)]
    #[case("@example.com", DomainError::InvalidEmail)]
    #[case("you@localhost", DomainError::InvalidEmail)]
    #[case("you@example.", DomainError::InvalidEmail)]
    #[case("you@@example.com", DomainError::InvalidEmail)]
    #[case("you@exa..mple.com", DomainError::InvalidEmail)]
    #[case("y ou@example.com", DomainError::InvalidEmail)]
    fn rejects_invalid_email(#[case] raw: &str, #[case] expected: DomainError) {
        assert_eq!(EmailAddress::new(raw).unwrap_err(), expected);
    }

    #[test]
    fn password_is_redacted_in_debug() {
        let password = Password::new("hunter22").unwrap();
        assert_eq!(format!("{password:?}"), "Password(***)");
        assert_eq!(password.expose(), "hunter22");
    }

    #[rstest]
    #[case("Male", Gender::Male)]
    #[case("female", Gender::Female)]
    fn parses_gender(#[case] raw: &str, #[case] expected: Gender) {
        assert_eq!(raw.parse::<Gender>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_gender() {
        assert_eq!(
            "other".parse::<Gender>().unwrap_err(),
            DomainError::InvalidGender("other".to_string())
        );
        assert_eq!("".parse::<Gender>().unwrap_err(), DomainError::MissingGender);
    }

    #[rstest]
    #[case("me.PNG", "png", "image/png")]
    #[case("holiday.photo.jpeg", "jpeg", "image/jpeg")]
    #[case("avatar", "bin", "application/octet-stream")]
    #[case("trailing.", "bin", "application/octet-stream")]
    fn derives_extension_and_content_type(
        #[case] filename: &str,
        #[case] ext: &str,
        #[case] content_type: &str,
    ) {
        let avatar = Avatar::new(filename, vec![1, 2, 3]).unwrap();
        assert_eq!(avatar.extension(), ext);
        assert_eq!(avatar.content_type(), content_type);
    }

    #[test]
    fn rejects_empty_avatar_and_blank_name() {
        assert_eq!(Avatar::new("a.png", vec![]).unwrap_err(), DomainError::EmptyAvatar);

        let result = RegistrationInput::new(
            "   ",
            EmailAddress::new("you@example.com").unwrap(),
            Password::new("secret").unwrap(),
            Gender::Female,
            None,
        );
        assert_eq!(result.unwrap_err(), DomainError::EmptyFullName);
    }
}
