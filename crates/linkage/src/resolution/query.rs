use common::ValidationError;

/// A validated identify request: one observed (email, phone) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    email: String,
    phone_number: String,
}

impl ContactQuery {
    /// Validate raw request values.
    ///
    /// Both values are required. Surrounding whitespace is dropped, the phone
    /// number must be ASCII digits, and a phone number whose value is zero
    /// counts as absent.
    pub fn new(email: Option<&str>, phone_number: Option<&str>) -> Result<Self, ValidationError> {
        let email = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ValidationError::missing("email"))?;

        let phone_number = phone_number
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.chars().all(|c| c == '0'))
            .ok_or_else(|| ValidationError::missing("phoneNumber"))?;

        if !phone_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "phoneNumber".to_string(),
                value: phone_number.to_string(),
            });
        }

        Ok(Self {
            email: email.to_string(),
            phone_number: phone_number.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }
}
