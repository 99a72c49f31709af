//! Validated identify request.

use super::contact::{ContactMatchQuery, EmailAddress, PhoneNumber};

/// Raised when neither identifier is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("at least one of email or phone number is required")]
pub struct MissingIdentifier;

/// An observation of `(email?, phone number?)` with at least one present.
///
/// # Examples
/// ```
/// use contact_ledger::domain::{EmailAddress, IdentifyRequest};
///
/// let email = EmailAddress::new("marty@hillvalley.edu").expect("valid email");
/// assert!(IdentifyRequest::new(Some(email), None).is_ok());
/// assert!(IdentifyRequest::new(None, None).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyRequest {
    email: Option<EmailAddress>,
    phone_number: Option<PhoneNumber>,
}

impl IdentifyRequest {
    pub fn new(
        email: Option<EmailAddress>,
        phone_number: Option<PhoneNumber>,
    ) -> Result<Self, MissingIdentifier> {
        if email.is_none() && phone_number.is_none() {
            return Err(MissingIdentifier);
        }
        Ok(Self {
            email,
            phone_number,
        })
    }

    pub fn email(&self) -> Option<&EmailAddress> {
        self.email.as_ref()
    }

    pub fn phone_number(&self) -> Option<&PhoneNumber> {
        self.phone_number.as_ref()
    }

    /// The matcher query for this observation.
    pub fn match_query(&self) -> ContactMatchQuery {
        ContactMatchQuery {
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn rejects_request_without_identifiers() {
        assert_eq!(IdentifyRequest::new(None, None), Err(MissingIdentifier));
    }

    #[rstest]
    fn phone_only_request_is_valid() {
        let phone = PhoneNumber::new("555").expect("valid phone");
        let request = IdentifyRequest::new(None, Some(phone.clone())).expect("valid request");
        assert_eq!(request.phone_number(), Some(&phone));
        assert!(request.email().is_none());
        assert!(!request.match_query().is_empty());
    }
}
