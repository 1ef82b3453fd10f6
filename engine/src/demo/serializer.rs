//! Validation rules for accounts

use super::models::Account;
use crate::error::ValidationError;
use crate::protobuf::Fields;
use crate::serializers::Serializer;
use serde_json::Value;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;

#[derive(Debug, Clone, Copy, Default)]
pub struct AccountSerializer;

impl Serializer for AccountSerializer {
    type Model = Account;

    fn validate(
        &self,
        data: &Fields,
        instance: Option<&Account>,
        partial: bool,
    ) -> Result<Fields, ValidationError> {
        let creating = instance.is_none();
        let mut errors = ValidationError::new();
        let mut validated = Fields::new();

        match data.get("username") {
            Some(Value::String(username)) => match check_username(username) {
                Ok(()) => {
                    validated.insert("username".into(), Value::from(username.as_str()));
                }
                Err(message) => errors.add("username", message),
            },
            Some(Value::Null) => errors.add("username", "This field may not be null."),
            Some(_) => errors.add("username", "Not a valid string."),
            None if creating && !partial => errors.add("username", "This field is required."),
            None => {}
        }

        match data.get("email") {
            Some(Value::String(email)) if email.is_empty() => {
                validated.insert("email".into(), Value::Null);
            }
            Some(Value::String(email)) => match check_email(email) {
                Ok(()) => {
                    validated.insert("email".into(), Value::from(email.as_str()));
                }
                Err(message) => errors.add("email", message),
            },
            Some(Value::Null) => {
                validated.insert("email".into(), Value::Null);
            }
            Some(_) => errors.add("email", "Not a valid string."),
            None => {}
        }

        match data.get("is_active") {
            Some(Value::Bool(active)) => {
                validated.insert("is_active".into(), Value::Bool(*active));
            }
            Some(Value::Null) => errors.add("is_active", "This field may not be null."),
            Some(_) => errors.add("is_active", "Must be a valid boolean."),
            None if creating => {
                validated.insert("is_active".into(), Value::Bool(true));
            }
            None => {}
        }

        match data.get("groups") {
            Some(Value::Array(groups)) => {
                if groups.iter().all(|g| g.as_str().is_some_and(|g| !g.is_empty())) {
                    validated.insert("groups".into(), Value::Array(groups.clone()));
                } else {
                    errors.add("groups", "Group names must be non-empty strings.");
                }
            }
            Some(Value::Null) => {
                validated.insert("groups".into(), Value::Array(Vec::new()));
            }
            Some(_) => errors.add("groups", "Expected a list of items."),
            None => {}
        }

        errors.into_result()?;
        Ok(validated)
    }
}

fn check_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("This field may not be blank.".into());
    }
    if username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {USERNAME_MAX_LENGTH} characters."
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .into(),
        );
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), String> {
    if email.chars().count() > EMAIL_MAX_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {EMAIL_MAX_LENGTH} characters."
        ));
    }
    match email.split_once('@') {
        Some((user, domain))
            if !user.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') =>
        {
            Ok(())
        }
        _ => Err("Enter a valid email address.".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_requires_username_and_defaults_active() {
        let err = AccountSerializer
            .validate(&data(json!({"email": "a@b.io"})), None, false)
            .unwrap_err();
        assert_eq!(err.field_errors("username"), ["This field is required."]);

        let validated = AccountSerializer
            .validate(&data(json!({"username": "ada"})), None, false)
            .unwrap();
        assert_eq!(validated.get("is_active"), Some(&json!(true)));
    }

    #[test]
    fn test_update_does_not_require_username() {
        let account = Account::new(1, "ada");
        let validated = AccountSerializer
            .validate(&data(json!({"email": "ada@example.com"})), Some(&account), false)
            .unwrap();
        assert!(!validated.contains_key("username"));
        assert!(!validated.contains_key("is_active"));
    }

    #[test]
    fn test_invalid_fields_are_all_reported() {
        let err = AccountSerializer
            .validate(
                &data(json!({
                    "username": "not valid!",
                    "email": "nobody",
                    "is_active": "yes",
                    "groups": ["ops", ""]
                })),
                None,
                false,
            )
            .unwrap_err();

        for field in ["username", "email", "is_active", "groups"] {
            assert_eq!(err.field_errors(field).len(), 1, "{field}");
        }
    }

    #[test]
    fn test_username_length_limit() {
        let long = "a".repeat(USERNAME_MAX_LENGTH + 1);
        let err = AccountSerializer
            .validate(&data(json!({ "username": long })), None, false)
            .unwrap_err();
        assert!(err.field_errors("username")[0].contains("150"));
    }

    #[test]
    fn test_null_clears_optional_fields() {
        let account = Account::new(1, "ada").with_email("ada@example.com");
        let validated = AccountSerializer
            .validate(&data(json!({"email": null, "groups": null})), Some(&account), true)
            .unwrap();
        assert_eq!(validated.get("email"), Some(&Value::Null));
        assert_eq!(validated.get("groups"), Some(&json!([])));
    }

    #[test]
    fn test_email_shapes() {
        assert!(check_email("ada@example.com").is_ok());
        assert!(check_email("@example.com").is_err());
        assert!(check_email("ada@localhost").is_err());
        assert!(check_email("ada@example.").is_err());
    }
}
