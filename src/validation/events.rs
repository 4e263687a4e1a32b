/// The maximum length of an event name.
pub const MAX_EVENT_NAME_LENGTH: usize = 200;

/// Validates an event name.
///
/// # Arguments
///
/// * `name` - The event name to validate.
///
/// # Returns
///
/// A `garde::Result` indicating whether the name is valid.
pub fn validate_event_name(name: &str, _context: &()) -> garde::Result {
    if name.trim().is_empty() {
        return Err(garde::Error::new("Event name cannot be empty"));
    }

    if name.len() > MAX_EVENT_NAME_LENGTH {
        return Err(garde::Error::new(format!(
            "Event name must be at most {} characters",
            MAX_EVENT_NAME_LENGTH
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '$')
    {
        return Err(garde::Error::new(
            "Event name can only contain letters, numbers, '_', '-', '.' and '$'",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        assert!(validate_event_name("signup_completed", &()).is_ok());
        assert!(validate_event_name("$pageview", &()).is_ok());
        assert!(validate_event_name("checkout.step-2", &()).is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        assert!(validate_event_name("", &()).is_err());
        assert!(validate_event_name("   ", &()).is_err());
        assert!(validate_event_name("drop table;", &()).is_err());
        assert!(validate_event_name(&"a".repeat(MAX_EVENT_NAME_LENGTH + 1), &()).is_err());
    }
}
