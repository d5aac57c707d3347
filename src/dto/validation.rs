//! Validation helpers for DTOs.

use validator::ValidationError;

/// Upper bound for any free-text credits value.
const MAX_CREDIT_LEN: usize = 200;

/// Validates that every guessed artist name carries visible characters and
/// stays within a sane length.
///
/// # Examples
///
/// ```ignore
/// validate_artist_names(&["Queen".into()])            // Ok
/// validate_artist_names(&["Queen".into(), "  ".into()]) // Err - blank entry
/// ```
pub fn validate_artist_names(artists: &[String]) -> Result<(), ValidationError> {
    if artists.iter().any(|artist| artist.trim().is_empty()) {
        let mut err = ValidationError::new("artist_blank");
        err.message = Some("Artist names must not be blank".into());
        return Err(err);
    }

    if let Some(artist) = artists
        .iter()
        .find(|artist| artist.chars().count() > MAX_CREDIT_LEN)
    {
        let mut err = ValidationError::new("artist_length");
        err.message = Some(
            format!(
                "Artist names must be at most {MAX_CREDIT_LEN} characters (got {})",
                artist.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a free-text value is not only whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_artist_names_valid() {
        assert!(validate_artist_names(&["Queen".into()]).is_ok());
        assert!(validate_artist_names(&["Daft Punk".into(), "Pharrell Williams".into()]).is_ok());
    }

    #[test]
    fn test_validate_artist_names_invalid() {
        assert!(validate_artist_names(&["Queen".into(), " ".into()]).is_err());
        assert!(validate_artist_names(&["".into()]).is_err());
        assert!(validate_artist_names(&["x".repeat(MAX_CREDIT_LEN + 1)]).is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Waterloo").is_ok());
        assert!(validate_not_blank(" \t").is_err());
    }
}
