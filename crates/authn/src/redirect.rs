//! Logout redirect.

use http::{Response, StatusCode, header::LOCATION};

/// Where to send the browser after a successful logout.
///
/// Always rendered as `302 Found`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
}

impl Redirect {
    /// Creates a redirect to `location`.
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self { location: location.into() }
    }

    /// Target URL.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// HTTP status of the redirect.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::FOUND
    }

    /// Renders the redirect as an empty-bodied response.
    ///
    /// # Errors
    ///
    /// Returns an error if `location` is not a valid header value.
    pub fn into_response(self) -> Result<Response<()>, http::Error> {
        Response::builder().status(self.status()).header(LOCATION, self.location).body(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_into_response() {
        let redirect = Redirect::to("https://auth.example.com/self-service/logout?token=t");
        assert_eq!(redirect.status(), StatusCode::FOUND);

        let response = redirect.into_response().unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "https://auth.example.com/self-service/logout?token=t"
        );
    }

    #[test]
    fn test_invalid_location_is_an_error() {
        assert!(Redirect::to("https://example.com/\nset-cookie: x").into_response().is_err());
    }
}
