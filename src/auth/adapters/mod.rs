pub mod apple;
pub mod email_password;
pub mod google;
pub mod grpc;
pub mod identity_toolkit;

use oauth2::url::form_urlencoded;

/// Form-encodes the `postBody` of an IdP sign-in request.
pub(crate) fn idp_post_body(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().copied())
        .finish()
}
