//! Swift/Keystone URL resolution (spec section 4.9 / 6):
//! `swift://CONTAINER/OBJECT` is resolved to an HTTP URL plus an
//! `X-Auth-Token` header by an external collaborator. The token-provider
//! protocol (Keystone auth, catalog lookup, token refresh) is out of scope
//! by spec; this module defines the trait the dispatcher calls through and
//! the one honest implementation we can ship without that collaborator.

use std::io;

use crate::error::WandioError;

/// A resolved Swift object location: the HTTP URL to GET/Range against,
/// plus any headers the collaborator says must accompany every request
/// (at minimum, the auth token).
pub struct SwiftLocation {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// The external collaborator seam (spec section 1, "Swift/Keystone
/// authentication... an external token-provider interface that yields an
/// HTTP URL plus a header set").
pub trait SwiftResolver: Send + Sync {
    fn resolve(&self, container: &str, object: &str) -> io::Result<SwiftLocation>;
}

/// The resolver wired in by default: every call fails cleanly with
/// `Unsupported`, naming the bit of infrastructure that isn't present
/// rather than panicking or silently falling back to a bare HTTP GET.
pub struct NullSwiftResolver;

impl SwiftResolver for NullSwiftResolver {
    fn resolve(&self, container: &str, object: &str) -> io::Result<SwiftLocation> {
        Err(WandioError::Unsupported(format!(
            "no Swift/Keystone resolver configured (swift://{container}/{object})"
        ))
        .into())
    }
}

/// Splits `swift://CONTAINER/OBJECT` into its two path components (spec
/// section 6 URL grammar).
pub fn parse_swift_url(url: &str) -> io::Result<(String, String)> {
    let rest = url
        .strip_prefix("swift://")
        .ok_or_else(|| WandioError::InvalidUrl(format!("not a swift:// url: {url}")))?;
    match rest.split_once('/') {
        Some((container, object)) if !container.is_empty() && !object.is_empty() => {
            Ok((container.to_string(), object.to_string()))
        }
        _ => Err(
            WandioError::InvalidUrl(format!("swift url missing container or object: {url}"))
                .into(),
        ),
    }
}
