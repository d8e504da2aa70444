//! HTTP-POST Binding implementation.
//!
//! The IdP delivers signed responses to the SP through a self-submitting
//! HTML form.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{SamlError, SamlResult};
use crate::xml::XML_HEADER;

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Renders an auto-submitting form that posts `SAMLResponse` and
    /// `RelayState` to `destination`.
    ///
    /// `xml` is the signed response element; the XML declaration is
    /// prepended before encoding.
    #[must_use]
    pub fn encode_response(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        let encoded = STANDARD.encode(format!("{XML_HEADER}{xml}"));
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<body onload="document.getElementById('samlpost').submit()">
<noscript>
<p>
<strong>Note:</strong> Since your browser does not support JavaScript,
you must press the Continue button once to proceed.
</p>
</noscript>
<form action="{}" method="post" id="samlpost">
<div>
<input type="hidden" name="RelayState" value="{}"/>
<input type="hidden" name="SAMLResponse" value="{}"/>
</div>
<noscript>
<div>
<input type="submit" value="Continue"/>
</div>
</noscript>
</form>
</body>
</html>"#,
            html_escape(destination),
            html_escape(relay_state.unwrap_or_default()),
            encoded
        )
    }

    /// Decodes a posted `SAMLResponse` value.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` for bad base64 or non-UTF-8
    /// content.
    pub fn decode(encoded: &str) -> SamlResult<String> {
        let compact: String = encoded.split_whitespace().collect();
        let decoded = STANDARD.decode(compact)?;
        String::from_utf8(decoded)
            .map_err(|e| SamlError::MalformedRequest(format!("invalid UTF-8 in message: {e}")))
    }
}

/// Escapes HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
