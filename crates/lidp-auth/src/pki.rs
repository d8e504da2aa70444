//! Client-certificate subject extraction.

use lidp_crypto::Certificate;

/// Short names of the RDN types that make it into a subject DN, keyed by
/// dotted OID.
const RDN_NAMES: &[(&str, &str)] = &[
    ("2.5.4.3", "CN"),
    ("2.5.4.6", "C"),
    ("2.5.4.7", "L"),
    ("2.5.4.8", "ST"),
    ("2.5.4.9", "STREET"),
    ("2.5.4.10", "O"),
    ("2.5.4.11", "OU"),
];

/// Formats the subject of `cert` RFC 2253 style: most specific RDN first,
/// joined by `", "`. Attribute types without a short name are skipped.
#[must_use]
pub fn subject_dn(cert: &Certificate) -> String {
    cert.subject_attributes()
        .iter()
        .rev()
        .filter_map(|(oid, value)| {
            RDN_NAMES
                .iter()
                .find(|(known, _)| known == oid)
                .map(|(_, short)| format!("{short}={value}"))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
