//! Canonical form for domain names before they are compared.

use tracing::warn;

use crate::endpoint::strip_trailing_dot;

/// Trim one trailing "." and map the name to its Unicode form per UTS #46 /
/// RFC 5891 section 5, which also folds case. `EXAMPLE.com.` and
/// `example.com` come out identical, and `xn--bcher-kva.example` becomes
/// `bücher.example`.
///
/// Never fails: on a processing error the best-effort output is returned and
/// a warning is logged.
pub fn normalize_domain(domain: &str) -> String {
    let (unicode, result) = idna::domain_to_unicode(strip_trailing_dot(domain));
    if let Err(e) = result {
        warn!(domain, error = ?e, "got error while parsing domain");
    }
    unicode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_and_trailing_dot() {
        assert_eq!(normalize_domain("EXAMPLE.com."), "example.com");
        assert_eq!(normalize_domain("Foo-Bar.Example.Org"), "foo-bar.example.org");
        assert_eq!(normalize_domain("example.com"), "example.com");
    }

    #[test]
    fn only_one_trailing_dot_is_removed() {
        assert_ne!(normalize_domain("example.com.."), "example.com");
    }

    #[test]
    fn punycode_labels_become_unicode() {
        assert_eq!(normalize_domain("xn--bcher-kva.example"), "bücher.example");
        assert_eq!(normalize_domain("BÜCHER.example"), "bücher.example");
    }

    #[test]
    fn keeps_underscore_and_wildcard_labels() {
        assert_eq!(normalize_domain("_acme-challenge.Example.org"), "_acme-challenge.example.org");
        assert_eq!(normalize_domain("*.example.org."), "*.example.org");
    }

    #[test]
    fn malformed_punycode_degrades_instead_of_failing() {
        let normalized = normalize_domain("xn--zz-.Example.ORG.");
        assert!(normalized.ends_with(".example.org"), "{normalized}");
        assert!(!normalized.ends_with('.'));
        assert_eq!(normalized, normalized.to_lowercase());

        let filter = crate::domain_filter::DomainFilter::new(["example.org"]);
        assert!(filter.matches("xn--zz-.Example.ORG."));
    }

    #[test]
    fn empty_and_root_normalize_to_empty() {
        assert_eq!(normalize_domain(""), "");
        assert_eq!(normalize_domain("."), "");
    }
}
