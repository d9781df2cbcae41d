//! Minimal `Set-Cookie` / `Cookie` header handling.
//!
//! Session credentials are carried explicitly on every request, so there is
//! no cookie jar: the session provider reads the tokens it needs out of the
//! `Set-Cookie` headers and the listing calls replay them in a `Cookie`
//! header.

/// Returns the value of the first cookie named `name` across the given
/// `Set-Cookie` header values. Empty values are treated as absent.
pub fn find_set_cookie<'a, I>(set_cookie_values: I, name: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    set_cookie_values.into_iter().find_map(|header| {
        let pair = header.split(';').next()?.trim();
        let (key, value) = pair.split_once('=')?;
        if key.trim() != name {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_owned())
    })
}

/// Renders `name=value` pairs as a single `Cookie` request header value.
#[must_use]
pub fn cookie_header(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_named_cookie_among_several_headers() {
        let headers = [
            "ASP.NET_SessionId=abc123; path=/; HttpOnly; SameSite=Lax",
            "aga=xyz789; expires=Tue, 01 Dec 2026 00:00:00 GMT; path=/",
        ];
        assert_eq!(
            find_set_cookie(headers, "ASP.NET_SessionId").as_deref(),
            Some("abc123")
        );
        assert_eq!(find_set_cookie(headers, "aga").as_deref(), Some("xyz789"));
    }

    #[test]
    fn prefix_of_another_name_does_not_match() {
        let headers = ["agate=nope; path=/"];
        assert!(find_set_cookie(headers, "aga").is_none());
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let headers = ["aga=; path=/; expires=Thu, 01 Jan 1970 00:00:00 GMT"];
        assert!(find_set_cookie(headers, "aga").is_none());
    }

    #[test]
    fn value_may_contain_equals_signs() {
        let headers = ["aga=a=b=c; path=/"];
        assert_eq!(find_set_cookie(headers, "aga").as_deref(), Some("a=b=c"));
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let header = cookie_header(&[("ASP.NET_SessionId", "s1"), ("aga", "t1")]);
        assert_eq!(header, "ASP.NET_SessionId=s1; aga=t1");
    }
}
