// Property tests for the format resolver

use ffconvert::format::Format;
use proptest::prelude::*;

proptest! {
    /// Resolution is total: any input lands inside the whitelist.
    #[test]
    fn resolve_always_lands_in_whitelist(s in ".*") {
        let res = Format::resolve(Some(&s));
        prop_assert!(Format::ALL.contains(&res.format));
    }

    /// Whitelisted extensions resolve to themselves, unredirected,
    /// regardless of case and surrounding whitespace.
    #[test]
    fn known_extensions_resolve_to_themselves(
        idx in 0..Format::ALL.len(),
        upper in any::<bool>(),
        pad in "[ \t]{0,3}",
    ) {
        let format = Format::ALL[idx];
        let ext = if upper {
            format.ext().to_ascii_uppercase()
        } else {
            format.ext().to_string()
        };
        let raw = format!("{pad}{ext}{pad}");

        prop_assert_eq!(raw.parse::<Format>().unwrap(), format);

        let res = Format::resolve(Some(format.ext()));
        prop_assert!(!res.redirected);
        prop_assert_eq!(res.format, format);
    }

    /// Everything outside the whitelist redirects to the default.
    #[test]
    fn unknown_values_redirect_to_default(s in "[a-z0-9]{1,8}") {
        prop_assume!(s.parse::<Format>().is_err());
        let res = Format::resolve(Some(&s));
        prop_assert!(res.redirected);
        prop_assert_eq!(res.format, Format::DEFAULT);
    }
}
