//! Secret phrase check.
//!
//! A phrase is accepted when its first three `:`-separated parts start with
//! `FIZZ`, `FUZZ` and `TOOR`. Extra parts are ignored.

use crate::error::{Error, Result};

const PREFIXES: [&[u8]; 3] = [b"FIZZ", b"FUZZ", b"TOOR"];

pub fn check(phrase: &str) -> Result<()> {
    let mut parts = phrase.split(':');
    for prefix in PREFIXES {
        match parts.next() {
            Some(part) if part.as_bytes().starts_with(prefix) => {}
            _ => return Err(Error::InvalidPhrase),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_secret() {
        assert!(check("FIZZ:FUZZ:TOOR").is_ok());
        assert!(check("FIZZLE:FUZZY:TOORCON:extra").is_ok());
    }

    #[test]
    fn rejects_wrong_parts() {
        for phrase in ["FIZZ:BUZZ", "FIZZ:BUZZ:TOOR", "BUZZ:FUZZ:TOOR", "fizz:fuzz:toor"] {
            assert!(matches!(check(phrase), Err(Error::InvalidPhrase)), "{phrase}");
        }
    }

    #[test]
    fn short_parts_are_rejected_not_panicking() {
        let phrases = [
            "",
            ":",
            "::",
            "FIZ:FUZZ:TOOR",
            "FIZZ:FUZ:TOOR",
            "FIZZ:FUZZ:TOO",
            "FIZZ:FUZZ:",
        ];
        for phrase in phrases {
            assert!(check(phrase).is_err(), "{phrase}");
        }
    }

    #[test]
    fn non_ascii_input_is_rejected() {
        assert!(check("FIZZ:FUZZ0:TOO\u{1b}R").is_err());
        assert!(check("ΦIZZ:FUZZ:TOOR").is_err());
    }
}
