use std::fmt;

pub fn display_fn<F>(f: F) -> impl fmt::Display
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    struct DisplayFn<F> {
        f: F,
    }
    impl<F> fmt::Display for DisplayFn<F>
    where
        F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
    {
        fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            (self.f)(formatter)
        }
    }
    DisplayFn { f }
}

/// Quoted-form name of a raw byte: `'c'` for printable ASCII, `0xHH` otherwise.
///
/// This is the canonical spelling used for byte terminals everywhere in the
/// pipeline: the lexer, the regex expander and the code generator all agree
/// on it, so a byte interns to the same symbol no matter where it came from.
pub fn byte_symbol_name(byte: u8) -> String {
    if (0x20..=0x7E).contains(&byte) {
        if byte == b'\\' {
            // the backslash keeps its escape spelling
            "'\\\\'".to_owned()
        } else {
            format!("'{}'", byte as char)
        }
    } else {
        format!("0x{:02X}", byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_names() {
        assert_eq!(byte_symbol_name(b'a'), "'a'");
        assert_eq!(byte_symbol_name(b' '), "' '");
        assert_eq!(byte_symbol_name(b'\\'), "'\\\\'");
        assert_eq!(byte_symbol_name(0x0A), "0x0A");
        assert_eq!(byte_symbol_name(0xFF), "0xFF");
    }
}
