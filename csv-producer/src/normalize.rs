use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Prepended to names that would otherwise start with a digit.
pub const DIGIT_PREFIX: &str = "col_";

/// Turns a raw column header into a canonical field name.
///
/// Accented characters are decomposed and their marks dropped, any run of whitespace or
/// underscores becomes a single `_`, every other non-alphanumeric character is removed, and
/// the result is lower-cased and trimmed of separators. Characters that stay upper-case
/// after lower-casing, such as enclosed capital letters, are dropped too. Names starting with a digit get
/// [`DIGIT_PREFIX`]. Never fails; the result may be empty.
pub fn normalize(header: &str) -> String {
    let mut name = String::with_capacity(header.len());
    let mut pending_separator = false;

    for c in header.nfkd().flat_map(char::to_lowercase).nfkd() {
        if is_kept(c) {
            if pending_separator && !name.is_empty() {
                name.push('_');
            }
            pending_separator = false;
            name.push(c);
        } else if c.is_whitespace() || c == '_' {
            pending_separator = true;
        }
    }

    if name.starts_with(|c: char| c.is_numeric()) {
        name.insert_str(0, DIGIT_PREFIX);
    }

    name
}

// Marks must go even when Unicode counts them as alphabetic: a kept mark with a non-zero
// combining class could be reordered by the next decomposition.
fn is_kept(c: char) -> bool {
    c.is_alphanumeric() && !c.is_uppercase() && !is_combining_mark(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Índice ", "indice")]
    #[case("Ano", "ano")]
    #[case("CNPJ IF", "cnpj_if")]
    #[case("Instituição financeira", "instituicao_financeira")]
    #[case(
        "Quantidade de reclamações reguladas procedentes",
        "quantidade_de_reclamacoes_reguladas_procedentes"
    )]
    #[case("Quantidade total de clientes – CCS e SCR", "quantidade_total_de_clientes_ccs_e_scr")]
    #[case("  __leading and trailing__  ", "leading_and_trailing")]
    #[case("tabs\tand\nnewlines", "tabs_and_newlines")]
    #[case("multiple___underscores", "multiple_underscores")]
    #[case("a - b", "a_b")]
    #[case("a-b", "ab")]
    #[case("2024 Total", "col_2024_total")]
    #[case("1º trimestre", "col_1o_trimestre")]
    #[case("%", "")]
    #[case("\u{1F150} Ano", "ano")]
    #[case("\u{24B6}no", "ano")]
    #[case("\u{5D0}\u{5B1}$\u{5B0}", "\u{5D0}")]
    #[case("", "")]
    fn test_normalize(#[case] header: &str, #[case] expected: &str) {
        assert_eq!(normalize(header), expected);
    }

    #[test]
    fn test_normalize_compatibility_forms() {
        // Full-width letters and ligatures fold to their plain equivalents
        assert_eq!(normalize("ＡＢＣ"), "abc");
        assert_eq!(normalize("ﬁeld"), "field");
    }

    const HEADER_ALPHABET: &str = "\\PC{0,40}";

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(header in HEADER_ALPHABET) {
            let once = normalize(&header);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_output_shape(header in HEADER_ALPHABET) {
            let name = normalize(&header);
            prop_assert!(name.chars().all(|c| c == '_' || (c.is_alphanumeric() && !c.is_uppercase())));
            prop_assert!(!name.starts_with('_'));
            prop_assert!(!name.ends_with('_'));
            prop_assert!(!name.contains("__"));
            prop_assert!(!name.starts_with(|c: char| c.is_numeric()));
        }
    }
}
