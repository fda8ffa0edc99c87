//! Medición determinista de texto.
//!
//! Los validadores cuentan palabras y oraciones sobre el mismo texto que
//! produjo el LLM; estas funciones fijan una única forma de contar para que
//! validación y re-validación den siempre el mismo resultado.

/// Cuenta palabras separadas por whitespace.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Parte un texto en oraciones usando `.`, `!` y `?` como terminadores.
///
/// No intenta reconocer abreviaturas; el contrato de los prompts pide
/// oraciones simples sin puntos internos.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  a  detective   hunts a ghost "), 5);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn split_sentences_handles_terminators_and_tail() {
        let s = split_sentences("One. Two! Three? Four");
        assert_eq!(s, vec!["One.", "Two!", "Three?", "Four"]);
    }

    #[test]
    fn split_sentences_empty_input() {
        assert!(split_sentences("   ").is_empty());
    }
}
