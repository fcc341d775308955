// src/core/naming.rs

//! Utilidades de nombres: normalización de comandos y argumentos, conversión
//! de nombres de tipo y la inversión lógica de los textos de ayuda.

/// Normaliza el nombre de una implementación o de un parámetro.
///
/// Quita un único guion bajo final (la convención para nombres reservados)
/// y cambia los guiones bajos por guiones: `dry_run` -> `dry-run`,
/// `type_` -> `type`.
pub fn normalize_name(name: &str) -> String {
    let name = match name.strip_suffix('_') {
        Some(stripped) if !stripped.ends_with('_') => stripped,
        _ => name,
    };
    name.replace('_', "-")
}

/// Normaliza el nombre de un tipo: `SomeCommand` -> `some-command`.
pub fn normalize_type_name(name: &str) -> String {
    camel_to_underscore(name).replace('_', "-").to_lowercase()
}

/// Convierte un nombre en camel case a snake case.
///
/// `HttpRequest`, `httpRequest` y `HTTPRequest` dan `http_request`; los
/// guiones bajos existentes se respetan.
pub fn camel_to_underscore(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();

    // Primera pasada: separa cada mayúscula seguida de minúscula.
    let mut first_pass = Vec::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        let starts_word = c.is_uppercase()
            && chars.get(i + 1).is_some_and(|next| next.is_lowercase())
            && i > 0
            && chars[i - 1].is_alphanumeric();
        if starts_word {
            first_pass.push('_');
        }
        first_pass.push(c);
    }

    // Segunda pasada: separa cada minúscula seguida de mayúscula.
    let mut result = String::with_capacity(first_pass.len() + 4);
    for (i, &c) in first_pass.iter().enumerate() {
        result.push(c);
        let ends_word = c.is_lowercase()
            && first_pass.get(i + 1).is_some_and(|next| next.is_uppercase())
            && i > 0
            && first_pass[i - 1].is_alphanumeric();
        if ends_word {
            result.push('_');
        }
    }

    result.to_lowercase()
}

/// Invierte el sentido lógico de un texto de ayuda.
///
/// Se usa para generar la ayuda de las opciones inversas (`--no-echo`) a
/// partir de la ayuda de la opción original.
pub fn invert_string(string: &str) -> String {
    let Some(first_letter) = string.chars().next() else {
        return String::new();
    };
    let is_capitalized = first_letter.is_uppercase();

    const ONE_WORD: &[(&str, &str)] = &[
        ("Do", "Don't"),
        ("Don't", "Do"),
        ("Do not", "Do"),
        ("With", "Without"),
        ("Without", "With"),
        ("Yes", "No"),
        ("No", "Yes"),
    ];
    const FIRST_WORD: &[(&str, &str)] = &[
        ("Do", "No"),
        ("Don't", ""),
        ("Do not", ""),
        ("With", "Without"),
        ("Without", "With"),
        ("No", "With"),
    ];

    let lookup = |table: &[(&str, &str)], key: &str| -> Option<String> {
        table.iter().find_map(|(from, to)| {
            if *from == key {
                Some(to.to_string())
            } else if from.to_lowercase() == key {
                Some(to.to_lowercase())
            } else {
                None
            }
        })
    };

    if let Some(inverted) = lookup(ONE_WORD, string) {
        return inverted;
    }

    let first_word = string.split_whitespace().next().unwrap_or(string);
    let rest = &string[string.find(first_word).unwrap_or(0) + first_word.len()..];

    match lookup(FIRST_WORD, first_word) {
        Some(inverted) if inverted.is_empty() => {
            let rest = rest.trim_start();
            if is_capitalized {
                capitalize(rest)
            } else {
                rest.to_string()
            }
        }
        Some(inverted) => format!("{}{}", inverted, rest),
        None => {
            let negation = if is_capitalized { "Don't" } else { "don't" };
            let tail: String = string.chars().skip(1).collect();
            format!("{} {}{}", negation, first_letter.to_lowercase(), tail)
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Procesa un texto estilo docstring: el título pierde el punto final y las
/// líneas de continuación pierden cuatro columnas de sangría.
pub fn process_description(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut lines = text.lines();
    let title = lines.next().unwrap_or_default();
    let title = title.strip_suffix('.').unwrap_or(title);
    let mut description = vec![title.to_string()];
    description.extend(lines.map(|line| line.chars().skip(4).collect::<String>()));
    Some(description.join("\n"))
}
