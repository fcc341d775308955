// src/system/io.rs

use crate::core::errors::RunError;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;

/// Valores que confirman por defecto.
pub const YES_VALUES: &[&str] = &["y", "yes"];

/// ¿La respuesta es uno de los valores afirmativos? No distingue
/// mayúsculas y descarta los espacios.
pub fn is_confirmation(answer: &str, yes_values: &[&str]) -> bool {
    let answer = answer.trim().to_lowercase();
    yes_values.iter().any(|yes| *yes == answer)
}

/// Pide confirmación al usuario: `{message} [y/N]`.
///
/// Un error de lectura (stdin cerrado, Ctrl-C) cuenta como una negativa.
pub fn confirm(message: &str, yes_values: &[&str]) -> bool {
    let yes = yes_values.first().copied().unwrap_or("y");
    let answer = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("{} [{}/N]", message, yes))
        .allow_empty(true)
        .interact_text();
    match answer {
        Ok(answer) => is_confirmation(&answer, yes_values),
        Err(e) => {
            log::debug!("Confirmación interrumpida: {}", e);
            false
        }
    }
}

/// El error con el que se aborta una ejecución: "Aborted" si no hay
/// mensaje.
pub fn abort(return_code: i32, message: Option<&str>) -> RunError {
    RunError::aborted(return_code, message.unwrap_or("Aborted"))
}

/// Pide confirmación y aborta con `return_code` si no se da.
pub fn confirm_or_abort(message: &str, return_code: i32) -> Result<(), RunError> {
    if confirm(message, YES_VALUES) {
        Ok(())
    } else {
        Err(abort(return_code, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("y", true)]
    #[case(" YES ", true)]
    #[case("", false)]
    #[case("n", false)]
    #[case("yep", false)]
    fn confirmation_answers(#[case] answer: &str, #[case] expected: bool) {
        assert_eq!(is_confirmation(answer, YES_VALUES), expected);
    }

    #[test]
    fn abort_defaults_its_message() {
        let error = abort(0, None);
        assert!(error.is_abort());
        assert_eq!(error.to_string(), "Aborted");
        assert_eq!(error.return_code(), 0);
        assert_eq!(abort(3, Some("Nope")).to_string(), "Nope");
    }
}
