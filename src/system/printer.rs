// src/system/printer.rs

//! Salida de consola para el usuario. Los mensajes de diagnóstico van por
//! `log`; esto es solo lo que el usuario tiene que ver.

use std::env;

const DEFAULT_WIDTH: usize = 80;

pub fn print(message: &str) {
    println!("{}", message);
}

pub fn info(message: &str) {
    println!("{}", message);
}

/// El eco de un comando antes de ejecutarlo.
pub fn echo(message: &str) {
    println!("{}", message);
}

pub fn warning(message: &str) {
    eprintln!("{}", message);
}

pub fn error(message: &str) {
    eprintln!("{}", message);
}

/// Una línea horizontal del ancho de la terminal.
pub fn get_hr() -> String {
    let width = env::var("COLUMNS")
        .ok()
        .and_then(|columns| columns.parse::<usize>().ok())
        .filter(|&width| width > 0)
        .unwrap_or(DEFAULT_WIDTH);
    "=".repeat(width)
}

