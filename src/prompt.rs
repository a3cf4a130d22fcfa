//! Minimal terminal prompts for account and character selection.

use std::io::{self, Write};

/// Read one trimmed line from stdin after printing a prompt.
pub fn read_line(prompt: &str) -> anyhow::Result<String> {
    print!("{}: ", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Numbered selection among options; returns the chosen index.
pub fn select(title: &str, options: &[String]) -> anyhow::Result<usize> {
    println!("{}", title);
    for (i, option) in options.iter().enumerate() {
        println!("  [{}] {}", i + 1, option);
    }

    loop {
        let input = read_line("Selection")?;
        match input.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => return Ok(n - 1),
            _ => println!("Enter a number between 1 and {}", options.len()),
        }
    }
}
