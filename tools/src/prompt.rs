use std::io::Write;

use idb::Prompt;

/// Operator at the terminal
pub struct StdinPrompt;

/// Reads one trimmed line, `None` once stdin is closed
pub fn read_line() -> Option<String> {
    let mut buf = String::new();
    match std::io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn ask(question: &str) -> Option<String> {
    print!("{question} ");
    std::io::stdout().flush().ok();
    read_line()
}

impl Prompt for StdinPrompt {
    fn say(&mut self, message: &str) {
        println!("{message}");
    }

    async fn pause(&mut self, message: &str) {
        ask(message);
    }

    async fn agree(&mut self, question: &str) -> bool {
        loop {
            let Some(answer) = ask(question) else {
                return false;
            };
            match answer.to_lowercase().as_str() {
                "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => println!("Please enter \"yes\" or \"no\"."),
            }
        }
    }

    async fn choose(&mut self, question: &str, options: &[String]) -> Option<usize> {
        println!("{question}");
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }
        match ask("Number (empty for none):")?.parse::<usize>() {
            Ok(n) if n >= 1 && n <= options.len() => Some(n - 1),
            _ => None,
        }
    }
}
