use bcrypt::{hash, DEFAULT_COST};
use std::env;

fn main() {
    let password = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: hash-password <PASSWORD> [COST]");
        std::process::exit(1);
    });

    let cost = match env::args().nth(2).map(|raw| raw.parse::<u32>()) {
        None => DEFAULT_COST,
        Some(Ok(cost)) => cost,
        Some(Err(e)) => {
            eprintln!("Invalid cost: {}", e);
            std::process::exit(1);
        }
    };

    match hash(&password, cost) {
        Ok(hashed) => {
            println!("Cost : {}", cost);
            println!("Hash : {}\n", hashed);
            println!("# Paste this into your .env:");
            println!("ADMIN_HASH_PASSWORD={}", hashed);
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}
