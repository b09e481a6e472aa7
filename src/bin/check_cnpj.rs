//! Utility to check CNPJ numbers from the command line.
//!
//! Reads numbers from the arguments, or one per line from stdin when none
//! are given, and prints each with its formatted form and validity.

use agentdex_api::cnpj::{format_cnpj, validate_company_id};
use std::io::{self, BufRead};

fn report(raw: &str) -> bool {
    let valid = validate_company_id(raw);
    println!(
        "{:<22} {:<20} {}",
        raw.trim(),
        format_cnpj(raw),
        if valid { "válido" } else { "inválido" }
    );
    valid
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut invalid = 0usize;
    if args.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if !report(&line) {
                invalid += 1;
            }
        }
    } else {
        invalid = args.iter().filter(|a| !report(a)).count();
    }

    if invalid > 0 {
        anyhow::bail!("{} CNPJ(s) inválido(s)", invalid);
    }
    Ok(())
}
