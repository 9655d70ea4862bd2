use std::env;
use std::path::PathBuf;
use std::process;

use primecount_rs::scheduler::{count_primes, print_final_report, RunConfig};

fn usage(exe: &str) -> String {
    format!(
        "usage: {} [--workers=N] [--max-attempts=N] [--quiet] [path]\n\
         counts prime integers in a one-integer-per-line file (default: input.txt)",
        exe
    )
}

fn main() {
    let mut args = env::args_os();
    let exe = args
        .next()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "primecount".into());

    let mut cfg = RunConfig {
        progress: true,
        ..RunConfig::default()
    };
    let mut path: Option<PathBuf> = None;

    for arg in args {
        if let Some(flag) = arg.to_str() {
            if let Some(value) = flag.strip_prefix("--workers=") {
                match value.parse::<usize>() {
                    Ok(n) if n > 0 => cfg.workers = n,
                    _ => {
                        eprintln!("invalid worker count: {}", value);
                        eprintln!("{}", usage(&exe));
                        process::exit(2);
                    }
                }
                continue;
            }
            if let Some(value) = flag.strip_prefix("--max-attempts=") {
                match value.parse::<u32>() {
                    Ok(n) => cfg.max_task_attempts = n,
                    Err(_) => {
                        eprintln!("invalid attempt cap: {}", value);
                        eprintln!("{}", usage(&exe));
                        process::exit(2);
                    }
                }
                continue;
            }
            match flag {
                "--quiet" | "-q" => {
                    cfg.progress = false;
                    continue;
                }
                "--help" | "-h" => {
                    eprintln!("{}", usage(&exe));
                    process::exit(0);
                }
                _ if flag.starts_with("--") => {
                    eprintln!("unknown flag: {}", flag);
                    eprintln!("{}", usage(&exe));
                    process::exit(2);
                }
                _ => {}
            }
        }

        if path.is_some() {
            eprintln!("{}", usage(&exe));
            process::exit(2);
        }
        path = Some(PathBuf::from(arg));
    }

    let path = path.unwrap_or_else(|| PathBuf::from("input.txt"));

    match count_primes(&path, &cfg) {
        Ok(report) => print_final_report(&report),
        Err(err) => {
            eprintln!("{}: {}", exe, err);
            process::exit(1);
        }
    }
}
