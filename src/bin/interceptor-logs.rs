use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ollama_interceptor::inspect::{
    find_exchange, load_exchanges, reconstruct_response, GenerationStats, LoggedExchange,
};

#[derive(Parser)]
#[command(name = "interceptor-logs")]
#[command(about = "Browse exchanges captured by ollama-interceptor", long_about = None)]
struct Cli {
    /// Capture directory
    #[arg(short, long, default_value = "./logs", global = true)]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List captured exchanges, oldest first
    List {
        /// Only show exchanges whose filename, model or messages contain this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one exchange: conversation, assistant answer and stats
    Show {
        /// Exchange id (the numeric filename prefix)
        id: u64,

        /// Print the stored record as-is
        #[arg(long)]
        raw: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { search } => {
            let exchanges = load_exchanges(&cli.dir)?;
            let shown: Vec<&LoggedExchange> = exchanges
                .iter()
                .filter(|e| search.as_deref().map_or(true, |q| e.matches(q)))
                .collect();

            if shown.is_empty() {
                eprintln!("No captures found in {}", cli.dir.display());
                return Ok(());
            }
            for exchange in shown {
                println!(
                    "{:>6}  {}  {:<7} {:<24} {}  {}",
                    exchange.id,
                    exchange.timestamp,
                    exchange.method,
                    exchange.path,
                    exchange.response.status,
                    exchange.model().unwrap_or("-"),
                );
            }
        }
        Commands::Show { id, raw } => {
            let exchange = find_exchange(&cli.dir, id)?;
            if raw {
                let path = cli.dir.join(&exchange.file_name);
                print!("{}", std::fs::read_to_string(path)?);
                return Ok(());
            }
            print_exchange(&exchange);
        }
    }

    Ok(())
}

fn print_exchange(exchange: &LoggedExchange) {
    println!("File:      {}", exchange.file_name);
    println!("Timestamp: {}", local_time(&exchange.timestamp));
    println!("Request:   {} {}", exchange.method, exchange.path);
    println!("Status:    {}", exchange.response.status);
    if let Some(model) = exchange.model() {
        println!("Model:     {}", model);
    }

    let messages = exchange.messages();
    if !messages.is_empty() {
        println!("\n--- Conversation ---");
        for message in messages {
            println!("[{}]\n{}\n", message.role, message.content);
        }
    }

    let Some(body) = exchange.response.body.as_ref() else {
        println!("\n(no response body)");
        return;
    };

    let answer = reconstruct_response(body);
    if !answer.is_empty() {
        println!("--- Assistant ---\n{}\n", answer);
    }

    if let Some(stats) = GenerationStats::from_body(body) {
        println!("--- Stats ---");
        println!("Prompt tokens:              {}", stats.tokens_in);
        println!("Generated tokens:           {}", stats.tokens_out);
        println!("Total time:                 {:.2} s", stats.total_duration_secs);
        println!("Generation time per token:  {:.2} ms", stats.eval_ms_per_token);
        println!("Prompt time per token:      {:.2} ms", stats.prompt_ms_per_token);
    }
}

fn local_time(timestamp: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => ts
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
        Err(_) => format!("{} (unparsed)", timestamp),
    }
}
