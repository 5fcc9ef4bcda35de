//! ollabench - Ollama benchmark harness
//!
//! USAGE:
//!   ollabench run [FLAGS]          # run one benchmark batch, print report
//!   ollabench models               # list models on the Ollama server
//!   ollabench doctor               # check config and connectivity
//!   ollabench config set <k> <v>   # non-interactive config

use anyhow::Result;

use ollabench::client::OllamaClient;
use ollabench::config;
use ollabench::runner::BatchRunner;
use ollabench::types::RunRequest;

// ═══════════════════════════════════════════════════════════════
// CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
enum Command {
    Run { request: RunRequest, csv: bool },
    Models,
    Doctor,
    ConfigSet { key: String, value: String },
    Help,
}

fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        return Command::Help;
    }

    match args.first().map(|s| s.as_str()) {
        Some("models") => return Command::Models,
        Some("doctor") => return Command::Doctor,
        Some("config") => {
            if args.get(1).map(|s| s.as_str()) == Some("set") {
                return Command::ConfigSet {
                    key: args.get(2).cloned().unwrap_or_default(),
                    value: args.get(3).cloned().unwrap_or_default(),
                };
            }
            return Command::Help;
        }
        Some("run") => {}
        _ => return Command::Help,
    }

    // Parse run flags
    let mut request = RunRequest::default();
    let mut keywords: Vec<String> = Vec::new();
    let mut csv = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--model" | "-m" => {
                i += 1;
                request.model = args.get(i).cloned();
            }
            "--prompt" | "-p" => {
                i += 1;
                request.prompt = args.get(i).cloned();
            }
            "--runs" | "-r" => {
                i += 1;
                request.runs = args.get(i).and_then(|v| v.parse().ok());
            }
            "--concurrency" | "-c" => {
                i += 1;
                request.concurrency = args.get(i).and_then(|v| v.parse().ok());
            }
            "--timeout-ms" => {
                i += 1;
                request.timeout_ms = args.get(i).and_then(|v| v.parse().ok());
            }
            "--max-tokens" => {
                i += 1;
                request.max_tokens = args.get(i).and_then(|v| v.parse().ok());
            }
            "--temperature" => {
                i += 1;
                request.temperature = args.get(i).and_then(|v| v.parse().ok());
            }
            "--keyword" | "-k" => {
                i += 1;
                if let Some(kw) = args.get(i) {
                    keywords.push(kw.clone());
                }
            }
            "--provider" => {
                i += 1;
                request.provider = args.get(i).cloned();
            }
            "--csv" => csv = true,
            _ => {}
        }
        i += 1;
    }

    if !keywords.is_empty() {
        request.expected_keywords = Some(keywords);
    }
    Command::Run { request, csv }
}

fn print_help() {
    println!(
        r#"ollabench - Ollama benchmark harness

USAGE:
    ollabench run [FLAGS]          # run one benchmark batch, print report
    ollabench models               # list models on the Ollama server
    ollabench doctor               # check config, base URL, connectivity
    ollabench config set <k> <v>   # set config value (base_url, model)

RUN FLAGS:
    -m, --model <id>        Model to benchmark (default: qwen2.5:3b)
    -p, --prompt <text>     Prompt to send (default: "Say hello.")
    -r, --runs <N>          Runs per batch, capped at 200 (default: 1)
    -c, --concurrency <N>   Parallel calls, capped at runs (default: 1)
        --timeout-ms <N>    Per-call timeout in ms (default: 60000)
        --max-tokens <N>    Token budget per call (default: 64)
        --temperature <F>   Sampling temperature (default: 0.2)
    -k, --keyword <KW>      Expected keyword for quality scoring (repeatable)
        --csv               Print CSV instead of JSON

CONFIG:
    ~/.config/ollabench/config.json    base URL, default model

ENVIRONMENT:
    OLLAMA_BASE_URL         Override base URL (default: http://localhost:11434)
"#
    );
}

// ═══════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    match parse_args() {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Doctor => run_doctor().await,
        Command::Models => run_models().await,
        Command::ConfigSet { key, value } => run_config_set(&key, &value),
        Command::Run { request, csv } => run_bench(request, csv).await,
    }
}

// ═══════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════

async fn run_bench(mut request: RunRequest, csv: bool) -> Result<()> {
    // CLI default model can come from the config file
    if request.model.is_none() {
        request.model = config::Config::load()?.default_model;
    }

    let params = request.normalize();
    eprintln!(
        "Benchmarking {} on {} ({} runs, concurrency {})...",
        params.model,
        config::base_url(),
        params.runs,
        params.concurrency
    );

    let report = BatchRunner::new().run(&request).await;

    if csv {
        print!("{}", report.to_csv());
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let failed = report.results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        eprintln!("{}/{} runs failed", failed, report.results.len());
    }
    Ok(())
}

async fn run_models() -> Result<()> {
    let client = OllamaClient::new();
    let reply = client.list_models().await;

    println!("Ollama at {}", reply.base_url);
    if let Some(err) = &reply.error {
        println!("  error: {}", err);
        return Ok(());
    }
    println!("Models ({}):", reply.count);
    for m in &reply.models {
        println!("  {}", m);
    }
    Ok(())
}

async fn run_doctor() -> Result<()> {
    println!("ollabench doctor\n");

    // Check config file
    let cfg = config::Config::load()?;
    let path = config::config_path()?;
    println!(
        "[{}] Config: {}",
        if path.exists() { "✓" } else { "·" },
        path.display()
    );

    // Effective base URL and where it comes from
    let from_env = std::env::var("OLLAMA_BASE_URL").is_ok();
    println!(
        "[✓] Base URL: {} ({})",
        config::base_url(),
        if from_env {
            "env"
        } else if cfg.base_url.is_some() {
            "config"
        } else {
            "default"
        }
    );

    // Check network
    print!("[?] Ollama: checking...");
    let client = OllamaClient::new();
    match client.check_connectivity().await {
        Ok(()) => println!("\r[✓] Ollama: reachable          "),
        Err(e) => println!("\r[✗] Ollama: {}", e),
    }

    Ok(())
}

fn run_config_set(key: &str, value: &str) -> Result<()> {
    let mut cfg = config::Config::load()?;

    match key {
        "base_url" | "url" => {
            cfg.base_url = Some(value.to_string());
            cfg.save()?;
            println!("Base URL saved to {}", config::config_path()?.display());
        }
        "model" => {
            cfg.default_model = Some(value.to_string());
            cfg.save()?;
            println!("Default model set to: {}", value);
        }
        _ => {
            anyhow::bail!("Unknown config key: {}. Valid keys: base_url, model", key);
        }
    }
    Ok(())
}
