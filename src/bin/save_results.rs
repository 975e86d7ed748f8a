//! Posts a batch of results to a running server.
//!
//! Without `--file` a small sample batch is sent, which is handy to check
//! that a fresh installation accepts data.

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "save-results", about = "Submit benchmark results to codespeed")]
struct Args {
    /// Server root, e.g. http://localhost:8000/
    #[clap(long, default_value = "http://localhost:8000/")]
    url: String,
    /// JSON file holding a list of results; sample data when omitted
    #[clap(long)]
    file: Option<PathBuf>,
    #[clap(long, requires = "password")]
    user: Option<String>,
    #[clap(long, requires = "user")]
    password: Option<String>,
}

fn sample_data() -> Value {
    json!([
        {
            "commitid": "8",
            "project": "MyProject",
            "branch": "default",
            "executable": "myexe O3 64bits",
            "benchmark": "float",
            "environment": "Dual Core",
            "result_value": 2500.0
        },
        {
            "commitid": "8",
            "project": "MyProject",
            "branch": "default",
            "executable": "myexe O3 64bits",
            "benchmark": "int",
            "environment": "Dual Core",
            "result_value": 1100
        }
    ])
}

fn endpoint(url: &str) -> String {
    format!("{}/result/add/json/", url.trim_end_matches('/'))
}

fn load_results(file: Option<&PathBuf>) -> anyhow::Result<Value> {
    let results = match file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
        }
        None => sample_data(),
    };
    if !results.is_array() {
        bail!("results must be a JSON list of objects");
    }
    Ok(results)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let results = load_results(args.file.as_ref())?;
    let payload = serde_json::to_string(&results)?;
    let url = endpoint(&args.url);

    let client = reqwest::blocking::Client::new();
    let mut request = client.post(&url).form(&[("json", payload)]);
    if let Some(user) = &args.user {
        request = request.basic_auth(user, args.password.as_ref());
    }

    let response = request
        .send()
        .with_context(|| format!("failed to reach {}", url))?;
    let status = response.status();
    let body = response.text()?;
    if !status.is_success() {
        eprintln!("{}", status);
        eprintln!("{}", body);
        std::process::exit(1);
    }

    println!("Server ({}) response: {}", args.url, body);
    Ok(())
}
