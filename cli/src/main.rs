//! `fetch` - one blocking request from the command line.
//!
//! Reads a client configuration from the JSON file named by `FETCH_CONFIG`
//! (or a preset named by `FETCH_PROFILE`), applies the flags, performs one
//! GET / POST / PUT and prints the body. Log verbosity follows `RUST_LOG`.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use fetch_core::{ClientConfig, FetchClient, Payload, Profile};

#[derive(Debug, Default, PartialEq)]
struct Args {
    method: String,
    url: String,
    fields: Vec<(String, String)>,
    data: Option<String>,
    headers: Vec<String>,
    cookie: Option<PathBuf>,
    info: bool,
    verbose: bool,
    include: bool,
    insecure: bool,
}

fn parse_args(argv: &[String]) -> anyhow::Result<Args> {
    let mut iter = argv.iter();
    let method = iter.next().context("missing command")?.to_ascii_lowercase();
    if !matches!(method.as_str(), "get" | "post" | "put") {
        bail!("unknown command: {method}");
    }
    let url = iter.next().context("missing url")?.clone();

    let mut args = Args {
        method,
        url,
        ..Args::default()
    };
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-H" | "--header" => args.headers.push(iter.next().context("-H needs a value")?.clone()),
            "-d" | "--data" => args.data = Some(iter.next().context("--data needs a value")?.clone()),
            "-c" | "--cookie" => {
                args.cookie = Some(PathBuf::from(iter.next().context("--cookie needs a path")?))
            }
            "-i" | "--include" => args.include = true,
            "-k" | "--insecure" => args.insecure = true,
            "-v" | "--verbose" => args.verbose = true,
            "--info" => args.info = true,
            field => match field.split_once('=') {
                Some((key, value)) => args.fields.push((key.to_string(), value.to_string())),
                None => bail!("unexpected argument: {field}"),
            },
        }
    }
    Ok(args)
}

fn load_config() -> anyhow::Result<ClientConfig> {
    if let Ok(path) = env::var("FETCH_CONFIG") {
        return ClientConfig::from_path(path.as_ref())
            .with_context(|| format!("loading client config from {path}"));
    }
    let profile = match env::var("FETCH_PROFILE").as_deref() {
        Ok("browser") => Profile::Browser,
        Ok("fetcher") => Profile::Fetcher,
        _ => Profile::Basic,
    };
    Ok(ClientConfig::profile(profile))
}

fn run(args: Args) -> anyhow::Result<bool> {
    let mut client = FetchClient::with_config(load_config()?);

    for line in &args.headers {
        client.push_raw_header(line.as_str());
    }
    if args.verbose {
        client.verbose_on();
        client.request_header_on();
    }
    if args.include {
        client.response_header_on();
    }
    if args.insecure {
        client.ssl_verify_off();
    }
    if let Some(path) = &args.cookie {
        if !path.exists() {
            std::fs::write(path, "").with_context(|| format!("creating {}", path.display()))?;
        }
        client.assign_cookie_path(path)?;
        client.enable_cookie()?;
    }

    let payload = match args.data {
        Some(raw) => Payload::Raw(raw),
        None => Payload::Form(args.fields.clone()),
    };
    let body = match args.method.as_str() {
        "get" => {
            let params: Vec<(&str, &str)> =
                args.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            client.get(&args.url, &params)?
        }
        "post" => client.post(&args.url, payload)?,
        _ => client.put(&args.url, payload)?,
    };

    if args.verbose {
        for line in client.request_headers().unwrap_or_default() {
            eprintln!("> {line}");
        }
    }
    print!("{body}");
    if args.info {
        if let Some(info) = client.transfer_info() {
            eprintln!("{}", info.to_json());
        }
    }
    if let Err(err) = client.check_transport() {
        eprintln!("{err}");
        return Ok(false);
    }
    Ok(true)
}

fn print_usage() {
    println!(
        r#"fetch - blocking HTTP requests

USAGE:
    fetch get <url> [key=value ...] [OPTIONS]
    fetch post <url> [key=value ... | --data <body>] [OPTIONS]
    fetch put <url> [key=value ... | --data <body>] [OPTIONS]

OPTIONS:
    -H, --header <line>   Add a header line ("Name: value")
    -d, --data <body>     Send <body> verbatim
    -c, --cookie <path>   Read and store cookies in <path>
    -i, --include         Print response headers before the body
    -k, --insecure        Skip TLS verification
    -v, --verbose         Trace the exchange on stderr
        --info            Print transfer details as JSON on stderr

ENVIRONMENT:
    FETCH_CONFIG          JSON client configuration file
    FETCH_PROFILE         basic | browser | fetcher
    RUST_LOG              log filter (default fetch_core=warn)"#
    );
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fetch_core=warn")),
        )
        .init();

    let argv: Vec<String> = env::args().skip(1).collect();
    if argv.is_empty() || matches!(argv[0].as_str(), "-h" | "--help" | "help") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}
