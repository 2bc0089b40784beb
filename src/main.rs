use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use treesh::pipe::DEFAULT_SLOTS;
use treesh::{ChanPipe, Shell, ShellConfig, ShellOptions, RUNNER_STACK_SIZE};

#[derive(Parser)]
#[command(name = "treesh")]
#[command(about = "A POSIX-style shell with a tree-walking interpreter")]
#[command(version)]
struct Cli {
    /// Execute the script from command line argument
    #[arg(short = 'c')]
    script: Option<String>,

    /// Working directory
    #[arg(long = "cwd")]
    cwd: Option<String>,

    /// Output results as JSON (stdout, stderr, exitCode)
    #[arg(long = "json")]
    json: bool,

    /// TOML configuration file (env, cwd, limits)
    #[arg(long = "config")]
    config: Option<String>,

    /// Enable debug logging on stderr
    #[arg(long = "debug")]
    debug: bool,

    /// Script file to execute
    #[arg()]
    script_file: Option<String>,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .thread_stack_size(RUNNER_STACK_SIZE)
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("treesh: cannot start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let status = runtime.block_on(run(cli));
    // Don't wait for a stdin feeder still blocked on the terminal.
    runtime.shutdown_background();
    ExitCode::from(status)
}

async fn run(cli: Cli) -> u8 {
    let mut options = match cli.config.as_deref().map(ShellConfig::load).transpose() {
        Ok(config) => config.map(ShellOptions::from).unwrap_or_default(),
        Err(e) => {
            eprintln!("treesh: {}", e);
            return 2;
        }
    };
    if cli.cwd.is_some() {
        options.cwd = cli.cwd;
    }

    // Determine script source: -c, file, or an interactive session on stdin
    let script = if let Some(s) = cli.script {
        s
    } else if let Some(ref file) = cli.script_file {
        match std::fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("treesh: cannot read script file: {}: {}", file, e);
                return 1;
            }
        }
    } else {
        return interactive(options).await;
    };

    let joined = tokio::task::spawn_blocking(move || Shell::new(options).exec(&script)).await;
    let result = match joined {
        Ok(result) => result,
        Err(e) => {
            eprintln!("treesh: {}", e);
            return 1;
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string(&result).unwrap_or_else(|_| String::from("{}"))
        );
    } else {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
    }
    (result.exit_code & 0xff) as u8
}

/// Forward stdin into the session's input pipe and its output pipe to stdout.
async fn interactive(options: ShellOptions) -> u8 {
    let input = ChanPipe::shared(DEFAULT_SLOTS);
    let output = ChanPipe::shared(DEFAULT_SLOTS);

    {
        let input = Arc::clone(&input);
        tokio::task::spawn_blocking(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(mut line) = line else { break };
                line.push('\n');
                if input.write_str(&line).is_err() {
                    break;
                }
            }
            input.close();
        });
    }
    let drainer = {
        let output = Arc::clone(&output);
        tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            let mut buf = [0u8; 4096];
            while let Ok(n) = output.read(&mut buf) {
                if n == 0 || stdout.write_all(&buf[..n]).and_then(|_| stdout.flush()).is_err() {
                    break;
                }
            }
            output.close();
        })
    };

    let session = {
        let (input, output) = (Arc::clone(&input), Arc::clone(&output));
        tokio::task::spawn_blocking(move || {
            let mut shell = Shell::new(options);
            let result = shell.interact(input, output);
            (result, shell.runner().exit_status())
        })
    };

    let status = match session.await {
        Ok((Ok(()), status)) => status,
        Ok((Err(e), _)) => {
            tracing::warn!(error = %e, "session failed");
            eprintln!("treesh: {}", e);
            1
        }
        Err(e) => {
            eprintln!("treesh: {}", e);
            1
        }
    };

    // The session closed the output pipe; wait until it is flushed.
    let _ = drainer.await;
    input.close();
    (status & 0xff) as u8
}
