use clap::Parser;
use primefleet::coordinator::{Coordinator, Endpoint};
use primefleet::logger;
use primefleet::worker::{Worker, DEFAULT_PORT};
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Run as a worker instead of the coordinator
    #[arg(short = 'w', long)]
    worker: bool,

    /// Port the worker listens on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds the coordinator waits for worker replies before giving up
    /// on a number
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Worker endpoints the coordinator connects to, e.g. localhost:4444
    #[arg(value_name = "HOST:PORT")]
    workers: Vec<Endpoint>,
}

#[tokio::main]
async fn main() -> ExitCode {
    logger::init();

    match run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err.as_ref());
            while let Some(cause) = current {
                if let Some(ioerr) = cause.downcast_ref::<std::io::Error>() {
                    if ioerr.kind() == std::io::ErrorKind::BrokenPipe {
                        return ExitCode::SUCCESS;
                    }
                }
                current = cause.source();
            }

            eprintln!("Error: {}", err);
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let task = async move {
        if args.worker {
            // A failure to bind the listening port is fatal.
            let worker = Worker::bind(args.port).await?;
            worker.run().await?;
        } else {
            if args.workers.is_empty() {
                return Err(
                    "expected at least one worker endpoint, e.g. localhost:4444".into()
                );
            }
            let coordinator =
                Coordinator::connect(&args.workers, Duration::from_secs(args.timeout_secs))
                    .await?;
            coordinator.run().await?;
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    };

    tokio::select! {
        res = task => res?,
        _ = signal::ctrl_c() => {
            println!("\nShutting down gracefully...");
        }
    }

    Ok(())
}
