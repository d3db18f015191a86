use std::future::Future;

use tokio::io::{BufWriter, Stdout};
use tracing::{Level, debug, warn};
use tracing_subscriber::EnvFilter;

use super::error::AppError;
use crate::streaming::{DemuxError, DestroyHandle};

/// Environment variable overriding the `-v` derived log filter
pub const LOG_ENV: &str = "DEMUX_LOG";

/// Output handles passed to the application's main function
pub struct Writers {
    pub stdout: BufWriter<Stdout>,
}

impl Writers {
    fn stdout() -> Self {
        Self {
            stdout: BufWriter::new(tokio::io::stdout()),
        }
    }
}

/// Reusable CLI application runner that handles:
/// - Verbosity flags and tracing setup (logs go to stderr)
/// - Signal handling (SIGINT, SIGTERM, SIGHUP)
/// - Exit codes (0 = success, 1 = error, 130 = SIGINT, 143 = SIGTERM, 129 = SIGHUP)
///
/// A signal destroys the running session through its [`DestroyHandle`]; the
/// main function is still awaited so it can release its resources.
pub struct CliApp<A> {
    name: String,
    log_env: String,
    value_flags: Vec<String>,
    parse: Box<dyn FnOnce(Vec<String>) -> Result<A, AppError>>,
}

impl CliApp<Vec<String>> {
    /// Create a new CLI application runner that passes raw arguments through
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            log_env: LOG_ENV.to_string(),
            value_flags: Vec::new(),
            parse: Box::new(Ok),
        }
    }
}

impl<A> CliApp<A> {
    /// Parse arguments (program name first, verbosity flags removed) before running
    pub fn with_args<B, P>(self, parse: P) -> CliApp<B>
    where
        P: FnOnce(Vec<String>) -> Result<B, AppError> + 'static,
    {
        CliApp {
            name: self.name,
            log_env: self.log_env,
            value_flags: self.value_flags,
            parse: Box::new(parse),
        }
    }

    /// Flags whose next argument is a value, never a verbosity flag
    pub fn with_value_flags(mut self, flags: &[&str]) -> Self {
        self.value_flags = flags.iter().map(|flag| flag.to_string()).collect();
        self
    }

    /// Read the log filter from a different environment variable (defaults to `DEMUX_LOG`)
    pub fn with_log_env(mut self, var: &str) -> Self {
        self.log_env = var.to_string();
        self
    }

    /// Run the CLI application on a new tokio runtime
    ///
    /// This function never returns - it calls std::process::exit with the appropriate code
    pub fn run<F, Fut>(self, main_fn: F) -> !
    where
        F: FnOnce(Writers, A, DestroyHandle) -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        let (verbosity, args) = split_verbosity(std::env::args().collect(), &self.value_flags);
        init_tracing(&self.log_env, verbosity);

        let args = match (self.parse)(args) {
            Ok(args) => args,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        };

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                eprintln!("Error: failed to start runtime: {e}");
                std::process::exit(1);
            }
        };

        debug!(app = %self.name, "Starting");
        let code = runtime.block_on(drive(main_fn, args));
        std::process::exit(code);
    }
}

/// Race main application logic against signal reception
async fn drive<A, F, Fut>(main_fn: F, args: A) -> i32
where
    F: FnOnce(Writers, A, DestroyHandle) -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let handle = DestroyHandle::new();
    let main = main_fn(Writers::stdout(), args, handle.clone());
    tokio::pin!(main);

    tokio::select! {
        result = &mut main => match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {e}");
                1
            }
        },
        signal = wait_for_signal() => {
            eprintln!("Received {}", signal.name());
            handle.destroy(Some(DemuxError::Cancelled(signal.name().to_string())));
            if let Err(e) = main.await {
                debug!(error = %e, "Main function ended after signal");
            }
            signal.exit_code()
        }
    }
}

/// Signals that end the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
    Hangup,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
        }
    }

    /// 128 + signal number
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Interrupt => 130,
            Self::Terminate => 143,
            Self::Hangup => 129,
        }
    }
}

/// Wait for any Unix signal (SIGINT, SIGTERM, SIGHUP) or Ctrl+C
async fn wait_for_signal() -> Signal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let handlers = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        );
        let (mut sigterm, mut sigint, mut sighup) = match handlers {
            (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
            _ => {
                warn!("Failed to set up signal handlers; signals will not be handled");
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => Signal::Terminate,
            _ = sigint.recv() => Signal::Interrupt,
            _ = sighup.recv() => Signal::Hangup,
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to set up Ctrl+C handler");
            return std::future::pending().await;
        }
        Signal::Interrupt
    }
}

/// Remove `-v`/`-vv`/`--verbose` flags, returning how many levels they add
///
/// The argument after any of `value_flags` is kept as that flag's value.
pub fn split_verbosity(args: Vec<String>, value_flags: &[String]) -> (u8, Vec<String>) {
    let mut verbosity = 0u8;
    let mut value_pending = false;
    let rest = args
        .into_iter()
        .filter(|arg| match arg.as_str() {
            _ if value_pending => {
                value_pending = false;
                true
            }
            flag if value_flags.iter().any(|f| f == flag) => {
                value_pending = true;
                true
            }
            "--verbose" => {
                verbosity = verbosity.saturating_add(1);
                false
            }
            flag if flag.len() > 1 && flag.starts_with('-') && flag[1..].bytes().all(|b| b == b'v') => {
                verbosity = verbosity.saturating_add((flag.len() - 1) as u8);
                false
            }
            _ => true,
        })
        .collect();
    (verbosity, rest)
}

/// Console log level for a number of `-v` flags
pub fn verbosity_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialize tracing to stderr; the environment variable wins over `-v` flags
fn init_tracing(log_env: &str, verbosity: u8) {
    let filter = EnvFilter::try_from_env(log_env)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_level(verbosity).to_string()));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        debug!("Tracing subscriber already installed");
    }
}
