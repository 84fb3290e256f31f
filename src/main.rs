//! kubectl-linstor
//!
//! Runs the LINSTOR client inside the controller of the current cluster.
//!
//! ```text
//! kubectl linstor node list
//! kubectl linstor resource list -r pvc:default/data-pvc
//! kubectl linstor volume list -r pod:default/web-0
//! kubectl linstor sos-report download /tmp
//! ```

use clap::Parser;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use kubectl_linstor::{CommandForwarder, EndpointKind, KubectlClient, PluginConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Run the LINSTOR client in the cluster's LINSTOR controller.
///
/// Plugin options must come before the LINSTOR command; everything from the
/// first positional argument on is passed to `linstor`.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Args {
    /// kubectl binary to run
    #[arg(long, env = "KUBECTL_LINSTOR_KUBECTL", default_value = "kubectl")]
    kubectl: String,

    /// Address the controller as a deployment or a running pod
    #[arg(long, env = "KUBECTL_LINSTOR_CONTROLLER_TARGET", default_value = "deployment")]
    controller_target: EndpointKind,

    /// Command run inside the controller
    #[arg(long, env = "KUBECTL_LINSTOR_REMOTE_COMMAND", default_value = "linstor")]
    remote_command: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "KUBECTL_LINSTOR_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "KUBECTL_LINSTOR_LOG_JSON")]
    log_json: bool,

    /// LINSTOR command and arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Args {
    fn plugin_config(&self) -> PluginConfig {
        PluginConfig {
            kubectl: self.kubectl.clone(),
            remote_command: self.remote_command.clone(),
            controller_target: self.controller_target,
            ..Default::default()
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    let config = args.plugin_config();
    debug!("kubectl-linstor {} with {:?}", kubectl_linstor::VERSION, config);

    // One interrupt cancels every outstanding kubectl call
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Received interrupt");
            on_interrupt.cancel();
        }
    });

    let kubectl = Arc::new(KubectlClient::new(config.kubectl.clone()));
    let forwarder = CommandForwarder::new(kubectl.clone(), kubectl, config);
    let tty = std::io::stdout().is_terminal();

    match forwarder.run(&args.command, tty, &cancel).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout belongs to the forwarded command
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // Colors only for a terminal, a redirected stderr gets plain text
        tracing_subscriber::registry()
            .with(filter)
            .with(text_layer(std::io::stderr, std::io::stderr().is_terminal()))
            .init();
    }
}

fn text_layer<S, W>(writer: W, ansi: bool) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .without_time()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::sync::Mutex;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged(ansi: bool) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::registry().with(text_layer(move || writer.clone(), ansi));

        tracing::subscriber::with_default(subscriber, || tracing::warn!("controller not ready"));

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_redirected_logs_have_no_escapes() {
        let plain = logged(false);
        assert!(plain.contains("WARN"));
        assert!(plain.contains("controller not ready"));
        assert!(!plain.contains('\x1b'));

        assert!(logged(true).contains('\x1b'));
    }

    #[test]
    fn test_command_is_passed_through() {
        let args = parse(&["kubectl-linstor", "resource", "list", "--help", "-r", "pvc:ns/x"]);
        assert_eq!(args.command, vec!["resource", "list", "--help", "-r", "pvc:ns/x"]);
        assert_eq!(args.kubectl, "kubectl");
    }

    #[test]
    fn test_plugin_options_before_command() {
        let args = parse(&[
            "kubectl-linstor",
            "--controller-target",
            "pod",
            "--remote-command",
            "/usr/bin/linstor",
            "node",
            "list",
        ]);

        let config = args.plugin_config();
        assert_eq!(config.controller_target, EndpointKind::Pod);
        assert_eq!(config.remote_command, "/usr/bin/linstor");
        assert_eq!(args.command, vec!["node", "list"]);
    }

    #[test]
    fn test_options_after_command_belong_to_linstor() {
        let args = parse(&["kubectl-linstor", "node", "list", "--kubectl", "x"]);
        assert_eq!(args.kubectl, "kubectl");
        assert_eq!(args.command, vec!["node", "list", "--kubectl", "x"]);
    }

    #[test]
    fn test_no_command() {
        let args = parse(&["kubectl-linstor"]);
        assert!(args.command.is_empty());
    }
}
