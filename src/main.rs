mod app;
mod cli;

fn main() {
    // Keep stdout clean for the progress line; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = cli::parse();
    app::run(cli);
}
