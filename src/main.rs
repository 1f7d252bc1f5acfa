use clap::Parser;
use taskgate::cli::{
    Args, build_config, build_mailer, ensure_uploads_dir, init_logging, load_secrets,
    open_database, validate_client_url,
};
use taskgate::run_server;
use tracing::{error, info};

fn main() {
    // A missing .env is fine; real environment variables still apply
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_format);

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    // Secrets are read and scrubbed from the environment before the runtime
    // spawns its worker threads.
    let Some(secrets) = load_secrets(
        args.access_secret_file.as_deref(),
        args.refresh_secret_file.as_deref(),
    ) else {
        std::process::exit(1);
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to start async runtime");
            std::process::exit(1);
        });

    runtime.block_on(serve(args, secrets));
}

async fn serve(args: Args, secrets: (String, String)) {
    let Some(client_url) = validate_client_url(&args.client_url) else {
        std::process::exit(1);
    };

    let Some(uploads_dir) = ensure_uploads_dir(&args.uploads_dir) else {
        std::process::exit(1);
    };

    let Some(mailer) = build_mailer(&args) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(&args, db, client_url, secrets, mailer, uploads_dir);

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(e) => error!(error = %e, "Failed to read local address"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
