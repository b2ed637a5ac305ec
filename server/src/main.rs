use tracing::error;
use vmtester_server::{config, Server};

fn print_banner(addr: &str) {
    println!("Mock Voice Manager Server");
    println!("Listening on ws://{addr}");
    println!("Expected message flow:");
    println!("  1. registration: {{\"UID\": \"user_id\"}} or {{\"command\": \"UID\", \"message\": \"user_id\"}}");
    println!("  2. user turns:   {{\"command\": \"USER\", \"message\": \"prompt goes here\"}}");
    println!("  3. replies:      {{\"command\": \"LLM\", \"message\": \"response from the service\"}}");
    println!();
    println!("Press Ctrl+C to stop");
}

#[tokio::main]
async fn main() {
    #[cfg(debug_assertions)]
    {
        use tracing::Level;
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::fmt::init();
    }

    let addr = format!("0.0.0.0:{}", config::listen_port());
    print_banner(&addr);

    let server = Server::new();

    let reporter = server.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config::STATUS_INTERVAL);
        interval.tick().await; // the first tick fires immediately
        loop {
            interval.tick().await;
            reporter.print_status().await;
        }
    });

    if let Err(e) = server.run(&addr).await {
        error!("server error: {}", e);
    }
}
