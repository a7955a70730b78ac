#[tokio::main]
async fn main() {
    if let Err(e) = twintalk::run().await {
        eprintln!("twintalk failed to start: {e}");
        std::process::exit(1);
    }
}
