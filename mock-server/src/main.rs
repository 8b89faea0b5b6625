//! Standalone mock server for trying the `fetch` binary by hand.
//!
//! Binds `MOCK_ADDR` (default `127.0.0.1:3000`).

use tokio::net::TcpListener;

const ROUTES: &[&str] = &[
    "/echo",
    "/status/{code}",
    "/redirect",
    "/cookies",
    "/cookies/set?name=value",
    "/delay/{millis}",
    "/compressed",
];

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let addr = std::env::var("MOCK_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;
    for route in ROUTES {
        println!("http://{local}{route}");
    }
    mock_server::run(listener).await
}
